//! The public API: `init`, `allocate`, `release`, `resize`, `zero_allocate`.
//!
//! This module owns the allocator's process-wide state (one [`SegAlloc`]
//! per heap) and wires the other components together. It speaks in `usize`
//! offsets into the backing [`RegionProvider`]; only [`crate::Allocator`]
//! converts those offsets to outward-facing pointers.
mod coalescer;
mod extend;
mod fit;
mod free_list;
mod placer;
pub mod tag;

pub use extend::{CHUNK, INIT};
pub use free_list::{class_of, class_range, FreeList, NUM_CLASSES};
pub use tag::Tag;

use crate::error::RegionError;
use crate::region::RegionProvider;

/// Smallest allocated block: a 4-byte header plus 12 usable bytes.
pub const MIN_ALLOC: u32 = 16;
/// Smallest free block: header, next/prev offsets, and footer.
pub const MIN_FREE: u32 = 16;

/// The heap layout's fixed bytes: one padding word, prologue header, ten
/// 8-byte sentinels, prologue footer, epilogue header.
///
/// `(2*(MAXLIST+1) + 4) * 4` in the spec's terms, with `MAXLIST+1` being
/// [`NUM_CLASSES`]: padding(4) + prologue header(4) + ten sentinels(80) +
/// prologue footer(4) + epilogue header(4) = 96 bytes.
const fn init_size() -> usize {
    (2 * NUM_CLASSES + 4) * 4
}

/// A segregated-fit allocator over a single [`RegionProvider`].
///
/// Lazily initialized on first use, matching the spec's "if the allocator
/// is uninitialized, call `init`" rule for `allocate`.
pub struct SegAlloc<R: RegionProvider> {
    region: R,
    free_list: FreeList,
    epilogue_addr: usize,
    initialized: bool,
}
impl<R: RegionProvider> SegAlloc<R> {
    /// Wrap a fresh, not-yet-initialized region.
    pub const fn new(region: R) -> Self {
        Self {
            region,
            free_list: FreeList::new(0, 0),
            epilogue_addr: 0,
            initialized: false,
        }
    }

    /// Lay out the padding word, prologue (with its ten sentinels), and
    /// epilogue, then request the first real chunk of free space.
    pub fn init(&mut self) -> Result<(), RegionError> {
        let base = self.region.region_extend(init_size())?;
        self.region.write_u32(base, 0); // alignment padding

        let prologue_bp = base + 8;
        let prologue_size = (init_size() - 8) as u32;
        tag::write_prologue_tags(&mut self.region, prologue_bp, prologue_size);

        self.free_list = FreeList::new(base, prologue_bp);
        for class in 0..NUM_CLASSES {
            let s = self.free_list.sentinel(class);
            self.region.write_u32(s, s as u32);
            self.region.write_u32(s + 4, s as u32);
        }

        self.epilogue_addr = prologue_bp + prologue_size as usize;
        tag::write_epilogue_tag(&mut self.region, self.epilogue_addr, true);
        self.initialized = true;

        extend::extend_heap(
            &mut self.region,
            &self.free_list,
            &mut self.epilogue_addr,
            extend::INIT,
        )?;
        Ok(())
    }

    fn ensure_init(&mut self) -> Result<(), RegionError> {
        if self.initialized {
            Ok(())
        } else {
            self.init()
        }
    }

    /// Reserve `n` bytes, returning the payload's offset, or `None` if `n`
    /// is zero or the region is exhausted.
    pub fn allocate(&mut self, n: usize) -> Option<usize> {
        self.ensure_init().ok()?;
        if n == 0 {
            return None;
        }
        let a = adjusted_size(n)?;

        let bp = match fit::find_fit(&self.region, &self.free_list, a) {
            Some(bp) => bp,
            None => {
                let merged = extend::extend_heap(
                    &mut self.region,
                    &self.free_list,
                    &mut self.epilogue_addr,
                    a,
                )
                .ok()?;
                fit::find_fit(&self.region, &self.free_list, a).unwrap_or(merged)
            }
        };
        placer::place(&mut self.region, &self.free_list, bp, a);
        Some(bp)
    }

    /// Release a block previously returned by `allocate`/`resize`. The
    /// caller is responsible for translating a null pointer into "do
    /// nothing" before reaching this layer.
    pub fn release(&mut self, bp: usize) {
        let header = tag::header(&self.region, bp);
        tag::write_free_tags(&mut self.region, bp, header.size, header.prev_alloc);
        coalescer::coalesce(&mut self.region, &self.free_list, bp);
    }

    /// Resize a block. `bp = None` degrades to `allocate`; `n == 0`
    /// degrades to `release` (returning `None`). On failure to grow, the
    /// original block (if any) is left untouched.
    pub fn resize(&mut self, bp: Option<usize>, n: usize) -> Option<usize> {
        if n == 0 {
            if let Some(old) = bp {
                self.release(old);
            }
            return None;
        }
        let Some(old_bp) = bp else {
            return self.allocate(n);
        };

        let old_size = tag::size(&self.region, old_bp);
        let old_payload = (old_size - 4) as usize;
        let new_bp = self.allocate(n)?;

        let copy_len = core::cmp::min(n, old_payload);
        self.region.copy_within(old_bp, new_bp, copy_len);
        self.release(old_bp);
        Some(new_bp)
    }

    /// `count * elem_size` bytes, allocated and zeroed. `None` on overflow
    /// or allocation failure.
    pub fn zero_allocate(&mut self, count: usize, elem_size: usize) -> Option<usize> {
        let bytes = count.checked_mul(elem_size)?;
        let bp = self.allocate(bytes)?;
        let payload_len = (tag::size(&self.region, bp) - 4) as usize;
        self.region.zero(bp, payload_len);
        Some(bp)
    }

    /// Translate an outward-facing pointer back to its payload offset, or
    /// `None` if it does not point inside the live region.
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let base = self.region.as_bytes().as_ptr() as usize;
        let addr = ptr as usize;
        if addr < base {
            return None;
        }
        let offset = addr - base;
        (offset < self.region.region_high()).then_some(offset)
    }

    /// Translate a payload offset to an outward-facing pointer.
    pub fn ptr_of(&mut self, offset: usize) -> *mut u8 {
        // SAFETY: `offset` is always produced by `allocate`/`resize` and
        // lies within `[0, region_high())`.
        unsafe { self.region.as_bytes_mut().as_mut_ptr().add(offset) }
    }

    /// Walk the heap and free lists, reporting every invariant violation to
    /// `report`. See [`crate::checker::check_heap`] for the full walk.
    pub fn check(&self, verbose: bool, report: impl FnMut(crate::error::CheckError)) -> usize {
        if !self.initialized {
            return 0;
        }
        crate::checker::check_heap(
            &self.region,
            &self.free_list,
            self.region.region_low(),
            self.epilogue_addr,
            verbose,
            report,
        )
    }
}

/// The adjusted size for a request of `n` bytes: header included, floor of
/// 16, rounded up to a multiple of 8. `None` on overflow or if the result
/// cannot fit a `u32` (the heap's own size representation).
fn adjusted_size(n: usize) -> Option<u32> {
    if n <= 12 {
        Some(MIN_ALLOC)
    } else {
        let with_header = n.checked_add(4)?;
        let rounded = with_header.checked_add(7)? & !7;
        u32::try_from(rounded).ok()
    }
}
