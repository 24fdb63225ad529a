//! A segregated-fit dynamic storage allocator for embedded systems.
//!
//! This crate provides a single type called [`Allocator`]. This type
//! implements the [`core::alloc::GlobalAlloc`] trait, which is required to
//! use the [`alloc`-crate][alloc] on `#![no_std]` targets.
//!
//! # Usage
//! Copy and paste the following into your binary crate, adjusting the heap
//! size (here 64K) to your application's needs:
//! ```no_run
//! #[global_allocator]
//! static ALLOCATOR: segalloc::Allocator<65536> = segalloc::Allocator::new();
//!
//! extern crate alloc;
//! ```
//! Afterwards you don't need to interact with the crate or the variable
//! `ALLOCATOR` anymore: `use alloc::vec::Vec` and friends work as usual.
//!
//! # Implementation
//! Unlike a simple linear-scan allocator, this crate keeps ten segregated
//! free lists keyed by size class, placed by a hybrid first-fit/best-fit
//! policy, and coalesces released blocks with their neighbors via boundary
//! tags (a "previous block allocated" bit lets allocated blocks skip their
//! footer entirely). The heap starts small and grows on demand, up to the
//! const generic ceiling `N`, the way a real `sbrk`-backed allocator grows
//! up to the limits of its address space. See [`core_alloc`] for the full
//! design and [`checker`] for the consistency checker.
//!
//! `init` always lays out the padding/prologue/epilogue (96 bytes) and then
//! immediately requests the first `core_alloc::extend::INIT`-sized (4096
//! byte) chunk, so `N` needs to be at least 4192 for any allocation to
//! succeed; anything smaller fails `init` (and hence every allocation)
//! outright. Size `N` generously above that floor for real workloads.
//!
//! [alloc]: https://doc.rust-lang.org/alloc/index.html
#![cfg_attr(not(test), no_std)]
#![warn(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod checker;
pub mod core_alloc;
pub mod error;
pub mod region;

pub use core_alloc::SegAlloc;
pub use error::{CheckError, RegionError};

use core::alloc::{GlobalAlloc, Layout};
use core::mem::size_of;
use core::ptr;
use region::InlineRegion;
use spin::Mutex;

/// The memory allocator for embedded systems.
///
/// This is the core type of this crate: an allocator with a predefined heap
/// ceiling. Therefore the heap memory usage is statically limited to an
/// upper value, which also helps to prevent issues with heap/stack-smashes,
/// as the heap is counted to the static memory (e.g. `.data`/`.bss`
/// sections).
///
/// Its usage is simple: just copy and paste the following in the binary
/// crate you're developing. The memory ceiling of the heap is `65536` or
/// 64K in this example. Adjust that value to your needs.
/// ```no_run
/// #[global_allocator]
/// static ALLOCATOR: segalloc::Allocator<65536> = segalloc::Allocator::new();
/// ```
pub struct Allocator<const N: usize> {
    /// The segregated-fit allocator proper.
    ///
    /// Protected by a `spin::Mutex` to make it usable with shared references
    /// (a requirement of [`GlobalAlloc`]) without needing an operating
    /// system's thread primitives.
    inner: Mutex<SegAlloc<InlineRegion<N>>>,
}
impl<const N: usize> Allocator<N> {
    /// Create a new [`Allocator`]. The heap is not touched until the first
    /// allocation (or an explicit call to [`Allocator::check_heap`]).
    ///
    /// This function is a `const fn`, therefore you can call it directly
    /// when creating a `static`.
    #[must_use = "assign the allocator to a static variable and apply the `#[global_allocator]`-attribute to make it the global allocator"]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(SegAlloc::new(InlineRegion::new())),
        }
    }

    /// Reserve `size` bytes, returning a pointer to the payload, or a null
    /// pointer if `size` is zero or the heap is exhausted.
    ///
    /// This is the raw, alignment-agnostic entry point described by the
    /// allocator's public interface; [`GlobalAlloc::alloc`] layers
    /// over-alignment support on top of it.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        let mut inner = self.inner.lock();
        match inner.allocate(size) {
            Some(bp) => inner.ptr_of(bp),
            None => ptr::null_mut(),
        }
    }

    /// Release a pointer previously returned by [`Allocator::allocate`],
    /// [`Allocator::resize`], or [`Allocator::zero_allocate`]. A null
    /// pointer, or a pointer not tracked by this allocator, is a silent
    /// no-op.
    pub fn release(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let mut inner = self.inner.lock();
        if let Some(bp) = inner.offset_of(ptr) {
            inner.release(bp);
        }
    }

    /// Resize the allocation at `ptr` to `size` bytes, preserving
    /// `min(size, old_size)` bytes of payload. A null `ptr` degrades to
    /// [`Allocator::allocate`]; `size == 0` degrades to
    /// [`Allocator::release`] and returns a null pointer. Returns null
    /// (leaving the original allocation untouched) if growth fails.
    pub fn resize(&self, ptr: *mut u8, size: usize) -> *mut u8 {
        let mut inner = self.inner.lock();
        let bp = if ptr.is_null() {
            None
        } else {
            match inner.offset_of(ptr) {
                found @ Some(_) => found,
                None => return ptr::null_mut(),
            }
        };
        match inner.resize(bp, size) {
            Some(new_bp) => inner.ptr_of(new_bp),
            None => ptr::null_mut(),
        }
    }

    /// `count * elem_size` bytes, allocated and zeroed. Null on overflow,
    /// zero size, or exhaustion.
    pub fn zero_allocate(&self, count: usize, elem_size: usize) -> *mut u8 {
        let mut inner = self.inner.lock();
        match inner.zero_allocate(count, elem_size) {
            Some(bp) => inner.ptr_of(bp),
            None => ptr::null_mut(),
        }
    }

    /// Walk the heap and free lists, reporting every invariant violation
    /// found. Returns the number of violations. `verbose` additionally
    /// traces every block visited; see [`checker::check_heap`].
    ///
    /// Safe to call at any time; an allocator that has never serviced an
    /// allocation reports zero violations.
    pub fn check_heap(&self, verbose: bool) -> usize {
        self.inner.lock().check(verbose, |_err| {})
    }
}
impl<const N: usize> Default for Allocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Round `addr` up to the next multiple of `align` (a power of two).
fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

// SAFETY: every allocation is at least 8-byte aligned by construction (see
// `core_alloc`'s data model), so `alloc`/`dealloc` only need extra work for
// `layout.align() > 8`. Neither method panics; both route every failure
// through the null-pointer convention `GlobalAlloc` expects.
unsafe impl<const N: usize> GlobalAlloc for Allocator<N> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let align = layout.align();
        let size = layout.size();
        let mut inner = self.inner.lock();

        if align <= 8 {
            return match inner.allocate(size) {
                Some(bp) => inner.ptr_of(bp),
                None => ptr::null_mut(),
            };
        }

        // Over-aligned request: allocate extra room to slide the payload
        // forward to an aligned address, and stash the real block pointer
        // just before the returned pointer so `dealloc` can recover it
        // (boundary-tag `release` needs the exact block start, unlike a
        // scanning allocator that can match any interior pointer).
        let back_pointer = size_of::<usize>();
        let Some(padded) = size
            .checked_add(align)
            .and_then(|s| s.checked_add(back_pointer))
        else {
            return ptr::null_mut();
        };
        let Some(bp) = inner.allocate(padded) else {
            return ptr::null_mut();
        };
        let base = inner.ptr_of(bp) as usize;
        let aligned = align_up(base + back_pointer, align);
        let stash = (aligned - back_pointer) as *mut usize;
        // SAFETY: `stash..aligned` and `aligned..aligned+size` both lie
        // within the `padded`-byte block just allocated above.
        unsafe { stash.write(bp) };
        aligned as *mut u8
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let align = layout.align();
        let mut inner = self.inner.lock();

        if align <= 8 {
            if let Some(bp) = inner.offset_of(ptr) {
                inner.release(bp);
            }
            return;
        }

        let stash = ptr.wrapping_sub(size_of::<usize>()) as *const usize;
        // SAFETY: written by `alloc` for every over-aligned allocation this
        // pointer could have come from.
        let bp = unsafe { stash.read() };
        inner.release(bp);
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let align = layout.align();
        if align <= 8 {
            let mut inner = self.inner.lock();
            return match inner.zero_allocate(1, layout.size()) {
                Some(bp) => inner.ptr_of(bp),
                None => ptr::null_mut(),
            };
        }
        // SAFETY: delegates to `alloc`, which upholds the same contract.
        let ptr = unsafe { self.alloc(layout) };
        if !ptr.is_null() {
            // SAFETY: `alloc` just returned a block of at least `layout.size()`
            // writable bytes at `ptr`.
            unsafe { ptr::write_bytes(ptr, 0, layout.size()) };
        }
        ptr
    }
}
