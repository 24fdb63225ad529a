//! The heap extender: grow the region on a fit miss and feed the new space
//! through the coalescer so it merges with any trailing free block.
use super::coalescer;
use super::free_list::FreeList;
use super::tag;
use crate::error::RegionError;
use crate::region::RegionProvider;

/// Minimum chunk the heap grows by on a miss, in bytes. Tunable within
/// `[256, 4096]`; 512 favors fewer, larger `region_extend` calls without
/// over-reserving for small requests.
pub const CHUNK: u32 = 512;

/// The size of the first chunk `init` requests after laying out the
/// prologue/epilogue.
pub const INIT: u32 = 4096;

/// Grow the region by `max(a, CHUNK)` bytes, install the new space as a free
/// block where the old epilogue used to sit, write a fresh epilogue past
/// it, and coalesce. Returns the resulting free block's pointer.
pub fn extend_heap<R: RegionProvider + ?Sized>(
    region: &mut R,
    free_list: &FreeList,
    epilogue_addr: &mut usize,
    a: u32,
) -> Result<usize, RegionError> {
    let ext = a.max(CHUNK);
    let old_epilogue = *epilogue_addr;
    let old_epilogue_prev_alloc = tag::prev_alloc(region, old_epilogue);

    region.region_extend(ext as usize)?;

    // The new free block reuses the 4 bytes that used to be the old
    // epilogue's header as its own header; the freshly acquired bytes cover
    // its body, footer, and the new epilogue's header.
    let new_bp = old_epilogue;
    tag::write_free_tags(region, new_bp, ext, old_epilogue_prev_alloc);

    let new_epilogue = new_bp + ext as usize;
    tag::write_epilogue_tag(region, new_epilogue, false);
    *epilogue_addr = new_epilogue;

    Ok(coalescer::coalesce(region, free_list, new_bp))
}
