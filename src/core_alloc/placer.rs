//! The placer: install an adjusted-size allocation into a free block,
//! splitting off a remainder when the leftover is big enough to be useful.
use super::free_list::{class_of, FreeList};
use super::tag;
use super::MIN_FREE;
use crate::region::RegionProvider;

/// Place a request of `a` bytes into the free block at `bp` (of size `c`,
/// `a <= c`), splitting off a free remainder when `c - a >= MIN_FREE`.
pub fn place<R: RegionProvider + ?Sized>(region: &mut R, free_list: &FreeList, bp: usize, a: u32) {
    let c = tag::size(region, bp);
    let prev_alloc = tag::prev_alloc(region, bp);
    free_list.remove(region, bp);

    if c - a >= MIN_FREE {
        tag::write_allocated_header(region, bp, a, prev_alloc);

        let remainder = bp + a as usize;
        let remainder_size = c - a;
        // The block after the remainder already carries `prev_alloc = 0`
        // from when it sat after one big free block; splitting does not
        // change that, only the remainder's own `prev_alloc` (it now
        // follows an allocated block) needs writing.
        tag::write_free_tags(region, remainder, remainder_size, true);
        free_list.insert(region, remainder, class_of(remainder_size));
    } else {
        tag::write_allocated_header(region, bp, c, prev_alloc);
        let next = tag::next_block(region, bp);
        tag::mark_prev_alloc(region, next, true);
    }
}
