//! The coalescer: merge a newly freed block with its immediate neighbors,
//! a plain tagged-match on `(prev_alloc, next_alloc)` rather than any
//! runtime polymorphism — the four cases are all there is.
use super::free_list::{class_of, FreeList};
use super::tag;
use crate::region::RegionProvider;

/// Coalesce the freshly-freed block at `bp` (header/footer already written
/// as free, not yet in any class list) with its neighbors, insert the
/// result into its new class, and return the resulting block's pointer.
pub fn coalesce<R: RegionProvider + ?Sized>(region: &mut R, free_list: &FreeList, bp: usize) -> usize {
    let p = tag::prev_alloc(region, bp);
    let next = tag::next_block(region, bp);
    let n = tag::alloc(region, next);
    let size = tag::size(region, bp);

    match (p, n) {
        (true, true) => {
            tag::mark_prev_alloc(region, next, false);
            free_list.insert(region, bp, class_of(size));
            bp
        }
        (true, false) => {
            let next_size = tag::size(region, next);
            free_list.remove(region, next);
            let new_size = size + next_size;
            tag::write_free_tags(region, bp, new_size, true);
            free_list.insert(region, bp, class_of(new_size));
            bp
        }
        (false, true) => {
            let prev = tag::prev_block(region, bp).expect("prev_alloc=0 implies a free predecessor");
            let prev_size = tag::size(region, prev);
            let prev_prev_alloc = tag::prev_alloc(region, prev);
            free_list.remove(region, prev);

            let new_size = prev_size + size;
            tag::mark_prev_alloc(region, next, false);
            tag::write_free_tags(region, prev, new_size, prev_prev_alloc);
            free_list.insert(region, prev, class_of(new_size));
            prev
        }
        (false, false) => {
            let prev = tag::prev_block(region, bp).expect("prev_alloc=0 implies a free predecessor");
            let prev_size = tag::size(region, prev);
            let prev_prev_alloc = tag::prev_alloc(region, prev);
            let next_size = tag::size(region, next);
            free_list.remove(region, prev);
            free_list.remove(region, next);

            let new_size = prev_size + size + next_size;
            tag::write_free_tags(region, prev, new_size, prev_prev_alloc);
            free_list.insert(region, prev, class_of(new_size));
            prev
        }
    }
}
