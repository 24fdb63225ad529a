//! The fit finder: pick a free block for an adjusted size, hybrid policy.
//!
//! Small requests (class `< SMALL_CLASS_THRESHOLD`) dominate throughput, so
//! they get first-fit: return the first block encountered that's big enough.
//! Large requests are rarer but riskier for fragmentation, so they pay for a
//! best-fit scan of their own class and every larger one.
use super::free_list::{FreeList, SMALL_CLASS_THRESHOLD};
use super::free_list::{class_of, NUM_CLASSES};
use super::tag;
use crate::region::RegionProvider;

/// Find a free block of at least `a` bytes, or `None` on a miss.
pub fn find_fit<R: RegionProvider + ?Sized>(region: &R, free_list: &FreeList, a: u32) -> Option<usize> {
    let i0 = class_of(a);
    if i0 >= SMALL_CLASS_THRESHOLD {
        best_fit(region, free_list, i0, a)
    } else {
        first_fit(region, free_list, i0, a)
    }
}

fn first_fit<R: RegionProvider + ?Sized>(
    region: &R,
    free_list: &FreeList,
    i0: usize,
    a: u32,
) -> Option<usize> {
    for class in i0..NUM_CLASSES {
        for bp in free_list.iter(region, class) {
            if tag::size(region, bp) >= a {
                return Some(bp);
            }
        }
    }
    None
}

fn best_fit<R: RegionProvider + ?Sized>(
    region: &R,
    free_list: &FreeList,
    i0: usize,
    a: u32,
) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for class in i0..NUM_CLASSES {
        for bp in free_list.iter(region, class) {
            let size = tag::size(region, bp);
            if size < a {
                continue;
            }
            best = match best {
                None => Some((bp, size)),
                // strict `<` keeps the first-scanned block on ties.
                Some((_, best_size)) if size < best_size => Some((bp, size)),
                Some(existing) => Some(existing),
            };
        }
    }
    best.map(|(bp, _)| bp)
}

#[cfg(test)]
mod tests {
    use super::super::tag;
    use super::*;
    use crate::region::InlineRegion;

    fn setup(class_count: usize) -> (InlineRegion<4096>, FreeList) {
        let mut region = InlineRegion::<4096>::new();
        region.region_extend(4096).unwrap();
        let sentinel_base = 0;
        let free_list = FreeList::new(0, sentinel_base);
        for class in 0..class_count {
            let s = free_list.sentinel(class);
            region.write_u32(s, s as u32);
            region.write_u32(s + 4, s as u32);
        }
        (region, free_list)
    }

    #[test]
    fn best_fit_picks_smallest_sufficient_block() {
        let (mut region, free_list) = setup(super::NUM_CLASSES);
        let mut cursor = super::NUM_CLASSES * 8;

        for &size in &[64u32, 128, 256] {
            tag::write_free_tags(&mut region, cursor, size, true);
            let class = class_of(size);
            free_list.insert(&mut region, cursor, class);
            cursor += size as usize + 16;
        }

        let bp = find_fit(&region, &free_list, 100).unwrap();
        // 100 falls in class 3 (64..=127), which is < SMALL_CLASS_THRESHOLD(4):
        // first-fit picks the first block >= 100 scanned from class 3 upward,
        // which is the 128-byte block (the 64-byte one is too small).
        assert_eq!(tag::size(&region, bp), 128);
    }

    #[test]
    fn best_fit_tie_break_prefers_first_scanned() {
        let (mut region, free_list) = setup(super::NUM_CLASSES);
        let mut cursor = super::NUM_CLASSES * 8;

        // two blocks of the same size 256 (class 5, large) inserted in order;
        // each insert pushes at the front of the list, so traversal (and
        // hence the first block "scanned") encounters the later-inserted one
        // first.
        let first_inserted = cursor;
        tag::write_free_tags(&mut region, cursor, 256, true);
        free_list.insert(&mut region, cursor, class_of(256));
        cursor += 256 + 16;

        let last_inserted = cursor;
        tag::write_free_tags(&mut region, cursor, 256, true);
        free_list.insert(&mut region, cursor, class_of(256));

        let bp = find_fit(&region, &free_list, 200).unwrap();
        assert_ne!(first_inserted, last_inserted);
        assert_eq!(bp, last_inserted, "tie-break should keep the first-scanned (most recently pushed) block");
    }

    #[test]
    fn first_fit_returns_first_match_by_insertion_order() {
        let (mut region, free_list) = setup(super::NUM_CLASSES);
        let mut cursor = super::NUM_CLASSES * 8;

        for &size in &[24u32, 40, 32] {
            tag::write_free_tags(&mut region, cursor, size, true);
            free_list.insert(&mut region, cursor, class_of(size));
            cursor += size as usize + 16;
        }
        // all three sizes are class 1, inserted front-to-back as [32, 40, 24]
        // in list order (last-inserted first); first-fit over class 1 finds
        // the first block with size >= 20, which is the most recently
        // inserted block (32).
        let bp = find_fit(&region, &free_list, 20).unwrap();
        assert_eq!(tag::size(&region, bp), 32);
    }
}
