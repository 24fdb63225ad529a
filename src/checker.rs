//! The heap checker: walk the boundary-tag chain, then cross-check the free
//! lists against what that walk found. Every violation is reported as it is
//! found; the walk never stops early, so a single call surfaces everything
//! wrong with the heap rather than just the first symptom.
use crate::core_alloc::{class_of, class_range, tag, FreeList, MIN_ALLOC, NUM_CLASSES};
use crate::error::CheckError;
use crate::region::RegionProvider;

/// Walk the heap from `base` (the region's low address, where the alignment
/// padding and prologue live) to `epilogue_addr`, then walk every size
/// class's free list, reporting each invariant violation found to `report`.
/// Returns the number of violations reported.
///
/// Every violation is logged via the `log` crate at `warn` level regardless
/// of `verbose`; `verbose` additionally traces each block visited during the
/// heap walk at `trace` level.
pub fn check_heap<R: RegionProvider + ?Sized>(
    region: &R,
    free_list: &FreeList,
    base: usize,
    epilogue_addr: usize,
    verbose: bool,
    mut report: impl FnMut(CheckError),
) -> usize {
    let mut violations = 0usize;
    let mut emit = |err: CheckError| {
        log::warn!("heap check: {err}");
        report(err);
        violations += 1;
    };

    if region.read_u32(base) != 0 {
        emit(CheckError::PaddingNotZero);
    }

    let prologue_bp = base + 8;
    let prologue = tag::header(region, prologue_bp);
    let prologue_footer = tag::footer(region, prologue_bp, prologue.size);
    if !prologue.alloc || !prologue.prev_alloc || prologue_footer != prologue {
        emit(CheckError::PrologueInvalid);
    }

    let epilogue = tag::header(region, epilogue_addr);
    if !epilogue.alloc || epilogue.size != 0 {
        emit(CheckError::EpilogueInvalid);
    }

    let mut walk_free_count = 0usize;
    let mut bp = tag::next_block(region, prologue_bp);
    let mut prev_free = false;
    while bp < epilogue_addr {
        if bp % 8 != 0 {
            emit(CheckError::Misaligned(bp));
        }
        if bp < region.region_low() || bp >= region.region_high() {
            emit(CheckError::OutOfBounds(bp));
        }

        let h = tag::header(region, bp);
        if verbose {
            log::trace!("block {bp:#x}: size={} alloc={} prev_alloc={}", h.size, h.alloc, h.prev_alloc);
        }
        if h.prev_alloc == prev_free {
            emit(CheckError::PrevAllocMismatch(bp));
        }
        if h.size < MIN_ALLOC {
            emit(CheckError::TooSmall(bp));
        }

        if h.alloc {
            prev_free = false;
        } else {
            walk_free_count += 1;
            if prev_free {
                emit(CheckError::AdjacentFreeBlocks(bp));
            }
            if tag::footer(region, bp, h.size) != h {
                emit(CheckError::FooterMismatch(bp));
            }
            prev_free = true;
        }

        if h.size == 0 {
            // a zero-sized non-epilogue block would spin the walk forever;
            // bail out rather than loop.
            break;
        }
        bp = tag::next_block(region, bp);
    }

    let mut list_free_count = 0usize;
    for class in 0..NUM_CLASSES {
        if free_list.has_short_cycle(region, class) {
            emit(CheckError::ListCycle(class));
            continue;
        }
        for member in free_list.iter(region, class) {
            list_free_count += 1;
            let size = tag::size(region, member);
            if !class_range(class).contains(&size) {
                emit(CheckError::WrongClass(member));
            }
            debug_assert_eq!(class_of(size), class);

            let next = free_list.next_of(region, member);
            if free_list.prev_of(region, next) != member {
                emit(CheckError::ListLinkMismatch(member));
            }
        }
    }

    if walk_free_count != list_free_count {
        emit(CheckError::FreeCountMismatch {
            walk: walk_free_count,
            lists: list_free_count,
        });
    }

    if epilogue.prev_alloc == prev_free {
        emit(CheckError::EpiloguePrevAllocMismatch);
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::InlineRegion;

    fn setup() -> (InlineRegion<4096>, FreeList, usize, usize) {
        let mut region = InlineRegion::<4096>::new();
        let base = region.region_extend(96).unwrap();
        region.write_u32(base, 0);
        let prologue_bp = base + 8;
        tag::write_prologue_tags(&mut region, prologue_bp, 88);
        let free_list = FreeList::new(base, prologue_bp);
        for class in 0..NUM_CLASSES {
            let s = free_list.sentinel(class);
            region.write_u32(s, s as u32);
            region.write_u32(s + 4, s as u32);
        }
        let epilogue_addr = prologue_bp + 88;
        tag::write_epilogue_tag(&mut region, epilogue_addr, true);
        (region, free_list, base, epilogue_addr)
    }

    #[test]
    fn freshly_initialized_empty_heap_has_no_violations() {
        let (region, free_list, base, epilogue_addr) = setup();
        let mut errs = std::vec::Vec::new();
        let n = check_heap(&region, &free_list, base, epilogue_addr, false, |e| errs.push(e));
        assert_eq!(n, 0, "unexpected violations: {errs:?}");
    }

    #[test]
    fn heap_with_one_allocated_block_is_clean() {
        let (mut region, free_list, base, epilogue_addr) = setup();
        let bp = epilogue_addr;
        region.region_extend(32).unwrap();
        tag::write_allocated_header(&mut region, bp, 32, true);
        let new_epilogue = bp + 32;
        tag::write_epilogue_tag(&mut region, new_epilogue, true);

        let mut errs = std::vec::Vec::new();
        let n = check_heap(&region, &free_list, base, new_epilogue, false, |e| errs.push(e));
        assert_eq!(n, 0, "unexpected violations: {errs:?}");
    }

    #[test]
    fn heap_with_one_free_block_registered_in_its_class_is_clean() {
        let (mut region, free_list, base, epilogue_addr) = setup();
        let bp = epilogue_addr;
        region.region_extend(64).unwrap();
        tag::write_free_tags(&mut region, bp, 64, true);
        free_list.insert(&mut region, bp, class_of(64));
        let new_epilogue = bp + 64;
        tag::write_epilogue_tag(&mut region, new_epilogue, false);

        let mut errs = std::vec::Vec::new();
        let n = check_heap(&region, &free_list, base, new_epilogue, false, |e| errs.push(e));
        assert_eq!(n, 0, "unexpected violations: {errs:?}");
    }

    #[test]
    fn corrupted_prev_alloc_bit_is_caught() {
        let (mut region, free_list, base, epilogue_addr) = setup();
        let a = epilogue_addr;
        let b = a + 32;
        region.region_extend(64).unwrap();
        tag::write_allocated_header(&mut region, a, 32, true);
        tag::write_allocated_header(&mut region, b, 32, true);
        let new_epilogue = b + 32;
        tag::write_epilogue_tag(&mut region, new_epilogue, true);
        // corrupt b's prev_alloc bit directly, bypassing the coalescer.
        tag::mark_prev_alloc(&mut region, b, false);

        let mut errs = std::vec::Vec::new();
        let n = check_heap(&region, &free_list, base, new_epilogue, false, |e| errs.push(e));
        assert!(n >= 1);
        assert!(errs.contains(&CheckError::PrevAllocMismatch(b)));
    }

    #[test]
    fn adjacent_uncoalesced_free_blocks_are_caught() {
        let (mut region, free_list, base, epilogue_addr) = setup();
        let a = epilogue_addr;
        let b = a + 32;
        region.region_extend(64).unwrap();
        tag::write_free_tags(&mut region, a, 32, true);
        free_list.insert(&mut region, a, class_of(32));
        tag::write_free_tags(&mut region, b, 32, false);
        free_list.insert(&mut region, b, class_of(32));
        let new_epilogue = b + 32;
        tag::write_epilogue_tag(&mut region, new_epilogue, false);

        let mut errs = std::vec::Vec::new();
        let _ = check_heap(&region, &free_list, base, new_epilogue, false, |e| errs.push(e));
        assert!(errs.contains(&CheckError::AdjacentFreeBlocks(b)));
    }

    #[test]
    fn free_block_missing_from_its_class_list_is_caught() {
        let (mut region, free_list, base, epilogue_addr) = setup();
        let bp = epilogue_addr;
        region.region_extend(64).unwrap();
        tag::write_free_tags(&mut region, bp, 64, true);
        // deliberately not inserted into any class list.
        let new_epilogue = bp + 64;
        tag::write_epilogue_tag(&mut region, new_epilogue, false);

        let mut errs = std::vec::Vec::new();
        let _ = check_heap(&region, &free_list, base, new_epilogue, false, |e| errs.push(e));
        assert!(errs.contains(&CheckError::FreeCountMismatch { walk: 1, lists: 0 }));
    }

    #[test]
    fn scrambled_prev_link_with_an_intact_next_cycle_is_caught() {
        let (mut region, free_list, base, epilogue_addr) = setup();
        let a = epilogue_addr;
        let b = a + 32;
        region.region_extend(64).unwrap();
        tag::write_free_tags(&mut region, a, 32, true);
        tag::write_free_tags(&mut region, b, 32, false);
        let class = class_of(32);
        free_list.insert(&mut region, a, class);
        free_list.insert(&mut region, b, class);
        let new_epilogue = b + 32;
        tag::write_epilogue_tag(&mut region, new_epilogue, false);

        // `a`'s and `b`'s `next` chain (through the sentinel) is still a
        // full, well-formed cycle; only `a`'s `prev` link is corrupted to
        // point at itself instead of back at `b`. `has_short_cycle` cannot
        // see this — it only follows `next`.
        let a_off = (a - base) as u32;
        region.write_u32(a + 4, a_off);

        let mut errs = std::vec::Vec::new();
        let _ = check_heap(&region, &free_list, base, new_epilogue, false, |e| errs.push(e));
        assert!(!free_list.has_short_cycle(&region, class));
        assert!(errs.iter().any(|e| matches!(e, CheckError::ListLinkMismatch(_))));
    }

    #[test]
    fn corrupted_epilogue_prev_alloc_bit_is_caught() {
        let (mut region, free_list, base, epilogue_addr) = setup();
        let bp = epilogue_addr;
        region.region_extend(32).unwrap();
        tag::write_allocated_header(&mut region, bp, 32, true);
        let new_epilogue = bp + 32;
        // the real last block (`bp`) is allocated, so the epilogue's
        // prev_alloc should be `true`; write it as `false` instead.
        tag::write_epilogue_tag(&mut region, new_epilogue, false);

        let mut errs = std::vec::Vec::new();
        let n = check_heap(&region, &free_list, base, new_epilogue, false, |e| errs.push(e));
        assert!(n >= 1);
        assert!(errs.contains(&CheckError::EpiloguePrevAllocMismatch));
    }
}
