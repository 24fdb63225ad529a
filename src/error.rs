//! Error types for the region bridge and the heap checker.
//!
//! The allocator's public entry points (`allocate`, `release`, `resize`,
//! `zero_allocate`) stay at the primitive null/`-1` convention described by
//! the external interface, but everything underneath them is typed until the
//! `GlobalAlloc` boundary translates a failure down to a null pointer.

use core::fmt;

/// The region provider could not satisfy an extension request.
///
/// This is the only failure mode the core allocator ever sees: the backing
/// region has hit its ceiling (for [`crate::region::InlineRegion`], the
/// const generic `N`) or the requested extension would overflow `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// The region cannot grow by the requested number of bytes.
    Exhausted,
}
impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "region exhausted: cannot extend heap further"),
        }
    }
}
#[cfg(feature = "std")]
impl std::error::Error for RegionError {}

/// A single invariant violation found by [`crate::checker::check_heap`].
///
/// Every variant names exactly one of the invariants from the data model:
/// boundary-tag agreement, free-list bookkeeping, alignment, and so on. The
/// checker never stops at the first violation; it reports every one it
/// finds, the caller decides what to do with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
    /// The four padding bytes at the start of the heap are not zero.
    PaddingNotZero,
    /// The prologue is missing its permanently-allocated, `prev_alloc`-set
    /// header/footer.
    PrologueInvalid,
    /// The epilogue is not a zero-sized allocated block.
    EpilogueInvalid,
    /// A block address is not 8-byte aligned.
    Misaligned(usize),
    /// A block lies outside `[region_low(), region_high())`.
    OutOfBounds(usize),
    /// A block's `prev_alloc` bit disagrees with its predecessor's `alloc` bit.
    PrevAllocMismatch(usize),
    /// A real block (not prologue/epilogue) is smaller than the 16-byte floor.
    TooSmall(usize),
    /// A free block's footer disagrees with its header.
    FooterMismatch(usize),
    /// Two free blocks sit next to each other uncoalesced.
    AdjacentFreeBlocks(usize),
    /// A free block's size does not fall within its class's range.
    WrongClass(usize),
    /// The number of free blocks found walking the heap and walking the
    /// class lists disagree.
    FreeCountMismatch {
        /// Free blocks found while walking the heap by boundary tags.
        walk: usize,
        /// Free blocks found while walking every class's list.
        lists: usize,
    },
    /// A class's free list contains a cycle shorter than its proper,
    /// sentinel-terminated circular form.
    ListCycle(usize),
    /// A free list member's `next`/`prev` links do not mirror each other:
    /// `prev(next(b)) != b`.
    ListLinkMismatch(usize),
    /// The epilogue's `prev_alloc` bit disagrees with the real last block's
    /// `alloc` bit.
    EpiloguePrevAllocMismatch,
}
impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PaddingNotZero => write!(f, "padding word is not zero"),
            Self::PrologueInvalid => write!(f, "prologue header/footer is invalid"),
            Self::EpilogueInvalid => write!(f, "epilogue is not a zero-sized allocated block"),
            Self::Misaligned(bp) => write!(f, "block at {bp:#x} is not 8-byte aligned"),
            Self::OutOfBounds(bp) => write!(f, "block at {bp:#x} lies outside the heap"),
            Self::PrevAllocMismatch(bp) => {
                write!(f, "block at {bp:#x} has a wrong prev_alloc bit")
            }
            Self::TooSmall(bp) => write!(f, "block at {bp:#x} is smaller than the 16-byte floor"),
            Self::FooterMismatch(bp) => {
                write!(f, "free block at {bp:#x} has a footer disagreeing with its header")
            }
            Self::AdjacentFreeBlocks(bp) => {
                write!(f, "free block at {bp:#x} is adjacent to another free block")
            }
            Self::WrongClass(bp) => write!(f, "free block at {bp:#x} is in the wrong size class"),
            Self::FreeCountMismatch { walk, lists } => write!(
                f,
                "free block count mismatch: {walk} found walking the heap, {lists} found in class lists"
            ),
            Self::ListCycle(class) => write!(f, "class {class} free list has a short cycle"),
            Self::ListLinkMismatch(bp) => {
                write!(f, "free block at {bp:#x} has mismatched next/prev links")
            }
            Self::EpiloguePrevAllocMismatch => {
                write!(f, "epilogue prev_alloc bit disagrees with the last real block")
            }
        }
    }
}
#[cfg(feature = "std")]
impl std::error::Error for CheckError {}
