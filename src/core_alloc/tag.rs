//! The block codec: encode/decode the 4-byte header/footer tag and navigate
//! to neighboring blocks by boundary tags.
//!
//! A block pointer `bp` always refers to the start of its payload, i.e. the
//! byte right after the header. `header_addr(bp) == bp - 4`; for a free
//! block, `footer_addr(bp, size) == bp + size - 8` (the last 4 bytes of the
//! block, since the block itself spans `[bp - 4, bp - 4 + size)`).
use crate::region::RegionProvider;

/// A decoded header/footer tag: size plus the two flag bits.
///
/// Packing keeps the on-heap layout identical to a raw bitfield: bits 3..31
/// hold the size (always a multiple of 8), bit 1 is `prev_alloc`, bit 0 is
/// `alloc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub size: u32,
    pub alloc: bool,
    pub prev_alloc: bool,
}
impl Tag {
    const SIZE_MASK: u32 = !0x7;

    const fn pack(self) -> u32 {
        (self.size & Self::SIZE_MASK) | ((self.prev_alloc as u32) << 1) | (self.alloc as u32)
    }

    const fn unpack(raw: u32) -> Self {
        Self {
            size: raw & Self::SIZE_MASK,
            prev_alloc: (raw >> 1) & 1 != 0,
            alloc: raw & 1 != 0,
        }
    }
}

/// Address of a block's header, given its payload pointer.
pub const fn header_addr(bp: usize) -> usize {
    bp - 4
}

/// Address of a free block's footer, given its payload pointer and size.
pub const fn footer_addr(bp: usize, size: u32) -> usize {
    bp + size as usize - 8
}

fn read_tag<R: RegionProvider + ?Sized>(region: &R, addr: usize) -> Tag {
    Tag::unpack(region.read_u32(addr))
}

fn write_tag<R: RegionProvider + ?Sized>(region: &mut R, addr: usize, tag: Tag) {
    region.write_u32(addr, tag.pack());
}

/// Decode the header of the block at `bp`.
pub fn header<R: RegionProvider + ?Sized>(region: &R, bp: usize) -> Tag {
    read_tag(region, header_addr(bp))
}

/// The block's size in bytes, header included.
pub fn size<R: RegionProvider + ?Sized>(region: &R, bp: usize) -> u32 {
    header(region, bp).size
}

/// Whether the block at `bp` is allocated.
pub fn alloc<R: RegionProvider + ?Sized>(region: &R, bp: usize) -> bool {
    header(region, bp).alloc
}

/// Whether the block lexically preceding `bp` is allocated.
pub fn prev_alloc<R: RegionProvider + ?Sized>(region: &R, bp: usize) -> bool {
    header(region, bp).prev_alloc
}

/// The lexically next block's payload pointer.
pub fn next_block<R: RegionProvider + ?Sized>(region: &R, bp: usize) -> usize {
    bp + size(region, bp) as usize
}

/// The lexically previous block's payload pointer, if it is free.
///
/// Valid only when `prev_alloc(bp) == false`: an allocated predecessor has
/// no footer, so its size (and hence its start) cannot be recovered, but it
/// is also never needed as a lookup key (see the data model's rationale for
/// the `prev_alloc` bit).
pub fn prev_block<R: RegionProvider + ?Sized>(region: &R, bp: usize) -> Option<usize> {
    if prev_alloc(region, bp) {
        None
    } else {
        let prev_footer = read_tag(region, bp - 8);
        Some(bp - prev_footer.size as usize)
    }
}

/// Set or clear the `prev_alloc` bit only, preserving size and `alloc`.
pub fn mark_prev_alloc<R: RegionProvider + ?Sized>(region: &mut R, bp: usize, v: bool) {
    let addr = header_addr(bp);
    let mut tag = read_tag(region, addr);
    tag.prev_alloc = v;
    write_tag(region, addr, tag);
}

/// Write an allocated block's header (no footer).
pub fn write_allocated_header<R: RegionProvider + ?Sized>(
    region: &mut R,
    bp: usize,
    size: u32,
    prev_alloc: bool,
) {
    write_tag(
        region,
        header_addr(bp),
        Tag {
            size,
            alloc: true,
            prev_alloc,
        },
    );
}

/// Write a free block's header and footer (both tags agree).
pub fn write_free_tags<R: RegionProvider + ?Sized>(
    region: &mut R,
    bp: usize,
    size: u32,
    prev_alloc: bool,
) {
    let tag = Tag {
        size,
        alloc: false,
        prev_alloc,
    };
    write_tag(region, header_addr(bp), tag);
    write_tag(region, footer_addr(bp, size), tag);
}

/// Write the prologue's header and footer. Unlike ordinary allocated blocks
/// the prologue keeps a footer (it is a permanent sentinel-holder, never
/// split or coalesced, and is easiest to bound with a boundary tag on both
/// sides like a free block).
pub fn write_prologue_tags<R: RegionProvider + ?Sized>(region: &mut R, bp: usize, size: u32) {
    let tag = Tag {
        size,
        alloc: true,
        prev_alloc: true,
    };
    write_tag(region, header_addr(bp), tag);
    write_tag(region, footer_addr(bp, size), tag);
}

/// Write the epilogue's header: zero-sized, allocated, walk terminator.
pub fn write_epilogue_tag<R: RegionProvider + ?Sized>(region: &mut R, bp: usize, prev_alloc: bool) {
    write_allocated_header(region, bp, 0, prev_alloc);
}

/// Decode a free block's footer tag, given its payload pointer and size.
/// Exposed for the checker, which needs to compare header against footer
/// without duplicating the bit layout.
pub fn footer<R: RegionProvider + ?Sized>(region: &R, bp: usize, size: u32) -> Tag {
    read_tag(region, footer_addr(bp, size))
}
