//! The region bridge: a thin adapter over a `sbrk`-like growth primitive.
//!
//! Everything above this module addresses memory by `usize` offset from
//! [`RegionProvider::region_low`], never by raw pointer; only the
//! [`crate::Allocator`] wrapper converts an offset to an outward-facing
//! pointer.
use crate::error::RegionError;
use core::mem::MaybeUninit;

/// The external collaborator the core allocator depends on but never
/// implements: something that can grow a byte region on request and report
/// its current bounds.
///
/// A real `sbrk`-backed implementation would ask the operating system for
/// more pages; [`InlineRegion`] below instead reserves its ceiling up front
/// (as any `#![no_std]` allocator without an MMU must) and treats that
/// reservation the way a memory-system simulator treats its `MAX_HEAP`
/// array: extension only ever moves a `high` water mark forward within it.
pub trait RegionProvider {
    /// The lowest address ever handed out; this is the allocator's `base`.
    fn region_low(&self) -> usize;

    /// The current end of the region (exclusive).
    fn region_high(&self) -> usize;

    /// Grow the region by `bytes`, rounded up to a multiple of 8, returning
    /// the address the new segment starts at (equal to the old
    /// `region_high()`). Fails if the region has no more room.
    fn region_extend(&mut self, bytes: usize) -> Result<usize, RegionError>;

    /// The live bytes of the region, `[region_low(), region_high())`.
    fn as_bytes(&self) -> &[u8];

    /// Mutable access to the live bytes of the region.
    fn as_bytes_mut(&mut self) -> &mut [u8];

    /// Read a little-endian `u32` at `offset`.
    fn read_u32(&self, offset: usize) -> u32 {
        let bytes = self.as_bytes();
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    /// Write a little-endian `u32` at `offset`.
    fn write_u32(&mut self, offset: usize, value: u32) {
        let bytes = value.to_le_bytes();
        self.as_bytes_mut()[offset..offset + 4].copy_from_slice(&bytes);
    }

    /// Copy `len` bytes from `src` to `dst` within the region, as if by
    /// `memcpy` (the two spans never overlap in practice: `dst` is always a
    /// freshly placed block and `src` an about-to-be-released one).
    fn copy_within(&mut self, src: usize, dst: usize, len: usize) {
        self.as_bytes_mut().copy_within(src..src + len, dst);
    }

    /// Zero `len` bytes starting at `offset`.
    fn zero(&mut self, offset: usize, len: usize) {
        self.as_bytes_mut()[offset..offset + len].fill(0);
    }
}

/// A region whose ceiling `N` is reserved inline, statically, at compile
/// time, the way a `#![no_std]` allocator without an MMU reserves its whole
/// heap in its own static storage instead of asking the OS for pages.
///
/// Only the bytes in `[0, high)` are ever read; `region_extend` is the only
/// way `high` moves, so nothing downstream ever reads uninitialized memory.
#[repr(align(8))]
pub struct InlineRegion<const N: usize> {
    bytes: [MaybeUninit<u8>; N],
    high: usize,
}
impl<const N: usize> InlineRegion<N> {
    /// Create an empty region. No bytes are considered live until
    /// [`RegionProvider::region_extend`] is called.
    pub const fn new() -> Self {
        Self {
            bytes: [MaybeUninit::uninit(); N],
            high: 0,
        }
    }
}
impl<const N: usize> Default for InlineRegion<N> {
    fn default() -> Self {
        Self::new()
    }
}
impl<const N: usize> RegionProvider for InlineRegion<N> {
    fn region_low(&self) -> usize {
        0
    }

    fn region_high(&self) -> usize {
        self.high
    }

    fn region_extend(&mut self, bytes: usize) -> Result<usize, RegionError> {
        let rounded = (bytes + 7) & !7;
        let new_high = self
            .high
            .checked_add(rounded)
            .ok_or(RegionError::Exhausted)?;
        if new_high > N {
            return Err(RegionError::Exhausted);
        }
        let base = self.high;
        self.high = new_high;
        Ok(base)
    }

    fn as_bytes(&self) -> &[u8] {
        // SAFETY: bytes in `[0, high)` are always written by a `region_extend`
        // caller (the prologue/epilogue/block writers) before anything reads
        // them; `high` never exceeds `N`.
        unsafe { core::slice::from_raw_parts(self.bytes.as_ptr().cast(), self.high) }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: see `as_bytes`.
        unsafe { core::slice::from_raw_parts_mut(self.bytes.as_mut_ptr().cast(), self.high) }
    }
}
