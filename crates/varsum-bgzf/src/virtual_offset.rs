//! Virtual offsets: addressing a byte inside a BGZF stream.
//!
//! A virtual offset packs the file offset of a block's first compressed byte
//! together with the offset of a byte within that block's decompressed data.
//! Because blocks are at most 64KB uncompressed, the intra-block part fits in
//! 16 bits and the whole address fits in a `u64` that compares in stream
//! order.

use std::fmt;

/// Number of low bits holding the intra-block (uncompressed) offset.
const UNCOMPRESSED_BITS: u32 = 16;

/// Address of a byte in a BGZF stream.
///
/// The packed representation is `compressed_offset << 16 | uncompressed_offset`.
/// Ordering on the packed value is stream order: first by containing block,
/// then by position within the block.
///
/// A position at the exact end of a block is conventionally normalized to
/// `(next_block_offset, 0)`; this type does not enforce that, it only packs
/// and unpacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Largest representable offset, used as an open-ended range sentinel
    /// (for example, the end of the final slice of a file).
    pub const MAX: VirtualOffset = VirtualOffset(u64::MAX);

    /// Pack a compressed block offset and an intra-block offset.
    ///
    /// `compressed` must fit in 48 bits; BGZF files addressed here are far
    /// below that bound.
    #[must_use]
    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        Self((compressed << UNCOMPRESSED_BITS) | u64::from(uncompressed))
    }

    /// File offset of the first byte of the containing block.
    #[must_use]
    pub fn compressed(self) -> u64 {
        self.0 >> UNCOMPRESSED_BITS
    }

    /// Offset within the containing block's decompressed data.
    #[must_use]
    pub fn uncompressed(self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// The packed `u64` value (used in work-unit tokens).
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Rebuild from a packed `u64` value.
    #[must_use]
    pub fn from_value(value: u64) -> Self {
        Self(value)
    }
}

impl From<u64> for VirtualOffset {
    fn from(value: u64) -> Self {
        Self::from_value(value)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.value()
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.compressed(), self.uncompressed())
    }
}
