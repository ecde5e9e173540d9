#![deny(unsafe_code)]

//! BGZF block I/O for varsum.
//!
//! BGZF (Blocked GZIP Format) stores data as a sequence of independent gzip
//! members, each carrying its total compressed size in a `BC` extra subfield.
//! That framing is what makes random access and partial downloads possible:
//! any block boundary is a clean restart point, addressed by a
//! [`VirtualOffset`].
//!
//! This crate provides the three low-level pieces the rest of varsum builds
//! on:
//!
//! - [`reader`] - raw block parsing (header validation, `BC` subfield walk)
//!   and libdeflater-based decompression with CRC32 verification.
//! - [`writer`] - inline compression of a byte stream into BGZF blocks,
//!   terminated by the standard EOF marker.
//! - [`virtual_offset`] - the packed (compressed offset, intra-block offset)
//!   address type.

pub mod reader;
pub mod virtual_offset;
pub mod writer;

pub use reader::{
    BGZF_EOF, BGZF_FOOTER_SIZE, BGZF_HEADER_SIZE, RawBgzfBlock, block_size_from_header,
    decompress_block, decompress_block_into, read_raw_block,
};
pub use virtual_offset::VirtualOffset;
pub use writer::{BGZF_MAX_BLOCK_SIZE, BlockCompressor, CompressedBlock};
