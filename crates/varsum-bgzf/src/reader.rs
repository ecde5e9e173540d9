//! Raw BGZF block reading and decompression.
//!
//! Blocks are read without being decompressed, so callers can skip over
//! them, plan partitions from their sizes, or decompress them lazily with a
//! reused libdeflater [`Decompressor`].
//!
//! # BGZF block structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ Fixed header (12 bytes)                                         │
//! │  - Magic: 0x1f 0x8b (gzip)                                      │
//! │  - Method: 0x08 (deflate)                                       │
//! │  - Flags: 0x04 (FEXTRA)                                         │
//! │  - MTIME, XFL, OS: 6 bytes                                      │
//! │  - XLEN: 2 bytes                                                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Extra subfields (XLEN bytes), one of which must be              │
//! │   "BC" + len(2 = 2) + BSIZE(2), BSIZE = total block size - 1    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Compressed data (raw deflate)                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Footer (8 bytes)                                                │
//! │  - CRC32: 4 bytes                                               │
//! │  - ISIZE: 4 bytes (uncompressed size mod 2^32)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writers in the wild always use XLEN = 6 (the `BC` subfield alone), but
//! the gzip spec allows additional subfields, so the parser walks all of
//! them looking for `BC`.

use libdeflater::Decompressor;
use std::io::{self, Read};

// ============================================================================
// Constants
// ============================================================================

/// Size of the fixed part of the header, up to and including XLEN.
const BGZF_FIXED_HEADER_SIZE: usize = 12;

/// Size of the standard BGZF block header (fixed part + the `BC` subfield).
pub const BGZF_HEADER_SIZE: usize = 18;

/// Size of the BGZF block footer (CRC32 + ISIZE).
pub const BGZF_FOOTER_SIZE: usize = 8;

/// BGZF EOF marker block (empty block signaling end of stream).
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02, 0x00,
    0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

// ============================================================================
// Header parsing
// ============================================================================

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// Validate the fixed header fields and return XLEN.
fn parse_fixed_header(header: &[u8]) -> io::Result<usize> {
    if header.len() < BGZF_FIXED_HEADER_SIZE {
        return Err(invalid(format!(
            "BGZF header too short: {} bytes, need at least {BGZF_FIXED_HEADER_SIZE}",
            header.len()
        )));
    }
    if header[0] != 0x1f || header[1] != 0x8b {
        return Err(invalid(format!(
            "Invalid BGZF magic: expected 0x1f 0x8b, got 0x{:02x} 0x{:02x}",
            header[0], header[1]
        )));
    }
    if header[2] != 0x08 {
        return Err(invalid(format!(
            "Invalid compression method: expected 0x08, got 0x{:02x}",
            header[2]
        )));
    }
    if header[3] & 0x04 == 0 {
        return Err(invalid("BGZF block missing FEXTRA flag".to_string()));
    }
    Ok(u16::from_le_bytes([header[10], header[11]]) as usize)
}

/// Walk the extra subfields looking for `BC` and return its BSIZE value.
fn find_bsize(extra: &[u8]) -> io::Result<u16> {
    let mut offset = 0;
    while offset + 4 <= extra.len() {
        let (si1, si2) = (extra[offset], extra[offset + 1]);
        let slen = u16::from_le_bytes([extra[offset + 2], extra[offset + 3]]) as usize;
        offset += 4;
        if offset + slen > extra.len() {
            return Err(invalid("BGZF extra subfield overruns XLEN".to_string()));
        }
        if si1 == b'B' && si2 == b'C' {
            if slen != 2 {
                return Err(invalid(format!(
                    "Invalid BC subfield length: expected 2, got {slen}"
                )));
            }
            return Ok(u16::from_le_bytes([extra[offset], extra[offset + 1]]));
        }
        offset += slen;
    }
    Err(invalid("BGZF block has no BC subfield".to_string()))
}

/// Parse a block header prefix and return the total size of the block.
///
/// `bytes` must hold at least the fixed header plus XLEN extra bytes of the
/// block; for the standard layout, [`BGZF_HEADER_SIZE`] bytes suffice. This
/// is what partition planners use to walk block boundaries from ranged
/// reads without touching the compressed payload.
///
/// # Errors
///
/// Returns `InvalidData` if the header is malformed or the `BC` subfield is
/// missing, and `UnexpectedEof` if `bytes` is too short to cover the extra
/// subfields.
pub fn block_size_from_header(bytes: &[u8]) -> io::Result<usize> {
    let xlen = parse_fixed_header(bytes)?;
    let header_size = BGZF_FIXED_HEADER_SIZE + xlen;
    if bytes.len() < header_size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("BGZF header needs {header_size} bytes, got {}", bytes.len()),
        ));
    }
    let bsize = find_bsize(&bytes[BGZF_FIXED_HEADER_SIZE..header_size])?;
    let block_size = bsize as usize + 1;
    if block_size < header_size + BGZF_FOOTER_SIZE {
        return Err(invalid(format!("BGZF block too small: {block_size} bytes")));
    }
    Ok(block_size)
}

// ============================================================================
// Raw block type
// ============================================================================

/// A raw BGZF block (compressed, not yet decompressed).
#[derive(Debug, Clone)]
pub struct RawBgzfBlock {
    /// Complete raw block data: header + compressed data + footer.
    pub data: Vec<u8>,
}

impl RawBgzfBlock {
    /// Total size of the block in the compressed stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the block holds no bytes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether this is the BGZF EOF marker block.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.data == BGZF_EOF
    }

    /// Size of this block's header including all extra subfields.
    #[must_use]
    pub fn header_size(&self) -> usize {
        if self.data.len() < BGZF_FIXED_HEADER_SIZE {
            return self.data.len();
        }
        let xlen = u16::from_le_bytes([self.data[10], self.data[11]]) as usize;
        BGZF_FIXED_HEADER_SIZE + xlen
    }

    /// The deflate payload (between header and footer).
    #[must_use]
    pub fn compressed_data(&self) -> &[u8] {
        let header = self.header_size();
        if self.data.len() <= header + BGZF_FOOTER_SIZE {
            return &[];
        }
        &self.data[header..self.data.len() - BGZF_FOOTER_SIZE]
    }

    /// Expected uncompressed size from the footer ISIZE field.
    #[must_use]
    pub fn uncompressed_size(&self) -> usize {
        if self.data.len() < BGZF_FOOTER_SIZE {
            return 0;
        }
        let len = self.data.len();
        u32::from_le_bytes([
            self.data[len - 4],
            self.data[len - 3],
            self.data[len - 2],
            self.data[len - 1],
        ]) as usize
    }

    /// Expected CRC32 of the uncompressed data, from the footer.
    #[must_use]
    pub fn crc32(&self) -> u32 {
        if self.data.len() < BGZF_FOOTER_SIZE {
            return 0;
        }
        let len = self.data.len();
        u32::from_le_bytes([
            self.data[len - 8],
            self.data[len - 7],
            self.data[len - 6],
            self.data[len - 5],
        ])
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Read a single raw BGZF block from the input.
///
/// Returns `Ok(Some(block))` if a block was read and `Ok(None)` on a clean
/// EOF at a block boundary. EOF in the middle of a block is an
/// `UnexpectedEof` error, so callers can distinguish a finished stream from
/// a truncated one.
///
/// # Errors
///
/// Returns `InvalidData` for malformed headers and `UnexpectedEof` for
/// truncated blocks.
pub fn read_raw_block<R: Read + ?Sized>(reader: &mut R) -> io::Result<Option<RawBgzfBlock>> {
    let mut fixed = [0u8; BGZF_FIXED_HEADER_SIZE];
    match read_exact_or_start(reader, &mut fixed)? {
        ReadOutcome::CleanEof => return Ok(None),
        ReadOutcome::Filled => {}
    }

    let xlen = parse_fixed_header(&fixed)?;
    let header_size = BGZF_FIXED_HEADER_SIZE + xlen;

    let mut header = vec![0u8; header_size];
    header[..BGZF_FIXED_HEADER_SIZE].copy_from_slice(&fixed);
    reader.read_exact(&mut header[BGZF_FIXED_HEADER_SIZE..])?;

    let bsize = find_bsize(&header[BGZF_FIXED_HEADER_SIZE..])?;
    let block_size = bsize as usize + 1;
    if block_size < header_size + BGZF_FOOTER_SIZE {
        return Err(invalid(format!("BGZF block too small: {block_size} bytes")));
    }

    let mut data = vec![0u8; block_size];
    data[..header_size].copy_from_slice(&header);
    reader.read_exact(&mut data[header_size..])?;

    Ok(Some(RawBgzfBlock { data }))
}

enum ReadOutcome {
    Filled,
    CleanEof,
}

/// Fill `buf`, treating EOF before the first byte as a clean end of stream
/// and EOF after it as truncation.
fn read_exact_or_start<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<ReadOutcome>
where
    R: Read + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(ReadOutcome::CleanEof),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("BGZF stream truncated mid-header after {filled} bytes"),
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(ReadOutcome::Filled)
}

// ============================================================================
// Decompression
// ============================================================================

/// Decompress a raw BGZF block into a fresh buffer.
///
/// # Errors
///
/// Returns `InvalidData` if decompression fails or the CRC32 does not match.
pub fn decompress_block(
    block: &RawBgzfBlock,
    decompressor: &mut Decompressor,
) -> io::Result<Vec<u8>> {
    let mut output = Vec::with_capacity(block.uncompressed_size());
    decompress_block_into(block, decompressor, &mut output)?;
    Ok(output)
}

/// Decompress a BGZF block, appending to `output`.
///
/// The decompressor is reused across calls; libdeflater resets its state per
/// call, so one decompressor serves a whole stream. The footer CRC32 is
/// verified against the decompressed bytes.
///
/// # Errors
///
/// Returns `InvalidData` if decompression fails or the CRC32 does not match.
pub fn decompress_block_into(
    block: &RawBgzfBlock,
    decompressor: &mut Decompressor,
    output: &mut Vec<u8>,
) -> io::Result<()> {
    if block.is_eof() || block.uncompressed_size() == 0 {
        return Ok(());
    }

    let compressed = block.compressed_data();
    let uncompressed_size = block.uncompressed_size();

    let start = output.len();
    output.resize(start + uncompressed_size, 0);

    decompressor
        .deflate_decompress(compressed, &mut output[start..])
        .map_err(|e| invalid(format!("BGZF decompression failed: {e:?}")))?;

    let expected_crc = block.crc32();
    let actual_crc = crc32fast::hash(&output[start..]);
    if expected_crc != actual_crc {
        return Err(invalid(format!(
            "BGZF CRC32 mismatch: expected 0x{expected_crc:08x}, got 0x{actual_crc:08x}, \
             block_size={}, uncompressed_size={uncompressed_size}",
            block.len(),
        )));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
