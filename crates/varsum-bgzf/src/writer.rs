//! Inline BGZF compression.
//!
//! [`BlockCompressor`] buffers a byte stream and emits complete BGZF blocks
//! as the buffer fills, using libdeflate via the `bgzf` crate. Callers
//! control framing: `flush` closes the current block early (useful when a
//! block boundary should fall at a record boundary), and `finish` appends
//! the standard EOF marker so the result is a complete BGZF stream.

use crate::reader::BGZF_EOF;
use bgzf::{CompressionLevel, Compressor as BgzfCompressor};
use std::io;

/// Maximum uncompressed payload of one BGZF block.
pub const BGZF_MAX_BLOCK_SIZE: usize = bgzf::BGZF_BLOCK_SIZE;

/// A compressed BGZF block ready for writing.
#[derive(Debug, Clone)]
pub struct CompressedBlock {
    /// Complete BGZF block (header + compressed data + footer).
    pub data: Vec<u8>,
}

/// Streaming BGZF compressor producing one block per `BGZF_MAX_BLOCK_SIZE`
/// bytes of input (or per explicit flush).
///
/// # Usage
///
/// ```
/// use varsum_bgzf::BlockCompressor;
///
/// # fn main() -> std::io::Result<()> {
/// let mut compressor = BlockCompressor::new(6);
/// compressor.write_all(b"record data")?;
/// compressor.finish()?;
///
/// let mut stream = Vec::new();
/// compressor.write_blocks_to(&mut stream)?;
/// # Ok(())
/// # }
/// ```
pub struct BlockCompressor {
    /// Uncompressed bytes accumulating toward the next block.
    buffer: Vec<u8>,
    /// bgzf crate compressor, reused across blocks.
    compressor: BgzfCompressor,
    /// Completed blocks not yet handed to the caller.
    completed_blocks: Vec<CompressedBlock>,
    /// Recycled output buffers.
    buffer_pool: Vec<Vec<u8>>,
}

impl BlockCompressor {
    /// Create a compressor with the given level (clamped to 1..=12).
    ///
    /// # Panics
    ///
    /// Panics if the bgzf library rejects level 6, which it never does.
    #[must_use]
    pub fn new(compression_level: u32) -> Self {
        let level = u8::try_from(compression_level.clamp(1, 12))
            .expect("value in [1, 12] always fits in u8");
        let level =
            CompressionLevel::new(level).unwrap_or_else(|_| CompressionLevel::new(6).unwrap());
        Self {
            buffer: Vec::with_capacity(BGZF_MAX_BLOCK_SIZE),
            compressor: BgzfCompressor::new(level),
            completed_blocks: Vec::new(),
            buffer_pool: Vec::new(),
        }
    }

    /// Append data, compressing a block each time the buffer fills.
    ///
    /// # Errors
    ///
    /// Returns an error if BGZF compression fails.
    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let room = BGZF_MAX_BLOCK_SIZE - self.buffer.len();
            let take = room.min(data.len() - offset);
            self.buffer.extend_from_slice(&data[offset..offset + take]);
            offset += take;

            if self.buffer.len() >= BGZF_MAX_BLOCK_SIZE {
                self.compress_current_buffer()?;
            }
        }
        Ok(())
    }

    /// Compress whatever is buffered into a (possibly short) block.
    ///
    /// # Errors
    ///
    /// Returns an error if BGZF compression fails.
    pub fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.compress_current_buffer()?;
        }
        Ok(())
    }

    /// Flush and append the 28-byte EOF marker, completing the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if BGZF compression fails.
    pub fn finish(&mut self) -> io::Result<()> {
        self.flush()?;
        self.completed_blocks.push(CompressedBlock { data: BGZF_EOF.to_vec() });
        Ok(())
    }

    /// Take all completed blocks, clearing the internal list.
    pub fn take_blocks(&mut self) -> Vec<CompressedBlock> {
        std::mem::take(&mut self.completed_blocks)
    }

    /// Write all completed blocks to `output`, recycling their buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `output` fails.
    pub fn write_blocks_to<W: io::Write + ?Sized>(&mut self, output: &mut W) -> io::Result<()> {
        for block in self.completed_blocks.drain(..) {
            output.write_all(&block.data)?;
            let mut buf = block.data;
            buf.clear();
            self.buffer_pool.push(buf);
        }
        Ok(())
    }

    fn compress_current_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut compressed = self.buffer_pool.pop().unwrap_or_default();
        compressed.clear();

        self.compressor
            .compress(&self.buffer, &mut compressed)
            .map_err(|e| io::Error::other(format!("BGZF compression failed: {e}")))?;

        self.completed_blocks.push(CompressedBlock { data: compressed });
        self.buffer.clear();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
