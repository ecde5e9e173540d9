//! Forward-only cursor over the decompressed bytes of a BGZF stream.
//!
//! [`BgzfCursor`] wraps any [`Read`] positioned at a block boundary of a BGZF
//! stream and exposes delimiter-driven scanning primitives over the
//! decompressed bytes: read a token up to one of two delimiters, skip past a
//! number of delimiters, or seek forward by a byte count. Tokens that span
//! block boundaries are assembled transparently in a spill buffer, and
//! `seek_forward` skips whole blocks without inflating them when the target
//! lies beyond, which is what makes fixed-stride record skipping cheap.
//!
//! The cursor tracks its [`VirtualOffset`] so callers can compare record
//! start positions against a slice boundary.

use crate::errors::{Result, VarsumError};
use bstr::ByteSlice;
use libdeflater::Decompressor;
use std::io::Read;
use varsum_bgzf::{VirtualOffset, decompress_block_into, read_raw_block};

/// Terminator reported by token reads when the stream ends before a
/// delimiter. Never a valid VCF delimiter, so it cannot be confused with a
/// real terminator.
pub const END_OF_STREAM: u8 = 0;

enum Hit {
    /// Token lies entirely within the current block.
    InBlock { start: usize, end: usize, terminator: u8 },
    /// Token was assembled in the spill buffer.
    InSpill { terminator: u8 },
    /// Stream ended; any partial token is in the spill buffer.
    End,
}

/// Forward-only scanning cursor over a BGZF stream.
///
/// The underlying reader must deliver the stream starting at the compressed
/// offset of the construction [`VirtualOffset`]; all reported virtual
/// positions are absolute under that convention.
pub struct BgzfCursor<R: Read> {
    reader: R,
    decompressor: Decompressor,
    /// Decompressed bytes of the current block.
    block: Vec<u8>,
    /// Read position within `block`. Invariant: `pos <= block.len()`.
    pos: usize,
    /// Compressed offset of the current block.
    block_start: u64,
    /// Compressed offset just past the current block.
    next_block_start: u64,
    /// Scratch for tokens spanning block boundaries.
    spill: Vec<u8>,
    blocks_inflated: u64,
    blocks_skipped: u64,
    finished: bool,
}

impl<R: Read> BgzfCursor<R> {
    /// Open a cursor at `start`, inflating the first block and seeking to the
    /// intra-block offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the first block is malformed or the intra-block
    /// offset lies past the block's decompressed length.
    pub fn new(reader: R, start: VirtualOffset) -> Result<Self> {
        let mut cursor = Self {
            reader,
            decompressor: Decompressor::new(),
            block: Vec::new(),
            pos: 0,
            block_start: start.compressed(),
            next_block_start: start.compressed(),
            spill: Vec::new(),
            blocks_inflated: 0,
            blocks_skipped: 0,
            finished: false,
        };
        cursor.load_next_block()?;
        let skip = start.uncompressed() as usize;
        if skip > cursor.block.len() {
            return Err(VarsumError::Truncated {
                location: format!("block at compressed offset {}", cursor.block_start),
                reason: format!(
                    "start offset {skip} exceeds decompressed block length {}",
                    cursor.block.len()
                ),
            });
        }
        cursor.pos = skip;
        Ok(cursor)
    }

    /// Current position, normalized to the next block's start when the
    /// cursor sits at the exact end of a block.
    pub fn virtual_position(&self) -> VirtualOffset {
        if self.pos >= self.block.len() {
            VirtualOffset::new(self.next_block_start, 0)
        } else {
            VirtualOffset::new(self.block_start, self.pos as u16)
        }
    }

    /// Number of blocks decompressed so far.
    pub fn blocks_inflated(&self) -> u64 {
        self.blocks_inflated
    }

    /// Number of blocks passed over without decompression.
    pub fn blocks_skipped(&self) -> u64 {
        self.blocks_skipped
    }

    /// Whether any decompressed bytes remain, inflating the next block if
    /// the current one is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the next block is malformed or truncated.
    pub fn has_more(&mut self) -> Result<bool> {
        self.fill()
    }

    /// Next byte without consuming it, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the next block is malformed or truncated.
    pub fn peek(&mut self) -> Result<Option<u8>> {
        Ok(if self.fill()? { Some(self.block[self.pos]) } else { None })
    }

    /// Read bytes up to the next occurrence of `delimiter`.
    ///
    /// See [`read_until_set`](Self::read_until_set).
    ///
    /// # Errors
    ///
    /// Returns an error if a block fails to decode mid-token.
    pub fn read_until(&mut self, delimiter: u8) -> Result<(&[u8], u8)> {
        self.read_until_set(&[delimiter])
    }

    /// Read bytes up to the next occurrence of either delimiter.
    ///
    /// See [`read_until_set`](Self::read_until_set).
    ///
    /// # Errors
    ///
    /// Returns an error if a block fails to decode mid-token.
    pub fn read_until2(&mut self, a: u8, b: u8) -> Result<(&[u8], u8)> {
        self.read_until_set(&[a, b])
    }

    /// Read bytes up to the next occurrence of any delimiter in the set,
    /// consuming the delimiter.
    ///
    /// Returns the token (delimiter excluded) and the terminator that ended
    /// it: one of the delimiters, or [`END_OF_STREAM`] if the stream ended
    /// first. A partial token cut off by end of stream is still returned in
    /// full, so callers can distinguish "no delimiter before end" from "no
    /// data at all" by the token length.
    ///
    /// The returned slice borrows the cursor and is invalidated by the next
    /// call.
    ///
    /// # Errors
    ///
    /// Returns an error if a block fails to decode mid-token.
    pub fn read_until_set(&mut self, delimiters: &[u8]) -> Result<(&[u8], u8)> {
        self.spill.clear();
        let mut in_spill = false;
        let hit = loop {
            if !self.fill()? {
                break Hit::End;
            }
            match self.block[self.pos..].find_byteset(delimiters) {
                Some(offset) => {
                    let start = self.pos;
                    let terminator = self.block[start + offset];
                    self.pos = start + offset + 1;
                    if in_spill {
                        self.spill.extend_from_slice(&self.block[start..start + offset]);
                        break Hit::InSpill { terminator };
                    }
                    break Hit::InBlock { start, end: start + offset, terminator };
                }
                None => {
                    self.spill.extend_from_slice(&self.block[self.pos..]);
                    in_spill = true;
                    self.pos = self.block.len();
                }
            }
        };
        Ok(match hit {
            Hit::InBlock { start, end, terminator } => (&self.block[start..end], terminator),
            Hit::InSpill { terminator } => (&self.spill, terminator),
            Hit::End => (&self.spill, END_OF_STREAM),
        })
    }

    /// Skip past `count` occurrences of `delimiter`.
    ///
    /// Returns `true` if all occurrences were found, `false` if the stream
    /// ended first (cursor left at end of stream).
    ///
    /// # Errors
    ///
    /// Returns an error if a block fails to decode while skipping.
    pub fn skip_past(&mut self, delimiter: u8, count: usize) -> Result<bool> {
        let mut remaining = count;
        while remaining > 0 {
            if !self.fill()? {
                return Ok(false);
            }
            match self.block[self.pos..].find_byte(delimiter) {
                Some(offset) => {
                    self.pos += offset + 1;
                    remaining -= 1;
                }
                None => self.pos = self.block.len(),
            }
        }
        Ok(true)
    }

    /// Skip past the next occurrence of `delimiter`, counting bytes from
    /// `counted` seen along the way.
    ///
    /// Returns the count and whether the delimiter was found before end of
    /// stream. Used to estimate a minimum line stride from the delimiter
    /// density of the first record in a slice.
    ///
    /// # Errors
    ///
    /// Returns an error if a block fails to decode while skipping.
    pub fn skip_past_counting(&mut self, delimiter: u8, counted: &[u8]) -> Result<(u64, bool)> {
        let mut count = 0u64;
        loop {
            if !self.fill()? {
                return Ok((count, false));
            }
            while self.pos < self.block.len() {
                let byte = self.block[self.pos];
                self.pos += 1;
                if counted.contains(&byte) {
                    count += 1;
                }
                if byte == delimiter {
                    return Ok((count, true));
                }
            }
        }
    }

    /// Advance the cursor `distance` decompressed bytes, skipping whole
    /// blocks without inflating them when the target lies beyond.
    ///
    /// Returns `true` if the full distance was covered, `false` if the
    /// stream ended first (cursor left at end of stream).
    ///
    /// # Errors
    ///
    /// Returns an error if a block header is malformed or the stream is
    /// truncated mid-block.
    pub fn seek_forward(&mut self, distance: u64) -> Result<bool> {
        let mut remaining = distance;
        loop {
            let available = (self.block.len() - self.pos) as u64;
            if remaining <= available {
                self.pos += remaining as usize;
                return Ok(true);
            }
            remaining -= available;
            self.pos = self.block.len();
            if self.finished {
                return Ok(false);
            }

            let Some(raw) = read_raw_block(&mut self.reader)? else {
                self.finished = true;
                return Ok(false);
            };
            self.block_start = self.next_block_start;
            self.next_block_start += raw.len() as u64;
            if raw.is_eof() {
                self.finished = true;
                self.block.clear();
                self.pos = 0;
                return Ok(false);
            }

            let uncompressed = raw.uncompressed_size() as u64;
            if uncompressed <= remaining {
                // Target is past this block entirely; never inflate it.
                remaining -= uncompressed;
                self.blocks_skipped += 1;
                self.block.clear();
                self.pos = 0;
            } else {
                self.block.clear();
                decompress_block_into(&raw, &mut self.decompressor, &mut self.block)?;
                self.blocks_inflated += 1;
                self.pos = remaining as usize;
                return Ok(true);
            }
        }
    }

    /// Ensure at least one unread byte is available, advancing to the next
    /// non-empty block if needed.
    fn fill(&mut self) -> Result<bool> {
        if self.pos < self.block.len() {
            return Ok(true);
        }
        if self.finished {
            return Ok(false);
        }
        self.load_next_block()
    }

    /// Read and inflate the next non-empty block. Returns `false` when the
    /// stream ends (EOF marker or clean end at a block boundary).
    fn load_next_block(&mut self) -> Result<bool> {
        self.block.clear();
        self.pos = 0;
        loop {
            let Some(raw) = read_raw_block(&mut self.reader)? else {
                self.finished = true;
                return Ok(false);
            };
            self.block_start = self.next_block_start;
            self.next_block_start += raw.len() as u64;
            if raw.is_eof() {
                self.finished = true;
                return Ok(false);
            }
            if raw.uncompressed_size() == 0 {
                self.blocks_skipped += 1;
                continue;
            }
            decompress_block_into(&raw, &mut self.decompressor, &mut self.block)?;
            self.blocks_inflated += 1;
            return Ok(true);
        }
    }
}
