//! VCF slice scanning.
//!
//! [`scan_slice`] pulls CHROM/POS/REF/ALT out of the raw VCF text of one
//! virtual-offset slice, emitting a [`Variant`] per alternate allele to a
//! [`VariantSink`] and tallying allele counts from the INFO `AC=` and `AN=`
//! tags. Records are validated to be non-decreasing by position within a
//! contig.
//!
//! # Slice ownership
//!
//! A record belongs to the slice whose range contains its line-start virtual
//! position (`start <= slice_end`); the final owned record is read to
//! completion past the slice boundary. A slice that does not begin at the
//! file start first skips one line, which is the spillover record owned by
//! the preceding slice.
//!
//! # Stride optimization
//!
//! Genotype columns dominate line length in many-sample VCFs, and this
//! scanner never reads them. After the first record's INFO tags, the rest of
//! the line is skipped while counting tail separators; twice that count is a
//! minimum length for every later record's tail, so later records seek that
//! far and then skip to the newline instead of scanning byte by byte. The
//! estimate is a heuristic: every landing is validated (contig unchanged,
//! POS numeric and non-decreasing) and a bad landing aborts the scan with
//! [`VarsumError::StrideLanding`] so the caller can rescan the slice with
//! striding disabled.

use crate::bgzf_cursor::{BgzfCursor, END_OF_STREAM};
use crate::errors::{Result, VarsumError};
use crate::variant::Variant;
use bstr::{BString, ByteSlice};
use log::{debug, warn};
use std::io::Read;
use varsum_bgzf::VirtualOffset;

/// Line-tail separators counted for the stride estimate. Each one is
/// followed by at least a one-byte value in well-formed genotype columns,
/// so twice their count bounds the tail length from below.
const STRIDE_SEPARATORS: [u8; 5] = [b'\t', b'/', b'|', b';', b':'];

/// Receives the variants extracted by a scan, in file order.
pub trait VariantSink {
    /// Accept one variant under its contig.
    ///
    /// # Errors
    ///
    /// Sink errors abort the scan.
    fn record(&mut self, contig: &[u8], variant: Variant) -> Result<()>;
}

/// Scan tuning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Estimate a line stride from the first record and seek past the
    /// genotype columns of later records instead of scanning them.
    pub use_stride: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { use_stride: true }
    }
}

/// Aggregate counters produced by one slice scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    /// Alternate alleles tallied from INFO `AC=` values (one per value,
    /// comma-separated values adding one each).
    pub variant_count: u64,
    /// Total called alleles accumulated from INFO `AN=` values.
    pub call_count: u64,
    /// Records whose leading fields were fully parsed.
    pub records_scanned: u64,
    /// Records that ended without both `AC=` and `AN=`.
    pub records_missing_info: u64,
}

/// Scan the records of one slice, emitting variants to `sink`.
///
/// The cursor must be positioned at the slice start. `slice_end` is the
/// first virtual offset past the slice ([`VirtualOffset::MAX`] for the final
/// slice of a file); `at_file_start` selects between skipping the `#` header
/// lines and skipping the preceding slice's spillover line.
///
/// # Errors
///
/// Returns [`VarsumError::UnsortedInput`] on a position decrease,
/// [`VarsumError::Truncated`] when the stream ends inside a record's leading
/// fields, [`VarsumError::StrideLanding`] when a stride landing fails
/// validation, and [`VarsumError::InvalidInput`] for malformed fields.
pub fn scan_slice<R: Read, S: VariantSink>(
    cursor: &mut BgzfCursor<R>,
    slice_end: VirtualOffset,
    at_file_start: bool,
    config: &ScanConfig,
    sink: &mut S,
) -> Result<ScanCounts> {
    let mut counts = ScanCounts::default();

    if at_file_start {
        skip_header_lines(cursor)?;
    } else if !cursor.skip_past(b'\n', 1)? {
        // The spillover line owned by the preceding slice ran to stream end.
        return Ok(counts);
    }

    let mut contig = BString::from("");
    let mut last_position = 0u64;
    let mut stride: Option<u64> = None;
    let mut first_record = true;

    loop {
        let record_start = cursor.virtual_position();
        if record_start > slice_end || !cursor.has_more()? {
            break;
        }
        let landed_by_stride = stride.is_some();

        // CHROM
        let (chrom, term) = cursor.read_until(b'\t')?;
        if term == END_OF_STREAM {
            if chrom.is_empty() {
                break;
            }
            return Err(truncated(record_start, "record ended inside the CHROM field"));
        }
        if chrom.is_empty() {
            return Err(VarsumError::InvalidInput {
                location: format!("virtual offset {record_start}"),
                reason: "empty CHROM field".to_string(),
            });
        }
        if first_record {
            contig = chrom.into();
        } else if chrom != &contig[..] {
            if landed_by_stride {
                return Err(VarsumError::StrideLanding {
                    virtual_offset: record_start.value(),
                    reason: format!("contig changed from '{contig}' to '{}'", chrom.as_bstr()),
                });
            }
            contig.clear();
            contig.extend_from_slice(chrom);
            last_position = 0;
        }

        // POS
        let (pos_bytes, term) = cursor.read_until(b'\t')?;
        if term == END_OF_STREAM {
            return Err(truncated(record_start, "record ended inside the POS field"));
        }
        let Some(position) = parse_unsigned(pos_bytes) else {
            let shown = pos_bytes.as_bstr().to_string();
            if landed_by_stride {
                return Err(VarsumError::StrideLanding {
                    virtual_offset: record_start.value(),
                    reason: format!("POS field '{shown}' is not numeric"),
                });
            }
            return Err(VarsumError::InvalidInput {
                location: format!("virtual offset {record_start}"),
                reason: format!("POS field '{shown}' is not numeric"),
            });
        };
        if position < last_position {
            if landed_by_stride {
                return Err(VarsumError::StrideLanding {
                    virtual_offset: record_start.value(),
                    reason: format!("position {position} after {last_position}"),
                });
            }
            return Err(VarsumError::UnsortedInput {
                contig: contig.to_string(),
                previous: last_position,
                position,
            });
        }
        last_position = position;

        // ID (skipped)
        if !cursor.skip_past(b'\t', 1)? {
            return Err(truncated(record_start, "record ended inside the ID field"));
        }

        // REF
        let (reference, term) = cursor.read_until(b'\t')?;
        if term == END_OF_STREAM {
            return Err(truncated(record_start, "record ended inside the REF field"));
        }
        let reference = BString::from(reference);

        // ALT, one variant per comma-separated alternate
        let (alternates, term) = cursor.read_until(b'\t')?;
        if term == END_OF_STREAM {
            return Err(truncated(record_start, "record ended inside the ALT field"));
        }
        for alternate in alternates.split_str(",") {
            sink.record(&contig, Variant::new(position, reference.clone(), alternate))?;
        }
        counts.records_scanned += 1;

        // QUAL and FILTER (skipped)
        if !cursor.skip_past(b'\t', 2)? {
            return Err(truncated(record_start, "record ended before the INFO field"));
        }

        // INFO: AC= and AN=, other entries skipped
        let mut found_ac = false;
        let mut found_an = false;
        let info_term = loop {
            let (entry, term) = cursor.read_until_set(&[b';', b'\t', b'\n'])?;
            if term == END_OF_STREAM {
                warn!("Stream ended inside the INFO field of the record at {record_start}");
                counts.records_missing_info += 1;
                return Ok(counts);
            }
            if entry.len() >= 4 {
                if &entry[..3] == b"AC=" {
                    found_ac = true;
                    counts.variant_count +=
                        1 + entry[3..].iter().filter(|&&b| b == b',').count() as u64;
                } else if &entry[..3] == b"AN=" {
                    let Some(calls) = parse_unsigned(&entry[3..]) else {
                        return Err(VarsumError::InvalidInput {
                            location: format!("virtual offset {record_start}"),
                            reason: format!(
                                "AN value '{}' is not numeric",
                                entry[3..].as_bstr()
                            ),
                        });
                    };
                    found_an = true;
                    counts.call_count += calls;
                }
            }
            if found_ac && found_an {
                break term;
            }
            if term != b';' {
                debug!("Record at {record_start} lacks AC= or AN= in INFO");
                counts.records_missing_info += 1;
                break term;
            }
        };

        // Rest of line: derive the stride from the first record, ride it on
        // later ones. A '\n' terminator means the line is already consumed.
        if info_term != b'\n' {
            if first_record && config.use_stride {
                let (count, found) = cursor.skip_past_counting(b'\n', &STRIDE_SEPARATORS)?;
                stride = Some(2 * count);
                if !found {
                    break;
                }
            } else if let Some(stride_len) = stride {
                if !cursor.seek_forward(stride_len)? || !cursor.skip_past(b'\n', 1)? {
                    break;
                }
            } else if !cursor.skip_past(b'\n', 1)? {
                break;
            }
        }
        first_record = false;
    }

    Ok(counts)
}

/// Skip `#`-prefixed header lines at the start of a file.
fn skip_header_lines<R: Read>(cursor: &mut BgzfCursor<R>) -> Result<()> {
    while cursor.peek()? == Some(b'#') {
        if !cursor.skip_past(b'\n', 1)? {
            break;
        }
    }
    Ok(())
}

fn truncated(record_start: VirtualOffset, what: &str) -> VarsumError {
    VarsumError::Truncated {
        location: format!("virtual offset {record_start}"),
        reason: what.to_string(),
    }
}

/// Parse an ASCII-decimal unsigned integer. Rejects empty input, non-digit
/// bytes, and overflow.
fn parse_unsigned(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut value = 0u64;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value.checked_mul(10)?.checked_add(u64::from(byte - b'0'))?;
    }
    Some(value)
}
