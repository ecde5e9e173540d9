//! Work partitioning for both pipelines.
//!
//! Summarization splits one BGZF-compressed VCF into slices along block
//! boundaries, sized by a cost model that balances per-slice startup cost
//! against scan throughput. Duplicate search splits each contig's merged
//! coordinate span into fixed-stride windows and assigns every summary
//! object overlapping each window.
//!
//! Slice boundaries come straight from the BGZF container: the planner
//! walks block headers with small ranged reads, never touching the
//! compressed payloads, so planning a multi-gigabyte object costs a few
//! kilobytes of traffic per megabyte of file.

use crate::bgzf_cursor::BgzfCursor;
use crate::errors::{Result, VarsumError};
use crate::store::ObjectStore;
use crate::variant::{CoordinateWindow, RegionSpan};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::io::{self, Read};
use varsum_bgzf::{BGZF_EOF, BGZF_HEADER_SIZE, VirtualOffset, block_size_from_header};

/// Default coordinate stride of duplicate-search windows, in base pairs.
pub const DEFAULT_WINDOW_STRIDE: u64 = 5_000;

/// Compressed bytes fetched per ranged read while walking block headers.
const HEADER_PROBE_BYTES: u64 = 1 << 20;

/// Newton iterations before settling for the current estimate.
const NEWTON_ITERATION_LIMIT: usize = 64;

// ----------------------------------------------------------------------------
// Slice sizing
// ----------------------------------------------------------------------------

/// Cost model for slice sizing.
///
/// One slice costs a fixed startup floor plus its bytes divided by scan
/// throughput, and dispatching each slice costs the planner a little time
/// of its own. [`optimal_slice_size`] minimizes the modeled end-to-end
/// latency of summarizing the whole file.
#[derive(Debug, Clone)]
pub struct CostModel {
    /// Minimum wall-clock seconds one slice takes regardless of size.
    pub min_task_time: f64,
    /// Scan throughput in compressed bytes per second.
    pub throughput: f64,
    /// Planner-side seconds spent dispatching one slice.
    pub dispatch_overhead: f64,
    /// Cap on the number of slices one file may fan out into.
    pub max_concurrency: u64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            min_task_time: 0.1,
            throughput: 75e6,
            dispatch_overhead: 0.02,
            max_concurrency: 1_000,
        }
    }
}

/// Slice size, in compressed bytes, minimizing the modeled time to
/// summarize a file of `total_size` compressed bytes.
///
/// Newton-Raphson on the derivative of the cost function, starting from
/// `sqrt(total_size)`. Iteration stops once the extrapolated remaining
/// error falls below `epsilon`; callers pass half the average block size,
/// since a finer answer than one block boundary cannot be acted on. The
/// result is then raised so the file fans out into at most
/// `model.max_concurrency` slices.
///
/// `total_size` must be positive.
#[must_use]
pub fn optimal_slice_size(total_size: f64, epsilon: f64, model: &CostModel) -> f64 {
    let mut sizes: Vec<f64> = Vec::new();
    let mut next_size = total_size.sqrt();
    for _ in 0..NEWTON_ITERATION_LIMIT {
        sizes.push(next_size);
        next_size = newton_step(total_size, next_size, model);
        if next_size <= 0.0 {
            // Overshot into the region where the model is meaningless;
            // restart closer to zero.
            next_size = sizes[sizes.len() - 1] / 2.0;
        }
        if sizes.len() < 2 {
            continue;
        }
        let last_difference = next_size - sizes[sizes.len() - 1];
        let previous_difference = sizes[sizes.len() - 1] - sizes[sizes.len() - 2];
        if previous_difference == 0.0 {
            break;
        }
        let rate = last_difference / previous_difference;
        if rate.abs() < 1.0 && (last_difference / (1.0 - rate)).abs() < epsilon {
            break;
        }
    }

    if total_size / next_size > model.max_concurrency as f64 {
        next_size = total_size / model.max_concurrency as f64;
    }
    next_size
}

/// One Newton step toward the root of the cost function's derivative.
fn newton_step(total_size: f64, split_size: f64, model: &CostModel) -> f64 {
    let min_time = model.min_task_time;
    let rate = model.throughput;
    let dispatch = model.dispatch_overhead;

    let derivative = -min_time.powi(2) / split_size.powi(2) + 1.0 / rate.powi(2)
        - 2.0 * dispatch * total_size * min_time / split_size.powi(3)
        - dispatch * total_size / split_size.powi(2) / rate;
    let second_derivative = 2.0 * min_time.powi(2) / split_size.powi(3)
        + 6.0 * dispatch * total_size * min_time / split_size.powi(4)
        + 2.0 * dispatch * total_size / split_size.powi(3) / rate;

    split_size - derivative / second_derivative
}

// ----------------------------------------------------------------------------
// Slice planning
// ----------------------------------------------------------------------------

/// Partition one compressed VCF into scan slices.
///
/// Each slice is a pair of virtual offsets: where the slice begins and
/// where the next slice begins. The final slice ends at
/// [`VirtualOffset::MAX`] so its worker reads to the end of the stream.
/// Consecutive slices share their boundary offset, which is what the
/// scanner's line-ownership rule keys on.
///
/// # Errors
///
/// Returns [`VarsumError::InvalidInput`] if the object holds no data
/// blocks or a block header is malformed, and [`VarsumError::Truncated`]
/// if the object ends inside a block.
pub fn plan_slices(
    store: &dyn ObjectStore,
    key: &str,
    model: &CostModel,
) -> Result<Vec<(VirtualOffset, VirtualOffset)>> {
    let (total_size, boundaries) = data_block_starts(store, key)?;
    let average_block = total_size as f64 / boundaries.len() as f64;
    let slice_size = optimal_slice_size(total_size as f64, average_block / 2.0, model);
    let slices = group_boundaries(&boundaries, slice_size);
    debug!(
        "Planned {} slices for '{key}': {} blocks, target slice size {:.0} bytes",
        slices.len(),
        boundaries.len(),
        slice_size
    );
    Ok(slices)
}

/// [`plan_slices`] with an explicit slice size instead of the cost model.
///
/// # Errors
///
/// Same failure modes as [`plan_slices`].
pub fn plan_slices_with_size(
    store: &dyn ObjectStore,
    key: &str,
    slice_size: f64,
) -> Result<Vec<(VirtualOffset, VirtualOffset)>> {
    let (_, boundaries) = data_block_starts(store, key)?;
    Ok(group_boundaries(&boundaries, slice_size))
}

/// Object size and data-block starts, rejecting objects with no data.
fn data_block_starts(store: &dyn ObjectStore, key: &str) -> Result<(u64, Vec<u64>)> {
    let total_size = store.size(key)?;
    let boundaries = walk_block_starts(store, key, total_size, HEADER_PROBE_BYTES)?;
    if boundaries.is_empty() {
        return Err(VarsumError::InvalidInput {
            location: key.to_string(),
            reason: "no data blocks before the EOF marker".to_string(),
        });
    }
    Ok((total_size, boundaries))
}

/// Compressed byte offset of every data block in the object, in order.
///
/// Fetches headers in `probe_bytes` windows and never reads compressed
/// payloads. The trailing EOF marker is not reported; an empty block in
/// the middle of the stream is.
fn walk_block_starts(
    store: &dyn ObjectStore,
    key: &str,
    total_size: u64,
    probe_bytes: u64,
) -> Result<Vec<u64>> {
    debug_assert!(probe_bytes >= BGZF_HEADER_SIZE as u64);

    let mut starts = Vec::new();
    let mut window: Vec<u8> = Vec::new();
    let mut window_start = 0u64;
    let mut offset = 0u64;

    while offset < total_size {
        if offset + BGZF_HEADER_SIZE as u64 > total_size {
            return Err(VarsumError::Truncated {
                location: format!("{key} at byte {offset}"),
                reason: format!(
                    "{} trailing bytes are too few for a block header",
                    total_size - offset
                ),
            });
        }

        let window_end = window_start + window.len() as u64;
        if offset < window_start || window_end.saturating_sub(offset) < BGZF_HEADER_SIZE as u64 {
            let fetch_end = (offset + probe_bytes - 1).min(total_size - 1);
            window = store.get_range(key, offset, fetch_end)?;
            window_start = offset;
        }

        let at = (offset - window_start) as usize;
        let block_size = match block_size_from_header(&window[at..]) {
            Ok(size) => size,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof
                && window_start + (window.len() as u64) < total_size =>
            {
                // An oversized extra field straddles the probe window;
                // refetch with the block start at the window start.
                let fetch_end = (offset + probe_bytes - 1).min(total_size - 1);
                window = store.get_range(key, offset, fetch_end)?;
                window_start = offset;
                block_size_from_header(&window).map_err(|e| malformed_header(key, offset, &e))?
            }
            Err(e) => return Err(malformed_header(key, offset, &e)),
        };

        let next = offset + block_size as u64;
        if next > total_size {
            return Err(VarsumError::Truncated {
                location: format!("{key} at byte {offset}"),
                reason: format!(
                    "block header declares {block_size} bytes but only {} remain",
                    total_size - offset
                ),
            });
        }
        if next == total_size && block_size == BGZF_EOF.len() {
            break;
        }
        starts.push(offset);
        offset = next;
    }
    Ok(starts)
}

fn malformed_header(key: &str, offset: u64, error: &io::Error) -> VarsumError {
    VarsumError::InvalidInput {
        location: format!("{key} at byte {offset}"),
        reason: error.to_string(),
    }
}

/// Group block starts into slices spanning at least `slice_size`
/// compressed bytes each, the last one open ended.
fn group_boundaries(boundaries: &[u64], slice_size: f64) -> Vec<(VirtualOffset, VirtualOffset)> {
    let mut slices = Vec::new();
    let mut start = boundaries[0];
    for &boundary in &boundaries[1..] {
        if (boundary - start) as f64 >= slice_size {
            slices.push((VirtualOffset::new(start, 0), VirtualOffset::new(boundary, 0)));
            start = boundary;
        }
    }
    slices.push((VirtualOffset::new(start, 0), VirtualOffset::MAX));
    slices
}

// ----------------------------------------------------------------------------
// Sample counting
// ----------------------------------------------------------------------------

/// Number of sample columns declared by the `#CHROM` header line.
///
/// The fixed VCF columns through FORMAT account for eight tab separators;
/// every column past them is a sample. Sites-only files, which stop at
/// INFO, count as zero samples.
///
/// # Errors
///
/// Returns [`VarsumError::InvalidInput`] if a record line appears before
/// `#CHROM` or the stream ends without one.
pub fn count_samples<R: Read>(cursor: &mut BgzfCursor<R>) -> Result<u64> {
    while cursor.has_more()? {
        let (line, _terminator) = cursor.read_until(b'\n')?;
        if line.first() != Some(&b'#') {
            return Err(VarsumError::InvalidInput {
                location: "VCF header".to_string(),
                reason: "record line before the #CHROM header line".to_string(),
            });
        }
        if line.starts_with(b"#CHROM") {
            let tabs = line.iter().filter(|&&b| b == b'\t').count() as u64;
            return Ok(tabs.saturating_sub(8));
        }
    }
    Err(VarsumError::InvalidInput {
        location: "VCF header".to_string(),
        reason: "stream ended before the #CHROM header line".to_string(),
    })
}

// ----------------------------------------------------------------------------
// Summary keys
// ----------------------------------------------------------------------------

/// A summary object's identity, recovered from its key.
///
/// Keys follow `{prefix}/contig/{contig}/{dataset}/regions/{start}-{end}`.
/// The dataset segment has `/` replaced by `%`, so it never introduces
/// extra segments and the key parses unambiguously from the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryFileInfo {
    /// Full object key, used to fetch the summary.
    pub key: String,
    /// Contig the summary covers.
    pub contig: String,
    /// Encoded dataset name.
    pub dataset: String,
    /// Position span covered, from the key's final segment.
    pub span: RegionSpan,
}

/// Parse a summary object key.
///
/// Returns `None` when the key does not follow the summary layout, since
/// unrelated objects may live under the same prefix.
#[must_use]
pub fn parse_summary_key(key: &str) -> Option<SummaryFileInfo> {
    let segments: Vec<&str> = key.split('/').collect();
    let n = segments.len();
    if n < 5 || segments[n - 2] != "regions" || segments[n - 5] != "contig" {
        return None;
    }
    let (start, end) = segments[n - 1].split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = end.parse().ok()?;
    if start > end {
        return None;
    }
    Some(SummaryFileInfo {
        key: key.to_string(),
        contig: segments[n - 4].to_string(),
        dataset: segments[n - 3].to_string(),
        span: RegionSpan::new(start, end),
    })
}

// ----------------------------------------------------------------------------
// Window planning
// ----------------------------------------------------------------------------

/// One duplicate-search work unit: a coordinate window on one contig plus
/// the summary objects overlapping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    /// Contig the window lies on.
    pub contig: String,
    /// Inclusive coordinate range to search.
    pub window: CoordinateWindow,
    /// Keys of the summary objects whose spans overlap the window.
    pub summary_keys: Vec<String>,
}

/// Partition each contig's merged span into fixed-stride windows.
///
/// Windows tile `[span.start, span.end]` inclusively: every position of
/// every file's span lands in exactly one window, including a final short
/// window when the span is not a stride multiple. Windows overlapped by
/// fewer than two files are still planned, so pending-set registration
/// covers every token; the search itself short-circuits them.
///
/// # Errors
///
/// Returns [`VarsumError::InvalidParameter`] for a zero stride and
/// [`VarsumError::InvalidSpan`] if a contig's merged span runs backwards.
pub fn plan_windows(files: &[SummaryFileInfo], stride: u64) -> Result<Vec<WindowPlan>> {
    if stride == 0 {
        return Err(VarsumError::InvalidParameter {
            parameter: "stride".to_string(),
            reason: "window stride must be positive".to_string(),
        });
    }

    let mut spans: BTreeMap<&str, RegionSpan> = BTreeMap::new();
    for file in files {
        spans
            .entry(file.contig.as_str())
            .and_modify(|span| *span = span.merge(file.span))
            .or_insert(file.span);
    }

    let mut plans = Vec::new();
    for (contig, span) in spans {
        if span.start > span.end {
            return Err(VarsumError::InvalidSpan {
                key: contig.to_string(),
                start: span.start,
                end: span.end,
            });
        }
        let mut window_start = span.start;
        loop {
            let window_end = span.end.min(window_start.saturating_add(stride - 1));
            let window = CoordinateWindow::new(window_start, window_end);
            let summary_keys = files
                .iter()
                .filter(|f| f.contig == contig && window.overlaps_span(f.span))
                .map(|f| f.key.clone())
                .collect();
            plans.push(WindowPlan { contig: contig.to_string(), window, summary_keys });
            match window_end.checked_add(1) {
                Some(next) if next <= span.end => window_start = next,
                _ => break,
            }
        }
    }
    Ok(plans)
}

// ----------------------------------------------------------------------------
// Stale summary cleanup
// ----------------------------------------------------------------------------

/// Delete every summary object belonging to `dataset` under `prefix`.
///
/// Runs before a file is re-summarized, so regions from an earlier, longer
/// version of the file cannot survive next to fresh output. Keys under the
/// prefix that do not parse as summaries are left alone.
///
/// # Errors
///
/// Returns an error if listing or deletion fails.
pub fn delete_summaries(store: &dyn ObjectStore, prefix: &str, dataset: &str) -> Result<u64> {
    let mut deleted = 0u64;
    for meta in store.list(&format!("{prefix}/contig/"))? {
        match parse_summary_key(&meta.key) {
            Some(info) if info.dataset == dataset => {
                store.delete(&meta.key)?;
                deleted += 1;
            }
            Some(_) => {}
            None => warn!("Ignoring unrecognized key under summary prefix: '{}'", meta.key),
        }
    }
    if deleted > 0 {
        info!("Deleted {deleted} stale summary objects for dataset '{dataset}'");
    }
    Ok(deleted)
}

// ============================================================================
// Tests
// ============================================================================
