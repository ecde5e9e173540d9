//! Duplicate detection across dataset summaries.
//!
//! Given the position-sorted variant sequences of every dataset overlapping
//! a coordinate window, [`search_window`] counts the distinct
//! (position, reference, alternate) keys present in two or more datasets.
//! Each key is credited once no matter how many datasets share it.
//!
//! Sequence pairs are compared with a binary-search-anchored merge: the
//! inner cursor only moves forward while the outer sequence is walked in
//! position order, so a pair costs O(n + log m) rather than O(n * m). The
//! window splits into contiguous sub-windows processed in parallel, and a
//! variant's position lands in exactly one sub-window, so sub-window counts
//! sum without double counting.

use crate::logging::format_count;
use crate::variant::{CoordinateWindow, RegionSpan, Variant};
use ahash::AHashMap;
use log::{debug, info};
use rayon::prelude::*;
use std::fmt;

/// One dataset's variants overlapping a search window.
#[derive(Debug, Clone)]
pub struct FileSequence {
    /// Dataset label used in logs.
    pub label: String,
    /// Coordinate span declared by the summary object's key.
    pub span: RegionSpan,
    /// Position-sorted variants.
    pub variants: Vec<Variant>,
}

impl FileSequence {
    pub fn new(label: impl Into<String>, span: RegionSpan, variants: Vec<Variant>) -> Self {
        Self { label: label.into(), span, variants }
    }
}

/// Search tuning.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Worker threads the window is split for.
    pub threads: usize,
    /// Sub-windows per thread; more gives better load balance on skewed
    /// variant density.
    pub subwindows_per_thread: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { threads: 1, subwindows_per_thread: 2 }
    }
}

/// Work counters for one search, used to catch algorithmic regressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchMetrics {
    /// Outer-sequence elements walked across all pairs.
    pub outer_elements: u64,
    /// Anchoring binary searches performed.
    pub binary_searches: u64,
    /// Reference/alternate equality tests.
    pub comparisons: u64,
    /// Times the inner cursor moved backward. Always zero when the merge
    /// is behaving; nonzero means the near-linear bound is broken.
    pub cursor_rewinds: u64,
}

impl SearchMetrics {
    pub fn merge(&mut self, other: SearchMetrics) {
        self.outer_elements += other.outer_elements;
        self.binary_searches += other.binary_searches;
        self.comparisons += other.comparisons;
        self.cursor_rewinds += other.cursor_rewinds;
    }
}

impl fmt::Display for SearchMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} outer elements, {} binary searches, {} comparisons, {} cursor rewinds",
            format_count(self.outer_elements),
            format_count(self.binary_searches),
            format_count(self.comparisons),
            format_count(self.cursor_rewinds)
        )
    }
}

/// Outcome of searching one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSearchResult {
    /// Distinct variant keys shared by at least two datasets.
    pub duplicate_count: u64,
    /// Datasets whose span overlapped the window.
    pub files_considered: usize,
    pub metrics: SearchMetrics,
}

/// Count the variant keys shared by two or more of `sequences` within
/// `window`.
///
/// Sequences whose span does not overlap the window are skipped. A window
/// with fewer than two overlapping sequences yields zero.
#[must_use]
pub fn search_window(
    sequences: &[FileSequence],
    window: CoordinateWindow,
    config: &SearchConfig,
) -> WindowSearchResult {
    let overlapping: Vec<&FileSequence> =
        sequences.iter().filter(|f| window.overlaps_span(f.span)).collect();
    if overlapping.len() < 2 {
        info!(
            "Window {window} overlaps {} dataset(s), nothing to compare",
            overlapping.len()
        );
        return WindowSearchResult {
            duplicate_count: 0,
            files_considered: overlapping.len(),
            metrics: SearchMetrics::default(),
        };
    }

    let pieces = config.threads.max(1) * config.subwindows_per_thread.max(1);
    let per_sub: Vec<(u64, SearchMetrics)> = window
        .split(pieces)
        .par_iter()
        .map(|sub| search_subwindow(&overlapping, *sub))
        .collect();

    let mut duplicate_count = 0;
    let mut metrics = SearchMetrics::default();
    for (count, sub_metrics) in per_sub {
        duplicate_count += count;
        metrics.merge(sub_metrics);
    }
    WindowSearchResult { duplicate_count, files_considered: overlapping.len(), metrics }
}

fn search_subwindow(files: &[&FileSequence], sub: CoordinateWindow) -> (u64, SearchMetrics) {
    let mut metrics = SearchMetrics::default();
    let mut duplicates: AHashMap<Variant, Vec<usize>> = AHashMap::new();

    for j in 1..files.len() {
        for m in 0..j {
            if !sub.overlaps_span(files[j].span)
                || !sub.overlaps_span(files[m].span)
                || !files[j].span.overlaps(files[m].span)
            {
                continue;
            }
            search_pair(files, j, m, sub, &mut duplicates, &mut metrics);
        }
    }

    if log::log_enabled!(log::Level::Debug) {
        for (variant, file_indexes) in &duplicates {
            let labels: Vec<&str> =
                file_indexes.iter().map(|&i| files[i].label.as_str()).collect();
            debug!("Duplicate {variant} shared by {}", labels.join(", "));
        }
    }
    (duplicates.len() as u64, metrics)
}

/// Merge-compare the pair (outer `j`, inner `m`) over `sub`, recording
/// shared keys into `duplicates`.
fn search_pair(
    files: &[&FileSequence],
    j: usize,
    m: usize,
    sub: CoordinateWindow,
    duplicates: &mut AHashMap<Variant, Vec<usize>>,
    metrics: &mut SearchMetrics,
) {
    let outer = &files[j].variants;
    let inner = &files[m].variants;
    if outer.is_empty() || inner.is_empty() {
        return;
    }

    // Outer elements below the inner sequence's front cannot match, so the
    // anchor skips straight past them.
    let mut o = lower_bound(outer, sub.start.max(inner[0].position));
    metrics.binary_searches += 1;
    let mut cursor = 0;
    let mut last_cursor = 0;

    while o < outer.len() && outer[o].position <= sub.end {
        metrics.outer_elements += 1;
        let target = outer[o].position;
        cursor += lower_bound(&inner[cursor..], target);
        metrics.binary_searches += 1;
        if cursor < last_cursor {
            metrics.cursor_rewinds += 1;
        }
        last_cursor = cursor;
        if cursor == inner.len() {
            // The inner sequence is exhausted, nothing further can match.
            break;
        }

        // Probe the equal-position run without moving the cursor, so an
        // equal-position run in the outer sequence reuses it.
        let mut k = cursor;
        while k < inner.len() && inner[k].position == target && inner[k].position <= sub.end {
            metrics.comparisons += 1;
            if inner[k].reference == outer[o].reference
                && inner[k].alternate == outer[o].alternate
            {
                let entry = duplicates.entry(outer[o].clone()).or_default();
                for file in [j, m] {
                    if !entry.contains(&file) {
                        entry.push(file);
                    }
                }
            }
            k += 1;
        }
        o += 1;
    }
}

/// Index of the first variant with position at or past `position`.
fn lower_bound(variants: &[Variant], position: u64) -> usize {
    variants.partition_point(|v| v.position < position)
}
