//! Variant model, coordinate windows, and region spans.
//!
//! A [`Variant`] is one normalized record: a multi-allelic VCF line splits
//! into one `Variant` per alternate allele. Summary objects hold position-
//! sorted runs of them; the duplicate engine compares them across datasets.

use bstr::BString;
use std::fmt;

/// One normalized variant record.
///
/// Ordering is by position first, then reference, then alternate, so a sorted
/// sequence of variants is grouped into equal-position runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variant {
    /// 1-based position on the contig
    pub position: u64,
    /// Reference allele bases
    pub reference: BString,
    /// One alternate allele (symbolic alleles keep their angle brackets)
    pub alternate: BString,
}

impl Variant {
    /// Create a variant from a position and allele byte strings.
    pub fn new(position: u64, reference: impl Into<BString>, alt: impl Into<BString>) -> Self {
        Self { position, reference: reference.into(), alternate: alt.into() }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}>{}", self.position, self.reference, self.alternate)
    }
}

/// Inclusive coordinate range covered by one summary file on one contig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionSpan {
    /// First covered position
    pub start: u64,
    /// Last covered position
    pub end: u64,
}

impl RegionSpan {
    /// Create a span; `start` must not exceed `end`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "span start {start} > end {end}");
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn merge(self, other: RegionSpan) -> RegionSpan {
        RegionSpan { start: self.start.min(other.start), end: self.end.max(other.end) }
    }

    /// Interval overlap-or-containment test.
    ///
    /// True when `other` starts inside `self`, ends inside `self`, or
    /// strictly contains `self`.
    #[must_use]
    pub fn overlaps(self, other: RegionSpan) -> bool {
        (self.start <= other.start && other.start <= self.end)
            || (self.start <= other.end && other.end <= self.end)
            || (other.start < self.start && self.end < other.end)
    }

    /// Token form `"<start>-<end>"` used in object keys and work units.
    #[must_use]
    pub fn token(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// Inclusive coordinate window processed by one duplicate-search work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateWindow {
    /// First position in the window
    pub start: u64,
    /// Last position in the window
    pub end: u64,
}

impl CoordinateWindow {
    /// Create a window; `start` must not exceed `end`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "window start {start} > end {end}");
        Self { start, end }
    }

    /// Whether `position` falls inside the window.
    #[must_use]
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }

    /// Whether a file's declared span overlaps this window.
    #[must_use]
    pub fn overlaps_span(&self, span: RegionSpan) -> bool {
        RegionSpan::new(self.start, self.end).overlaps(span)
    }

    /// Token form `"<start>-<end>"` identifying this window's work unit.
    #[must_use]
    pub fn token(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }

    /// Split into up to `pieces` contiguous, disjoint sub-windows that cover
    /// this window exactly. Fewer pieces come back when the window has fewer
    /// positions than requested.
    #[must_use]
    pub fn split(&self, pieces: usize) -> Vec<CoordinateWindow> {
        let width = self.end - self.start + 1;
        let pieces = (pieces.max(1) as u64).min(width);
        let base = width / pieces;
        let remainder = width % pieces;

        let mut windows = Vec::with_capacity(pieces as usize);
        let mut start = self.start;
        for i in 0..pieces {
            let len = if i < remainder { base + 1 } else { base };
            windows.push(CoordinateWindow::new(start, start + len - 1));
            start += len;
        }
        windows
    }
}

impl fmt::Display for CoordinateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
