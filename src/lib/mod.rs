#![deny(unsafe_code)]
// Clippy lint configuration for CI
// These lints are allowed because:
// - cast_*: Offset/size arithmetic intentionally casts between numeric types
// - missing_*_doc: Documentation improvements tracked separately
// - needless_pass_by_value: Some APIs designed for ownership transfer
// - items_after_statements: Some test code uses late item declarations
// - unused_self: Trait implementations may not use self
// - match_same_arms: Sometimes clearer to list arms explicitly
// - unnecessary_wraps: Some Result returns are for API consistency
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::needless_pass_by_value,
    clippy::items_after_statements,
    clippy::unused_self,
    clippy::match_same_arms,
    clippy::unnecessary_wraps,
    clippy::too_many_lines,
    clippy::redundant_closure_for_method_calls,
    clippy::explicit_iter_loop,
    clippy::struct_excessive_bools,
    clippy::map_unwrap_or,
    clippy::uninlined_format_args
)]

//! # varsum - VCF Summarization and Duplicate Detection Library
//!
//! This library summarizes bgzip-compressed VCF files into compact per-contig
//! variant objects and searches those objects for variants shared across
//! datasets, with the work split into independently retryable units that
//! coordinate through a conditional-update store.
//!
//! ## Overview
//!
//! The varsum library is organized into several key modules:
//!
//! ### Core Functionality
//!
//! - **[`vcf_scan`]** - Slice scanner: record framing, allele extraction, INFO counting
//! - **[`summary`]** - Summary object writing and window-clipped reading
//! - **[`dup_search`]** - Cross-dataset duplicate detection over sorted sequences
//! - **[`codec`]** - Compact binary variant encoding (packed nucleotides)
//! - **[`partition`]** - Slice and window planning, cost-model sizing
//!
//! ### Infrastructure
//!
//! - **[`store`]** - Object store abstraction (filesystem, memory, HTTP)
//! - **[`fetch`]** - Windowed, pipelined range fetching
//! - **[`bgzf_cursor`]** - Virtual-offset cursor over BGZF streams
//! - **[`coordination`]** - Pending-token aggregation protocol
//! - **[`bus`]** - Work-unit message publication
//!
//! ### Utilities
//!
//! - **[`validation`]** - Input validation utilities for parameters and files
//! - **[`progress`]** - Progress tracking and logging
//! - **[`logging`]** - Enhanced logging utilities with formatting
//! - **[`retry`]** - Backoff policies for transient failures
//!
//! ## Quick Start
//!
//! ### Scanning a slice of a VCF
//!
//! ```no_run
//! use std::fs::File;
//! use varsum_lib::bgzf_cursor::BgzfCursor;
//! use varsum_lib::vcf_scan::{ScanConfig, scan_slice};
//! use varsum_lib::summary::{SummaryConfig, SummaryWriter};
//! use varsum_lib::store::{FsStore, ObjectStore};
//! use varsum_bgzf::VirtualOffset;
//! use std::sync::Arc;
//!
//! # fn main() -> varsum_lib::Result<()> {
//! let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new("/data/summaries")?);
//! let reader = File::open("input.vcf.gz")?;
//! let mut cursor = BgzfCursor::new(reader, VirtualOffset::new(0, 0))?;
//! let mut writer =
//!     SummaryWriter::new(Arc::clone(&store), "mydata", SummaryConfig::default());
//! let counts = scan_slice(
//!     &mut cursor,
//!     VirtualOffset::MAX,
//!     true,
//!     &ScanConfig::default(),
//!     &mut writer,
//! )?;
//! let keys = writer.finish()?;
//! println!("{} variants in {} objects", counts.variant_count, keys.len());
//! # Ok(())
//! # }
//! ```
//!
//! ### Validating input files
//!
//! ```no_run
//! use varsum_lib::validation::validate_file_exists;
//!
//! # fn main() -> varsum_lib::Result<()> {
//! validate_file_exists("input.vcf.gz", "Input VCF")?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Progress tracking
//!
//! ```no_run
//! use varsum_lib::progress::ProgressTracker;
//!
//! let tracker = ProgressTracker::new("Scanned records").with_interval(100_000);
//! for _ in 0..1_000_000 {
//!     // Process one record...
//!     tracker.log_if_needed(1);
//! }
//! tracker.log_final();
//! ```
//!
//! ## Architecture
//!
//! Workers never talk to each other. Each unit of work (a slice of a VCF, or
//! a coordinate window of a contig) is registered as a pending token before
//! dispatch; workers fold their partial counts into shared totals with a
//! single conditional update that also retires their token, so a duplicated
//! delivery is detected as an already-applied update and dropped. The last
//! update to empty the pending set observes the final totals.

pub mod bgzf_cursor;
pub mod bus;
pub mod codec;
pub mod coordination;
pub mod dup_search;
pub mod errors;
pub mod fetch;
pub mod logging;
pub mod partition;
pub mod progress;
pub mod retry;
pub mod store;
pub mod summary;
pub mod validation;
pub mod variant;
pub mod vcf_scan;

// Re-export the error type and result alias for convenient access
pub use errors::{Result, VarsumError};

// Re-export the variant model used throughout the crate
pub use variant::{CoordinateWindow, Variant};
