//! CLI command implementations for varsum.
//!
//! Each submodule implements one command:
//!
//! - [`summarize`] - Scan a BGZF-compressed VCF into per-region summary objects
//! - [`find_duplicates`] - Count variant keys shared between summarized datasets

// Blanket clippy pedantic allows for command implementations.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod find_duplicates;
pub mod summarize;
