//! Helper utilities for integration tests.

pub mod summary_reader;
pub mod vcf_builder;

pub use summary_reader::*;
pub use vcf_builder::*;
