//! Error path integration tests.
//!
//! These tests verify that error conditions are handled correctly,
//! including validation failures, missing files, and invalid inputs.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

use crate::helpers::vcf_builder::{TWO_SAMPLE_HEADER, record_line, simple_vcf, write_bgzf};

/// Run summarize against `input`, writing summaries beside it.
fn summarize_status(temp_dir: &TempDir, input: &std::path::Path) -> std::process::ExitStatus {
    let store = temp_dir.path().join("summaries");
    Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(["summarize", "-i", input.to_str().unwrap(), "-s", store.to_str().unwrap()])
        .status()
        .expect("Failed to run summarize command")
}

// ==================== Summarize Input Errors ====================

#[test]
fn test_summarize_missing_input_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("no_such_file.vcf.gz");

    let status = summarize_status(&temp_dir, &input);
    assert!(!status.success(), "Summarize should fail on a missing input");
}

#[test]
fn test_summarize_rejects_plain_text_input() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("plain.vcf.gz");
    fs::write(&input, simple_vcf("1", &[100, 200])).expect("write plain text");

    let status = summarize_status(&temp_dir, &input);
    assert!(!status.success(), "Summarize should fail on uncompressed input");
}

#[test]
fn test_summarize_rejects_truncated_input() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cut.vcf.gz");
    write_bgzf(&input, &simple_vcf("1", &[100, 200, 300]));

    // Cut into the final block so its header promises more than remains.
    let data = fs::read(&input).expect("read fixture");
    fs::write(&input, &data[..data.len() - 10]).expect("truncate fixture");

    let status = summarize_status(&temp_dir, &input);
    assert!(!status.success(), "Summarize should fail on a truncated stream");
}

#[test]
fn test_summarize_rejects_record_before_header_line() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("headerless.vcf.gz");
    let mut text = String::from("##fileformat=VCFv4.2\n");
    text.push_str(&record_line("1", 100, "A", "G"));
    write_bgzf(&input, &text);

    let status = summarize_status(&temp_dir, &input);
    assert!(!status.success(), "Summarize should fail without a #CHROM line");
}

#[test]
fn test_summarize_rejects_unsorted_input() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("unsorted.vcf.gz");
    let mut text = TWO_SAMPLE_HEADER.to_string();
    text.push_str(&record_line("1", 500, "A", "G"));
    text.push_str(&record_line("1", 100, "C", "T"));
    write_bgzf(&input, &text);

    let status = summarize_status(&temp_dir, &input);
    assert!(!status.success(), "Summarize should fail on a position decrease");
}

// ==================== Parameter Validation ====================

#[test]
fn test_summarize_rejects_bad_compression_level() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cohort.vcf.gz");
    let store = temp_dir.path().join("summaries");
    write_bgzf(&input, &simple_vcf("1", &[100]));

    let status = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args([
            "summarize",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store.to_str().unwrap(),
            "--compression-level",
            "0",
        ])
        .status()
        .expect("Failed to run summarize command");
    assert!(!status.success(), "compression level 0 should be rejected");
}

#[test]
fn test_summarize_rejects_zero_slice_bytes() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cohort.vcf.gz");
    let store = temp_dir.path().join("summaries");
    write_bgzf(&input, &simple_vcf("1", &[100]));

    let status = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args([
            "summarize",
            "-i",
            input.to_str().unwrap(),
            "-s",
            store.to_str().unwrap(),
            "--slice-bytes",
            "0",
        ])
        .status()
        .expect("Failed to run summarize command");
    assert!(!status.success(), "slice size 0 should be rejected");
}

#[test]
fn test_find_duplicates_rejects_zero_stride() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");

    let status = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(["find-duplicates", "-s", store.to_str().unwrap(), "--window-stride", "0"])
        .status()
        .expect("Failed to run find-duplicates command");
    assert!(!status.success(), "window stride 0 should be rejected");
}

#[test]
fn test_find_duplicates_rejects_zero_subwindows() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");

    let status = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(["find-duplicates", "-s", store.to_str().unwrap(), "--subwindows-per-thread", "0"])
        .status()
        .expect("Failed to run find-duplicates command");
    assert!(!status.success(), "subwindow count 0 should be rejected");
}
