//! Integration tests for the find-duplicates command.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use crate::helpers::vcf_builder::{TWO_SAMPLE_HEADER, record_line, simple_vcf, write_bgzf};

/// Summarize `input` into `store`, panicking on failure.
fn summarize(input: &Path, store: &Path) {
    let status = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(["summarize", "-i", input.to_str().unwrap(), "-s", store.to_str().unwrap()])
        .status()
        .expect("Failed to run summarize command");
    assert!(status.success(), "Summarize command failed for {}", input.display());
}

/// Run find-duplicates and return its captured stderr (where the log goes).
fn find_duplicates_output(store: &Path, extra: &[&str]) -> (bool, String) {
    let mut args = vec!["find-duplicates", "-s", store.to_str().unwrap()];
    args.extend_from_slice(extra);
    let output = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(&args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to run find-duplicates command");
    (output.status.success(), String::from_utf8_lossy(&output.stderr).into_owned())
}

#[test]
fn test_find_duplicates_counts_shared_variants() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");
    let a = temp_dir.path().join("a.vcf.gz");
    let b = temp_dir.path().join("b.vcf.gz");
    write_bgzf(&a, &simple_vcf("20", &[100, 200, 300]));
    write_bgzf(&b, &simple_vcf("20", &[200, 300, 400]));
    summarize(&a, &store);
    summarize(&b, &store);

    let (ok, stderr) = find_duplicates_output(&store, &[]);
    assert!(ok, "find-duplicates failed:\n{stderr}");
    assert!(
        stderr.contains("Duplicate variant keys: 2"),
        "expected 2 shared variants in:\n{stderr}"
    );
}

#[test]
fn test_find_duplicates_empty_store() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");

    let (ok, stderr) = find_duplicates_output(&store, &[]);
    assert!(ok, "find-duplicates should succeed on an empty store:\n{stderr}");
    assert!(stderr.contains("Summary objects found: 0"), "unexpected output:\n{stderr}");
    assert!(stderr.contains("Duplicate variant keys: 0"), "unexpected output:\n{stderr}");
}

#[test]
fn test_find_duplicates_single_dataset_finds_nothing() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");
    let a = temp_dir.path().join("a.vcf.gz");
    write_bgzf(&a, &simple_vcf("20", &[100, 200, 300]));
    summarize(&a, &store);

    let (ok, stderr) = find_duplicates_output(&store, &[]);
    assert!(ok, "find-duplicates failed:\n{stderr}");
    assert!(stderr.contains("Duplicate variant keys: 0"), "unexpected output:\n{stderr}");
}

#[test]
fn test_find_duplicates_contig_filter() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");
    let a = temp_dir.path().join("a.vcf.gz");
    let b = temp_dir.path().join("b.vcf.gz");

    // Shared: one key on contig 1 (200), one on contig 2 (300).
    let mut text_a = TWO_SAMPLE_HEADER.to_string();
    text_a.push_str(&record_line("1", 100, "A", "G"));
    text_a.push_str(&record_line("1", 200, "A", "G"));
    text_a.push_str(&record_line("2", 100, "A", "G"));
    text_a.push_str(&record_line("2", 300, "A", "G"));
    let mut text_b = TWO_SAMPLE_HEADER.to_string();
    text_b.push_str(&record_line("1", 200, "A", "G"));
    text_b.push_str(&record_line("2", 300, "A", "G"));
    write_bgzf(&a, &text_a);
    write_bgzf(&b, &text_b);
    summarize(&a, &store);
    summarize(&b, &store);

    let (ok, stderr) = find_duplicates_output(&store, &[]);
    assert!(ok, "find-duplicates failed:\n{stderr}");
    assert!(stderr.contains("Duplicate variant keys: 2"), "unexpected output:\n{stderr}");
    assert!(stderr.contains("Contig 1:"), "per-contig line missing:\n{stderr}");
    assert!(stderr.contains("Contig 2:"), "per-contig line missing:\n{stderr}");

    let (ok, stderr) = find_duplicates_output(&store, &["--contig", "1"]);
    assert!(ok, "find-duplicates failed:\n{stderr}");
    assert!(stderr.contains("Duplicate variant keys: 1"), "unexpected output:\n{stderr}");
    assert!(!stderr.contains("Contig 2:"), "contig filter leaked:\n{stderr}");
}

#[test]
fn test_find_duplicates_stride_does_not_change_the_total() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");
    let a = temp_dir.path().join("a.vcf.gz");
    let b = temp_dir.path().join("b.vcf.gz");
    write_bgzf(&a, &simple_vcf("20", &[100, 2500, 7000]));
    write_bgzf(&b, &simple_vcf("20", &[100, 2500, 7000]));
    summarize(&a, &store);
    summarize(&b, &store);

    for stride in ["50", "2500", "1000000"] {
        let (ok, stderr) = find_duplicates_output(&store, &["--window-stride", stride]);
        assert!(ok, "find-duplicates failed at stride {stride}:\n{stderr}");
        assert!(
            stderr.contains("Duplicate variant keys: 3"),
            "stride {stride} changed the total:\n{stderr}"
        );
    }
}
