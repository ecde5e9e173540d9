//! End-to-end pipeline tests: summarize several datasets into one store,
//! then search the store for shared variant keys.

use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use crate::helpers::summary_reader::collect_summarized_variants;
use crate::helpers::vcf_builder::{TWO_SAMPLE_HEADER, record_line, simple_vcf, write_bgzf};

fn run_summarize(input: &Path, store: &Path, extra: &[&str]) {
    let mut args = vec!["summarize", "-i", input.to_str().unwrap(), "-s", store.to_str().unwrap()];
    args.extend_from_slice(extra);
    let status = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(&args)
        .status()
        .expect("Failed to run summarize command");
    assert!(status.success(), "Summarize failed for {}", input.display());
}

fn run_find_duplicates(store: &Path, extra: &[&str]) -> String {
    let mut args = vec!["find-duplicates", "-s", store.to_str().unwrap()];
    args.extend_from_slice(extra);
    let output = Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(&args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to run find-duplicates command");
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    assert!(output.status.success(), "find-duplicates failed:\n{stderr}");
    stderr
}

#[test]
fn test_pipeline_three_datasets_then_rerun_after_update() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");
    let a = temp_dir.path().join("a.vcf.gz");
    let b = temp_dir.path().join("b.vcf.gz");
    let c = temp_dir.path().join("c.vcf.gz");
    write_bgzf(&a, &simple_vcf("20", &[100, 200, 300, 5_000]));
    write_bgzf(&b, &simple_vcf("20", &[200, 300, 400]));
    write_bgzf(&c, &simple_vcf("20", &[300, 5_000]));

    run_summarize(&a, &store, &[]);
    run_summarize(&b, &store, &["-t", "2"]);
    run_summarize(&c, &store, &[]);

    // Shared keys: 200 (a, b), 300 (a, b, c), 5000 (a, c).
    let stderr = run_find_duplicates(&store, &["-t", "2"]);
    assert!(
        stderr.contains("Duplicate variant keys: 3"),
        "expected 3 shared variants in:\n{stderr}"
    );

    // Dataset c is replaced by a version shifted off every shared position.
    // A rerun must drop its old summaries, or 300 and 5000 would still
    // count through the stale objects.
    write_bgzf(&c, &simple_vcf("20", &[111, 222]));
    run_summarize(&c, &store, &[]);

    let stderr = run_find_duplicates(&store, &[]);
    assert!(
        stderr.contains("Duplicate variant keys: 2"),
        "stale summaries survived the rerun:\n{stderr}"
    );
}

#[test]
fn test_pipeline_reports_per_contig_totals() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = temp_dir.path().join("summaries");
    let a = temp_dir.path().join("a.vcf.gz");
    let b = temp_dir.path().join("b.vcf.gz");

    // Contig 1 shares two keys, contig 2 shares one.
    let mut text_a = TWO_SAMPLE_HEADER.to_string();
    text_a.push_str(&record_line("1", 100, "A", "G"));
    text_a.push_str(&record_line("1", 200, "C", "T"));
    text_a.push_str(&record_line("2", 100, "A", "G"));
    text_a.push_str(&record_line("2", 900, "G", "A"));
    let mut text_b = TWO_SAMPLE_HEADER.to_string();
    text_b.push_str(&record_line("1", 100, "A", "G"));
    text_b.push_str(&record_line("1", 200, "C", "T"));
    text_b.push_str(&record_line("2", 900, "G", "A"));
    text_b.push_str(&record_line("2", 950, "T", "C"));
    write_bgzf(&a, &text_a);
    write_bgzf(&b, &text_b);

    run_summarize(&a, &store, &[]);
    run_summarize(&b, &store, &[]);

    let variants = collect_summarized_variants(&store);
    assert_eq!(variants.len(), 8, "every record should be summarized: {variants:?}");

    let stderr = run_find_duplicates(&store, &[]);
    assert!(stderr.contains("Contig 1: 2 duplicate variant keys"), "in:\n{stderr}");
    assert!(stderr.contains("Contig 2: 1 duplicate variant keys"), "in:\n{stderr}");
    assert!(stderr.contains("Duplicate variant keys: 3"), "in:\n{stderr}");
}
