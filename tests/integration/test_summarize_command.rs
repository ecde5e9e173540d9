//! Integration tests for the summarize command.

use std::process::Command;
use tempfile::TempDir;
use varsum_lib::store::{FsStore, ObjectStore};

use crate::helpers::summary_reader::{collect_summarized_variants, summary_keys};
use crate::helpers::vcf_builder::{
    SITES_ONLY_HEADER, TWO_SAMPLE_HEADER, record_line, simple_vcf, write_bgzf, write_bgzf_parts,
};

/// Run summarize with the given extra arguments and return its exit status.
fn run_summarize(
    input: &std::path::Path,
    store: &std::path::Path,
    extra: &[&str],
) -> std::process::ExitStatus {
    let mut args = vec!["summarize", "-i", input.to_str().unwrap(), "-s", store.to_str().unwrap()];
    args.extend_from_slice(extra);
    Command::new(env!("CARGO_BIN_EXE_varsum"))
        .args(&args)
        .status()
        .expect("Failed to run summarize command")
}

#[test]
fn test_summarize_basic() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cohort.vcf.gz");
    let store = temp_dir.path().join("summaries");
    write_bgzf(&input, &simple_vcf("20", &[100, 200, 300]));

    let status = run_summarize(&input, &store, &[]);
    assert!(status.success(), "Summarize command failed");

    let keys = summary_keys(&store);
    assert_eq!(keys.len(), 1, "expected one region object, got {keys:?}");
    assert!(keys[0].starts_with("vcf-summaries/contig/20/"), "unexpected key {}", keys[0]);
    assert!(keys[0].ends_with("/regions/100-300"), "unexpected key {}", keys[0]);
    assert!(keys[0].contains("cohort"), "dataset name missing from key {}", keys[0]);

    let variants = collect_summarized_variants(&store);
    assert_eq!(variants.len(), 3);
    let positions: Vec<u64> = variants.iter().map(|v| v.1).collect();
    assert_eq!(positions, vec![100, 200, 300]);
    assert!(variants.iter().all(|(contig, _, r, a, _)| contig == "20" && r == "A" && a == "G"));
}

#[test]
fn test_summarize_splits_regions_on_position_gaps() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("gappy.vcf.gz");
    let store = temp_dir.path().join("summaries");
    // 50_000 - 300 exceeds the default 10_000 gap, closing the first region.
    write_bgzf(&input, &simple_vcf("1", &[100, 300, 50_000, 50_100]));

    let status = run_summarize(&input, &store, &[]);
    assert!(status.success(), "Summarize command failed");

    let keys = summary_keys(&store);
    assert_eq!(keys.len(), 2, "expected two region objects, got {keys:?}");
    assert!(keys.iter().any(|k| k.ends_with("/regions/100-300")));
    assert!(keys.iter().any(|k| k.ends_with("/regions/50000-50100")));
}

#[test]
fn test_summarize_slicing_does_not_change_variants() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cohort.vcf.gz");
    let store_whole = temp_dir.path().join("whole");
    let store_sliced = temp_dir.path().join("sliced");

    let first: String = (1..=8).map(|i| record_line("20", i * 50, "A", "G")).collect();
    let second: String = (9..=16).map(|i| record_line("20", i * 50, "C", "T")).collect();
    write_bgzf_parts(&input, &[TWO_SAMPLE_HEADER, &first, &second]);

    assert!(run_summarize(&input, &store_whole, &[]).success());
    // One slice per BGZF block.
    assert!(run_summarize(&input, &store_sliced, &["--slice-bytes", "1"]).success());

    let whole = collect_summarized_variants(&store_whole);
    let sliced = collect_summarized_variants(&store_sliced);
    assert_eq!(whole.len(), 16);
    assert_eq!(whole, sliced, "slicing must not change the summarized variants");

    // The sliced run writes at least as many region objects, one set per
    // slice that saw records.
    assert!(summary_keys(&store_sliced).len() >= summary_keys(&store_whole).len());
}

#[test]
fn test_summarize_stride_and_column_scan_agree() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cohort.vcf.gz");
    let store_fast = temp_dir.path().join("fast");
    let store_slow = temp_dir.path().join("slow");
    write_bgzf(&input, &simple_vcf("5", &[10, 20, 30, 40, 50, 60]));

    assert!(run_summarize(&input, &store_fast, &[]).success());
    assert!(run_summarize(&input, &store_slow, &["--no-stride"]).success());

    assert_eq!(
        collect_summarized_variants(&store_fast),
        collect_summarized_variants(&store_slow)
    );
}

#[test]
fn test_summarize_rerun_replaces_previous_summaries() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cohort.vcf.gz");
    let store = temp_dir.path().join("summaries");

    write_bgzf(&input, &simple_vcf("1", &[100, 200, 300, 400]));
    assert!(run_summarize(&input, &store, &[]).success());
    assert_eq!(collect_summarized_variants(&store).len(), 4);

    // Rewrite the dataset with different content and summarize again.
    write_bgzf(&input, &simple_vcf("1", &[100, 150]));
    assert!(run_summarize(&input, &store, &[]).success());

    let variants = collect_summarized_variants(&store);
    let positions: Vec<u64> = variants.iter().map(|v| v.1).collect();
    assert_eq!(positions, vec![100, 150], "stale summaries must not survive a rerun");
}

#[test]
fn test_summarize_sites_only_vcf() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("sites.vcf.gz");
    let store = temp_dir.path().join("summaries");
    let mut text = SITES_ONLY_HEADER.to_string();
    text.push_str("1\t100\t.\tA\tG\t50\tPASS\tAC=1;AN=0\n");
    text.push_str("1\t250\t.\tC\tT\t50\tPASS\tAC=1;AN=0\n");
    write_bgzf(&input, &text);

    let status = run_summarize(&input, &store, &[]);
    assert!(status.success(), "Summarize should handle sites-only VCFs");
    assert_eq!(collect_summarized_variants(&store).len(), 2);
}

#[test]
fn test_summarize_custom_prefix() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let input = temp_dir.path().join("cohort.vcf.gz");
    let store = temp_dir.path().join("summaries");
    write_bgzf(&input, &simple_vcf("1", &[100]));

    let status = run_summarize(&input, &store, &["--prefix", "alt-summaries"]);
    assert!(status.success(), "Summarize command failed");

    let fs_store = FsStore::new(&store).expect("open store");
    let listed = fs_store.list("alt-summaries/contig/").expect("list");
    assert_eq!(listed.len(), 1);
    assert!(fs_store.list("vcf-summaries/contig/").expect("list").is_empty());
}
