//! Helpers for reading back summary objects written by the CLI.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::Path;
use varsum_lib::partition::parse_summary_key;
use varsum_lib::store::{FsStore, ObjectStore};
use varsum_lib::summary::read_window;
use varsum_lib::variant::CoordinateWindow;

/// A summarized variant as a comparable tuple: contig, position, reference
/// allele, alternate allele, dataset.
pub type SummarizedVariant = (String, u64, String, String, String);

/// Keys of every summary object under the default prefix in `store_dir`,
/// sorted.
pub fn summary_keys(store_dir: &Path) -> Vec<String> {
    let store = FsStore::new(store_dir).expect("open summary store");
    store
        .list("vcf-summaries/contig/")
        .expect("list summaries")
        .into_iter()
        .map(|meta| meta.key)
        .collect()
}

/// Decode every summary object under the default prefix in `store_dir` into
/// a set of variants tagged with their dataset.
pub fn collect_summarized_variants(store_dir: &Path) -> BTreeSet<SummarizedVariant> {
    let store = FsStore::new(store_dir).expect("open summary store");
    let mut variants = BTreeSet::new();
    for meta in store.list("vcf-summaries/contig/").expect("list summaries") {
        let info = parse_summary_key(&meta.key).expect("summary key parses");
        let window = CoordinateWindow::new(0, u64::MAX);
        for variant in read_window(&store, &meta.key, window).expect("read summary object") {
            variants.insert((
                info.contig.clone(),
                variant.position,
                variant.reference.to_string(),
                variant.alternate.to_string(),
                info.dataset.clone(),
            ));
        }
    }
    variants
}
