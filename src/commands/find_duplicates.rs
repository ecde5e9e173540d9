//! The `find-duplicates` command: count variant keys shared between summarized datasets.
//!
//! Summary objects written by `summarize` are discovered by listing the
//! store, tiled into fixed-stride coordinate windows per contig, and searched
//! in parallel. Each window tallies the variant keys present in two or more
//! summary objects, and per-contig totals are merged through the completion
//! coordinator.

use ahash::AHashMap;
use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use varsum_lib::bus::{LogBus, WINDOW_TOPIC, WindowWorkUnit, publish_json};
use varsum_lib::coordination::{
    CompletionCoordinator, DUPLICATE_COUNT, MemoryCoordinationStore, Outcome,
};
use varsum_lib::dup_search::{
    FileSequence, SearchConfig, SearchMetrics, WindowSearchResult, search_window,
};
use varsum_lib::logging::{OperationTimer, format_count};
use varsum_lib::partition::{
    DEFAULT_WINDOW_STRIDE, SummaryFileInfo, WindowPlan, parse_summary_key, plan_windows,
};
use varsum_lib::progress::ProgressTracker;
use varsum_lib::store::ObjectStore;
use varsum_lib::summary::read_window;
use varsum_lib::validation::validate_positive;

use crate::commands::command::Command;
use crate::commands::common::{StoreOptions, ThreadingOptions};

/// Count variant keys shared between summarized datasets.
///
/// Tiles every summarized contig into coordinate windows and searches each
/// window for variant keys present in more than one summary object.
#[derive(Debug, Parser)]
#[command(
    name = "find-duplicates",
    about = "\x1b[38;5;173m[SEARCH]\x1b[0m         \x1b[36mCount variant keys shared between summarized datasets\x1b[0m",
    long_about = r#"
Count variant keys shared between summarized datasets.

Summary objects under the store prefix are listed and their coverage read
back from the object keys, so no state beyond the store itself is needed.
Each contig's covered span is tiled into fixed-stride windows, and every
window is searched independently: the position-sorted sequences of the
overlapping summary objects are merged pairwise, and a variant key (position,
reference allele, alternate allele) counts once when it appears in two or
more objects.

Window tallies are merged through the completion coordinator under one
aggregate per contig, and the run fails if any window token is left pending.

Example usage:
  varsum find-duplicates -s /data/summaries
  varsum find-duplicates -s /data/summaries --contig 20 -t 16
"#
)]
pub struct FindDuplicates {
    /// Summary store options
    #[command(flatten)]
    pub store: StoreOptions,

    /// Threading options
    #[command(flatten)]
    pub threading: ThreadingOptions,

    /// Key prefix summary objects are stored under
    #[arg(long = "prefix", default_value = "vcf-summaries")]
    pub prefix: String,

    /// Positions per search window
    #[arg(long = "window-stride", default_value_t = DEFAULT_WINDOW_STRIDE)]
    pub window_stride: u64,

    /// Sub-windows per worker thread within one window
    #[arg(long = "subwindows-per-thread", default_value_t = 2)]
    pub subwindows_per_thread: usize,

    /// Restrict the search to one contig
    #[arg(long = "contig")]
    pub contig: Option<String>,
}

/// Per-window search results gathered for the final report.
struct WindowReport {
    contig: String,
    result: WindowSearchResult,
    outcome: Outcome,
}

impl Command for FindDuplicates {
    fn execute(&self, command_line: &str) -> Result<()> {
        debug!("Command line: {command_line}");

        validate_positive(self.window_stride, "window-stride")?;
        validate_positive(self.subwindows_per_thread, "subwindows-per-thread")?;

        let timer = OperationTimer::new("Searching for duplicate variants");

        info!("Starting FindDuplicates");
        info!("Summary store: {}", self.store.store.display());
        info!("Summary prefix: {}", self.prefix);
        info!("Window stride: {}", self.window_stride);
        info!("{}", self.threading.log_message());
        if let Some(ref contig) = self.contig {
            info!("Restricted to contig: {contig}");
        }

        let store = self.store.open()?;

        // Coverage comes entirely from the listed keys; objects that do not
        // parse as summary keys are someone else's and are left alone.
        let mut files: Vec<SummaryFileInfo> = Vec::new();
        for meta in &store.list(&format!("{}/contig/", self.prefix))? {
            match parse_summary_key(&meta.key) {
                Some(file) => {
                    if self.contig.as_deref().is_none_or(|c| c == file.contig) {
                        files.push(file);
                    }
                }
                None => warn!("Ignoring foreign object under summary prefix: {}", meta.key),
            }
        }
        info!("Summary objects found: {}", files.len());

        if files.is_empty() {
            info!("Nothing to search");
            info!("=== Summary ===");
            info!("Summary objects: 0");
            info!("Windows searched: 0");
            info!("Duplicate variant keys: 0");
            timer.log_completion(0);
            return Ok(());
        }

        let plans = plan_windows(&files, self.window_stride)?;
        info!("Planned {} search windows", plans.len());

        // Register one aggregate per contig before any window contributes.
        let coord_store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&coord_store);
        let mut tokens_by_contig: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for plan in &plans {
            tokens_by_contig.entry(plan.contig.as_str()).or_default().push(plan.window.token());
        }
        for (contig, tokens) in &tokens_by_contig {
            coordinator.register(&duplicates_key(contig), tokens)?;
        }

        let bus = LogBus;
        for plan in &plans {
            let unit =
                WindowWorkUnit::new(plan.contig.as_str(), plan.window, plan.summary_keys.clone());
            publish_json(&bus, WINDOW_TOPIC, &unit)?;
        }

        let file_index: AHashMap<&str, &SummaryFileInfo> =
            files.iter().map(|f| (f.key.as_str(), f)).collect();
        let search_config = SearchConfig {
            threads: self.threading.num_threads(),
            subwindows_per_thread: self.subwindows_per_thread,
        };

        info!("Searching windows...");
        let progress = ProgressTracker::new("Searched windows").with_interval(1_000);
        let pool = self.threading.build_pool()?;
        let reports = pool.install(|| {
            plans
                .par_iter()
                .map(|plan| {
                    let result =
                        search_one_window(store.as_ref(), &file_index, plan, &search_config)?;
                    progress.log_if_needed(1);
                    let outcome = coordinator.contribute(
                        &duplicates_key(&plan.contig),
                        &plan.window.token(),
                        &[(DUPLICATE_COUNT, result.duplicate_count)],
                    )?;
                    Ok(WindowReport { contig: plan.contig.clone(), result, outcome })
                })
                .collect::<varsum_lib::errors::Result<Vec<WindowReport>>>()
        })?;
        progress.log_final();

        // The window that retires a contig's last token carries its totals.
        let mut completed: BTreeMap<&str, u64> = BTreeMap::new();
        for report in &reports {
            if let Outcome::Completed(totals) = &report.outcome {
                let count = totals.get(DUPLICATE_COUNT).copied().unwrap_or(0);
                completed.insert(report.contig.as_str(), count);
            }
        }

        let mut total_duplicates = 0u64;
        for contig in tokens_by_contig.keys() {
            let Some(&count) = completed.get(contig) else {
                let state = coordinator.fetch(&duplicates_key(contig))?;
                let remaining = state.map_or(0, |s| s.pending.len());
                bail!("contig {contig} incomplete: {remaining} window tokens still pending");
            };
            info!("Contig {contig}: {} duplicate variant keys", format_count(count));
            total_duplicates = total_duplicates.saturating_add(count);
        }

        let mut metrics = SearchMetrics::default();
        for report in &reports {
            metrics.merge(report.result.metrics);
        }

        info!("=== Summary ===");
        info!("Summary objects: {}", files.len());
        info!("Contigs searched: {}", tokens_by_contig.len());
        info!("Windows searched: {}", plans.len());
        info!("Duplicate variant keys: {}", format_count(total_duplicates));
        info!("Search work: {metrics}");

        timer.log_completion(plans.len() as u64);
        Ok(())
    }
}

/// Aggregate key for one contig's duplicate tally.
fn duplicates_key(contig: &str) -> String {
    format!("duplicates/{contig}")
}

/// Load the sequences a window's plan names and search the window.
fn search_one_window(
    store: &dyn ObjectStore,
    file_index: &AHashMap<&str, &SummaryFileInfo>,
    plan: &WindowPlan,
    config: &SearchConfig,
) -> varsum_lib::errors::Result<WindowSearchResult> {
    let mut sequences = Vec::with_capacity(plan.summary_keys.len());
    for key in &plan.summary_keys {
        let Some(file) = file_index.get(key.as_str()) else {
            warn!("Window {} references unknown summary object {key}", plan.window);
            continue;
        };
        let variants = read_window(store, key, plan.window)?;
        sequences.push(FileSequence::new(file.dataset.clone(), file.span, variants));
    }
    let result = search_window(&sequences, plan.window, config);
    debug!(
        "Window {} on {}: {} duplicates across {} sequences",
        plan.window, plan.contig, result.duplicate_count, result.files_considered
    );
    Ok(result)
}
