//! The `summarize` command: scan a BGZF-compressed VCF into per-region summary objects.
//!
//! The input is divided into slices along BGZF block boundaries, each slice is
//! scanned in parallel for variant records, and the extracted positions are
//! written to the summary store as compact per-region objects. Slice totals
//! are merged through the completion coordinator, and the slice that retires
//! the last pending token announces the dataset as ready for searching.

use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::Arc;
use varsum_bgzf::VirtualOffset;
use varsum_lib::bgzf_cursor::BgzfCursor;
use varsum_lib::bus::{
    DATASET_READY_TOPIC, DatasetReady, LogBus, SLICE_TOPIC, SliceWorkUnit, publish_json,
};
use varsum_lib::coordination::{
    CALL_COUNT, CompletionCoordinator, MemoryCoordinationStore, Outcome, SAMPLE_COUNT,
    VARIANT_COUNT,
};
use varsum_lib::errors::VarsumError;
use varsum_lib::fetch::{FetchConfig, RangeReader};
use varsum_lib::logging::{OperationTimer, format_count};
use varsum_lib::partition::{
    CostModel, count_samples, delete_summaries, plan_slices, plan_slices_with_size,
};
use varsum_lib::progress::ProgressTracker;
use varsum_lib::store::ObjectStore;
use varsum_lib::summary::{SummaryConfig, SummaryWriter, dataset_key};
use varsum_lib::vcf_scan::{ScanConfig, ScanCounts, scan_slice};

use crate::commands::command::Command;
use crate::commands::common::{CompressionOptions, StoreOptions, ThreadingOptions, open_location};

/// Summarize a BGZF-compressed VCF into per-region summary objects.
///
/// Slices the input along BGZF block boundaries, scans the slices in
/// parallel, and replaces any previous summaries for the same dataset.
#[derive(Debug, Parser)]
#[command(
    name = "summarize",
    about = "\x1b[38;5;151m[SUMMARIZE]\x1b[0m      \x1b[36mScan a BGZF-compressed VCF into per-region summary objects\x1b[0m",
    long_about = r#"
Scan a BGZF-compressed VCF into per-region summary objects.

The input is split into slices along BGZF block boundaries without reading
any index file: block headers are walked directly, and a cost model picks a
slice size that balances per-slice overhead against scan throughput. Each
slice is scanned in parallel. Variant positions and allele identities are
written to the summary store as compact per-region objects keyed by

  {prefix}/contig/{contig}/{dataset}/regions/{start}-{end}

Slice counts (variants, genotype calls) are merged through the completion
coordinator under the full input location. When the last slice reports in,
the dataset is announced as ready for duplicate searching.

The input may be a local file or an http(s) URL; remote inputs are fetched
with ranged reads so only the bytes each slice needs are transferred.

Example usage:
  varsum summarize -i cohort.vcf.gz -s /data/summaries
  varsum summarize -i https://example.org/1000g/chr20.vcf.gz -s /data/summaries -t 16
"#
)]
pub struct Summarize {
    /// Input BGZF-compressed VCF (local path or http(s) URL)
    #[arg(short = 'i', long = "input")]
    pub input: String,

    /// Summary store options
    #[command(flatten)]
    pub store: StoreOptions,

    /// Threading options
    #[command(flatten)]
    pub threading: ThreadingOptions,

    /// Compression options for summary objects
    #[command(flatten)]
    pub compression: CompressionOptions,

    /// Position gap that closes the current summary region
    #[arg(long = "max-position-gap", default_value_t = 10_000)]
    pub max_position_gap: u64,

    /// Encoded bytes after which the current summary object closes
    #[arg(long = "max-object-size", default_value_t = 5 * 1024 * 1024)]
    pub max_object_size: usize,

    /// Key prefix summary objects are stored under
    #[arg(long = "prefix", default_value = "vcf-summaries")]
    pub prefix: String,

    /// Scan every genotype column instead of striding past them
    #[arg(long = "no-stride", default_value_t = false)]
    pub no_stride: bool,

    /// Fixed compressed bytes per slice, overriding the cost model
    #[arg(long = "slice-bytes")]
    pub slice_bytes: Option<u64>,
}

/// Per-slice scan results gathered for the final report.
struct SliceReport {
    counts: ScanCounts,
    summary_keys: Vec<String>,
    rescanned: bool,
    outcome: Outcome,
}

impl Command for Summarize {
    fn execute(&self, command_line: &str) -> Result<()> {
        debug!("Command line: {command_line}");

        self.compression.validate()?;
        if self.max_position_gap == 0 {
            bail!("--max-position-gap must be positive");
        }
        if self.max_object_size == 0 {
            bail!("--max-object-size must be positive");
        }
        if self.slice_bytes == Some(0) {
            bail!("--slice-bytes must be positive");
        }

        let timer = OperationTimer::new("Summarizing dataset");

        info!("Starting Summarize");
        info!("Input: {}", self.input);
        info!("Summary store: {}", self.store.store.display());
        info!("Summary prefix: {}", self.prefix);
        info!("{}", self.threading.log_message());
        if self.no_stride {
            info!("Stride skipping: disabled");
        }

        let (input_store, input_key) = open_location(&self.input)?;
        let summary_store = self.store.open()?;
        let dataset = dataset_key(&self.input);
        info!("Dataset key: {dataset}");

        let slices = match self.slice_bytes {
            Some(bytes) => plan_slices_with_size(input_store.as_ref(), &input_key, bytes as f64)?,
            None => plan_slices(input_store.as_ref(), &input_key, &CostModel::default())?,
        };
        info!("Planned {} slices", slices.len());

        // Register every slice token before any slice can contribute, so
        // completion is observable no matter which slice finishes last.
        let coord_store = MemoryCoordinationStore::new();
        let coordinator = CompletionCoordinator::new(&coord_store);
        let tokens: Vec<String> = slices
            .iter()
            .map(|&(start, end)| SliceWorkUnit::new(self.input.as_str(), start, end).token())
            .collect();
        coordinator.register(&self.input, &tokens)?;

        let samples = {
            let reader =
                RangeReader::new(Arc::clone(&input_store), &input_key, FetchConfig::default())?;
            let mut cursor = BgzfCursor::new(reader, VirtualOffset::new(0, 0))?;
            count_samples(&mut cursor)?
        };
        coordinator.set_field(&self.input, SAMPLE_COUNT, samples)?;
        info!("Samples: {samples}");

        // Summaries from a previous run of the same dataset would double
        // count during search.
        delete_summaries(summary_store.as_ref(), &self.prefix, &dataset)?;

        let bus = LogBus;
        for &(start, end) in &slices {
            let unit = SliceWorkUnit::new(self.input.as_str(), start, end);
            publish_json(&bus, SLICE_TOPIC, &unit)?;
        }

        let summary_config = SummaryConfig {
            max_position_gap: self.max_position_gap,
            max_object_size: self.max_object_size,
            compression_level: self.compression.compression_level,
            prefix: self.prefix.clone(),
        };
        let use_stride = !self.no_stride;

        info!("Scanning slices...");
        let progress = ProgressTracker::new("Scanned records").with_interval(1_000_000);
        let pool = self.threading.build_pool()?;
        let reports = pool.install(|| {
            slices
                .par_iter()
                .map(|&(start, end)| {
                    let (counts, summary_keys, rescanned) = scan_one_slice(
                        &input_store,
                        &input_key,
                        &summary_store,
                        &dataset,
                        &summary_config,
                        (start, end),
                        use_stride,
                    )?;
                    progress.log_if_needed(counts.records_scanned);
                    let token = SliceWorkUnit::new(self.input.as_str(), start, end).token();
                    let outcome = coordinator.contribute(
                        &self.input,
                        &token,
                        &[(VARIANT_COUNT, counts.variant_count), (CALL_COUNT, counts.call_count)],
                    )?;
                    Ok(SliceReport { counts, summary_keys, rescanned, outcome })
                })
                .collect::<varsum_lib::errors::Result<Vec<SliceReport>>>()
        })?;
        progress.log_final();

        // Exactly one contribution sees the pending set drain to empty and
        // carries the merged totals.
        let totals = reports.iter().find_map(|report| match &report.outcome {
            Outcome::Completed(totals) => Some(totals.clone()),
            _ => None,
        });
        let Some(totals) = totals else {
            let state = coordinator.fetch(&self.input)?;
            let remaining = state.map_or(0, |s| s.pending.len());
            bail!("dataset incomplete after all slices ran: {remaining} tokens still pending");
        };

        let ready = DatasetReady { location: self.input.clone(), dataset: dataset.clone() };
        publish_json(&bus, DATASET_READY_TOPIC, &ready)?;

        let records_scanned: u64 = reports.iter().map(|r| r.counts.records_scanned).sum();
        let missing_info: u64 = reports.iter().map(|r| r.counts.records_missing_info).sum();
        let summary_objects: usize = reports.iter().map(|r| r.summary_keys.len()).sum();
        let rescans = reports.iter().filter(|r| r.rescanned).count();

        info!("=== Summary ===");
        info!("Input: {}", self.input);
        info!("Slices scanned: {}", slices.len());
        info!("Records scanned: {}", format_count(records_scanned));
        info!("Variants: {}", format_count(totals.get(VARIANT_COUNT).copied().unwrap_or(0)));
        info!("Genotype calls: {}", format_count(totals.get(CALL_COUNT).copied().unwrap_or(0)));
        info!("Samples: {samples}");
        info!("Summary objects written: {summary_objects}");
        if missing_info > 0 {
            info!("Records missing INFO counts: {}", format_count(missing_info));
        }
        if rescans > 0 {
            info!("Slices rescanned without striding: {rescans}");
        }

        timer.log_completion(records_scanned);
        Ok(())
    }
}

/// Scan one slice of the input into summary objects.
///
/// Returns the scan counters, the keys of the summary objects written, and
/// whether the slice had to be rescanned with striding disabled. A stride
/// landing that fails validation aborts the fast scan; its partial output is
/// deleted and the slice is scanned again column by column.
fn scan_one_slice(
    input_store: &Arc<dyn ObjectStore>,
    input_key: &str,
    summary_store: &Arc<dyn ObjectStore>,
    dataset: &str,
    summary_config: &SummaryConfig,
    slice: (VirtualOffset, VirtualOffset),
    use_stride: bool,
) -> varsum_lib::errors::Result<(ScanCounts, Vec<String>, bool)> {
    let (start, end) = slice;
    let at_file_start = start.value() == 0;
    let reader = RangeReader::with_range(
        Arc::clone(input_store),
        input_key,
        start.compressed(),
        None,
        FetchConfig::default(),
    )?;
    let mut cursor = BgzfCursor::new(reader, start)?;
    let mut writer =
        SummaryWriter::new(Arc::clone(summary_store), dataset, summary_config.clone());
    let config = ScanConfig { use_stride };

    match scan_slice(&mut cursor, end, at_file_start, &config, &mut writer) {
        Ok(counts) => {
            let summary_keys = writer.finish()?;
            Ok((counts, summary_keys, false))
        }
        Err(error @ VarsumError::StrideLanding { .. }) if use_stride => {
            warn!("Rescanning slice {start}..{end} without striding: {error}");
            for key in writer.written_keys() {
                summary_store.delete(key)?;
            }
            let (counts, summary_keys, _) = scan_one_slice(
                input_store,
                input_key,
                summary_store,
                dataset,
                summary_config,
                slice,
                false,
            )?;
            Ok((counts, summary_keys, true))
        }
        Err(error) => Err(error),
    }
}
