//! Summary object writing and reading.
//!
//! A summary object is one BGZF-compressed run of [`codec`](crate::codec)
//! records covering a contiguous region of one contig for one dataset.
//! [`SummaryWriter`] sits behind the scanner as its
//! [`VariantSink`](crate::vcf_scan::VariantSink): it buffers encoded records
//! and closes the current region when the contig changes, when the position
//! jumps by more than the configured gap, or when the buffer reaches the
//! object size limit. Region boundaries land in the object key, so the
//! duplicate search can pick the objects overlapping a coordinate window
//! from a listing alone.
//!
//! Keys follow `{prefix}/contig/{contig}/{dataset}/regions/{first}-{last}`.

use crate::codec::{decode_allele, decode_position, encode_record, skip_allele};
use crate::errors::{Result, VarsumError};
use crate::store::ObjectStore;
use crate::variant::{CoordinateWindow, Variant};
use crate::vcf_scan::VariantSink;
use bstr::BString;
use libdeflater::Decompressor;
use log::debug;
use std::sync::Arc;
use varsum_bgzf::{BlockCompressor, decompress_block_into, read_raw_block};

/// Summary writer tuning.
#[derive(Debug, Clone)]
pub struct SummaryConfig {
    /// Position gap that closes the current region.
    pub max_position_gap: u64,
    /// Encoded bytes after which the current region closes.
    pub max_object_size: usize,
    /// BGZF compression level for summary objects.
    pub compression_level: u32,
    /// Key prefix summaries live under.
    pub prefix: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_position_gap: 10_000,
            max_object_size: 5 * 1024 * 1024,
            compression_level: 6,
            prefix: "vcf-summaries".to_string(),
        }
    }
}

/// Canonical dataset identifier for a source location: the scheme and a
/// trailing `.vcf.gz` are stripped and `/` becomes `%`, so the result is a
/// single key segment.
#[must_use]
pub fn dataset_key(location: &str) -> String {
    let without_scheme = match location.find("://") {
        Some(i) => &location[i + 3..],
        None => location,
    };
    let trimmed = without_scheme.strip_suffix(".vcf.gz").unwrap_or(without_scheme);
    trimmed.replace('/', "%")
}

/// Sink that writes position-sorted variants out as summary objects.
pub struct SummaryWriter {
    store: Arc<dyn ObjectStore>,
    dataset: String,
    config: SummaryConfig,
    contig: BString,
    buffer: Vec<u8>,
    region_start: u64,
    last_position: u64,
    written_keys: Vec<String>,
}

impl SummaryWriter {
    pub fn new(store: Arc<dyn ObjectStore>, dataset: &str, config: SummaryConfig) -> Self {
        Self {
            store,
            dataset: dataset.to_string(),
            config,
            contig: BString::from(""),
            buffer: Vec::new(),
            region_start: 0,
            last_position: 0,
            written_keys: Vec::new(),
        }
    }

    /// Keys of the objects written so far. Useful for cleanup when a scan
    /// fails partway through.
    #[must_use]
    pub fn written_keys(&self) -> &[String] {
        &self.written_keys
    }

    /// Flush the open region and return every key written.
    ///
    /// # Errors
    ///
    /// Returns the store error if the final region cannot be written.
    pub fn finish(mut self) -> Result<Vec<String>> {
        self.flush_region()?;
        Ok(self.written_keys)
    }

    fn flush_region(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let key = format!(
            "{}/contig/{}/{}/regions/{}-{}",
            self.config.prefix, self.contig, self.dataset, self.region_start, self.last_position
        );

        let mut compressor = BlockCompressor::new(self.config.compression_level);
        compressor.write_all(&self.buffer)?;
        compressor.finish()?;
        let mut object = Vec::new();
        compressor.write_blocks_to(&mut object)?;

        debug!(
            "Writing summary region {} ({} encoded bytes, {} compressed)",
            key,
            self.buffer.len(),
            object.len()
        );
        self.store.put(&key, &object)?;
        self.written_keys.push(key);
        self.buffer.clear();
        Ok(())
    }
}

impl VariantSink for SummaryWriter {
    fn record(&mut self, contig: &[u8], variant: Variant) -> Result<()> {
        if contig != &self.contig[..] {
            self.flush_region()?;
            self.contig.clear();
            self.contig.extend_from_slice(contig);
            self.last_position = 0;
        } else if !self.buffer.is_empty() {
            if variant.position < self.last_position {
                return Err(VarsumError::UnsortedInput {
                    contig: self.contig.to_string(),
                    previous: self.last_position,
                    position: variant.position,
                });
            }
            if variant.position > self.last_position.saturating_add(self.config.max_position_gap)
                || self.buffer.len() >= self.config.max_object_size
            {
                self.flush_region()?;
            }
        }

        if self.buffer.is_empty() {
            self.region_start = variant.position;
        }
        encode_record(&variant, &mut self.buffer)?;
        self.last_position = variant.position;
        Ok(())
    }
}

/// Read one summary object and return its variants with positions inside
/// `window`.
///
/// Records outside the window are stepped over by descriptor without
/// decoding their alleles; the scan stops at the first position past the
/// window end since records are position-sorted.
///
/// # Errors
///
/// Returns the store error if the object cannot be fetched, or
/// [`VarsumError::MalformedRecord`] if its contents do not decode.
pub fn read_window(
    store: &dyn ObjectStore,
    key: &str,
    window: CoordinateWindow,
) -> Result<Vec<Variant>> {
    let object = store.get(key)?;
    let mut reader: &[u8] = &object;
    let mut decompressor = Decompressor::new();
    let mut data = Vec::new();
    while let Some(block) = read_raw_block(&mut reader)? {
        if block.is_eof() {
            break;
        }
        decompress_block_into(&block, &mut decompressor, &mut data)?;
    }

    let mut variants = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let position = decode_position(&data, &mut pos)?;
        if position > window.end {
            break;
        }
        if position < window.start {
            skip_allele(&data, &mut pos)?;
            skip_allele(&data, &mut pos)?;
            continue;
        }
        let reference = decode_allele(&data, &mut pos)?;
        let alternate = decode_allele(&data, &mut pos)?;
        variants.push(Variant { position, reference, alternate });
    }
    Ok(variants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn writer_with(config: SummaryConfig) -> (Arc<MemoryStore>, SummaryWriter) {
        let store = Arc::new(MemoryStore::new());
        let writer = SummaryWriter::new(Arc::clone(&store) as Arc<dyn ObjectStore>, "test", config);
        (store, writer)
    }

    fn wide() -> CoordinateWindow {
        CoordinateWindow::new(0, u64::MAX)
    }

    // === Dataset keys ===

    #[test]
    fn test_dataset_key_strips_scheme_and_suffix() {
        let key = dataset_key("s3://cohort-bucket/batch1/data.vcf.gz");
        assert_eq!(key, "cohort-bucket%batch1%data");
        assert_eq!(dataset_key("http://host/samples.vcf.gz"), "host%samples");
        assert_eq!(dataset_key("batch1/data.vcf.gz"), "batch1%data");
        assert_eq!(dataset_key("plain-name"), "plain-name");
    }

    // === Region writing ===

    #[test]
    fn test_single_region_roundtrip() {
        let (store, mut writer) = writer_with(SummaryConfig::default());
        for (pos, alt) in [(100, "T"), (150, "G"), (200, "C")] {
            writer.record(b"1", Variant::new(pos, "A", alt)).unwrap();
        }
        let keys = writer.finish().unwrap();

        assert_eq!(keys, vec!["vcf-summaries/contig/1/test/regions/100-200"]);
        let variants = read_window(store.as_ref(), &keys[0], wide()).unwrap();
        assert_eq!(
            variants,
            vec![
                Variant::new(100, "A", "T"),
                Variant::new(150, "A", "G"),
                Variant::new(200, "A", "C"),
            ]
        );
    }

    #[test]
    fn test_position_gap_closes_region() {
        let config = SummaryConfig { max_position_gap: 50, ..SummaryConfig::default() };
        let (_, mut writer) = writer_with(config);
        writer.record(b"1", Variant::new(100, "A", "T")).unwrap();
        writer.record(b"1", Variant::new(120, "A", "T")).unwrap();
        writer.record(b"1", Variant::new(500, "A", "T")).unwrap();
        let keys = writer.finish().unwrap();

        assert_eq!(
            keys,
            vec![
                "vcf-summaries/contig/1/test/regions/100-120",
                "vcf-summaries/contig/1/test/regions/500-500",
            ]
        );
    }

    #[test]
    fn test_gap_exactly_at_limit_stays_in_region() {
        let config = SummaryConfig { max_position_gap: 400, ..SummaryConfig::default() };
        let (_, mut writer) = writer_with(config);
        writer.record(b"1", Variant::new(100, "A", "T")).unwrap();
        writer.record(b"1", Variant::new(500, "A", "T")).unwrap();
        let keys = writer.finish().unwrap();

        assert_eq!(keys, vec!["vcf-summaries/contig/1/test/regions/100-500"]);
    }

    #[test]
    fn test_size_limit_closes_region() {
        // A packed SNV record is 14 bytes; the third record pushes the
        // buffer past 32 bytes so the fourth starts a new region.
        let config = SummaryConfig { max_object_size: 32, ..SummaryConfig::default() };
        let (_, mut writer) = writer_with(config);
        for pos in [100, 101, 102, 103] {
            writer.record(b"1", Variant::new(pos, "A", "T")).unwrap();
        }
        let keys = writer.finish().unwrap();

        assert_eq!(
            keys,
            vec![
                "vcf-summaries/contig/1/test/regions/100-102",
                "vcf-summaries/contig/1/test/regions/103-103",
            ]
        );
    }

    #[test]
    fn test_contig_change_closes_region_and_resets_positions() {
        let (_, mut writer) = writer_with(SummaryConfig::default());
        writer.record(b"1", Variant::new(100, "A", "T")).unwrap();
        // Lower position on the next contig is fine.
        writer.record(b"2", Variant::new(50, "C", "G")).unwrap();
        let keys = writer.finish().unwrap();

        assert_eq!(
            keys,
            vec![
                "vcf-summaries/contig/1/test/regions/100-100",
                "vcf-summaries/contig/2/test/regions/50-50",
            ]
        );
    }

    #[test]
    fn test_position_decrease_within_contig_rejected() {
        let (_, mut writer) = writer_with(SummaryConfig::default());
        writer.record(b"1", Variant::new(100, "A", "T")).unwrap();
        let err = writer.record(b"1", Variant::new(50, "A", "T")).unwrap_err();
        assert!(matches!(err, VarsumError::UnsortedInput { previous: 100, position: 50, .. }));
    }

    #[test]
    fn test_written_keys_visible_before_finish() {
        let config = SummaryConfig { max_position_gap: 10, ..SummaryConfig::default() };
        let (_, mut writer) = writer_with(config);
        writer.record(b"1", Variant::new(100, "A", "T")).unwrap();
        writer.record(b"1", Variant::new(5_000, "A", "T")).unwrap();

        assert_eq!(writer.written_keys(), ["vcf-summaries/contig/1/test/regions/100-100"]);
        let keys = writer.finish().unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_finish_without_records_writes_nothing() {
        let (store, writer) = writer_with(SummaryConfig::default());
        assert!(writer.finish().unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_custom_prefix_in_keys() {
        let config = SummaryConfig { prefix: "alt-prefix".to_string(), ..SummaryConfig::default() };
        let (_, mut writer) = writer_with(config);
        writer.record(b"X", Variant::new(7, "A", "T")).unwrap();
        let keys = writer.finish().unwrap();
        assert_eq!(keys, vec!["alt-prefix/contig/X/test/regions/7-7"]);
    }

    // === Window reads ===

    #[test]
    fn test_read_window_clips_to_bounds() {
        let (store, mut writer) = writer_with(SummaryConfig::default());
        for i in 0..10 {
            writer.record(b"1", Variant::new(100 + 2 * i, "A", "T")).unwrap();
        }
        let keys = writer.finish().unwrap();

        let variants =
            read_window(store.as_ref(), &keys[0], CoordinateWindow::new(104, 111)).unwrap();
        let positions: Vec<u64> = variants.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![104, 106, 108, 110]);
    }

    #[test]
    fn test_read_window_outside_region_is_empty() {
        let (store, mut writer) = writer_with(SummaryConfig::default());
        writer.record(b"1", Variant::new(100, "A", "T")).unwrap();
        let keys = writer.finish().unwrap();

        let variants =
            read_window(store.as_ref(), &keys[0], CoordinateWindow::new(900, 999)).unwrap();
        assert!(variants.is_empty());
    }

    #[test]
    fn test_large_region_spans_multiple_bgzf_blocks() {
        // 6000 packed SNVs encode past the 64 KiB block size, so the object
        // holds several BGZF blocks.
        let (store, mut writer) = writer_with(SummaryConfig::default());
        for pos in 1..=6000 {
            writer.record(b"1", Variant::new(pos, "A", "T")).unwrap();
        }
        let keys = writer.finish().unwrap();
        assert_eq!(keys, vec!["vcf-summaries/contig/1/test/regions/1-6000"]);

        let variants = read_window(store.as_ref(), &keys[0], wide()).unwrap();
        assert_eq!(variants.len(), 6000);
        assert_eq!(variants[0].position, 1);
        assert_eq!(variants[5999].position, 6000);
    }

    #[test]
    fn test_read_window_missing_object_is_store_error() {
        let store = MemoryStore::new();
        let err = read_window(&store, "vcf-summaries/contig/1/test/regions/1-2", wide());
        assert!(matches!(err, Err(VarsumError::Store { .. })));
    }
}
