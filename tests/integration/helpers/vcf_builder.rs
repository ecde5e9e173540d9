//! Helpers for building BGZF-compressed VCF fixtures on disk.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use varsum_bgzf::BlockCompressor;

/// Standard two-sample VCF header.
pub const TWO_SAMPLE_HEADER: &str = "##fileformat=VCFv4.2\n\
    ##INFO=<ID=AC,Number=A,Type=Integer,Description=\"Allele count\">\n\
    ##INFO=<ID=AN,Number=1,Type=Integer,Description=\"Allele number\">\n\
    ##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n\
    #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\n";

/// Sites-only VCF header with no FORMAT or sample columns.
pub const SITES_ONLY_HEADER: &str = "##fileformat=VCFv4.2\n\
    #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

/// One record line with AC/AN INFO and two diploid calls.
pub fn record_line(contig: &str, position: u64, reference: &str, alternate: &str) -> String {
    format!(
        "{contig}\t{position}\t.\t{reference}\t{alternate}\t50\tPASS\tAC=1;AN=4\tGT\t0|1\t0|0\n"
    )
}

/// One record line with explicit AC and AN values.
pub fn record_line_with_info(
    contig: &str,
    position: u64,
    reference: &str,
    alternate: &str,
    ac: &str,
    an: u64,
) -> String {
    format!(
        "{contig}\t{position}\t.\t{reference}\t{alternate}\t50\tPASS\tAC={ac};AN={an}\tGT\t0|1\t0|0\n"
    )
}

/// A small single-contig VCF body: header plus records at the given
/// positions, all `A>G`.
pub fn simple_vcf(contig: &str, positions: &[u64]) -> String {
    let mut text = TWO_SAMPLE_HEADER.to_string();
    for &position in positions {
        text.push_str(&record_line(contig, position, "A", "G"));
    }
    text
}

/// Compress `text` as a single-part BGZF stream and write it to `path`.
pub fn write_bgzf(path: &Path, text: &str) {
    write_bgzf_parts(path, &[text]);
}

/// Compress `parts` with a block flush between each and write the stream to
/// `path`. Multiple parts force multiple BGZF blocks, which lets tests drive
/// slice boundaries.
pub fn write_bgzf_parts(path: &Path, parts: &[&str]) {
    let mut compressor = BlockCompressor::new(6);
    for part in parts {
        compressor.write_all(part.as_bytes()).expect("compress VCF text");
        compressor.flush().expect("flush BGZF block");
    }
    compressor.finish().expect("finish BGZF stream");

    let mut data = Vec::new();
    for block in compressor.take_blocks() {
        data.extend_from_slice(&block.data);
    }
    fs::write(path, data).expect("write VCF fixture");
}
