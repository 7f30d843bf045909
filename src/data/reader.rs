//! Dataset readers: turn a [`Datasource`] into samples or labels.
//!
//! Supported reader tags:
//!
//! - `mnist`: IDX3 image files (raw pixel values 0–255) and IDX1 label files.
//! - `csv`: one comma-separated sample per line, or one integer label per
//!   line. Blank lines are skipped.

use std::fs;

use serde::{Serialize, Deserialize};

use crate::error::{Error, Result};

/// Threshold used by `binarize` on raw MNIST pixels.
const MNIST_BINARIZE_THRESHOLD: f64 = 30.0;

/// Threshold used by `binarize` on CSV values.
const CSV_BINARIZE_THRESHOLD: f64 = 0.5;

/// Where and how to read one half (samples or labels) of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Datasource {
    pub source: String,
    pub reader: String,
    /// Map every value to 0 or 1.
    pub binarize: bool,
    /// Scale each sample to zero mean and unit variance (after binarize).
    pub normalize: bool,
    /// Read at most this many items.
    pub limit: Option<usize>,
}

impl Datasource {
    pub fn new(source: impl Into<String>, reader: impl Into<String>) -> Datasource {
        Datasource { source: source.into(), reader: reader.into(), ..Datasource::default() }
    }

    pub fn empty(&self) -> bool {
        self.source.is_empty()
    }
}

/// Samples and their labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasourcePack {
    pub samples: Datasource,
    pub labels: Datasource,
}

pub fn read_samples(ds: &Datasource) -> Result<Vec<Vec<f64>>> {
    let (mut samples, threshold) = match ds.reader.as_str() {
        "mnist" => (parse_idx3(&read_file(ds)?, ds.limit)?, MNIST_BINARIZE_THRESHOLD),
        "csv" => (parse_csv_samples(&read_text(ds)?, ds.limit)?, CSV_BINARIZE_THRESHOLD),
        other => return Err(Error::data(format!("unknown samples reader: {}", other))),
    };

    if samples.is_empty() {
        return Err(Error::data(format!("no samples in {}", ds.source)));
    }
    if ds.binarize {
        binarize_each(&mut samples, threshold);
    }
    if ds.normalize {
        normalize_each(&mut samples);
    }
    log::debug!("read {} samples from {}", samples.len(), ds.source);
    Ok(samples)
}

pub fn read_labels(ds: &Datasource) -> Result<Vec<usize>> {
    let labels = match ds.reader.as_str() {
        "mnist" => parse_idx1(&read_file(ds)?, ds.limit)?,
        "csv" => parse_csv_labels(&read_text(ds)?, ds.limit)?,
        other => return Err(Error::data(format!("unknown labels reader: {}", other))),
    };

    if labels.is_empty() {
        return Err(Error::data(format!("no labels in {}", ds.source)));
    }
    log::debug!("read {} labels from {}", labels.len(), ds.source);
    Ok(labels)
}

fn read_file(ds: &Datasource) -> Result<Vec<u8>> {
    fs::read(&ds.source).map_err(|e| Error::data(format!("failed to read {}: {}", ds.source, e)))
}

fn read_text(ds: &Datasource) -> Result<String> {
    fs::read_to_string(&ds.source)
        .map_err(|e| Error::data(format!("failed to read {}: {}", ds.source, e)))
}

pub fn binarize_each(samples: &mut [Vec<f64>], threshold: f64) {
    for v in samples.iter_mut().flat_map(|s| s.iter_mut()) {
        *v = if *v > threshold { 1.0 } else { 0.0 };
    }
}

/// Zero mean, unit variance per sample. Constant samples only get centered.
pub fn normalize_each(samples: &mut [Vec<f64>]) {
    for sample in samples.iter_mut() {
        let n = sample.len() as f64;
        let mean = sample.iter().sum::<f64>() / n;
        let std_dev = (sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        for v in sample.iter_mut() {
            *v -= mean;
            if std_dev > 0.0 {
                *v /= std_dev;
            }
        }
    }
}

fn be_u32(bytes: &[u8], offset: usize) -> usize {
    u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]]) as usize
}

fn check_idx_header(bytes: &[u8], dims: u8, header_len: usize, what: &str) -> Result<()> {
    if bytes.len() < header_len {
        return Err(Error::data(format!(
            "IDX {} file too short: expected at least {} header bytes, got {}",
            what, header_len, bytes.len()
        )));
    }
    if bytes[0] != 0x00 || bytes[1] != 0x00 || bytes[2] != 0x08 || bytes[3] != dims {
        return Err(Error::data(format!(
            "IDX {} file: bad magic 0x{:02X}{:02X}{:02X}{:02X}, expected 0x000008{:02X}",
            what, bytes[0], bytes[1], bytes[2], bytes[3], dims
        )));
    }
    Ok(())
}

/// Parses an IDX3 (uint8) image file into flat samples of `rows * cols` raw
/// pixel values.
pub fn parse_idx3(bytes: &[u8], limit: Option<usize>) -> Result<Vec<Vec<f64>>> {
    check_idx_header(bytes, 0x03, 16, "image")?;

    let declared = be_u32(bytes, 4);
    let n_pixels = be_u32(bytes, 8)
        .checked_mul(be_u32(bytes, 12))
        .ok_or_else(|| Error::data("IDX image file: rows * cols overflows"))?;
    let n_items = limit.map_or(declared, |l| l.min(declared));

    let needed = n_items
        .checked_mul(n_pixels)
        .and_then(|d| d.checked_add(16))
        .ok_or_else(|| Error::data("IDX image file: data length overflows"))?;
    if bytes.len() < needed {
        return Err(Error::data(format!(
            "IDX image file too short: {} items of {} pixels need {} bytes, file has {}",
            n_items, n_pixels, needed, bytes.len()
        )));
    }

    Ok(bytes[16..needed]
        .chunks_exact(n_pixels.max(1))
        .map(|chunk| chunk.iter().map(|&px| px as f64).collect())
        .collect())
}

/// Parses an IDX1 (uint8) label file.
pub fn parse_idx1(bytes: &[u8], limit: Option<usize>) -> Result<Vec<usize>> {
    check_idx_header(bytes, 0x01, 8, "label")?;

    let declared = be_u32(bytes, 4);
    let n_items = limit.map_or(declared, |l| l.min(declared));
    if bytes.len() < 8 + n_items {
        return Err(Error::data(format!(
            "IDX label file too short: {} labels need {} bytes, file has {}",
            n_items, 8 + n_items, bytes.len()
        )));
    }

    Ok(bytes[8..8 + n_items].iter().map(|&b| b as usize).collect())
}

fn data_lines(text: &str, limit: Option<usize>) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty())
        .take(limit.unwrap_or(usize::MAX))
}

pub fn parse_csv_samples(text: &str, limit: Option<usize>) -> Result<Vec<Vec<f64>>> {
    data_lines(text, limit)
        .map(|(line_no, line)| {
            line.split(',')
                .map(|field| {
                    field.trim().parse::<f64>().map_err(|_| {
                        Error::data(format!("line {}: '{}' is not a number", line_no, field.trim()))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

pub fn parse_csv_labels(text: &str, limit: Option<usize>) -> Result<Vec<usize>> {
    data_lines(text, limit)
        .map(|(line_no, line)| {
            line.parse::<usize>()
                .map_err(|_| Error::data(format!("line {}: '{}' is not a class index", line_no, line)))
        })
        .collect()
}
