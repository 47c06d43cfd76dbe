//! Product ("pillar") telemetry files.
//!
//! Each product writes `<unix timestamp>-<token>.json` files into its own directory. A file
//! holds one flat JSON object whose values become string metrics of a single report.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

const METRICS_FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ProductFamily {
    #[serde(rename = "PRODUCT_FAMILY_PS")]
    Ps,
    #[serde(rename = "PRODUCT_FAMILY_PXC")]
    Pxc,
    #[serde(rename = "PRODUCT_FAMILY_PSMDB")]
    Psmdb,
    #[serde(rename = "PRODUCT_FAMILY_POSTGRESQL")]
    Postgresql,
}

/// One parsed product telemetry file.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsFile {
    pub path: PathBuf,
    /// Taken from the file name, not from the file system.
    pub timestamp: DateTime<Utc>,
    pub product_family: ProductFamily,
    pub metrics: BTreeMap<String, String>,
}

/// Reads every product directory in order. A directory that cannot be read is logged and
/// contributes nothing.
pub fn process_product_directories(directories: &[(PathBuf, ProductFamily)]) -> Vec<MetricsFile> {
    let mut files = Vec::new();
    for (directory, product_family) in directories {
        info!(directory = %directory.display(), ?product_family, "processing product metrics");
        match process_metrics_directory(directory, *product_family) {
            Ok(found) => files.extend(found),
            Err(err) => error!(
                error = %format!("{err:#}"),
                ?product_family,
                "failed to process product metrics"
            ),
        }
    }
    files
}

/// Parses the metrics files of one product directory, sorted by file name.
///
/// A missing directory is empty. Entries that are not regular `.json` files are ignored and
/// files that fail to parse are logged and skipped.
pub fn process_metrics_directory(
    directory: &Path,
    product_family: ProductFamily,
) -> Result<Vec<MetricsFile>> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(
                directory = %directory.display(),
                "product metrics directory is absent, skipping"
            );
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("can't read metrics directory {}", directory.display())
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("can't read metrics directory {}", directory.display()))?;
        let path = entry.path();

        // file_type() does not follow symlinks, so links are skipped too.
        let is_regular = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if !is_regular || path.extension() != Some(OsStr::new(METRICS_FILE_EXTENSION)) {
            debug!(file = %path.display(), "not a metrics file, skipping");
            continue;
        }

        debug!(file = %path.display(), "parsing metrics file");
        match parse_metrics_file(&path, product_family) {
            Ok(file) => files.push(file),
            Err(err) => error!(
                file = %path.display(),
                error = %format!("{err:#}"),
                "error during parsing metrics file, skipping"
            ),
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

pub fn parse_metrics_file(path: &Path, product_family: ProductFamily) -> Result<MetricsFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("can't read metrics file {}", path.display()))?;
    let object: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("metrics file {} is not a JSON object", path.display()))?;

    let metrics = object
        .iter()
        .map(|(key, value)| (key.clone(), metric_value(value)))
        .collect();

    Ok(MetricsFile {
        path: path.to_path_buf(),
        timestamp: timestamp_from_file_name(path)?,
        product_family,
        metrics,
    })
}

/// Strings stay bare, booleans (also spelled as strings) become `1`/`0`, anything else is
/// kept as compact JSON.
fn metric_value(value: &Value) -> String {
    match value {
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::String(text) => match text.as_str() {
            "true" => "1".to_string(),
            "false" => "0".to_string(),
            _ => text.clone(),
        },
        other => other.to_string(),
    }
}

/// `1708026156-d7664a58-d855-45c9-b017-50678cf620bb.json` -> 2024-02-15T19:42:36Z
fn timestamp_from_file_name(path: &Path) -> Result<DateTime<Utc>> {
    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
    let seconds: i64 = stem
        .split('-')
        .next()
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("file name {stem:?} does not start with a unix timestamp"))?;

    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| anyhow!("timestamp {seconds} is out of range"))
}
