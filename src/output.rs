//! Output formatting and persistence for pipeline results.
//!
//! Supports a JSON report for the chart, and CSV append of
//! bucket cells.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::normalize::NormalizeReport;
use crate::pipeline::{PipelineConfig, PipelineOutput};

/// Complete chart payload written as JSON.
#[derive(Debug, Serialize)]
pub struct ChartReport<'a> {
    pub schema_version: u8,
    pub generated_at: DateTime<Utc>,
    pub normalize: &'a NormalizeReport,
    pub config: &'a PipelineConfig,
    #[serde(flatten)]
    pub output: &'a PipelineOutput,
}

impl<'a> ChartReport<'a> {
    pub fn new(normalize: &'a NormalizeReport, config: &'a PipelineConfig, output: &'a PipelineOutput) -> Self {
        ChartReport {
            schema_version: 1,
            generated_at: Utc::now(),
            normalize,
            config,
            output,
        }
    }
}

/// One (bucket, category) cell flattened for CSV.
#[derive(Debug, Serialize)]
pub struct BucketRow<'a> {
    pub bucket: usize,
    pub lower: f64,
    pub upper: f64,
    pub category: &'a str,
    pub mean_value_change: Option<f64>,
    pub samples: usize,
}

/// Flattens the buckets of `output` into CSV rows, bucket by bucket.
pub fn bucket_rows(output: &PipelineOutput) -> Vec<BucketRow<'_>> {
    output
        .buckets
        .iter()
        .flat_map(|bucket| {
            bucket.cells.iter().map(move |(category, cell)| BucketRow {
                bucket: bucket.index,
                lower: bucket.lower,
                upper: bucket.upper,
                category,
                mean_value_change: cell.mean_value_change,
                samples: cell.samples,
            })
        })
        .collect()
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes `value` as pretty-printed JSON to `path`, replacing the file.
pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(path, body).with_context(|| format!("Failed to write {}", path))?;
    debug!(path, "JSON written");
    Ok(())
}

/// Appends serializable rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, records: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::config::RollupMode;
    use crate::pipeline::types::{Bucket, BucketCell};
    use std::collections::BTreeMap;
    use std::env;
    use std::fs;

    fn temp_path(name: &str) -> String {
        format!("{}/{}", env::temp_dir().display(), name)
    }

    fn output() -> PipelineOutput {
        let mut cells = BTreeMap::new();
        cells.insert(
            "Ontario".to_string(),
            BucketCell {
                mean_value_change: Some(4.5),
                samples: 2,
            },
        );
        cells.insert("Quebec".to_string(), BucketCell::default());

        PipelineOutput {
            mode: RollupMode::Province,
            categories: vec!["Ontario".to_string(), "Quebec".to_string()],
            aggregated: vec![],
            changes: vec![],
            buckets: vec![Bucket {
                index: 0,
                lower: 0.0,
                upper: 1.5,
                cells,
            }],
        }
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&output()).unwrap();
    }

    #[test]
    fn test_bucket_rows() {
        let out = output();
        let rows = bucket_rows(&out);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "Ontario");
        assert_eq!(rows[1].mean_value_change, None);
    }

    #[test]
    fn test_report_json_shape() {
        let out = output();
        let config = PipelineConfig::for_records(&[]);
        let normalize = NormalizeReport::default();
        let report = ChartReport::new(&normalize, &config, &out);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["mode"]["mode"], "province");
        assert_eq!(json["config"]["bucket_count"], 11);
        assert!(json["buckets"][0]["cells"]["Quebec"]["mean_value_change"].is_null());
    }

    #[test]
    fn test_write_json() {
        let path = temp_path("rental_trends_test_report.json");
        write_json(&path, &output()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"Ontario\""));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let path = temp_path("rental_trends_test_header.csv");
        let _ = fs::remove_file(&path);

        let out = output();
        append_records(&path, &bucket_rows(&out)).unwrap();
        append_records(&path, &bucket_rows(&out)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.starts_with("bucket,")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 appends of 2 rows
        assert_eq!(content.lines().count(), 5);

        fs::remove_file(&path).unwrap();
    }
}
