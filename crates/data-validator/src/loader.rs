//! CSV Loader for Labeled IMU Recordings

use crate::error::ValidationError;
use crate::schema::ColumnMap;
use csv::{ReaderBuilder, StringRecord};
use event_window::{EventLabel, ImuSample, LabeledSample};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Lines to drop before the header row
    pub skip_rows: usize,
    /// Label marking rows that were never annotated
    pub unknown_label: String,
    /// Keep unannotated rows with no label instead of dropping them
    #[serde(default)]
    pub keep_unlabeled: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            skip_rows: 0,
            unknown_label: "unknown".to_string(),
            keep_unlabeled: false,
        }
    }
}

/// Samples read from a recording
#[derive(Debug, Clone, Default)]
pub struct LoadedData {
    /// Samples in file order
    pub samples: Vec<LabeledSample>,
    /// Data rows read (excluding header and annotations)
    pub rows_read: usize,
    /// Rows dropped for being unlabeled or `unknown`
    pub rows_dropped: usize,
    /// Unannotated rows kept without a label
    pub rows_unlabeled: usize,
}

/// Reads labeled samples from CSV exports
pub struct CsvLoader {
    config: LoaderConfig,
}

impl CsvLoader {
    /// Create a new loader with given config
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load a recording from disk
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadedData, ValidationError> {
        let path = path.as_ref();
        info!("Loading labeled events from {}", path.display());
        let file = File::open(path)?;
        self.load_reader(file)
    }

    /// Load a recording from any reader
    pub fn load_reader<R: Read>(&self, reader: R) -> Result<LoadedData, ValidationError> {
        let mut buffered = BufReader::new(reader);
        let mut discard = String::new();
        for _ in 0..self.config.skip_rows {
            discard.clear();
            if buffered.read_line(&mut discard)? == 0 {
                break;
            }
        }

        // InfluxDB annotated exports prefix the header with #group/#datatype/#default rows
        let mut csv_reader = ReaderBuilder::new()
            .comment(Some(b'#'))
            .flexible(true)
            .from_reader(buffered);

        let headers = csv_reader.headers()?.clone();
        let columns = ColumnMap::from_headers(&headers)?;

        let mut data = LoadedData::default();
        for result in csv_reader.records() {
            let record = result?;
            // Line numbers restart after the skipped preamble
            let row = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(data.rows_read + 1)
                + self.config.skip_rows;

            let event_id = field(&record, columns.event_id).trim();
            // Multi-table exports repeat the header row
            if event_id == "event_id" {
                debug!("Skipping repeated header at line {}", row);
                continue;
            }
            data.rows_read += 1;

            let raw_label = field(&record, columns.label).trim();
            let label = if raw_label.is_empty() || raw_label.eq_ignore_ascii_case(&self.config.unknown_label) {
                if !self.config.keep_unlabeled {
                    data.rows_dropped += 1;
                    continue;
                }
                data.rows_unlabeled += 1;
                None
            } else {
                let label: EventLabel = raw_label.parse().map_err(|_| ValidationError::UnknownLabel {
                    row,
                    label: raw_label.to_string(),
                })?;
                Some(label)
            };

            let sample = ImuSample {
                accel_x: parse_number(&record, columns.accel[0], "accel_x", row)?,
                accel_y: parse_number(&record, columns.accel[1], "accel_y", row)?,
                accel_z: parse_number(&record, columns.accel[2], "accel_z", row)?,
                gyro_x: parse_number(&record, columns.gyro[0], "gyro_x", row)?,
                gyro_y: parse_number(&record, columns.gyro[1], "gyro_y", row)?,
                gyro_z: parse_number(&record, columns.gyro[2], "gyro_z", row)?,
                accel_mag: match columns.accel_mag {
                    Some(idx) if !field(&record, idx).trim().is_empty() => {
                        Some(parse_number(&record, idx, "accel_mag", row)?)
                    }
                    _ => None,
                },
            };

            let sample_index = match columns.sample_index {
                Some(idx) => parse_index(&record, idx, row)?,
                None => None,
            };

            data.samples.push(LabeledSample {
                event_id: event_id.to_string(),
                sample_index,
                label,
                sample,
            });
        }

        if data.samples.is_empty() {
            return Err(ValidationError::EmptyDataset);
        }

        info!(
            "Loaded {} samples ({} unlabeled rows dropped, {} kept)",
            data.samples.len(),
            data.rows_dropped,
            data.rows_unlabeled
        );
        Ok(data)
    }
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self::new(LoaderConfig::default())
    }
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_number(
    record: &StringRecord,
    idx: usize,
    column: &'static str,
    row: usize,
) -> Result<f64, ValidationError> {
    let raw = field(record, idx).trim();
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::InvalidNumber {
            row,
            column,
            value: raw.to_string(),
        }),
    }
}

fn parse_index(record: &StringRecord, idx: usize, row: usize) -> Result<Option<i64>, ValidationError> {
    let raw = field(record, idx).trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Ok(Some(value));
    }
    // Exports through dataframes may write integer indices as floats
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Ok(Some(value as i64)),
        _ => Err(ValidationError::InvalidNumber {
            row,
            column: "sample_idx",
            value: raw.to_string(),
        }),
    }
}
