//! Column Schema for Labeled Recordings

use crate::error::ValidationError;
use csv::StringRecord;

/// Columns every recording must provide
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "event_id", "label", "accel_x", "accel_y", "accel_z", "gyro_x", "gyro_y", "gyro_z",
];

/// Columns used when present
pub const OPTIONAL_COLUMNS: [&str; 4] = ["sample_idx", "sample_id", "sample_index", "accel_mag"];

/// Positions of the known columns in a header row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub event_id: usize,
    pub label: usize,
    pub accel: [usize; 3],
    pub gyro: [usize; 3],
    pub sample_index: Option<usize>,
    pub accel_mag: Option<usize>,
}

impl ColumnMap {
    /// Resolve column positions by name; unknown columns are ignored
    pub fn from_headers(headers: &StringRecord) -> Result<Self, ValidationError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let find = |name: &str| names.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| find(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingColumns(missing));
        }

        // Presence was checked above
        let required = |name: &str| find(name).unwrap_or_default();

        Ok(Self {
            event_id: required("event_id"),
            label: required("label"),
            accel: [required("accel_x"), required("accel_y"), required("accel_z")],
            gyro: [required("gyro_x"), required("gyro_y"), required("gyro_z")],
            sample_index: find("sample_idx")
                .or_else(|| find("sample_id"))
                .or_else(|| find("sample_index")),
            accel_mag: find("accel_mag"),
        })
    }
}
