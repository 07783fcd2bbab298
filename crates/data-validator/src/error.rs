//! Validation Error Types

use thiserror::Error;

/// Errors during data loading and validation
#[derive(Debug, Error)]
pub enum ValidationError {
    /// File could not be opened or read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Header lacks required columns
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Numeric field does not parse
    #[error("Row {row}: invalid number {value:?} in column {column}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    /// Label is not one of the known events
    #[error("Row {row}: unrecognized label {label:?}")]
    UnknownLabel { row: usize, label: String },

    /// Nothing usable left after filtering
    #[error("Dataset contains no usable samples")]
    EmptyDataset,

    /// NaN or infinite value where a finite one is required
    #[error("Non-finite value at row {row}, column {column}")]
    NonFinite { row: usize, column: usize },

    /// Matrix width differs from the fitted width
    #[error("Shape mismatch: expected {expected} columns, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
}
