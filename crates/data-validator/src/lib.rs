//! Data Validation and Normalization
//!
//! Loads labeled IMU recordings from CSV, validates their schema and labels,
//! and provides the MinMax feature scaler.

mod error;
mod loader;
mod normalizer;
mod schema;

pub use error::ValidationError;
pub use loader::{CsvLoader, LoadedData, LoaderConfig};
pub use normalizer::MinMaxScaler;
pub use schema::{ColumnMap, OPTIONAL_COLUMNS, REQUIRED_COLUMNS};
