//! Feature Engineering Engine
//!
//! Turns 3-second IMU event windows into fixed-width feature vectors for
//! the event classifier.

mod features;
mod statistics;

pub use features::{
    FeatureExtractor, FeatureMatrix, FeatureSet, FeatureVector, EXTENDED_FEATURE_COUNT,
    STANDARD_FEATURE_COUNT,
};
pub use statistics::StatisticalFeatures;

use thiserror::Error;

/// Errors during feature extraction
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("No event windows to extract features from")]
    NoWindows,
    #[error("Feature {feature} of event {event_id} is not finite")]
    NonFinite { event_id: String, feature: String },
    #[error("Event {event_id} has no label")]
    Unlabeled { event_id: String },
    #[error("Unknown feature set: {0}")]
    UnknownFeatureSet(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
