//! Random Forest Trainer
//!
//! Label encoding, stratified splitting, forest fitting on top of
//! `linfa-trees`, model selection and evaluation for the event classifier.

mod bundle;
mod forest;
mod labels;
mod metrics;
mod rules;
mod search;
mod split;
mod surrogate;

pub use bundle::{
    load_postcard, save_postcard, BundleMetrics, ModelBundle, Prediction, BUNDLE_FORMAT_VERSION,
};
pub use forest::{ForestParams, MaxFeatures, RandomForest};
pub use labels::LabelEncoder;
pub use metrics::{
    accuracy_score, f1_score, Average, AverageMetrics, ClassMetrics, ClassificationReport,
    ConfusionMatrix,
};
pub use rules::TreeRule;
pub use search::{
    cross_val_score, CandidateScore, CvScores, GridSearch, GridSearchResult, ParamGrid, Scoring,
};
pub use split::{train_test_split_stratified, SplitIndices, StratifiedKFold};
pub use surrogate::{SurrogateTree, DEFAULT_SURROGATE_DEPTH};

use data_validator::ValidationError;
use event_window::EventLabel;
use feature_engine::FeatureError;
use thiserror::Error;

/// Errors during training, evaluation and persistence
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Cannot split dataset: {0}")]
    InvalidSplit(String),
    #[error("Tree fitting failed: {0}")]
    Fit(String),
    #[error("Fitted tree has a split node without children")]
    MalformedTree,
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Label {0} is not a trained class")]
    UnknownClass(EventLabel),
    #[error("Class index {0} is out of range")]
    ClassIndexOutOfRange(usize),
    #[error("Parameter grid is empty")]
    EmptyGrid,
    #[error("Window has {actual} samples, model needs {expected}")]
    WindowTooShort { expected: usize, actual: usize },
    #[error("Unsupported bundle format version {0}")]
    UnsupportedFormat(u32),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
}
