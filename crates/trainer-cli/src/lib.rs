//! Luma Event Classifier Training
//!
//! Library side of the `luma-train` binary: settings, logging and the
//! training, prediction and feature export pipelines.

mod pipeline;
mod predict;
mod settings;

pub use pipeline::{export_features, load_windows, run_training, TrainingOutcome};
pub use predict::{run_prediction, EventPrediction};
pub use settings::{
    CrossValidationSettings, DataSettings, ExportSettings, FeatureSettings, ForestSettings,
    GridSearchSettings, SplitSettings, TrainingSettings, ENV_PREFIX,
};

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging, DEBUG when `verbose` and INFO otherwise
pub fn init_logging(verbose: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(verbose)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
