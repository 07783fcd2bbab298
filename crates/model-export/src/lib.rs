//! Model Export
//!
//! Writes the artifacts that accompany a trained classifier: the JSON model
//! description, C sources for the helmet firmware, evaluation reports and
//! plots.

mod c_source;
mod config;
mod plots;
mod reports;

pub use c_source::{render_feature_header, render_tree_source};
pub use config::{ModelConfigExport, MODEL_TYPE};
pub use plots::{render_confusion_matrix, render_feature_importance, SensorFamily, DEFAULT_TOP_N};
pub use reports::{write_classification_report, write_confusion_matrix, write_feature_importance};

use event_window::EventLabel;
use forest_trainer::{ClassificationReport, ConfusionMatrix, ModelBundle, TrainingError, TreeRule};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Errors while writing artifacts
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Nothing to plot")]
    EmptyPlot,
    #[error(transparent)]
    Model(#[from] TrainingError),
}

/// Writes artifacts into one output directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    /// Create the writer, creating the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `model_config.json`
    pub fn model_config(&self, bundle: &ModelBundle) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("model_config.json");
        let export = ModelConfigExport::from_bundle(bundle)?;
        fs::write(&path, export.to_json()?)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// `feature_indices.h`
    pub fn feature_header(&self, bundle: &ModelBundle) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("feature_indices.h");
        let source = render_feature_header(
            &bundle.feature_names,
            &bundle.classes,
            bundle.scaler.data_min(),
            bundle.scaler.data_max(),
        )?;
        fs::write(&path, source)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// `classifier_tree.c`
    pub fn tree_source(
        &self,
        rules: &TreeRule,
        classes: &[EventLabel],
        accuracy: f64,
    ) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("classifier_tree.c");
        fs::write(&path, render_tree_source(rules, classes, accuracy))?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// `classification_report.csv`
    pub fn classification_report(&self, report: &ClassificationReport) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("classification_report.csv");
        write_classification_report(fs::File::create(&path)?, report)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// `confusion_matrix.csv`
    pub fn confusion_matrix(
        &self,
        matrix: &ConfusionMatrix,
        classes: &[EventLabel],
    ) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("confusion_matrix.csv");
        write_confusion_matrix(fs::File::create(&path)?, matrix, classes)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// `feature_importance.csv`
    pub fn feature_importance(&self, names: &[String], importances: &[f64]) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("feature_importance.csv");
        write_feature_importance(fs::File::create(&path)?, names, importances)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// `confusion_matrix.png`
    pub fn confusion_matrix_plot(&self, matrix: &ConfusionMatrix) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("confusion_matrix.png");
        render_confusion_matrix(matrix)?.save(&path)?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// `feature_importance.png`
    pub fn feature_importance_plot(
        &self,
        names: &[String],
        importances: &[f64],
        top_n: usize,
    ) -> Result<PathBuf, ExportError> {
        let path = self.dir.join("feature_importance.png");
        render_feature_importance(names, importances, top_n)?.save(&path)?;
        info!("Saved {}", path.display());
        Ok(path)
    }
}
