//! Batch Prediction with a Saved Bundle

use crate::pipeline::load_recording;
use crate::settings::TrainingSettings;
use anyhow::{Context, Result};
use event_window::EventLabel;
use forest_trainer::{ModelBundle, Prediction};
use std::path::Path;
use tracing::info;

/// Classification of one recorded event
#[derive(Debug, Clone)]
pub struct EventPrediction {
    pub event_id: String,
    /// Label recorded in the CSV, `None` for unannotated events
    pub actual: Option<EventLabel>,
    pub prediction: Prediction,
}

/// Classify every event window of a recording.
///
/// Windowing follows the bundle's settings so events are cut the same way
/// as during training. Rows without a label are classified like any other.
pub fn run_prediction(settings: &TrainingSettings, model: &Path, data: &Path) -> Result<Vec<EventPrediction>> {
    let bundle = ModelBundle::load(model)
        .with_context(|| format!("Failed to load model {}", model.display()))?;

    let mut settings = settings.clone();
    settings.window = bundle.window.clone();
    let (windows, _) = load_recording(&settings, data, true)?;

    let predictions = windows
        .iter()
        .map(|window| {
            let prediction = bundle
                .predict_window(window)
                .with_context(|| format!("Failed to classify event {}", window.event_id))?;
            Ok(EventPrediction {
                event_id: window.event_id.clone(),
                actual: window.label,
                prediction,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let labeled = predictions.iter().filter(|p| p.actual.is_some()).count();
    let correct = predictions
        .iter()
        .filter(|p| p.actual == Some(p.prediction.label))
        .count();
    info!(
        "Classified {} events, {} of {} labeled events match the recorded label",
        predictions.len(),
        correct,
        labeled
    );
    Ok(predictions)
}
