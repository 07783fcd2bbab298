//! JSON Model Description

use crate::ExportError;
use forest_trainer::{LabelEncoder, ModelBundle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of the `model_type` field
pub const MODEL_TYPE: &str = "RandomForest";

/// Contents of `model_config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfigExport {
    pub model_type: String,
    pub n_estimators: usize,
    /// `null` for unbounded trees
    pub max_depth: Option<usize>,
    pub classes: Vec<String>,
    pub class_encoding: BTreeMap<String, usize>,
    pub n_features: usize,
    pub feature_names: Vec<String>,
    pub scaler_min: Vec<f64>,
    pub scaler_max: Vec<f64>,
    pub accuracy: f64,
    pub f1_macro: f64,
}

impl ModelConfigExport {
    /// Describe a trained bundle
    pub fn from_bundle(bundle: &ModelBundle) -> Result<Self, ExportError> {
        let params = bundle.forest.params();
        let encoder = bundle.encoder()?;
        Ok(Self {
            model_type: MODEL_TYPE.to_string(),
            n_estimators: params.n_estimators,
            max_depth: params.max_depth,
            classes: encoder.classes().iter().map(|c| c.as_str().to_string()).collect(),
            class_encoding: class_encoding(&encoder),
            n_features: bundle.feature_names.len(),
            feature_names: bundle.feature_names.clone(),
            scaler_min: bundle.scaler.data_min().to_vec(),
            scaler_max: bundle.scaler.data_max().to_vec(),
            accuracy: bundle.metrics.accuracy,
            f1_macro: bundle.metrics.f1_macro,
        })
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn class_encoding(encoder: &LabelEncoder) -> BTreeMap<String, usize> {
    encoder
        .class_encoding()
        .into_iter()
        .map(|(label, index)| (label.as_str().to_string(), index))
        .collect()
}
