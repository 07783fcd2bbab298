//! Model Bundle
//!
//! Everything needed to classify a raw event window, persisted as one
//! postcard file: feature layout, window settings, class vocabulary, scaler
//! and forest.

use crate::forest::{first_argmax, RandomForest};
use crate::labels::LabelEncoder;
use crate::TrainingError;
use chrono::{DateTime, Utc};
use data_validator::MinMaxScaler;
use event_window::{EventLabel, EventWindow, WindowConfig};
use feature_engine::{FeatureExtractor, FeatureSet};
use ndarray::{Array1, Axis};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Current on-disk bundle layout
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Held-out scores recorded at training time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleMetrics {
    pub accuracy: f64,
    pub f1_macro: f64,
    pub f1_weighted: f64,
}

/// Classification of one event window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Winning label
    pub label: EventLabel,
    /// Vote fraction of the winning label
    pub confidence: f64,
    /// Vote fraction per class, in class index order
    pub probabilities: Vec<(EventLabel, f64)>,
}

/// Trained classifier with its preprocessing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub feature_set: FeatureSet,
    pub feature_names: Vec<String>,
    pub window: WindowConfig,
    pub classes: Vec<EventLabel>,
    pub scaler: MinMaxScaler,
    pub forest: RandomForest,
    pub metrics: BundleMetrics,
}

impl ModelBundle {
    /// Assemble a bundle from trained parts
    pub fn new(
        feature_set: FeatureSet,
        window: WindowConfig,
        encoder: &LabelEncoder,
        scaler: MinMaxScaler,
        forest: RandomForest,
        metrics: BundleMetrics,
    ) -> Result<Self, TrainingError> {
        let feature_names = feature_set.feature_names();
        if scaler.n_features() != feature_names.len() {
            return Err(TrainingError::ShapeMismatch {
                expected: feature_names.len(),
                actual: scaler.n_features(),
            });
        }
        if forest.n_features() != feature_names.len() {
            return Err(TrainingError::ShapeMismatch {
                expected: feature_names.len(),
                actual: forest.n_features(),
            });
        }
        if forest.n_classes() != encoder.n_classes() {
            return Err(TrainingError::ShapeMismatch {
                expected: encoder.n_classes(),
                actual: forest.n_classes(),
            });
        }

        Ok(Self {
            format_version: BUNDLE_FORMAT_VERSION,
            trained_at: Utc::now(),
            feature_set,
            feature_names,
            window,
            classes: encoder.classes().to_vec(),
            scaler,
            forest,
            metrics,
        })
    }

    /// Encoder for the stored class list
    pub fn encoder(&self) -> Result<LabelEncoder, TrainingError> {
        LabelEncoder::from_classes(self.classes.clone())
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, TrainingError> {
        postcard::to_allocvec(self).map_err(|e| TrainingError::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TrainingError> {
        let bundle: Self =
            postcard::from_bytes(bytes).map_err(|e| TrainingError::Serialization(e.to_string()))?;
        if bundle.format_version != BUNDLE_FORMAT_VERSION {
            return Err(TrainingError::UnsupportedFormat(bundle.format_version));
        }
        Ok(bundle)
    }

    /// Write the bundle to disk
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrainingError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        fs::write(path, &bytes)?;
        info!("Saved model bundle to {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    /// Read a bundle from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrainingError> {
        let path = path.as_ref();
        let bundle = Self::from_bytes(&fs::read(path)?)?;
        info!(
            "Loaded {} model trained at {} from {}",
            bundle.feature_set,
            bundle.trained_at.to_rfc3339(),
            path.display()
        );
        Ok(bundle)
    }

    /// Classify a raw event window
    pub fn predict_window(&self, window: &EventWindow) -> Result<Prediction, TrainingError> {
        let size = self.window.window_size;
        let trimmed;
        let window = if self.window.require_full_window {
            if window.len() < size {
                return Err(TrainingError::WindowTooShort {
                    expected: size,
                    actual: window.len(),
                });
            }
            if window.len() > size {
                trimmed = EventWindow::new(
                    window.event_id.clone(),
                    window.label,
                    window.samples[..size].to_vec(),
                );
                &trimmed
            } else {
                window
            }
        } else {
            window
        };

        let extractor = FeatureExtractor::new(self.feature_set, self.window.sample_rate_hz);
        let vector = extractor.extract(window);
        if let Some(j) = vector.values.iter().position(|v| !v.is_finite()) {
            return Err(feature_engine::FeatureError::NonFinite {
                event_id: vector.event_id,
                feature: self.feature_names.get(j).cloned().unwrap_or_default(),
            }
            .into());
        }

        let raw = Array1::from(vector.values);
        let scaled = self.scaler.transform_row(raw.view())?.insert_axis(Axis(0));
        let proba = self.forest.predict_proba(&scaled)?;
        let row = proba.row(0);

        let best = first_argmax(row.iter().copied());
        let label = self
            .classes
            .get(best)
            .copied()
            .ok_or(TrainingError::ClassIndexOutOfRange(best))?;
        let probabilities = self.classes.iter().copied().zip(row.iter().copied()).collect();
        debug!("Event {}: {} ({:.2})", window.event_id, label, row[best]);

        Ok(Prediction {
            label,
            confidence: row[best],
            probabilities,
        })
    }
}

/// Write any serializable value as postcard
pub fn save_postcard<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), TrainingError> {
    let bytes = postcard::to_allocvec(value).map_err(|e| TrainingError::Serialization(e.to_string()))?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Read a postcard-encoded value
pub fn load_postcard<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, TrainingError> {
    let bytes = fs::read(path)?;
    postcard::from_bytes(&bytes).map_err(|e| TrainingError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestParams, MaxFeatures};
    use event_window::ImuSample;
    use feature_engine::FeatureExtractor;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn window(id: &str, label: EventLabel, rng: &mut ChaCha8Rng, len: usize) -> EventWindow {
        let (accel, gyro) = match label {
            EventLabel::Crash => (4.0, 200.0),
            EventLabel::Turn => (1.0, 60.0),
            _ => (1.0, 2.0),
        };
        let samples = (0..len)
            .map(|_| {
                ImuSample::new(
                    [
                        rng.gen_range(-0.1..0.1) * accel,
                        rng.gen_range(-0.1..0.1) * accel,
                        accel + rng.gen_range(-0.1..0.1),
                    ],
                    [
                        gyro + rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    ],
                )
            })
            .collect();
        EventWindow::new(id, label, samples)
    }

    fn trained_bundle() -> (ModelBundle, Vec<EventWindow>) {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let labels = [EventLabel::Crash, EventLabel::Normal, EventLabel::Turn];
        let windows: Vec<EventWindow> = (0..30)
            .map(|i| window(&format!("e{}", i), labels[i % 3], &mut rng, 150))
            .collect();

        let extractor = FeatureExtractor::new(FeatureSet::Standard, 50.0);
        let matrix = extractor.extract_all(&windows).unwrap();
        let encoder = LabelEncoder::fit(&matrix.labels).unwrap();
        let y = encoder.encode_all(&matrix.labels).unwrap();
        let (scaler, x) = MinMaxScaler::fit_transform(&matrix.records).unwrap();
        let params = ForestParams {
            n_estimators: 10,
            max_depth: Some(4),
            max_features: MaxFeatures::All,
            ..Default::default()
        };
        let forest = RandomForest::fit(&params, &x, &y, encoder.n_classes()).unwrap();
        let bundle = ModelBundle::new(
            FeatureSet::Standard,
            WindowConfig::default(),
            &encoder,
            scaler,
            forest,
            BundleMetrics::default(),
        )
        .unwrap();
        (bundle, windows)
    }

    #[test]
    fn test_predict_window_matches_training_labels() {
        let (bundle, windows) = trained_bundle();
        for w in &windows {
            let prediction = bundle.predict_window(w).unwrap();
            assert_eq!(Some(prediction.label), w.label);
            assert!(prediction.confidence > 0.5);
            let total: f64 = prediction.probabilities.iter().map(|(_, p)| p).sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_save_and_load_predict_identically() {
        let (bundle, windows) = trained_bundle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rf_classifier.bin");
        bundle.save(&path).unwrap();
        let loaded = ModelBundle::load(&path).unwrap();
        assert_eq!(loaded.classes, bundle.classes);
        assert_eq!(loaded.trained_at, bundle.trained_at);
        assert_eq!(
            loaded.predict_window(&windows[0]).unwrap(),
            bundle.predict_window(&windows[0]).unwrap()
        );
    }

    #[test]
    fn test_short_window_rejected() {
        let (bundle, _) = trained_bundle();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let short = window("s", EventLabel::Normal, &mut rng, 20);
        assert!(matches!(
            bundle.predict_window(&short),
            Err(TrainingError::WindowTooShort { expected: 150, actual: 20 })
        ));
    }

    #[test]
    fn test_long_window_trimmed() {
        let (bundle, _) = trained_bundle();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let long = window("l", EventLabel::Crash, &mut rng, 200);
        assert_eq!(bundle.predict_window(&long).unwrap().label, EventLabel::Crash);
    }

    #[test]
    fn test_rejects_unknown_format_version() {
        let (mut bundle, _) = trained_bundle();
        bundle.format_version = 99;
        let bytes = bundle.to_bytes().unwrap();
        assert!(matches!(
            ModelBundle::from_bytes(&bytes),
            Err(TrainingError::UnsupportedFormat(99))
        ));
    }

    #[test]
    fn test_scaler_postcard_roundtrip() {
        let (bundle, _) = trained_bundle();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        save_postcard(&path, &bundle.scaler).unwrap();
        let scaler: MinMaxScaler = load_postcard(&path).unwrap();
        assert_eq!(scaler, bundle.scaler);
    }
}
