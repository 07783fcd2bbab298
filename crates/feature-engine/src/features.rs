//! Feature Vector Assembly

use crate::statistics::{
    self, centered_zero_crossing_rate, diff, energy, population_std, sign_change_rate,
    StatisticalFeatures,
};
use crate::FeatureError;
use event_window::{Channel, EventLabel, EventWindow};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use tracing::{debug, info};

/// Width of the standard (helmet) feature vector
pub const STANDARD_FEATURE_COUNT: usize = 49;

/// Width of the extended (embedded export) feature vector
pub const EXTENDED_FEATURE_COUNT: usize = 61;

const ACCEL_AXES: [Channel; 3] = [Channel::AccelX, Channel::AccelY, Channel::AccelZ];
const GYRO_AXES: [Channel; 3] = [Channel::GyroX, Channel::GyroY, Channel::GyroZ];

/// Which feature layout to compute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureSet {
    /// Helmet training set: 49 features
    #[default]
    Standard,
    /// Embedded export set: 61 features, rates normalized by window length
    Extended,
}

impl FeatureSet {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureSet::Standard => "standard",
            FeatureSet::Extended => "extended",
        }
    }

    /// Number of features produced
    pub fn len(&self) -> usize {
        match self {
            FeatureSet::Standard => STANDARD_FEATURE_COUNT,
            FeatureSet::Extended => EXTENDED_FEATURE_COUNT,
        }
    }

    /// Always false; every set produces features
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Feature names in vector order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.len());
        let mut stats = |prefix: &str, suffixes: &[&str]| {
            for suffix in suffixes {
                names.push(format!("{}_{}", prefix, suffix));
            }
        };

        match self {
            FeatureSet::Standard => {
                for axis in ACCEL_AXES {
                    stats(
                        axis.as_str(),
                        &["mean", "std", "max", "min", "range", "median", "skew", "kurtosis"],
                    );
                }
                stats("accel_mag", &["mean", "std", "max", "range"]);
                for axis in GYRO_AXES {
                    stats(axis.as_str(), &["mean", "std", "max", "range"]);
                }
                stats("gyro_mag", &["mean", "std", "max"]);
                stats("jerk", &["mean", "max", "std"]);
                stats("accel", &["energy"]);
                stats("gyro", &["energy"]);
                stats("accel_x", &["zcr"]);
            }
            FeatureSet::Extended => {
                for axis in ACCEL_AXES.iter().chain([Channel::AccelMag].iter()) {
                    stats(
                        axis.as_str(),
                        &["mean", "std", "max", "min", "range", "median", "skew", "kurtosis"],
                    );
                }
                for axis in GYRO_AXES {
                    stats(axis.as_str(), &["mean", "std", "max", "min", "range", "abs_max"]);
                }
                stats("gyro_mag", &["mean", "max"]);
                stats("jerk", &["mean", "max", "std"]);
                stats("accel", &["energy"]);
                stats("gyro", &["energy"]);
                for axis in GYRO_AXES {
                    stats(axis.as_str(), &["zcr"]);
                }
                names.push("peak_position".to_string());
            }
        }
        names
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureSet {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(FeatureSet::Standard),
            "extended" => Ok(FeatureSet::Extended),
            other => Err(FeatureError::UnknownFeatureSet(other.to_string())),
        }
    }
}

/// Features of one event window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Source event
    pub event_id: String,
    /// Event label, if the window was annotated
    pub label: Option<EventLabel>,
    /// Feature values in `FeatureSet::feature_names` order
    pub values: Vec<f64>,
}

/// Features of many windows, one row per event
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Column names
    pub names: Vec<String>,
    /// Row-major feature values
    pub records: Array2<f64>,
    /// Label per row
    pub labels: Vec<EventLabel>,
    /// Event id per row
    pub event_ids: Vec<String>,
}

impl FeatureMatrix {
    /// Number of events
    pub fn n_events(&self) -> usize {
        self.records.nrows()
    }

    /// Number of features per event
    pub fn n_features(&self) -> usize {
        self.records.ncols()
    }

    /// Write `event_id,label,<features...>` rows as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), FeatureError> {
        let mut csv = csv::Writer::from_writer(writer);
        let mut header = vec!["event_id".to_string(), "label".to_string()];
        header.extend(self.names.iter().cloned());
        csv.write_record(&header)?;

        for (i, row) in self.records.outer_iter().enumerate() {
            let mut record = vec![self.event_ids[i].clone(), self.labels[i].to_string()];
            record.extend(row.iter().map(|v| v.to_string()));
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// Computes feature vectors from event windows
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    /// Feature layout
    set: FeatureSet,
    /// Sample rate (Hz)
    sample_rate: f64,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new(set: FeatureSet, sample_rate: f64) -> Self {
        Self { set, sample_rate }
    }

    /// Feature layout in use
    pub fn feature_set(&self) -> FeatureSet {
        self.set
    }

    /// Extract features from one window
    pub fn extract(&self, window: &EventWindow) -> FeatureVector {
        let mut values = Vec::with_capacity(self.set.len());
        match self.set {
            FeatureSet::Standard => self.standard(window, &mut values),
            FeatureSet::Extended => self.extended(window, &mut values),
        }
        debug_assert_eq!(values.len(), self.set.len());

        FeatureVector {
            event_id: window.event_id.clone(),
            label: window.label,
            values,
        }
    }

    /// Extract features from every labeled window into a matrix
    pub fn extract_all(&self, windows: &[EventWindow]) -> Result<FeatureMatrix, FeatureError> {
        if windows.is_empty() {
            return Err(FeatureError::NoWindows);
        }

        let names = self.set.feature_names();
        let mut records = Array2::zeros((windows.len(), names.len()));
        let mut labels = Vec::with_capacity(windows.len());
        let mut event_ids = Vec::with_capacity(windows.len());

        for (i, window) in windows.iter().enumerate() {
            let vector = self.extract(window);
            if let Some(j) = vector.values.iter().position(|v| !v.is_finite()) {
                return Err(FeatureError::NonFinite {
                    event_id: vector.event_id,
                    feature: names[j].clone(),
                });
            }
            let label = vector.label.ok_or_else(|| FeatureError::Unlabeled {
                event_id: vector.event_id.clone(),
            })?;
            for (j, value) in vector.values.into_iter().enumerate() {
                records[[i, j]] = value;
            }
            labels.push(label);
            event_ids.push(vector.event_id);
            debug!("Extracted features for event {}", window.event_id);
        }

        info!(
            "Extracted {} {} features from {} events",
            names.len(),
            self.set,
            windows.len()
        );

        Ok(FeatureMatrix {
            names,
            records,
            labels,
            event_ids,
        })
    }

    fn standard(&self, window: &EventWindow, out: &mut Vec<f64>) {
        for axis in ACCEL_AXES {
            let s = StatisticalFeatures::compute(&window.channel(axis));
            out.extend([
                s.mean, s.std_dev, s.max, s.min, s.range, s.median, s.skewness, s.kurtosis,
            ]);
        }

        // Magnitude is always derived from the axes here
        let accel_mag: Vec<f64> = window
            .samples
            .iter()
            .map(|s| (s.accel_x * s.accel_x + s.accel_y * s.accel_y + s.accel_z * s.accel_z).sqrt())
            .collect();
        let s = StatisticalFeatures::compute(&accel_mag);
        out.extend([s.mean, s.std_dev, s.max, s.range]);

        for axis in GYRO_AXES {
            let s = StatisticalFeatures::compute(&window.channel(axis));
            out.extend([s.mean, s.std_dev, s.max, s.range]);
        }

        let gyro_mag = window.gyro_magnitude();
        let s = StatisticalFeatures::compute(&gyro_mag);
        out.extend([s.mean, s.std_dev, s.max]);

        // Jerk per sample step
        let jerk = diff(&accel_mag);
        let abs_jerk: Vec<f64> = jerk.iter().map(|j| j.abs()).collect();
        out.push(statistics::mean(&abs_jerk));
        out.push(max_or_nan(&abs_jerk));
        out.push(population_std(&jerk));

        out.push(energy(&accel_mag));
        out.push(energy(&gyro_mag));

        out.push(sign_change_rate(&window.channel(Channel::AccelX)));
    }

    fn extended(&self, window: &EventWindow, out: &mut Vec<f64>) {
        for axis in ACCEL_AXES.iter().chain([Channel::AccelMag].iter()) {
            let s = StatisticalFeatures::compute(&window.channel(*axis));
            out.extend([
                s.mean, s.std_dev, s.max, s.min, s.range, s.median, s.skewness, s.kurtosis,
            ]);
        }

        for axis in GYRO_AXES {
            let s = StatisticalFeatures::compute(&window.channel(axis));
            out.extend([s.mean, s.std_dev, s.max, s.min, s.range, s.abs_max]);
        }

        let gyro_mag = window.gyro_magnitude();
        out.push(statistics::mean(&gyro_mag));
        out.push(max_or_nan(&gyro_mag));

        // Jerk in g/s
        let accel_mag = window.accel_magnitude();
        if accel_mag.len() > 1 {
            let jerk: Vec<f64> = diff(&accel_mag).iter().map(|d| d * self.sample_rate).collect();
            let abs_jerk: Vec<f64> = jerk.iter().map(|j| j.abs()).collect();
            out.push(statistics::mean(&abs_jerk));
            out.push(max_or_nan(&abs_jerk));
            out.push(population_std(&jerk));
        } else {
            out.extend([0.0, 0.0, 0.0]);
        }

        let n = window.len() as f64;
        out.push(energy(&accel_mag) / n);
        out.push(energy(&gyro_mag) / n);

        for axis in GYRO_AXES {
            out.push(centered_zero_crossing_rate(&window.channel(axis)));
        }

        let peak = statistics::argmax(&accel_mag)
            .map(|idx| idx as f64 / n)
            .unwrap_or(0.5);
        out.push(peak);
    }
}

fn max_or_nan(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}
