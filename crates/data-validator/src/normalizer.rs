//! MinMax Feature Normalization
//!
//! Column-wise scaling fitted on the training matrix. MinMax preserves the
//! extreme values that separate crashes from bumps better than z-scores.

use crate::error::ValidationError;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature MinMax scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    /// Minimum seen per feature
    data_min: Vec<f64>,
    /// Maximum seen per feature
    data_max: Vec<f64>,
    /// Target range (low, high)
    feature_range: (f64, f64),
    /// Clamp transformed values into the target range
    clip: bool,
}

impl MinMaxScaler {
    /// Fit a scaler onto `[0, 1]`
    pub fn fit(records: &Array2<f64>) -> Result<Self, ValidationError> {
        Self::fit_with_range(records, (0.0, 1.0), false)
    }

    /// Fit a scaler with an explicit target range
    pub fn fit_with_range(
        records: &Array2<f64>,
        feature_range: (f64, f64),
        clip: bool,
    ) -> Result<Self, ValidationError> {
        if records.nrows() == 0 || records.ncols() == 0 {
            return Err(ValidationError::EmptyDataset);
        }
        if let Some(((row, column), _)) = records.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::NonFinite { row, column });
        }

        let data_min = records
            .axis_iter(Axis(1))
            .map(|col| col.iter().cloned().fold(f64::INFINITY, f64::min))
            .collect();
        let data_max = records
            .axis_iter(Axis(1))
            .map(|col| col.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
            .collect();

        Ok(Self {
            data_min,
            data_max,
            feature_range,
            clip,
        })
    }

    /// Fit and scale the same matrix
    pub fn fit_transform(records: &Array2<f64>) -> Result<(Self, Array2<f64>), ValidationError> {
        let scaler = Self::fit(records)?;
        let scaled = scaler.transform(records)?;
        Ok((scaler, scaled))
    }

    /// Scale a matrix with the fitted bounds
    pub fn transform(&self, records: &Array2<f64>) -> Result<Array2<f64>, ValidationError> {
        self.check_width(records.ncols())?;
        let mut scaled = records.clone();
        for mut row in scaled.axis_iter_mut(Axis(0)) {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.scale_value(j, *value);
            }
        }
        Ok(scaled)
    }

    /// Scale a single feature vector
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, ValidationError> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, &v)| self.scale_value(j, v))
            .collect())
    }

    /// Per-feature minimum seen during fit
    pub fn data_min(&self) -> &[f64] {
        &self.data_min
    }

    /// Per-feature maximum seen during fit
    pub fn data_max(&self) -> &[f64] {
        &self.data_max
    }

    /// Target range
    pub fn feature_range(&self) -> (f64, f64) {
        self.feature_range
    }

    /// Number of features the scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.data_min.len()
    }

    fn scale_value(&self, j: usize, value: f64) -> f64 {
        let (lo, hi) = self.feature_range;
        let range = self.data_max[j] - self.data_min[j];
        // Constant features map to the low end
        let unit = if range > 0.0 {
            (value - self.data_min[j]) / range
        } else {
            value - self.data_min[j]
        };
        let scaled = lo + unit * (hi - lo);
        if self.clip {
            scaled.clamp(lo, hi)
        } else {
            scaled
        }
    }

    fn check_width(&self, width: usize) -> Result<(), ValidationError> {
        if width != self.n_features() {
            return Err(ValidationError::ShapeMismatch {
                expected: self.n_features(),
                actual: width,
            });
        }
        Ok(())
    }
}
