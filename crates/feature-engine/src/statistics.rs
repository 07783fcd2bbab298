//! Statistical Features Computation
//!
//! Moments follow the dataframe conventions the deployed model was trained
//! with: sample standard deviation (n - 1) and bias-corrected skewness and
//! excess kurtosis.

/// Statistical features for a signal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticalFeatures {
    /// Mean value
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// max - min
    pub range: f64,
    /// Median value
    pub median: f64,
    /// Bias-corrected skewness (asymmetry)
    pub skewness: f64,
    /// Bias-corrected excess kurtosis (tailedness)
    pub kurtosis: f64,
    /// Largest absolute value
    pub abs_max: f64,
}

impl StatisticalFeatures {
    /// Compute statistical features from a slice of values
    pub fn compute(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                mean: f64::NAN,
                std_dev: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
                range: f64::NAN,
                median: f64::NAN,
                skewness: f64::NAN,
                kurtosis: f64::NAN,
                abs_max: f64::NAN,
            };
        }

        let n = values.len() as f64;
        let mean = mean(values);

        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let abs_max = values.iter().map(|v| v.abs()).fold(0.0, f64::max);

        // Central moments (sums, not averages)
        let mut m2 = 0.0;
        let mut m3 = 0.0;
        let mut m4 = 0.0;
        for &v in values {
            let d = v - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }

        let std_dev = if values.len() > 1 {
            (m2 / (n - 1.0)).sqrt()
        } else {
            f64::NAN
        };

        // G1 = n * sqrt(n - 1) / (n - 2) * m3 / m2^1.5
        let skewness = if values.len() < 3 {
            f64::NAN
        } else if m2 == 0.0 {
            0.0
        } else {
            n * (n - 1.0).sqrt() / (n - 2.0) * (m3 / m2.powf(1.5))
        };

        // G2 = n(n+1)(n-1) m4 / ((n-2)(n-3) m2^2) - 3(n-1)^2 / ((n-2)(n-3))
        let kurtosis = if values.len() < 4 {
            f64::NAN
        } else {
            let denominator = (n - 2.0) * (n - 3.0) * m2 * m2;
            if denominator == 0.0 {
                0.0
            } else {
                let numerator = n * (n + 1.0) * (n - 1.0) * m4;
                let adjustment = 3.0 * (n - 1.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0));
                numerator / denominator - adjustment
            }
        };

        Self {
            mean,
            std_dev,
            min,
            max,
            range: max - min,
            median: median(values),
            skewness,
            kurtosis,
            abs_max,
        }
    }
}

/// Arithmetic mean (NaN when empty)
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median (average of the two middle values for even lengths)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population standard deviation (n)
pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// First difference, `out[i] = values[i + 1] - values[i]`
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Sum of squares
pub fn energy(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Fraction of consecutive samples whose sign differs, over the window length.
///
/// Zero is its own sign, so a step from 0 to a positive value counts.
pub fn sign_change_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let changes = values
        .windows(2)
        .filter(|w| sign(w[0]) != sign(w[1]))
        .count();
    changes as f64 / values.len() as f64
}

/// Zero-crossing rate around the mean: `sum(|diff(sign(x - mean))|) / (2n)`
pub fn centered_zero_crossing_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let total: f64 = values
        .windows(2)
        .map(|w| (sign(w[1] - m) - sign(w[0] - m)).abs())
        .sum();
    total / (2.0 * values.len() as f64)
}

/// Index of the first maximum
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}
