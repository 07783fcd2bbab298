//! Classification Metrics

use crate::TrainingError;
use event_window::EventLabel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Averaging strategy for multi-class scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Average {
    /// Unweighted mean over classes
    Macro,
    /// Mean weighted by class support
    Weighted,
}

/// Confusion matrix, rows are true classes and columns predictions
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    /// Count `(true, predicted)` pairs
    pub fn new(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Result<Self, TrainingError> {
        if y_true.len() != y_pred.len() {
            return Err(TrainingError::ShapeMismatch {
                expected: y_true.len(),
                actual: y_pred.len(),
            });
        }
        let mut counts = Array2::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t >= n_classes {
                return Err(TrainingError::ClassIndexOutOfRange(t));
            }
            if p >= n_classes {
                return Err(TrainingError::ClassIndexOutOfRange(p));
            }
            counts[[t, p]] += 1;
        }
        Ok(Self { counts })
    }

    /// Raw counts
    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.counts.nrows()
    }

    /// Count of samples of class `actual` predicted as `predicted`
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        self.counts[[actual, predicted]]
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Samples whose true class is `class`
    pub fn support(&self, class: usize) -> usize {
        self.counts.row(class).sum()
    }

    /// Samples predicted as `class`
    pub fn predicted(&self, class: usize) -> usize {
        self.counts.column(class).sum()
    }

    /// Overall accuracy
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let correct: usize = (0..self.n_classes()).map(|c| self.get(c, c)).sum();
        correct as f64 / total as f64
    }

    /// Precision of one class (0 when nothing was predicted as it)
    pub fn precision(&self, class: usize) -> f64 {
        ratio(self.get(class, class), self.predicted(class))
    }

    /// Recall of one class (0 when the class has no samples)
    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.get(class, class), self.support(class))
    }

    /// F1 score of one class
    pub fn f1(&self, class: usize) -> f64 {
        let p = self.precision(class);
        let r = self.recall(class);
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Averaged F1 over the classes that occur in truth or predictions
    pub fn f1_average(&self, average: Average) -> f64 {
        let present: Vec<usize> = (0..self.n_classes())
            .filter(|&c| self.support(c) > 0 || self.predicted(c) > 0)
            .collect();
        if present.is_empty() {
            return 0.0;
        }
        match average {
            Average::Macro => present.iter().map(|&c| self.f1(c)).sum::<f64>() / present.len() as f64,
            Average::Weighted => {
                let total = self.total() as f64;
                present
                    .iter()
                    .map(|&c| self.f1(c) * self.support(c) as f64)
                    .sum::<f64>()
                    / total
            }
        }
    }
}

/// Per-class scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: EventLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Precision / recall / F1 per class plus summary rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

impl ClassificationReport {
    /// Build a report from a confusion matrix and the label of each class index
    pub fn new(matrix: &ConfusionMatrix, labels: &[EventLabel]) -> Result<Self, TrainingError> {
        if labels.len() != matrix.n_classes() {
            return Err(TrainingError::ShapeMismatch {
                expected: matrix.n_classes(),
                actual: labels.len(),
            });
        }

        let classes: Vec<ClassMetrics> = labels
            .iter()
            .enumerate()
            .map(|(c, &label)| ClassMetrics {
                label,
                precision: matrix.precision(c),
                recall: matrix.recall(c),
                f1_score: matrix.f1(c),
                support: matrix.support(c),
            })
            .collect();

        let present: Vec<&ClassMetrics> = classes
            .iter()
            .enumerate()
            .filter(|(c, m)| m.support > 0 || matrix.predicted(*c) > 0)
            .map(|(_, m)| m)
            .collect();
        let total = matrix.total();

        let macro_avg = {
            let n = present.len().max(1) as f64;
            AverageMetrics {
                precision: present.iter().map(|m| m.precision).sum::<f64>() / n,
                recall: present.iter().map(|m| m.recall).sum::<f64>() / n,
                f1_score: present.iter().map(|m| m.f1_score).sum::<f64>() / n,
                support: total,
            }
        };
        let weighted_avg = {
            let w = total.max(1) as f64;
            AverageMetrics {
                precision: present.iter().map(|m| m.precision * m.support as f64).sum::<f64>() / w,
                recall: present.iter().map(|m| m.recall * m.support as f64).sum::<f64>() / w,
                f1_score: present.iter().map(|m| m.f1_score * m.support as f64).sum::<f64>() / w,
                support: total,
            }
        };

        Ok(Self {
            classes,
            accuracy: matrix.accuracy(),
            macro_avg,
            weighted_avg,
        })
    }

    /// Plain-text table for logs and the console
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        );
        let _ = writeln!(out);
        for m in &self.classes {
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label.as_str(),
                m.precision,
                m.recall,
                m.f1_score,
                m.support
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        );
        for (name, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1_score, avg.support
            );
        }
        out
    }
}

/// Fraction of matching predictions
pub fn accuracy_score(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// Averaged F1 score
pub fn f1_score(
    y_true: &[usize],
    y_pred: &[usize],
    n_classes: usize,
    average: Average,
) -> Result<f64, TrainingError> {
    Ok(ConfusionMatrix::new(y_true, y_pred, n_classes)?.f1_average(average))
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
