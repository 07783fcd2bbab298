//! Surrogate Decision Tree
//!
//! A single shallow tree trained next to the forest so the firmware can run
//! an approximation of it as plain nested conditionals.

use crate::forest::fit_decision_tree;
use crate::metrics::accuracy_score;
use crate::rules::TreeRule;
use crate::TrainingError;
use ndarray::{Array1, Array2, Axis};
use tracing::info;

/// Depth used for the embedded tree export
pub const DEFAULT_SURROGATE_DEPTH: usize = 10;

/// Single decision tree suitable for C export
#[derive(Debug, Clone)]
pub struct SurrogateTree {
    rules: TreeRule,
    n_features: usize,
}

impl SurrogateTree {
    /// Fit a depth-limited tree on every row and feature
    pub fn fit(
        x: &Array2<f64>,
        y: &[usize],
        max_depth: usize,
        n_classes: usize,
    ) -> Result<Self, TrainingError> {
        if max_depth == 0 {
            return Err(TrainingError::InvalidParameter("max_depth must be at least 1".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(TrainingError::ShapeMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(TrainingError::ClassIndexOutOfRange(bad));
        }

        let targets: Array1<usize> = y.iter().copied().collect();
        let tree = fit_decision_tree(x.clone(), targets, Some(max_depth), 2, 1)?;
        let rules = TreeRule::from_tree(&tree)?;
        info!(
            "Surrogate tree: depth {}, {} leaves",
            rules.depth(),
            rules.leaf_count()
        );

        Ok(Self {
            rules,
            n_features: x.ncols(),
        })
    }

    /// Predict class indices
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, TrainingError> {
        if x.ncols() != self.n_features {
            return Err(TrainingError::ShapeMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        Ok(x.axis_iter(Axis(0)).map(|row| self.rules.predict_row(row)).collect())
    }

    /// Accuracy on a labeled set
    pub fn accuracy(&self, x: &Array2<f64>, y: &[usize]) -> Result<f64, TrainingError> {
        let predicted = self.predict(x)?;
        Ok(accuracy_score(y, &predicted))
    }

    /// Decision rules of the tree
    pub fn rules(&self) -> &TreeRule {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::blobs;

    #[test]
    fn test_surrogate_respects_depth() {
        let (x, y) = blobs(20, 11);
        let tree = SurrogateTree::fit(&x, &y, 2, 3).unwrap();
        assert!(tree.rules().depth() <= 2);
        assert!(tree.accuracy(&x, &y).unwrap() > 0.9);
    }

    #[test]
    fn test_surrogate_rejects_zero_depth() {
        let (x, y) = blobs(3, 12);
        assert!(SurrogateTree::fit(&x, &y, 0, 3).is_err());
    }

    #[test]
    fn test_surrogate_width_check() {
        let (x, y) = blobs(5, 13);
        let tree = SurrogateTree::fit(&x, &y, 3, 3).unwrap();
        assert!(tree.predict(&Array2::zeros((2, 3))).is_err());
    }
}
