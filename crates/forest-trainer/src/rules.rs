//! Decision Rules
//!
//! A library-independent view of a fitted decision tree, used for
//! importance accounting and for exporting trees as C conditionals.

use crate::TrainingError;
use linfa_trees::{DecisionTree, TreeNode};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Node of a fitted decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeRule {
    /// `x[feature] < threshold` goes left, everything else goes right
    Split {
        feature: usize,
        threshold: f64,
        impurity_decrease: f64,
        left: Box<TreeRule>,
        right: Box<TreeRule>,
    },
    /// Terminal node
    Leaf { class: usize },
}

impl TreeRule {
    /// Convert a fitted `linfa` tree
    pub fn from_tree(tree: &DecisionTree<f64, usize>) -> Result<Self, TrainingError> {
        Self::from_node(tree.root_node())
    }

    fn from_node(node: &TreeNode<f64, usize>) -> Result<Self, TrainingError> {
        if node.is_leaf() {
            let class = node.prediction().ok_or(TrainingError::MalformedTree)?;
            return Ok(TreeRule::Leaf { class });
        }

        let (feature, threshold, impurity_decrease) = node.split();
        let children = node.children();
        let left = children
            .first()
            .and_then(|c| c.as_ref())
            .ok_or(TrainingError::MalformedTree)?;
        let right = children
            .get(1)
            .and_then(|c| c.as_ref())
            .ok_or(TrainingError::MalformedTree)?;

        Ok(TreeRule::Split {
            feature,
            threshold,
            impurity_decrease,
            left: Box::new(Self::from_node(left)?),
            right: Box::new(Self::from_node(right)?),
        })
    }

    /// Remap feature indices, e.g. from a tree fitted on a column subset
    pub fn remap_features(self, map: &[usize]) -> Self {
        match self {
            TreeRule::Split {
                feature,
                threshold,
                impurity_decrease,
                left,
                right,
            } => TreeRule::Split {
                feature: map.get(feature).copied().unwrap_or(feature),
                threshold,
                impurity_decrease,
                left: Box::new(left.remap_features(map)),
                right: Box::new(right.remap_features(map)),
            },
            leaf => leaf,
        }
    }

    /// Class predicted for one feature row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> usize {
        let mut node = self;
        loop {
            match node {
                TreeRule::Leaf { class } => return *class,
                TreeRule::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if row[*feature] < *threshold { left } else { right };
                }
            }
        }
    }

    /// Number of split levels below this node
    pub fn depth(&self) -> usize {
        match self {
            TreeRule::Leaf { .. } => 0,
            TreeRule::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        match self {
            TreeRule::Leaf { .. } => 1,
            TreeRule::Split { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    /// Add each split's impurity decrease to its feature's slot
    pub fn accumulate_importance(&self, importances: &mut [f64]) {
        if let TreeRule::Split {
            feature,
            impurity_decrease,
            left,
            right,
            ..
        } = self
        {
            if let Some(slot) = importances.get_mut(*feature) {
                *slot += impurity_decrease;
            }
            left.accumulate_importance(importances);
            right.accumulate_importance(importances);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump() -> TreeRule {
        TreeRule::Split {
            feature: 1,
            threshold: 0.5,
            impurity_decrease: 0.3,
            left: Box::new(TreeRule::Leaf { class: 0 }),
            right: Box::new(TreeRule::Split {
                feature: 0,
                threshold: 2.0,
                impurity_decrease: 0.1,
                left: Box::new(TreeRule::Leaf { class: 1 }),
                right: Box::new(TreeRule::Leaf { class: 2 }),
            }),
        }
    }

    #[test]
    fn test_predict_row_uses_strict_less_than() {
        let tree = stump();
        assert_eq!(tree.predict_row(array![0.0, 0.4].view()), 0);
        // Equal to the threshold goes right
        assert_eq!(tree.predict_row(array![1.0, 0.5].view()), 1);
        assert_eq!(tree.predict_row(array![3.0, 0.9].view()), 2);
    }

    #[test]
    fn test_shape_queries() {
        let tree = stump();
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(TreeRule::Leaf { class: 4 }.depth(), 0);
    }

    #[test]
    fn test_importance_accumulation() {
        let mut importances = vec![0.0; 2];
        stump().accumulate_importance(&mut importances);
        assert!((importances[0] - 0.1).abs() < 1e-12);
        assert!((importances[1] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_remap_features() {
        let tree = stump().remap_features(&[7, 3]);
        match tree {
            TreeRule::Split { feature, right, .. } => {
                assert_eq!(feature, 3);
                assert!(matches!(*right, TreeRule::Split { feature: 7, .. }));
            }
            TreeRule::Leaf { .. } => panic!("expected a split"),
        }
    }
}
