//! Random Forest
//!
//! Bagged ensemble of `linfa-trees` decision trees. Each tree sees a
//! bootstrap sample of the rows and a random subset of the feature columns,
//! both drawn from a ChaCha stream derived from the forest seed and the tree
//! index, so a fitted forest does not depend on thread scheduling.

use crate::rules::TreeRule;
use crate::TrainingError;
use linfa::prelude::*;
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

/// Number of feature columns each tree sees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every column
    All,
    /// `sqrt(n_features)`
    Sqrt,
    /// `log2(n_features)`
    Log2,
    /// A fraction of the columns
    Fraction(f64),
}

impl MaxFeatures {
    /// Resolve to a column count in `1..=n_features`
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => n.sqrt().floor() as usize,
            MaxFeatures::Log2 => n.log2().floor() as usize,
            MaxFeatures::Fraction(f) => (n * f).floor() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl FromStr for MaxFeatures {
    type Err = TrainingError;

    /// `all`, `sqrt`, `log2` or a fraction such as `0.5`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "none" => Ok(MaxFeatures::All),
            "sqrt" | "auto" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|f| *f > 0.0 && *f <= 1.0)
                .map(MaxFeatures::Fraction)
                .ok_or_else(|| TrainingError::InvalidParameter(format!("invalid max_features: {}", s))),
        }
    }
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum tree depth (`None` grows until leaves are pure)
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf
    pub min_samples_leaf: usize,
    /// Feature columns per tree
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree
    pub bootstrap: bool,
    /// Seed for sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.n_estimators == 0 {
            return Err(TrainingError::InvalidParameter("n_estimators must be at least 1".to_string()));
        }
        if self.max_depth == Some(0) {
            return Err(TrainingError::InvalidParameter("max_depth must be at least 1".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(TrainingError::InvalidParameter(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(TrainingError::InvalidParameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if let MaxFeatures::Fraction(f) = self.max_features {
            if !(f > 0.0 && f <= 1.0) {
                return Err(TrainingError::InvalidParameter(format!(
                    "max_features fraction must be in (0, 1], got {}",
                    f
                )));
            }
        }
        Ok(())
    }
}

/// One fitted member of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForestTree {
    /// Columns of the full matrix this tree was fitted on
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Fitted Random Forest classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    trees: Vec<ForestTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit a forest on scaled features `x` and class indices `y`
    pub fn fit(
        params: &ForestParams,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<Self, TrainingError> {
        params.validate()?;
        if x.nrows() == 0 {
            return Err(TrainingError::InvalidParameter("cannot fit on zero rows".to_string()));
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

        let n_features = x.ncols();
        let k = params.max_features.resolve(n_features);
        info!(
            "Fitting {} trees on {} rows x {} features ({} per tree, max_depth={:?})",
            params.n_estimators,
            x.nrows(),
            n_features,
            k,
            params.max_depth
        );

        let trees = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| fit_member(params, x, y, k, i))
            .collect::<Result<Vec<_>, _>>()?;

        let feature_importances = forest_importances(&trees, n_features)?;
        debug!("Fitted {} trees", trees.len());

        Ok(Self {
            params: params.clone(),
            n_features,
            n_classes,
            trees,
            feature_importances,
        })
    }

    /// Fraction of tree votes per class, one row per sample
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>, TrainingError> {
        self.check_width(x.ncols())?;
        let mut votes = Array2::<f64>::zeros((x.nrows(), self.n_classes));
        for member in &self.trees {
            let subset = x.select(Axis(1), &member.features);
            let predicted: Array1<usize> = member.tree.predict(&subset);
            for (row, &class) in predicted.iter().enumerate() {
                if class < self.n_classes {
                    votes[[row, class]] += 1.0;
                }
            }
        }
        votes /= self.trees.len() as f64;
        Ok(votes)
    }

    /// Majority vote, ties going to the lowest class index
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>, TrainingError> {
        let proba = self.predict_proba(x)?;
        Ok(proba.axis_iter(Axis(0)).map(|row| first_argmax(row.iter().copied())).collect())
    }

    /// Mean impurity decrease per feature, summing to 1
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Decision rules of every tree, in full-matrix feature indices
    pub fn tree_rules(&self) -> Result<Vec<TreeRule>, TrainingError> {
        self.trees
            .iter()
            .map(|m| Ok(TreeRule::from_tree(&m.tree)?.remap_features(&m.features)))
            .collect()
    }

    /// Parameters the forest was fitted with
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of input features
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn check_width(&self, width: usize) -> Result<(), TrainingError> {
        if width != self.n_features {
            return Err(TrainingError::ShapeMismatch {
                expected: self.n_features,
                actual: width,
            });
        }
        Ok(())
    }
}

/// Fit a single decision tree with the forest's stopping rules
pub(crate) fn fit_decision_tree(
    x: Array2<f64>,
    y: Array1<usize>,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
) -> Result<DecisionTree<f64, usize>, TrainingError> {
    let dataset = Dataset::new(x, y);
    DecisionTree::<f64, usize>::params()
        .split_quality(SplitQuality::Gini)
        .max_depth(max_depth)
        .min_weight_split(min_samples_split as f32)
        .min_weight_leaf(min_samples_leaf as f32)
        .fit(&dataset)
        .map_err(|e| TrainingError::Fit(e.to_string()))
}

fn fit_member(
    params: &ForestParams,
    x: &Array2<f64>,
    y: &[usize],
    k: usize,
    index: usize,
) -> Result<ForestTree, TrainingError> {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    rng.set_stream(index as u64);

    let n = x.nrows();
    let rows: Vec<usize> = if params.bootstrap {
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    } else {
        (0..n).collect()
    };

    let mut features = index::sample(&mut rng, x.ncols(), k).into_vec();
    features.sort_unstable();

    let records = x.select(Axis(0), &rows).select(Axis(1), &features);
    let targets: Array1<usize> = rows.iter().map(|&r| y[r]).collect();

    let tree = fit_decision_tree(
        records,
        targets,
        params.max_depth,
        params.min_samples_split,
        params.min_samples_leaf,
    )?;
    Ok(ForestTree { features, tree })
}

fn forest_importances(trees: &[ForestTree], n_features: usize) -> Result<Vec<f64>, TrainingError> {
    let mut total = vec![0.0; n_features];
    let mut contributing = 0usize;
    for member in trees {
        let rules = TreeRule::from_tree(&member.tree)?.remap_features(&member.features);
        let mut per_tree = vec![0.0; n_features];
        rules.accumulate_importance(&mut per_tree);
        let sum: f64 = per_tree.iter().sum();
        // Single-leaf trees carry no importance
        if sum > 0.0 {
            for (t, v) in total.iter_mut().zip(&per_tree) {
                *t += v / sum;
            }
            contributing += 1;
        }
    }

    if contributing > 0 {
        let sum: f64 = total.iter().sum();
        for t in &mut total {
            *t /= sum;
        }
    }
    Ok(total)
}

pub(crate) fn first_argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0usize, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::blobs;
    use proptest::prelude::*;

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 15,
            max_depth: Some(4),
            max_features: MaxFeatures::All,
            ..Default::default()
        }
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(49), 7);
        assert_eq!(MaxFeatures::Log2.resolve(61), 5);
        assert_eq!(MaxFeatures::All.resolve(10), 10);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
    }

    #[test]
    fn test_max_features_parse() {
        assert_eq!("sqrt".parse::<MaxFeatures>().unwrap(), MaxFeatures::Sqrt);
        assert_eq!("0.5".parse::<MaxFeatures>().unwrap(), MaxFeatures::Fraction(0.5));
        assert!("1.5".parse::<MaxFeatures>().is_err());
        assert!("half".parse::<MaxFeatures>().is_err());
    }

    #[test]
    fn test_default_params() {
        let params = ForestParams::default();
        assert_eq!(params.n_estimators, 200);
        assert_eq!(params.max_depth, Some(10));
        assert_eq!(params.seed, 42);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let params = ForestParams {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        let params = ForestParams {
            min_samples_split: 1,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_fits_separable_blobs() {
        let (x, y) = blobs(20, 1);
        let forest = RandomForest::fit(&small_params(), &x, &y, 3).unwrap();
        let predicted = forest.predict(&x).unwrap();
        let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 57, "only {} of 60 correct", correct);
        assert_eq!(forest.n_trees(), 15);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = blobs(10, 2);
        let forest = RandomForest::fit(&small_params(), &x, &y, 3).unwrap();
        let proba = forest.predict_proba(&x).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_importances_normalized_and_ignore_noise() {
        let (x, y) = blobs(20, 3);
        let forest = RandomForest::fit(&small_params(), &x, &y, 3).unwrap();
        let importances = forest.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        let informative = importances[0].max(importances[1]).max(importances[2]);
        assert!(informative > importances[3]);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = blobs(10, 4);
        let params = ForestParams {
            max_features: MaxFeatures::Sqrt,
            ..small_params()
        };
        let a = RandomForest::fit(&params, &x, &y, 3).unwrap();
        let b = RandomForest::fit(&params, &x, &y, 3).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_width_mismatch() {
        let (x, y) = blobs(5, 5);
        let forest = RandomForest::fit(&small_params(), &x, &y, 3).unwrap();
        let narrow = Array2::zeros((1, 2));
        assert!(matches!(
            forest.predict(&narrow),
            Err(TrainingError::ShapeMismatch { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_class() {
        let (x, _) = blobs(2, 6);
        let y = vec![0, 0, 1, 1, 2, 5];
        assert!(matches!(
            RandomForest::fit(&small_params(), &x, &y, 3),
            Err(TrainingError::ClassIndexOutOfRange(5))
        ));
    }

    #[test]
    fn test_tree_rules_match_library_predictions() {
        let (x, y) = blobs(15, 7);
        let forest = RandomForest::fit(&small_params(), &x, &y, 3).unwrap();
        let rules = forest.tree_rules().unwrap();
        assert_eq!(rules.len(), 15);
        for (member, rule) in forest.trees.iter().zip(&rules) {
            let predicted: Array1<usize> = member.tree.predict(&x.select(Axis(1), &member.features));
            for (row, &p) in x.axis_iter(Axis(0)).zip(predicted.iter()) {
                assert_eq!(rule.predict_row(row), p);
            }
        }
    }

    #[test]
    fn test_first_argmax_tie_break() {
        assert_eq!(first_argmax([0.4, 0.4, 0.2].into_iter()), 0);
        assert_eq!(first_argmax([0.1, 0.5, 0.5].into_iter()), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]
        #[test]
        fn prop_forest_reproducible_for_seed(seed in any::<u64>()) {
            let (x, y) = blobs(6, 9);
            let params = ForestParams { seed, n_estimators: 5, ..small_params() };
            let a = RandomForest::fit(&params, &x, &y, 3).unwrap();
            let b = RandomForest::fit(&params, &x, &y, 3).unwrap();
            prop_assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        }
    }
}
