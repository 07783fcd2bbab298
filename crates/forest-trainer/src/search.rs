//! Hyperparameter Search
//!
//! Exhaustive grid search and cross-validation scoring over stratified
//! k-fold splits.

use crate::forest::{ForestParams, RandomForest};
use crate::metrics::{accuracy_score, f1_score, Average};
use crate::split::{SplitIndices, StratifiedKFold};
use crate::TrainingError;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Metric used to rank candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    Accuracy,
    F1Macro,
    #[default]
    F1Weighted,
}

impl Scoring {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Scoring::Accuracy => "accuracy",
            Scoring::F1Macro => "f1_macro",
            Scoring::F1Weighted => "f1_weighted",
        }
    }

    /// Score predictions against the truth
    pub fn score(&self, y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Result<f64, TrainingError> {
        match self {
            Scoring::Accuracy => Ok(accuracy_score(y_true, y_pred)),
            Scoring::F1Macro => f1_score(y_true, y_pred, n_classes, Average::Macro),
            Scoring::F1Weighted => f1_score(y_true, y_pred, n_classes, Average::Weighted),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scoring {
    type Err = TrainingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Scoring::Accuracy),
            "f1_macro" => Ok(Scoring::F1Macro),
            "f1_weighted" => Ok(Scoring::F1Weighted),
            other => Err(TrainingError::InvalidParameter(format!("unknown scoring: {}", other))),
        }
    }
}

/// Values to try for each hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl ParamGrid {
    /// Grid for the standard feature set (36 candidates)
    pub fn standard() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![Some(8), Some(10), Some(12)],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
        }
    }

    /// Wider grid for the extended feature set (108 candidates)
    pub fn extended() -> Self {
        Self {
            n_estimators: vec![50, 100, 200],
            max_depth: vec![Some(10), Some(20), Some(30), None],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }

    /// Preset by name
    pub fn preset(name: &str) -> Result<Self, TrainingError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::standard()),
            "extended" => Ok(Self::extended()),
            other => Err(TrainingError::InvalidParameter(format!("unknown grid preset: {}", other))),
        }
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
    }

    /// Check if the grid has no candidates
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cartesian product in declaration order, last field varying fastest
    pub fn candidates(&self, base: &ForestParams) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        out
    }
}

/// Cross-validation scores of one parameter set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScores {
    /// Score per fold
    pub scores: Vec<f64>,
    /// Mean over folds
    pub mean: f64,
    /// Population standard deviation over folds
    pub std: f64,
}

impl CvScores {
    fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let std = (scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n).sqrt();
        Self { scores, mean, std }
    }
}

/// Score of one grid candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub params: ForestParams,
    pub cv: CvScores,
}

/// Outcome of a grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSearchResult {
    pub best_params: ForestParams,
    pub best_score: f64,
    /// Every candidate in grid order
    pub results: Vec<CandidateScore>,
}

/// Exhaustive search over a parameter grid
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
    folds: StratifiedKFold,
    scoring: Scoring,
}

impl GridSearch {
    /// Create a new search
    pub fn new(grid: ParamGrid, folds: StratifiedKFold, scoring: Scoring) -> Self {
        Self { grid, folds, scoring }
    }

    /// Evaluate every candidate and pick the best mean CV score.
    ///
    /// Fields not covered by the grid are taken from `base`. Ties keep the
    /// earliest candidate.
    pub fn fit(
        &self,
        base: &ForestParams,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
    ) -> Result<GridSearchResult, TrainingError> {
        let candidates = self.grid.candidates(base);
        if candidates.is_empty() {
            return Err(TrainingError::EmptyGrid);
        }
        let splits = self.folds.split(y)?;
        info!(
            "Grid search: {} candidates x {} folds, scoring={}",
            candidates.len(),
            splits.len(),
            self.scoring
        );

        let mut results = Vec::with_capacity(candidates.len());
        let mut best: Option<(usize, f64)> = None;
        for (i, params) in candidates.into_iter().enumerate() {
            let cv = score_folds(&params, x, y, n_classes, &splits, self.scoring)?;
            debug!(
                "Candidate {}: n_estimators={} max_depth={:?} min_samples_split={} min_samples_leaf={} -> {:.4} (+/- {:.4})",
                i,
                params.n_estimators,
                params.max_depth,
                params.min_samples_split,
                params.min_samples_leaf,
                cv.mean,
                cv.std
            );
            if best.map_or(true, |(_, score)| cv.mean > score) {
                best = Some((i, cv.mean));
            }
            results.push(CandidateScore { params, cv });
        }

        let (best_index, best_score) = best.ok_or(TrainingError::EmptyGrid)?;
        let best_params = results[best_index].params.clone();
        info!("Best {} score: {:.4}", self.scoring, best_score);

        Ok(GridSearchResult {
            best_params,
            best_score,
            results,
        })
    }
}

/// Cross-validated scores of one parameter set
pub fn cross_val_score(
    params: &ForestParams,
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    folds: &StratifiedKFold,
    scoring: Scoring,
) -> Result<CvScores, TrainingError> {
    let splits = folds.split(y)?;
    score_folds(params, x, y, n_classes, &splits, scoring)
}

fn score_folds(
    params: &ForestParams,
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    splits: &[SplitIndices],
    scoring: Scoring,
) -> Result<CvScores, TrainingError> {
    if x.nrows() != y.len() {
        return Err(TrainingError::ShapeMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    let mut scores = Vec::with_capacity(splits.len());
    for split in splits {
        let x_train = x.select(Axis(0), &split.train);
        let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
        let x_test = x.select(Axis(0), &split.test);
        let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();

        let forest = RandomForest::fit(params, &x_train, &y_train, n_classes)?;
        let predicted = forest.predict(&x_test)?;
        scores.push(scoring.score(&y_test, &predicted, n_classes)?);
    }
    Ok(CvScores::from_scores(scores))
}
