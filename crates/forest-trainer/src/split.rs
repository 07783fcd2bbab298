//! Stratified Splitting
//!
//! Train/test splitting and k-fold assignment that keep every class
//! represented in proportion to its share of the dataset.

use crate::TrainingError;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Row indices of a train/test split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    /// Training rows
    pub train: Vec<usize>,
    /// Held-out rows
    pub test: Vec<usize>,
}

/// Split rows into train and test sets preserving class proportions.
///
/// The test set holds `ceil(test_size * n)` rows, distributed over classes by
/// largest remainder. Every class keeps at least one training row.
pub fn train_test_split_stratified(
    targets: &[usize],
    test_size: f64,
    seed: u64,
) -> Result<SplitIndices, TrainingError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TrainingError::InvalidParameter(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n = targets.len();
    let groups = group_by_class(targets);
    if let Some((class, members)) = groups.iter().find(|(_, m)| m.len() < 2) {
        return Err(TrainingError::InvalidSplit(format!(
            "class {} has only {} member(s), at least 2 are required",
            class,
            members.len()
        )));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test < groups.len() || n_train < groups.len() {
        return Err(TrainingError::InvalidSplit(format!(
            "{} train / {} test rows cannot hold {} classes",
            n_train,
            n_test,
            groups.len()
        )));
    }

    let counts: Vec<usize> = groups.values().map(Vec::len).collect();
    let allocation = allocate(&counts, n_test, n)?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for ((class, members), &take) in groups.into_iter().zip(&allocation) {
        let mut members = members;
        members.shuffle(&mut rng);
        debug!("Class {}: {} test / {} train", class, take, members.len() - take);
        test.extend_from_slice(&members[..take]);
        train.extend_from_slice(&members[take..]);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(SplitIndices { train, test })
}

/// Stratified k-fold cross-validation splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    /// Number of folds
    pub n_splits: usize,
    /// Shuffle members of each class before dealing them out
    pub shuffle: bool,
    /// Seed used when shuffling
    pub seed: u64,
}

impl StratifiedKFold {
    /// Create an unshuffled splitter
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            seed: 0,
        }
    }

    /// Shuffle class members with the given seed
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    /// Produce one `(train, test)` pair per fold
    pub fn split(&self, targets: &[usize]) -> Result<Vec<SplitIndices>, TrainingError> {
        let n = targets.len();
        if self.n_splits < 2 {
            return Err(TrainingError::InvalidParameter(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n {
            return Err(TrainingError::InvalidSplit(format!(
                "cannot make {} folds from {} samples",
                self.n_splits, n
            )));
        }

        let groups = group_by_class(targets);
        if let Some(smallest) = groups.values().map(Vec::len).min() {
            if smallest < self.n_splits {
                warn!(
                    "Smallest class has {} members, fewer than {} folds",
                    smallest, self.n_splits
                );
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut fold_of = vec![0usize; n];
        // A single running counter keeps fold sizes within one of each other
        let mut next = 0usize;
        for (_, mut members) in groups {
            if self.shuffle {
                members.shuffle(&mut rng);
            }
            for idx in members {
                fold_of[idx] = next % self.n_splits;
                next += 1;
            }
        }

        Ok((0..self.n_splits)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n).partition(|&i| fold_of[i] == fold);
                SplitIndices { train, test }
            })
            .collect())
    }
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self::new(5)
    }
}

fn group_by_class(targets: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &class) in targets.iter().enumerate() {
        groups.entry(class).or_default().push(i);
    }
    groups
}

/// Largest-remainder allocation of `n_draw` rows over class counts, capped
/// so each class keeps one row back.
fn allocate(counts: &[usize], n_draw: usize, n_total: usize) -> Result<Vec<usize>, TrainingError> {
    let mut allocation: Vec<usize> = counts.iter().map(|&c| c * n_draw / n_total).collect();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = counts[a] * n_draw % n_total;
        let rb = counts[b] * n_draw % n_total;
        rb.cmp(&ra).then(counts[b].cmp(&counts[a])).then(a.cmp(&b))
    });

    let mut left = n_draw - allocation.iter().sum::<usize>();
    while left > 0 {
        let mut progressed = false;
        for &class in &order {
            if left == 0 {
                break;
            }
            if allocation[class] + 1 < counts[class] {
                allocation[class] += 1;
                left -= 1;
                progressed = true;
            }
        }
        if !progressed {
            return Err(TrainingError::InvalidSplit(
                "not enough rows to keep every class in training".to_string(),
            ));
        }
    }
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn targets(counts: &[usize]) -> Vec<usize> {
        counts
            .iter()
            .enumerate()
            .flat_map(|(class, &c)| std::iter::repeat(class).take(c))
            .collect()
    }

    fn class_count(rows: &[usize], y: &[usize], class: usize) -> usize {
        rows.iter().filter(|&&i| y[i] == class).count()
    }

    #[test]
    fn test_split_sizes_and_proportions() {
        let y = targets(&[50, 30, 20]);
        let split = train_test_split_stratified(&y, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        assert_eq!(class_count(&split.test, &y, 0), 10);
        assert_eq!(class_count(&split.test, &y, 1), 6);
        assert_eq!(class_count(&split.test, &y, 2), 4);
    }

    #[test]
    fn test_split_is_reproducible() {
        let y = targets(&[12, 9, 7]);
        let a = train_test_split_stratified(&y, 0.25, 7).unwrap();
        let b = train_test_split_stratified(&y, 0.25, 7).unwrap();
        assert_eq!(a, b);
        let c = train_test_split_stratified(&y, 0.25, 8).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_partitions_rows() {
        let y = targets(&[10, 10]);
        let split = train_test_split_stratified(&y, 0.3, 1).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_singleton_class_rejected() {
        let y = targets(&[10, 1]);
        assert!(matches!(
            train_test_split_stratified(&y, 0.2, 42),
            Err(TrainingError::InvalidSplit(_))
        ));
    }

    #[test]
    fn test_invalid_test_size() {
        let y = targets(&[5, 5]);
        assert!(train_test_split_stratified(&y, 0.0, 42).is_err());
        assert!(train_test_split_stratified(&y, 1.0, 42).is_err());
        assert!(train_test_split_stratified(&y, f64::NAN, 42).is_err());
    }

    #[test]
    fn test_too_small_test_side() {
        // ceil(0.1 * 6) = 1 test row cannot hold 3 classes
        let y = targets(&[2, 2, 2]);
        assert!(matches!(
            train_test_split_stratified(&y, 0.1, 42),
            Err(TrainingError::InvalidSplit(_))
        ));
    }

    #[test]
    fn test_kfold_balances_classes() {
        let y = targets(&[10, 5]);
        let folds = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.test.len(), 3);
            assert_eq!(class_count(&fold.test, &y, 0), 2);
            assert_eq!(class_count(&fold.test, &y, 1), 1);
            assert_eq!(fold.train.len() + fold.test.len(), 15);
        }
    }

    #[test]
    fn test_kfold_each_row_tested_once() {
        let y = targets(&[7, 6, 4]);
        let folds = StratifiedKFold::new(3).with_shuffle(3).split(&y).unwrap();
        let mut seen = vec![0; y.len()];
        for fold in &folds {
            for &i in &fold.test {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&s| s == 1));
    }

    #[test]
    fn test_kfold_rejects_bad_fold_counts() {
        let y = targets(&[3, 3]);
        assert!(StratifiedKFold::new(1).split(&y).is_err());
        assert!(StratifiedKFold::new(7).split(&y).is_err());
    }

    proptest! {
        #[test]
        fn prop_split_preserves_proportions(
            counts in proptest::collection::vec(4usize..40, 2..6),
            test_size in 0.25f64..0.4,
            seed in any::<u64>(),
        ) {
            let y = targets(&counts);
            let n = y.len();
            let split = train_test_split_stratified(&y, test_size, seed).unwrap();
            let n_test = (test_size * n as f64).ceil() as usize;
            prop_assert_eq!(split.test.len(), n_test);
            for (class, &c) in counts.iter().enumerate() {
                let quota = c as f64 * n_test as f64 / n as f64;
                let got = class_count(&split.test, &y, class) as f64;
                prop_assert!((got - quota).abs() < 1.0);
                prop_assert!(class_count(&split.train, &y, class) >= 1);
            }
            prop_assert_eq!(&split, &train_test_split_stratified(&y, test_size, seed).unwrap());
        }
    }
}
