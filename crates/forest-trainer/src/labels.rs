//! Label Encoding

use crate::TrainingError;
use event_window::EventLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maps event labels to contiguous class indices in sorted label order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<EventLabel>,
}

impl LabelEncoder {
    /// Fit on the labels present in a dataset
    pub fn fit(labels: &[EventLabel]) -> Result<Self, TrainingError> {
        let classes: Vec<EventLabel> = labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        Self::from_classes(classes)
    }

    /// Rebuild an encoder from a stored class list
    pub fn from_classes(mut classes: Vec<EventLabel>) -> Result<Self, TrainingError> {
        if classes.is_empty() {
            return Err(TrainingError::InvalidParameter("no classes to encode".to_string()));
        }
        classes.sort();
        classes.dedup();
        Ok(Self { classes })
    }

    /// Class index of a label
    pub fn encode(&self, label: EventLabel) -> Result<usize, TrainingError> {
        self.classes
            .binary_search(&label)
            .map_err(|_| TrainingError::UnknownClass(label))
    }

    /// Encode every label
    pub fn encode_all(&self, labels: &[EventLabel]) -> Result<Vec<usize>, TrainingError> {
        labels.iter().map(|&l| self.encode(l)).collect()
    }

    /// Label of a class index
    pub fn decode(&self, index: usize) -> Result<EventLabel, TrainingError> {
        self.classes
            .get(index)
            .copied()
            .ok_or(TrainingError::ClassIndexOutOfRange(index))
    }

    /// Known classes in index order
    pub fn classes(&self) -> &[EventLabel] {
        &self.classes
    }

    /// Number of classes
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// `(label, index)` pairs
    pub fn class_encoding(&self) -> Vec<(EventLabel, usize)> {
        self.classes.iter().enumerate().map(|(i, &l)| (l, i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_sorted_alphabetically() {
        let encoder = LabelEncoder::fit(&[
            EventLabel::Turn,
            EventLabel::Brake,
            EventLabel::Normal,
            EventLabel::Brake,
        ])
        .unwrap();
        assert_eq!(
            encoder.classes(),
            &[EventLabel::Brake, EventLabel::Normal, EventLabel::Turn]
        );
        assert_eq!(encoder.encode(EventLabel::Normal).unwrap(), 1);
        assert_eq!(encoder.decode(2).unwrap(), EventLabel::Turn);
    }

    #[test]
    fn test_unknown_class_rejected() {
        let encoder = LabelEncoder::fit(&[EventLabel::Bump]).unwrap();
        assert!(matches!(
            encoder.encode(EventLabel::Crash),
            Err(TrainingError::UnknownClass(EventLabel::Crash))
        ));
        assert!(encoder.decode(1).is_err());
    }

    #[test]
    fn test_empty_fit_fails() {
        assert!(LabelEncoder::fit(&[]).is_err());
    }

    #[test]
    fn test_class_encoding_pairs() {
        let encoder = LabelEncoder::fit(&EventLabel::ALL).unwrap();
        let pairs = encoder.class_encoding();
        assert_eq!(pairs.len(), 5);
        assert_eq!(pairs[0], (EventLabel::Brake, 0));
        assert_eq!(pairs[4], (EventLabel::Turn, 4));
    }
}
