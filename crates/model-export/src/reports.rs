//! CSV Evaluation Reports

use crate::ExportError;
use event_window::EventLabel;
use forest_trainer::{ClassificationReport, ConfusionMatrix};
use std::io::Write;

/// Per-class scores followed by accuracy and the two averages
pub fn write_classification_report<W: Write>(
    writer: W,
    report: &ClassificationReport,
) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["", "precision", "recall", "f1-score", "support"])?;
    for m in &report.classes {
        csv.write_record([
            m.label.as_str().to_string(),
            m.precision.to_string(),
            m.recall.to_string(),
            m.f1_score.to_string(),
            m.support.to_string(),
        ])?;
    }
    let accuracy = report.accuracy.to_string();
    csv.write_record([
        "accuracy".to_string(),
        accuracy.clone(),
        accuracy.clone(),
        accuracy,
        report.macro_avg.support.to_string(),
    ])?;
    for (name, avg) in [("macro avg", &report.macro_avg), ("weighted avg", &report.weighted_avg)] {
        csv.write_record([
            name.to_string(),
            avg.precision.to_string(),
            avg.recall.to_string(),
            avg.f1_score.to_string(),
            avg.support.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Counts with class names as row and column headers
pub fn write_confusion_matrix<W: Write>(
    writer: W,
    matrix: &ConfusionMatrix,
    classes: &[EventLabel],
) -> Result<(), ExportError> {
    if classes.len() != matrix.n_classes() {
        return Err(ExportError::LengthMismatch {
            expected: matrix.n_classes(),
            actual: classes.len(),
        });
    }
    let mut csv = csv::Writer::from_writer(writer);
    let mut header = vec![String::new()];
    header.extend(classes.iter().map(|c| c.as_str().to_string()));
    csv.write_record(&header)?;
    for (actual, label) in classes.iter().enumerate() {
        let mut row = vec![label.as_str().to_string()];
        row.extend((0..classes.len()).map(|p| matrix.get(actual, p).to_string()));
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

/// Feature importances sorted from most to least important
pub fn write_feature_importance<W: Write>(
    writer: W,
    names: &[String],
    importances: &[f64],
) -> Result<(), ExportError> {
    if names.len() != importances.len() {
        return Err(ExportError::LengthMismatch {
            expected: names.len(),
            actual: importances.len(),
        });
    }
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["Feature", "Importance"])?;
    for i in ranked(importances) {
        csv.write_record([names[i].clone(), importances[i].to_string()])?;
    }
    csv.flush()?;
    Ok(())
}

/// Indices ordered by descending value, ties in index order
pub(crate) fn ranked(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_csv() {
        let matrix = ConfusionMatrix::new(&[0, 0, 1], &[0, 1, 1], 2).unwrap();
        let mut out = Vec::new();
        write_confusion_matrix(&mut out, &matrix, &[EventLabel::Brake, EventLabel::Turn]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ",brake,turn\nbrake,1,1\nturn,0,1\n"
        );
    }

    #[test]
    fn test_feature_importance_sorted() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut out = Vec::new();
        write_feature_importance(&mut out, &names, &[0.2, 0.5, 0.3]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Feature,Importance\nb,0.5\nc,0.3\na,0.2\n"
        );
    }

    #[test]
    fn test_classification_report_rows() {
        let matrix = ConfusionMatrix::new(&[0, 1], &[0, 1], 2).unwrap();
        let report =
            ClassificationReport::new(&matrix, &[EventLabel::Bump, EventLabel::Normal]).unwrap();
        let mut out = Vec::new();
        write_classification_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], ",precision,recall,f1-score,support");
        assert_eq!(lines[1], "bump,1,1,1,1");
        assert_eq!(lines[3], "accuracy,1,1,1,2");
        assert_eq!(lines[5], "weighted avg,1,1,1,2");
    }

    #[test]
    fn test_ranked_is_stable() {
        assert_eq!(ranked(&[0.1, 0.3, 0.3, 0.0]), vec![1, 2, 0, 3]);
    }
}
