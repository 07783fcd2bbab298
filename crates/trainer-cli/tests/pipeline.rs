//! End-to-end training on a synthetic recording

use event_window::EventLabel;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use trainer_cli::{export_features, run_prediction, run_training, TrainingSettings};

const EVENTS_PER_CLASS: usize = 8;
const SAMPLES: usize = 150;

/// Deterministic jitter in [-0.5, 0.5)
fn jitter(event: usize, i: usize, channel: usize) -> f64 {
    ((i * 7919 + event * 104_729 + channel * 1_299_709) % 1000) as f64 / 1000.0 - 0.5
}

fn sample(label: EventLabel, event: usize, i: usize) -> [f64; 6] {
    let t = i as f64 / 50.0;
    let phase = event as f64 * 0.37;
    let j = |c: usize| jitter(event, i, c);
    match label {
        EventLabel::Brake => [-0.6 + 0.05 * j(0), 0.02 * j(1), 1.0 + 0.02 * j(2), 2.0 * j(3), 2.0 * j(4), 2.0 * j(5)],
        EventLabel::Bump => [
            0.05 * j(0),
            0.05 * j(1),
            1.0 + 1.5 * (2.0 * std::f64::consts::PI * 8.0 * t + phase).sin(),
            10.0 * j(3),
            5.0 * j(4),
            2.0 * j(5),
        ],
        EventLabel::Crash => {
            let spike = if (60..80).contains(&i) { 4.0 } else { 0.0 };
            [
                spike * 0.5 + 0.3 * j(0),
                spike * 0.3 + 0.3 * j(1),
                1.0 + spike + 0.3 * j(2),
                150.0 * (t * 9.0 + phase).sin(),
                120.0 * (t * 7.0).cos(),
                80.0 * j(5),
            ]
        }
        EventLabel::Normal => [0.03 * j(0), 0.03 * j(1), 1.0 + 0.03 * j(2), 1.0 * j(3), 1.0 * j(4), 1.0 * j(5)],
        EventLabel::Turn => [
            0.05 * j(0),
            0.35 + 0.05 * j(1),
            0.95 + 0.03 * j(2),
            3.0 * j(3),
            3.0 * j(4),
            45.0 + 5.0 * (t + phase).sin(),
        ],
    }
}

fn write_recording(dir: &Path) -> PathBuf {
    let mut csv = String::from("event_id,sample_idx,label,accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z\n");
    let mut event_id = 0;
    for label in EventLabel::ALL {
        for event in 0..EVENTS_PER_CLASS {
            for i in 0..SAMPLES {
                let s = sample(label, event, i);
                writeln!(
                    csv,
                    "{},{},{},{},{},{},{},{},{}",
                    event_id, i, label, s[0], s[1], s[2], s[3], s[4], s[5]
                )
                .unwrap();
            }
            event_id += 1;
        }
    }
    // An event that was never annotated, and one too short for a window
    csv.push_str("999,0,unknown,0,0,1,0,0,0\n");
    csv.push_str("1000,0,normal,0,0,1,0,0,0\n");

    let path = dir.join("labeled_events.csv");
    fs::write(&path, csv).unwrap();
    path
}

fn settings(dir: &Path, data: PathBuf) -> TrainingSettings {
    let mut settings = TrainingSettings::default();
    settings.data.path = Some(data);
    settings.forest.n_estimators = 20;
    settings.forest.max_features = "0.5".to_string();
    settings.export.output = dir.join("models").join("rf_classifier.bin");
    settings.export.plots = true;
    settings
}

#[test]
fn test_training_writes_every_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_recording(dir.path());
    let outcome = run_training(&settings(dir.path(), data)).unwrap();

    assert_eq!(outcome.class_distribution.len(), 5);
    assert!(outcome.class_distribution.iter().all(|(_, n)| *n == EVENTS_PER_CLASS));
    assert_eq!(outcome.skipped_events, 1);
    assert!(outcome.metrics.accuracy >= 0.75, "accuracy {}", outcome.metrics.accuracy);
    assert_eq!(outcome.cv.scores.len(), 5);
    assert!(outcome.surrogate_accuracy.is_some());
    assert!(outcome.grid.is_none());

    assert!(outcome.bundle_path.is_file());
    assert!(outcome.scaler_path.ends_with("rf_classifier_scaler.bin"));
    assert!(outcome.scaler_path.is_file());
    let models = dir.path().join("models");
    for name in [
        "model_config.json",
        "classification_report.csv",
        "confusion_matrix.csv",
        "feature_importance.csv",
        "feature_indices.h",
        "classifier_tree.c",
        "confusion_matrix.png",
        "feature_importance.png",
    ] {
        assert!(models.join(name).is_file(), "missing {}", name);
    }
    assert_eq!(outcome.artifacts.len(), 8);

    let header = fs::read_to_string(models.join("feature_indices.h")).unwrap();
    assert!(header.contains("#define N_FEATURES 49"));
    assert!(header.contains("#define CLASS_TURN 4"));
    let config = fs::read_to_string(models.join("model_config.json")).unwrap();
    assert!(config.contains("\"turn\": 4"));
    let tree = fs::read_to_string(models.join("classifier_tree.c")).unwrap();
    assert!(tree.contains("int classify_event(float* features) {"));

    let importance_total: f64 = outcome.top_features.iter().map(|(_, v)| v).sum();
    assert!((importance_total - 1.0).abs() < 1e-6);
}

#[test]
fn test_saved_model_predicts_recording() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_recording(dir.path());
    let settings = settings(dir.path(), data.clone());
    let outcome = run_training(&settings).unwrap();

    let predictions = run_prediction(&settings, &outcome.bundle_path, &data).unwrap();
    assert_eq!(predictions.len(), 5 * EVENTS_PER_CLASS);
    assert!(predictions.iter().all(|p| p.actual.is_some()));
    let correct = predictions
        .iter()
        .filter(|p| p.actual == Some(p.prediction.label))
        .count();
    assert!(correct >= 36, "only {} correct", correct);
}

#[test]
fn test_saved_model_predicts_unannotated_recording() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_recording(dir.path());
    let settings = settings(dir.path(), data);
    let outcome = run_training(&settings).unwrap();

    // A fresh ride nobody has labeled yet: one crash-like and one calm event
    let mut csv = String::from("event_id,sample_idx,label,accel_x,accel_y,accel_z,gyro_x,gyro_y,gyro_z\n");
    for (event_id, label, blank) in [("fresh-1", EventLabel::Crash, "unknown"), ("fresh-2", EventLabel::Normal, "")] {
        for i in 0..SAMPLES {
            let s = sample(label, 3, i);
            writeln!(
                csv,
                "{},{},{},{},{},{},{},{},{}",
                event_id, i, blank, s[0], s[1], s[2], s[3], s[4], s[5]
            )
            .unwrap();
        }
    }
    let fresh = dir.path().join("fresh.csv");
    fs::write(&fresh, csv).unwrap();

    let predictions = run_prediction(&settings, &outcome.bundle_path, &fresh).unwrap();
    assert_eq!(predictions.len(), 2);
    assert!(predictions.iter().all(|p| p.actual.is_none()));
    assert_eq!(predictions[0].event_id, "fresh-1");
    assert_eq!(predictions[0].prediction.label, EventLabel::Crash);
    assert_eq!(predictions[1].prediction.label, EventLabel::Normal);
}

#[test]
fn test_feature_export() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_recording(dir.path());
    let settings = settings(dir.path(), data.clone());
    let output = dir.path().join("features").join("features.csv");

    let matrix = export_features(&settings, &data, &output).unwrap();
    assert_eq!(matrix.n_events(), 5 * EVENTS_PER_CLASS);
    let text = fs::read_to_string(&output).unwrap();
    assert_eq!(text.lines().count(), 1 + 5 * EVENTS_PER_CLASS);
}

#[test]
fn test_training_without_data_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = settings(dir.path(), PathBuf::new());
    settings.data.path = None;
    assert!(run_training(&settings).is_err());
}
