//! Training Pipeline
//!
//! load -> window -> features -> scale -> split -> (grid search) -> fit ->
//! evaluate -> cross-validate -> persist -> export

use crate::settings::TrainingSettings;
use anyhow::{bail, Context, Result};
use data_validator::{CsvLoader, LoaderConfig, MinMaxScaler};
use event_window::{class_distribution, EventLabel, EventWindow, Windower};
use feature_engine::{FeatureExtractor, FeatureMatrix};
use forest_trainer::{
    cross_val_score, f1_score, save_postcard, Average, BundleMetrics, ClassificationReport,
    ConfusionMatrix, CvScores, ForestParams, GridSearch, GridSearchResult, LabelEncoder,
    ModelBundle, RandomForest, SurrogateTree,
};
use model_export::ArtifactWriter;
use ndarray::Axis;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything a training run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Saved model bundle
    pub bundle_path: PathBuf,
    /// Saved scaler
    pub scaler_path: PathBuf,
    /// Exported reports, sources and plots
    pub artifacts: Vec<PathBuf>,
    /// Events per class
    pub class_distribution: Vec<(EventLabel, usize)>,
    /// Events skipped for being shorter than a window
    pub skipped_events: usize,
    /// Held-out metrics
    pub metrics: BundleMetrics,
    /// Held-out classification report
    pub report: ClassificationReport,
    /// Parameters of the final forest
    pub best_params: ForestParams,
    /// Grid search outcome, when enabled
    pub grid: Option<GridSearchResult>,
    /// K-fold scores of the final parameters over all events
    pub cv: CvScores,
    /// Held-out accuracy of the exported decision tree
    pub surrogate_accuracy: Option<f64>,
    /// `(feature, importance)` sorted by importance
    pub top_features: Vec<(String, f64)>,
}

/// Load a labeled recording and group it into event windows
pub fn load_windows(settings: &TrainingSettings, path: &Path) -> Result<(Vec<EventWindow>, usize)> {
    load_recording(settings, path, false)
}

/// Load a recording, optionally keeping unannotated rows, and window it
pub(crate) fn load_recording(
    settings: &TrainingSettings,
    path: &Path,
    keep_unlabeled: bool,
) -> Result<(Vec<EventWindow>, usize)> {
    let loader = CsvLoader::new(LoaderConfig {
        skip_rows: settings.data.skip_rows,
        unknown_label: settings.data.unknown_label.clone(),
        keep_unlabeled,
    });
    let data = loader
        .load_path(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let windower = Windower::new(settings.window.clone()).context("Invalid window settings")?;
    let report = windower.group(data.samples);
    if report.windows.is_empty() {
        bail!(
            "No complete {}-sample event windows in {} ({} events too short)",
            windower.config().window_size,
            path.display(),
            report.skipped_short
        );
    }
    Ok((report.windows, report.skipped_short))
}

/// Compute the feature matrix of a recording and write it as CSV
pub fn export_features(settings: &TrainingSettings, data: &Path, output: &Path) -> Result<FeatureMatrix> {
    let (windows, _) = load_windows(settings, data)?;
    let extractor = FeatureExtractor::new(settings.features.set, settings.window.sample_rate_hz);
    let matrix = extractor.extract_all(&windows)?;

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    matrix.write_csv(File::create(output)?)?;
    info!(
        "Wrote {} x {} feature matrix to {}",
        matrix.n_events(),
        matrix.n_features(),
        output.display()
    );
    Ok(matrix)
}

/// Run the full training pipeline
pub fn run_training(settings: &TrainingSettings) -> Result<TrainingOutcome> {
    let data_path = settings
        .data
        .path
        .as_deref()
        .context("No training data given (--data or data.path)")?;

    info!("[1] Loading labeled events");
    let (windows, skipped_events) = load_windows(settings, data_path)?;
    let distribution = class_distribution(&windows);
    info!("{} events:", windows.len());
    for (label, count) in &distribution {
        let share = 100.0 * *count as f64 / windows.len() as f64;
        info!("    {:<8} {:>5} ({:.1}%)", label.as_str(), count, share);
        if *count < settings.cross_validation.folds {
            warn!("Class {} has only {} events", label, count);
        }
    }

    info!("[2] Extracting {} features", settings.features.set);
    let extractor = FeatureExtractor::new(settings.features.set, settings.window.sample_rate_hz);
    let matrix = extractor.extract_all(&windows)?;
    let encoder = LabelEncoder::fit(&matrix.labels)?;
    let y = encoder.encode_all(&matrix.labels)?;
    let n_classes = encoder.n_classes();

    info!("[3] Scaling features (MinMax)");
    let (scaler, x) = MinMaxScaler::fit_transform(&matrix.records)?;

    info!("[4] Stratified split (test_size={})", settings.split.test_size);
    let split = forest_trainer::train_test_split_stratified(&y, settings.split.test_size, settings.seed)?;
    let x_train = x.select(Axis(0), &split.train);
    let x_test = x.select(Axis(0), &split.test);
    let y_train: Vec<usize> = split.train.iter().map(|&i| y[i]).collect();
    let y_test: Vec<usize> = split.test.iter().map(|&i| y[i]).collect();
    info!("Training set: {} events, test set: {} events", y_train.len(), y_test.len());

    let base = settings.forest_params()?;
    let (best_params, grid) = if settings.grid_search.enabled {
        info!("[5] Grid search ({} preset)", settings.grid_preset());
        let search = GridSearch::new(settings.param_grid()?, settings.grid_folds(), settings.grid_scoring());
        let result = search.fit(&base, &x_train, &y_train, n_classes)?;
        info!(
            "Best parameters: n_estimators={} max_depth={:?} min_samples_split={} min_samples_leaf={}",
            result.best_params.n_estimators,
            result.best_params.max_depth,
            result.best_params.min_samples_split,
            result.best_params.min_samples_leaf
        );
        (result.best_params.clone(), Some(result))
    } else {
        (base, None)
    };

    info!("[6] Training final forest ({} trees)", best_params.n_estimators);
    let forest = RandomForest::fit(&best_params, &x_train, &y_train, n_classes)?;

    info!("[7] Evaluating on held-out events");
    let y_pred = forest.predict(&x_test)?;
    let matrix_cm = ConfusionMatrix::new(&y_test, &y_pred, n_classes)?;
    let report = ClassificationReport::new(&matrix_cm, encoder.classes())?;
    let metrics = BundleMetrics {
        accuracy: report.accuracy,
        f1_macro: f1_score(&y_test, &y_pred, n_classes, Average::Macro)?,
        f1_weighted: f1_score(&y_test, &y_pred, n_classes, Average::Weighted)?,
    };
    info!(
        "Accuracy: {:.1}%  Macro F1: {:.4}  Weighted F1: {:.4}",
        metrics.accuracy * 100.0,
        metrics.f1_macro,
        metrics.f1_weighted
    );
    info!("Classification report:\n{}", report.to_text());

    let cv = cross_val_score(
        &best_params,
        &x,
        &y,
        n_classes,
        &settings.folds(),
        settings.cross_validation.scoring,
    )?;
    info!(
        "{}-fold CV {}: {:.4} (+/- {:.4})",
        cv.scores.len(),
        settings.cross_validation.scoring,
        cv.mean,
        cv.std * 2.0
    );

    let importances = forest.feature_importances().to_vec();
    let mut top_features: Vec<(String, f64)> = matrix
        .names
        .iter()
        .cloned()
        .zip(importances.iter().copied())
        .collect();
    top_features.sort_by(|a, b| b.1.total_cmp(&a.1));
    for (rank, (name, importance)) in top_features.iter().take(10).enumerate() {
        debug!("    {:<3} {:<30} {:.4}", rank + 1, name, importance);
    }

    info!("[8] Saving model");
    let bundle_path = settings.export.output.clone();
    let scaler_path = settings.scaler_path();
    let writer = ArtifactWriter::new(settings.output_dir())?;
    let bundle = ModelBundle::new(
        extractor.feature_set(),
        settings.window.clone(),
        &encoder,
        scaler,
        forest,
        metrics,
    )?;
    bundle.save(&bundle_path)?;
    save_postcard(&scaler_path, &bundle.scaler)?;
    info!("Saved scaler to {}", scaler_path.display());

    info!("[9] Exporting artifacts to {}", writer.dir().display());
    let mut artifacts = vec![
        writer.model_config(&bundle)?,
        writer.classification_report(&report)?,
        writer.confusion_matrix(&matrix_cm, encoder.classes())?,
        writer.feature_importance(&matrix.names, &importances)?,
    ];

    let surrogate_accuracy = if settings.export.c_export {
        let tree = SurrogateTree::fit(&x_train, &y_train, settings.export.surrogate_depth, n_classes)?;
        let accuracy = tree.accuracy(&x_test, &y_test)?;
        info!("Simplified decision tree accuracy: {:.4}", accuracy);
        artifacts.push(writer.feature_header(&bundle)?);
        artifacts.push(writer.tree_source(tree.rules(), encoder.classes(), accuracy)?);
        Some(accuracy)
    } else {
        None
    };

    if settings.export.plots {
        artifacts.push(writer.confusion_matrix_plot(&matrix_cm)?);
        artifacts.push(writer.feature_importance_plot(
            &matrix.names,
            &importances,
            settings.export.top_features,
        )?);
    }

    info!("[10] Summary");
    info!("Model: Random Forest ({} trees)", best_params.n_estimators);
    info!("Features: {}", matrix.n_features());
    info!(
        "Classes: {} ({})",
        n_classes,
        encoder
            .classes()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("Test accuracy: {:.2}%", metrics.accuracy * 100.0);
    if let Some(accuracy) = surrogate_accuracy {
        info!("Simplified tree accuracy: {:.2}%", accuracy * 100.0);
    }

    Ok(TrainingOutcome {
        bundle_path,
        scaler_path,
        artifacts,
        class_distribution: distribution,
        skipped_events,
        metrics,
        report,
        best_params,
        grid,
        cv,
        surrogate_accuracy,
        top_features,
    })
}
