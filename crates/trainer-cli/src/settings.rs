//! Training Settings
//!
//! Layered configuration: built-in defaults, then an optional TOML file,
//! then `LUMA__SECTION__KEY` environment variables. Command line flags are
//! applied on top by the binary.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use event_window::WindowConfig;
use feature_engine::FeatureSet;
use forest_trainer::{ForestParams, MaxFeatures, ParamGrid, Scoring, StratifiedKFold};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "LUMA";

/// Input recording options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    /// Labeled CSV recording
    pub path: Option<PathBuf>,
    /// Lines to skip before the header
    pub skip_rows: usize,
    /// Label of rows that were never annotated
    pub unknown_label: String,
}

/// Feature layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSettings {
    pub set: FeatureSet,
}

/// Train/test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSettings {
    /// Held-out fraction
    pub test_size: f64,
}

/// Fixed forest hyperparameters, used when grid search is off
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestSettings {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// `all`, `sqrt`, `log2` or a fraction
    pub max_features: String,
    pub bootstrap: bool,
}

/// Hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchSettings {
    pub enabled: bool,
    /// `standard` or `extended`; follows the feature set when unset
    pub preset: Option<String>,
    /// Ranking metric; follows the preset when unset
    pub scoring: Option<Scoring>,
}

/// K-fold cross-validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationSettings {
    pub folds: usize,
    pub shuffle: bool,
    pub scoring: Scoring,
}

/// Artifact output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Model bundle path; other artifacts go next to it
    pub output: PathBuf,
    /// Render PNG plots
    pub plots: bool,
    /// Write `feature_indices.h` and `classifier_tree.c`
    pub c_export: bool,
    /// Depth of the exported decision tree
    pub surrogate_depth: usize,
    /// Bars in the importance plot
    pub top_features: usize,
}

/// All training settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Seed for splitting, folds and forests
    pub seed: u64,
    pub data: DataSettings,
    pub window: WindowConfig,
    pub features: FeatureSettings,
    pub split: SplitSettings,
    pub forest: ForestSettings,
    pub grid_search: GridSearchSettings,
    pub cross_validation: CrossValidationSettings,
    pub export: ExportSettings,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            data: DataSettings {
                path: None,
                skip_rows: 0,
                unknown_label: "unknown".to_string(),
            },
            window: WindowConfig::default(),
            features: FeatureSettings {
                set: FeatureSet::Standard,
            },
            split: SplitSettings { test_size: 0.2 },
            forest: ForestSettings {
                n_estimators: 200,
                max_depth: Some(10),
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features: "sqrt".to_string(),
                bootstrap: true,
            },
            grid_search: GridSearchSettings {
                enabled: false,
                preset: None,
                scoring: None,
            },
            cross_validation: CrossValidationSettings {
                folds: 5,
                shuffle: false,
                scoring: Scoring::F1Macro,
            },
            export: ExportSettings {
                output: PathBuf::from("models/rf_classifier.bin"),
                plots: false,
                c_export: true,
                surrogate_depth: forest_trainer::DEFAULT_SURROGATE_DEPTH,
                top_features: model_export::DEFAULT_TOP_N,
            },
        }
    }
}

impl TrainingSettings {
    /// Load defaults, an optional file and environment overrides
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default()).context("Failed to encode default settings")?;
        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Self = builder
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        Ok(settings)
    }

    /// Forest parameters for a fixed-parameter run, also the base of a grid search
    pub fn forest_params(&self) -> Result<ForestParams> {
        let max_features: MaxFeatures = self
            .forest
            .max_features
            .parse()
            .context("Invalid forest.max_features")?;
        let params = ForestParams {
            n_estimators: self.forest.n_estimators,
            max_depth: self.forest.max_depth,
            min_samples_split: self.forest.min_samples_split,
            min_samples_leaf: self.forest.min_samples_leaf,
            max_features,
            bootstrap: self.forest.bootstrap,
            seed: self.seed,
        };
        params.validate()?;
        Ok(params)
    }

    /// Grid preset name in effect
    pub fn grid_preset(&self) -> &str {
        match &self.grid_search.preset {
            Some(name) => name,
            None => self.features.set.as_str(),
        }
    }

    /// Parameter grid in effect
    pub fn param_grid(&self) -> Result<ParamGrid> {
        Ok(ParamGrid::preset(self.grid_preset())?)
    }

    /// Grid ranking metric: weighted F1 for the standard grid, macro F1 for the extended one
    pub fn grid_scoring(&self) -> Scoring {
        self.grid_search.scoring.unwrap_or(match self.grid_preset() {
            "extended" => Scoring::F1Macro,
            _ => Scoring::F1Weighted,
        })
    }

    /// Fold splitter for cross-validation
    pub fn folds(&self) -> StratifiedKFold {
        let folds = StratifiedKFold::new(self.cross_validation.folds);
        if self.cross_validation.shuffle {
            folds.with_shuffle(self.seed)
        } else {
            folds
        }
    }

    /// Fold splitter for grid search; the extended grid always shuffles with `seed`
    pub fn grid_folds(&self) -> StratifiedKFold {
        match self.grid_preset() {
            "extended" => StratifiedKFold::new(self.cross_validation.folds).with_shuffle(self.seed),
            _ => self.folds(),
        }
    }

    /// Scaler artifact path, `<stem>_scaler.bin` next to the model
    pub fn scaler_path(&self) -> PathBuf {
        let output = &self.export.output;
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        output.with_file_name(format!("{}_scaler.bin", stem))
    }

    /// Directory receiving the exported artifacts
    pub fn output_dir(&self) -> PathBuf {
        match self.export.output.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = TrainingSettings::default();
        assert_eq!(settings.seed, 42);
        assert_eq!(settings.split.test_size, 0.2);
        assert_eq!(settings.forest.n_estimators, 200);
        assert!(!settings.grid_search.enabled);
        assert_eq!(settings.grid_preset(), "standard");
        assert_eq!(settings.grid_scoring(), Scoring::F1Weighted);
        let params = settings.forest_params().unwrap();
        assert_eq!(params.max_depth, Some(10));
        assert_eq!(params.max_features, MaxFeatures::Sqrt);
    }

    #[test]
    fn test_extended_set_switches_grid_and_scoring() {
        let mut settings = TrainingSettings::default();
        settings.features.set = FeatureSet::Extended;
        assert_eq!(settings.grid_preset(), "extended");
        assert_eq!(settings.grid_scoring(), Scoring::F1Macro);
        assert_eq!(settings.param_grid().unwrap().len(), 108);
    }

    #[test]
    fn test_extended_grid_folds_are_shuffled() {
        let mut settings = TrainingSettings::default();
        assert!(!settings.grid_folds().shuffle);

        settings.seed = 9;
        settings.grid_search.preset = Some("extended".to_string());
        let folds = settings.grid_folds();
        assert!(folds.shuffle);
        assert_eq!(folds.seed, 9);
        assert_eq!(folds.n_splits, 5);
        // Final cross-validation keeps its own setting
        assert!(!settings.folds().shuffle);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "seed = 7\n\n[forest]\nn_estimators = 25\nmax_features = \"0.5\"\n\n[window]\nwindow_size = 100\n\n[features]\nset = \"extended\"\n"
        )
        .unwrap();

        let settings = TrainingSettings::load(Some(file.path())).unwrap();
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.forest.n_estimators, 25);
        assert_eq!(settings.forest.max_depth, Some(10));
        assert_eq!(settings.window.window_size, 100);
        assert_eq!(settings.features.set, FeatureSet::Extended);
        assert_eq!(settings.forest_params().unwrap().max_features, MaxFeatures::Fraction(0.5));
    }

    #[test]
    fn test_artifact_paths() {
        let mut settings = TrainingSettings::default();
        settings.export.output = PathBuf::from("out/models/rf.bin");
        assert_eq!(settings.scaler_path(), PathBuf::from("out/models/rf_scaler.bin"));
        assert_eq!(settings.output_dir(), PathBuf::from("out/models"));
        settings.export.output = PathBuf::from("rf.bin");
        assert_eq!(settings.output_dir(), PathBuf::from("."));
    }
}
