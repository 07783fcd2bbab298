//! Luma Helmet Event Classifier - Training Entry Point

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use feature_engine::FeatureSet;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use trainer_cli::{export_features, init_logging, run_prediction, run_training, TrainingSettings};

#[derive(Parser)]
#[command(name = "luma-train")]
#[command(version, about = "Train the Random Forest event classifier for the Luma helmet")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (TOML)
    #[arg(short, long, global = true, env = "LUMA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a classifier from a labeled recording
    Train(TrainArgs),
    /// Classify the events of a recording with a saved model
    Predict {
        /// Model bundle written by `train`
        #[arg(short, long)]
        model: PathBuf,
        /// Labeled events CSV
        #[arg(short, long)]
        data: PathBuf,
    },
    /// Write the per-event feature matrix as CSV
    Features {
        /// Labeled events CSV
        #[arg(short, long)]
        data: PathBuf,
        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,
        /// Feature layout
        #[arg(long)]
        feature_set: Option<FeatureSet>,
    },
}

#[derive(Args)]
struct TrainArgs {
    /// Labeled events CSV (InfluxDB export)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Output path of the trained model
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Tune hyperparameters with a grid search (slower)
    #[arg(long)]
    grid_search: bool,

    /// Grid preset: standard or extended
    #[arg(long)]
    grid: Option<String>,

    /// Render confusion matrix and feature importance plots
    #[arg(long)]
    plot: bool,

    /// Feature layout
    #[arg(long)]
    feature_set: Option<FeatureSet>,

    /// Seed for splitting and training
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the C header and decision tree export
    #[arg(long)]
    no_c_export: bool,
}

impl TrainArgs {
    fn apply(self, settings: &mut TrainingSettings) {
        if let Some(data) = self.data {
            settings.data.path = Some(data);
        }
        if let Some(output) = self.output {
            settings.export.output = output;
        }
        if self.grid_search || self.grid.is_some() {
            settings.grid_search.enabled = true;
        }
        if let Some(grid) = self.grid {
            settings.grid_search.preset = Some(grid);
        }
        if self.plot {
            settings.export.plots = true;
        }
        if let Some(set) = self.feature_set {
            settings.features.set = set;
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if self.no_c_export {
            settings.export.c_export = false;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut settings = TrainingSettings::load(cli.config.as_deref())?;
    info!("=== Luma Event Classifier Training v{} ===", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Train(args) => {
            args.apply(&mut settings);
            let outcome = run_training(&settings)?;
            println!("Saved model to: {}", outcome.bundle_path.display());
            println!("Saved scaler to: {}", outcome.scaler_path.display());
            for path in &outcome.artifacts {
                println!("Saved: {}", path.display());
            }
            println!(
                "Test accuracy: {:.1}%  Macro F1: {:.4}  CV: {:.4} (+/- {:.4})",
                outcome.metrics.accuracy * 100.0,
                outcome.metrics.f1_macro,
                outcome.cv.mean,
                outcome.cv.std * 2.0
            );
        }
        Command::Predict { model, data } => {
            for p in run_prediction(&settings, &model, &data)? {
                let recorded = p.actual.map(|l| l.as_str()).unwrap_or("-");
                println!(
                    "{}\t{}\t{:.2}\t(recorded: {})",
                    p.event_id, p.prediction.label, p.prediction.confidence, recorded
                );
            }
        }
        Command::Features {
            data,
            output,
            feature_set,
        } => {
            if let Some(set) = feature_set {
                settings.features.set = set;
            }
            let matrix = export_features(&settings, &data, &output)
                .with_context(|| format!("Failed to export features from {}", data.display()))?;
            println!(
                "Wrote {} events x {} features to {}",
                matrix.n_events(),
                matrix.n_features(),
                output.display()
            );
        }
    }
    Ok(())
}
