//! Backtest Binary
//!
//! Selects the best registered model and re-scores it on fresh transactions.

use anyhow::Result;
use clap::Parser;
use propval::application::ml::backtest::{BacktestMode, BacktestOptions, BacktestRunner};
use propval::application::ml::feature_builder::ImputationPolicy;
use propval::application::ml::registry::ModelRegistry;
use propval::application::ml::reporting::ValuationReporter;
use propval::config::Config;
use propval::domain::valuation::model_metadata::ModelVersion;
use propval::infrastructure::observability::init_logging;
use propval::infrastructure::{CsvTableSource, FileSystemStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Backtest the best registered valuation model", long_about = None)]
struct Cli {
    /// Fresh transaction records CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Metric used to select the model
    #[arg(short, long, default_value = "mape")]
    metric: String,

    /// Select the highest metric value instead of the lowest
    #[arg(long)]
    higher_is_better: bool,

    /// Backtest this version instead of the best one
    #[arg(long)]
    version: Option<String>,

    /// Score models without a stored feature schema (report is flagged)
    #[arg(long)]
    diagnostic: bool,

    /// Impute missing values with medians of the fresh batch
    #[arg(long)]
    batch_medians: bool,

    /// Registry root directory (overrides MODEL_REGISTRY_DIR)
    #[arg(long)]
    registry_dir: Option<PathBuf>,

    /// Write the report as JSON to this path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    init_logging(&config.observability);

    let cli = Cli::parse();
    if let Some(dir) = cli.registry_dir {
        config.registry.directory = dir;
    }

    ValuationReporter::print_header(
        "PROPERTY VALUATION BACKTEST",
        &cli.input.display().to_string(),
        &config.registry.directory.display().to_string(),
    );

    let table = CsvTableSource::read(&cli.input)?;
    let registry = ModelRegistry::new(Arc::new(FileSystemStore::new(
        config.registry.directory.clone(),
    )));

    let options = BacktestOptions {
        metric: cli.metric,
        lower_is_better: !cli.higher_is_better,
        mode: if cli.diagnostic {
            BacktestMode::Diagnostic
        } else {
            BacktestMode::Strict
        },
        imputation: if cli.batch_medians {
            ImputationPolicy::BatchMedians
        } else {
            ImputationPolicy::TrainingMedians
        },
    };
    let runner = BacktestRunner::new(&registry, options);

    let report = match cli.version {
        Some(version) => {
            let version = ModelVersion::new(version);
            let registered = registry
                .load_registered(&version)
                .ok_or_else(|| anyhow::anyhow!("Model {} not found or unreadable", version))?;
            runner.run_model(&registered, &table)?
        }
        None => runner.run(&table)?,
    };

    ValuationReporter::print_backtest_report(&report);
    if let Some(path) = cli.output {
        ValuationReporter::export_json(&report, &path)?;
    }
    Ok(())
}
