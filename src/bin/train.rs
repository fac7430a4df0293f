//! Model Training Binary
//!
//! Builds features from a transaction CSV, trains a gradient-boosted price
//! model (optionally grid-searched) and registers it with its metrics.

use anyhow::{Context, Result};
use clap::Parser;
use propval::application::ml::pipeline::{PipelineConfig, TrainingPipeline};
use propval::application::ml::registry::ModelRegistry;
use propval::application::ml::reporting::ValuationReporter;
use propval::application::ml::trainer::{ParameterGrid, TrainerConfig};
use propval::config::Config;
use propval::infrastructure::observability::init_logging;
use propval::infrastructure::{CsvTableSource, FileSystemStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Train and register a property valuation model", long_about = None)]
struct Cli {
    /// Transaction records CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Skip the hyperparameter grid search and fit fixed hyperparameters
    #[arg(long)]
    no_tune: bool,

    /// Held-out fraction for the test split (and again for validation)
    #[arg(long)]
    test_size: Option<f64>,

    /// Random seed for splits, subsampling and CV folds
    #[arg(long)]
    seed: Option<u64>,

    /// TOML file with parameter grid configuration
    #[arg(long)]
    grid_config: Option<PathBuf>,

    /// Registry root directory (overrides MODEL_REGISTRY_DIR)
    #[arg(long)]
    registry_dir: Option<PathBuf>,

    /// Author recorded in the model metadata (overrides MODEL_AUTHOR)
    #[arg(long)]
    author: Option<String>,

    /// Free-text description stored with the model
    #[arg(short, long, default_value = "")]
    description: String,

    /// Number of grid candidates to display
    #[arg(long, default_value = "5")]
    top_n: usize,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    init_logging(&config.observability);

    let cli = Cli::parse();
    if let Some(dir) = cli.registry_dir {
        config.registry.directory = dir;
    }
    if let Some(size) = cli.test_size {
        config.training.test_size = size;
    }
    if let Some(seed) = cli.seed {
        config.training.seed = seed;
    }
    config.validate()?;

    ValuationReporter::print_header(
        "PROPERTY VALUATION MODEL TRAINING",
        &cli.input.display().to_string(),
        &config.registry.directory.display().to_string(),
    );

    let grid = match &cli.grid_config {
        Some(path) => {
            info!("Loading parameter grid from: {:?}", path);
            load_grid_from_toml(path)?
        }
        None => ParameterGrid::default(),
    };

    let table = CsvTableSource::read(&cli.input)?;
    let registry = ModelRegistry::new(Arc::new(FileSystemStore::new(
        config.registry.directory.clone(),
    )));

    let pipeline_config = PipelineConfig {
        test_size: config.training.test_size,
        trainer: TrainerConfig {
            tune: !cli.no_tune,
            seed: config.training.seed,
            cv_folds: config.training.cv_folds,
            grid,
            early_stopping_rounds: config.training.early_stopping_rounds,
            ..Default::default()
        },
        author: cli.author.unwrap_or(config.registry.author),
        description: cli.description,
    };

    if pipeline_config.trainer.tune {
        println!(
            "🚀 Grid search over {} candidates ({}-fold CV)...\n",
            pipeline_config.trainer.grid.len(),
            pipeline_config.trainer.cv_folds
        );
    }

    let outcome = TrainingPipeline::new(&registry, pipeline_config).run(&table)?;

    ValuationReporter::print_search_results(&outcome.search, cli.top_n);
    ValuationReporter::print_training_summary(&outcome);
    println!("✅ Registered model {}\n", outcome.version);
    Ok(())
}

fn load_grid_from_toml(path: &Path) -> Result<ParameterGrid> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read grid config file: {:?}", path))?;
    let grid: ParameterGrid =
        toml::from_str(&content).context(format!("Failed to parse grid config TOML: {:?}", path))?;
    if grid.is_empty() {
        anyhow::bail!("Grid config {:?} yields no candidates", path);
    }
    Ok(grid)
}
