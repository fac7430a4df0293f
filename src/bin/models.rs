//! Model Registry Inspection Binary

use anyhow::Result;
use clap::{Parser, Subcommand};
use propval::application::ml::registry::ModelRegistry;
use propval::application::ml::reporting::ValuationReporter;
use propval::config::Config;
use propval::domain::valuation::model_metadata::ModelVersion;
use propval::infrastructure::FileSystemStore;
use propval::infrastructure::observability::init_logging;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Inspect the model registry", long_about = None)]
struct Cli {
    /// Registry root directory (overrides MODEL_REGISTRY_DIR)
    #[arg(long, global = true)]
    registry_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered versions, newest first
    List,
    /// Show the best version by a metric
    Best {
        #[arg(short, long, default_value = "mape")]
        metric: String,

        #[arg(long)]
        higher_is_better: bool,
    },
    /// Show metadata of one version
    Show { version: String },
    /// Delete one version
    Delete { version: String },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    init_logging(&config.observability);

    let cli = Cli::parse();
    if let Some(dir) = cli.registry_dir {
        config.registry.directory = dir;
    }
    let registry = ModelRegistry::new(Arc::new(FileSystemStore::new(
        config.registry.directory.clone(),
    )));

    match cli.command {
        Commands::List => {
            let models = registry.list()?;
            ValuationReporter::print_model_table(&models);
        }
        Commands::Best {
            metric,
            higher_is_better,
        } => match registry.get_best(&metric, !higher_is_better)? {
            Some(best) => ValuationReporter::print_model_details(&best.metadata),
            None => anyhow::bail!("No registered model has metric '{}'", metric),
        },
        Commands::Show { version } => {
            let version = ModelVersion::new(version);
            match registry.metadata(&version) {
                Some(metadata) => ValuationReporter::print_model_details(&metadata),
                None => anyhow::bail!("Model {} not found", version),
            }
        }
        Commands::Delete { version } => {
            let version = ModelVersion::new(version);
            if registry.delete(&version)? {
                println!("🗑️  Deleted {}", version);
            } else {
                println!("Model {} was not registered", version);
            }
        }
    }
    Ok(())
}
