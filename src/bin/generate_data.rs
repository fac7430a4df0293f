//! Synthetic transaction data generator.

use anyhow::Result;
use clap::Parser;
use propval::application::ml::synthetic::SyntheticMarket;
use propval::config::Config;
use propval::domain::valuation::record_table::RecordTable;
use propval::infrastructure::CsvTableSource;
use propval::infrastructure::observability::init_logging;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about = "Generate synthetic property transactions", long_about = None)]
struct Cli {
    /// Number of records
    #[arg(short, long, default_value = "1000")]
    rows: usize,

    /// Random seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Probability that an optional feature cell is left empty
    #[arg(long, default_value = "0.03")]
    missing_rate: f64,

    /// Output CSV path
    #[arg(short, long, default_value = "data/transactions.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_logging(&config.observability);

    let cli = Cli::parse();
    info!("Generating {} records with seed {}", cli.rows, cli.seed);

    let records = SyntheticMarket::new(cli.seed)
        .with_missing_rate(cli.missing_rate)
        .generate(cli.rows);
    CsvTableSource::write(&cli.output, &RecordTable::from_records(&records))?;

    println!("💾 {} records written to {}", records.len(), cli.output.display());
    Ok(())
}
