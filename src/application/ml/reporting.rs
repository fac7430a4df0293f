//! Console summaries for the training, backtest and registry binaries.

use super::backtest::BacktestReport;
use super::evaluator::EvaluationReport;
use super::pipeline::PipelineOutcome;
use super::trainer::CandidateScore;
use crate::domain::valuation::model_metadata::{ModelMetadata, metric_names};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

pub struct ValuationReporter;

impl ValuationReporter {
    pub fn print_header(title: &str, input: &str, registry: &str) {
        println!("{}", "=".repeat(80));
        println!("🏠 {}", title);
        println!("{}", "=".repeat(80));
        println!("Input:        {}", input);
        println!("Registry:     {}", registry);
        println!("{}", "=".repeat(80));
    }

    pub fn print_training_summary(outcome: &PipelineOutcome) {
        println!("\n{}", "=".repeat(80));
        println!("✅ TRAINING COMPLETE - {}", outcome.version);
        println!("{}", "=".repeat(80));
        println!(
            "  Samples:          {} train / {} validation / {} test",
            outcome.n_train, outcome.n_validation, outcome.n_test
        );
        if outcome.skipped_rows > 0 {
            println!("  Skipped rows:     {} (no price)", outcome.skipped_rows);
        }
        println!("  Features:         {}", outcome.n_features);
        let hp = &outcome.hyperparameters;
        println!(
            "  Hyperparameters:  n_estimators={} max_depth={} learning_rate={} subsample={} colsample={}",
            hp.n_estimators, hp.max_depth, hp.learning_rate, hp.subsample, hp.colsample
        );
        println!();
        Self::print_evaluation(&outcome.evaluation);
        if let Some(Some(mae)) = outcome.metrics.get(metric_names::VALIDATION_MAE) {
            println!("  Validation MAE:   {:.2}", mae);
        }
        println!("{}\n", "=".repeat(80));
    }

    pub fn print_evaluation(report: &EvaluationReport) {
        println!("  Test samples:     {}", report.n_samples);
        println!("  MAE:              {:.2}", report.mae);
        println!("  RMSE:             {:.2}", report.rmse);
        println!("  MAPE:             {:.2}%", report.mape);
        println!("  MdAPE:            {:.2}%", report.mdape);
        println!("  R²:               {:.4}", report.r2);
        if let Some(train) = report.train_mape {
            println!("  Train MAPE:       {:.2}%", train);
        }
        if let Some(delta) = report.train_test_delta {
            println!("  Train/test delta: {:.2} pp", delta);
        }
    }

    /// Top `top_n` grid candidates by cross-validated MAE.
    pub fn print_search_results(search: &[CandidateScore], top_n: usize) {
        if search.is_empty() {
            return;
        }
        let mut ranked: Vec<&CandidateScore> = search.iter().collect();
        ranked.sort_by(|a, b| b.mean_score.total_cmp(&a.mean_score));

        println!("\n📊 Grid search: {} candidates", search.len());
        println!(
            "{:<4} | {:>6} | {:>5} | {:>6} | {:>6} | {:>6} | {:>12}",
            "#", "Trees", "Depth", "LR", "Rows", "Cols", "CV MAE"
        );
        println!("{}", "-".repeat(64));
        for (i, candidate) in ranked.iter().take(top_n).enumerate() {
            let hp = &candidate.hyperparameters;
            println!(
                "{:<4} | {:>6} | {:>5} | {:>6.3} | {:>6.2} | {:>6.2} | {:>12.2}",
                i + 1,
                hp.n_estimators,
                hp.max_depth,
                hp.learning_rate,
                hp.subsample,
                hp.colsample,
                -candidate.mean_score
            );
        }
    }

    pub fn print_backtest_report(report: &BacktestReport) {
        println!("\n{}", "=".repeat(80));
        println!("🔁 BACKTEST - {}", report.version);
        println!("{}", "=".repeat(80));
        if !report.schema_verified {
            println!("  ⚠️  Feature schema NOT verified: model has no stored schema");
        }
        if report.schema_verified && !report.vocabulary_verified {
            println!("  ⚠️  Category vocabulary NOT verified: baselines taken from the fresh batch");
        }
        if !report.added_columns.is_empty() {
            println!("  Added columns:    {}", report.added_columns.join(", "));
        }
        if !report.dropped_columns.is_empty() {
            println!("  Dropped columns:  {}", report.dropped_columns.join(", "));
        }
        if report.unseen_categories > 0 {
            println!("  Unseen categories: {}", report.unseen_categories);
        }
        if report.skipped_rows > 0 {
            println!("  Skipped rows:     {} (no price)", report.skipped_rows);
        }
        Self::print_evaluation(&report.evaluation);
        if let (Some(registered), Some(drift)) = (report.registered_mape, report.mape_drift) {
            println!(
                "  Registered MAPE:  {:.2}% (drift {:+.2} pp)",
                registered, drift
            );
        }
        println!("{}\n", "=".repeat(80));
    }

    pub fn print_model_table(models: &[ModelMetadata]) {
        println!("\n{}", "=".repeat(80));
        println!("📦 REGISTERED MODELS ({})", models.len());
        println!("{}", "=".repeat(80));
        println!(
            "{:<26} | {:<19} | {:<12} | {:>8} | {:>8} | {:>8}",
            "Version", "Timestamp", "Author", "MAPE%", "MAE", "R²"
        );
        println!("{}", "-".repeat(80));
        for m in models {
            println!(
                "{:<26} | {:<19} | {:<12} | {:>8} | {:>8} | {:>8}",
                m.version,
                m.timestamp.format("%Y-%m-%d %H:%M:%S"),
                truncate(&m.author, 12),
                fmt_metric(m.metric(metric_names::MAPE), 2),
                fmt_metric(m.metric(metric_names::MAE), 0),
                fmt_metric(m.metric(metric_names::R2), 4),
            );
        }
        println!("{}\n", "=".repeat(80));
    }

    pub fn print_model_details(metadata: &ModelMetadata) {
        println!("{}", "=".repeat(80));
        println!("📦 {}", metadata.version);
        println!("{}", "=".repeat(80));
        println!("  Timestamp:    {}", metadata.timestamp.to_rfc3339());
        println!("  Author:       {}", metadata.author);
        if !metadata.description.is_empty() {
            println!("  Description:  {}", metadata.description);
        }
        println!("  Metrics:");
        for (name, value) in &metadata.metrics {
            println!("    {:<18} {}", name, fmt_metric(*value, 4));
        }
        println!("  Parameters:");
        for (name, value) in &metadata.parameters {
            println!("    {:<18} {}", name, value);
        }
        match &metadata.feature_schema {
            Some(columns) if !columns.is_empty() => {
                println!("  Feature schema ({} columns):", columns.len());
                for column in columns {
                    println!("    {}", column);
                }
            }
            _ => println!("  Feature schema: ⚠️  missing (model cannot be backtested strictly)"),
        }
        println!("{}", "=".repeat(80));
    }

    pub fn export_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
        std::fs::write(path, json).context(format!("Failed to write report to {:?}", path))?;
        println!("💾 Report saved to: {}", path.display());
        Ok(())
    }
}

fn fmt_metric(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max - 1).chain(std::iter::once('…')).collect()
    }
}
