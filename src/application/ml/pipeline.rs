//! End-to-end training: features → split → train → evaluate → register.

use super::cross_validation::LabeledSet;
use super::evaluator::{EvaluationReport, Evaluator};
use super::feature_builder::FeatureBuilder;
use super::gradient_boosting::Hyperparameters;
use super::predictor::PricePredictor;
use super::registry::ModelRegistry;
use super::trainer::{CandidateScore, Trainer, TrainerConfig};
use crate::domain::valuation::model_metadata::{ModelMetrics, ModelVersion, metric_names};
use crate::domain::valuation::record_table::RecordTable;
use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fraction held out for testing, then again for validation from the rest.
    pub test_size: f64,
    pub trainer: TrainerConfig,
    pub author: String,
    pub description: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            trainer: TrainerConfig::default(),
            author: "unknown".to_string(),
            description: String::new(),
        }
    }
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub version: ModelVersion,
    pub evaluation: EvaluationReport,
    pub metrics: ModelMetrics,
    pub hyperparameters: Hyperparameters,
    pub search: Vec<CandidateScore>,
    pub n_train: usize,
    pub n_validation: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub skipped_rows: usize,
}

pub struct TrainingPipeline<'a> {
    registry: &'a ModelRegistry,
    config: PipelineConfig,
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(registry: &'a ModelRegistry, config: PipelineConfig) -> Self {
        Self { registry, config }
    }

    /// Trains on `table` and registers the result.
    ///
    /// The feature schema (vocabulary and medians) is fitted on the whole
    /// table before splitting, so every split shares one column layout.
    pub fn run(&self, table: &RecordTable) -> Result<PipelineOutcome> {
        let seed = self.config.trainer.seed;
        let test_size = self.config.test_size;

        let fitted = FeatureBuilder::fit(table).context("Failed to build feature matrix")?;
        let n_features = fitted.schema.len();
        let dataset = LabeledSet::new(fitted.matrix, fitted.targets);
        info!(
            "Pipeline: {} samples x {} features ({} rows skipped)",
            dataset.len(),
            n_features,
            fitted.skipped_rows
        );

        let (remainder, test) = dataset
            .split(test_size, seed)
            .context("Failed to split off test set")?;
        let (train, validation) = remainder
            .split(test_size, seed.wrapping_add(1))
            .context("Failed to split off validation set")?;
        info!(
            "Pipeline: split {} train / {} validation / {} test",
            train.len(),
            validation.len(),
            test.len()
        );

        let trainer = Trainer::new(self.config.trainer.clone());
        let result = trainer
            .train(&train, Some(&validation))
            .context("Training failed")?;

        let train_predictions = result.model.predict(&train.features)?;
        let train_mape = Evaluator::mape(&train_predictions, &train.targets)
            .context("Failed to score training set")?;

        let test_predictions = result.model.predict(&test.features)?;
        let evaluation = Evaluator::evaluate(&test_predictions, &test.targets, Some(train_mape))
            .context("Failed to score test set")?;

        let validation_predictions = result.model.predict(&validation.features)?;
        let validation_report =
            Evaluator::evaluate(&validation_predictions, &validation.targets, None)
                .context("Failed to score validation set")?;

        let mut metrics = evaluation.to_metrics();
        metrics.insert(
            metric_names::VALIDATION_MAE.to_string(),
            Some(validation_report.mae).filter(|v| v.is_finite()),
        );

        let version = self
            .registry
            .save(
                &result.model,
                metrics.clone(),
                &fitted.schema,
                &self.config.description,
                &self.config.author,
            )
            .context("Failed to register model")?;

        info!(
            "Pipeline: registered {} (test MAPE {:.2}%, R2 {:.4})",
            version, evaluation.mape, evaluation.r2
        );

        Ok(PipelineOutcome {
            version,
            evaluation,
            metrics,
            hyperparameters: result.hyperparameters,
            search: result.search,
            n_train: train.len(),
            n_validation: validation.len(),
            n_test: test.len(),
            n_features,
            skipped_rows: fitted.skipped_rows,
        })
    }
}
