//! Re-scoring a registered model against fresh transactions.

use super::evaluator::{EvaluationReport, Evaluator};
use super::feature_builder::{FeatureBuilder, ImputationPolicy};
use super::predictor::PricePredictor;
use super::registry::{ModelRegistry, RegisteredModel};
use crate::domain::errors::BacktestError;
use crate::domain::valuation::model_metadata::{ModelVersion, metric_names};
use crate::domain::valuation::record_table::RecordTable;
use serde::Serialize;
use tracing::{info, warn};

/// What to do when the selected model carries no feature schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BacktestMode {
    /// Refuse to score.
    #[default]
    Strict,
    /// Score against the fresh batch's own columns and flag the report.
    ///
    /// The fresh columns are not padded to the model's width: a batch whose
    /// category set yields a different column count fails with
    /// [`ModelError::DimensionMismatch`](crate::domain::errors::ModelError).
    Diagnostic,
}

#[derive(Debug, Clone)]
pub struct BacktestOptions {
    pub metric: String,
    pub lower_is_better: bool,
    pub mode: BacktestMode,
    pub imputation: ImputationPolicy,
}

impl Default for BacktestOptions {
    fn default() -> Self {
        Self {
            metric: metric_names::MAPE.to_string(),
            lower_is_better: true,
            mode: BacktestMode::Strict,
            imputation: ImputationPolicy::TrainingMedians,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub version: ModelVersion,
    pub evaluation: EvaluationReport,
    /// False when the model had no schema and the fresh columns were used as-is.
    pub schema_verified: bool,
    /// False when the schema stored columns only and categories were encoded
    /// against the fresh batch's own baselines.
    pub vocabulary_verified: bool,
    pub added_columns: Vec<String>,
    pub dropped_columns: Vec<String>,
    pub unseen_categories: usize,
    pub skipped_rows: usize,
    /// Test MAPE recorded at registration.
    pub registered_mape: Option<f64>,
    /// Backtest MAPE minus registered MAPE, in percentage points.
    pub mape_drift: Option<f64>,
}

pub struct BacktestRunner<'a> {
    registry: &'a ModelRegistry,
    options: BacktestOptions,
}

impl<'a> BacktestRunner<'a> {
    pub fn new(registry: &'a ModelRegistry, options: BacktestOptions) -> Self {
        Self { registry, options }
    }

    /// Selects the best registered model by the configured metric and scores
    /// it on `table`.
    pub fn run(&self, table: &RecordTable) -> Result<BacktestReport, BacktestError> {
        let selected = self
            .registry
            .get_best(&self.options.metric, self.options.lower_is_better)?
            .ok_or_else(|| BacktestError::NoModel {
                metric: self.options.metric.clone(),
            })?;
        self.run_model(&selected, table)
    }

    /// Scores an already loaded model on `table`.
    pub fn run_model(
        &self,
        registered: &RegisteredModel,
        table: &RecordTable,
    ) -> Result<BacktestReport, BacktestError> {
        let version = registered.version().clone();
        info!(
            "Backtest: scoring {} on {} fresh records ({:?} mode)",
            version,
            table.len(),
            self.options.mode
        );

        let (
            features,
            targets,
            schema_verified,
            vocabulary_verified,
            added,
            dropped,
            unseen,
            skipped,
        ) = match registered.schema() {
            Some(schema) => {
                let encoded =
                    FeatureBuilder::transform(table, &schema, self.options.imputation)?;
                if !encoded.used_stored_vocabulary {
                    warn!(
                        "Backtest: {} stored columns without a vocabulary; categorical baselines come from the fresh batch",
                        version
                    );
                }
                (
                    encoded.matrix,
                    encoded.targets,
                    true,
                    encoded.used_stored_vocabulary,
                    encoded.added_columns,
                    encoded.dropped_columns,
                    encoded.unseen_categories,
                    encoded.skipped_rows,
                )
            }
            None if self.options.mode == BacktestMode::Strict => {
                return Err(BacktestError::SchemaMissing {
                    version: version.to_string(),
                });
            }
            None => {
                warn!(
                    "Backtest: {} has no stored feature schema; scoring against fresh columns, results are unverified",
                    version
                );
                let fitted = FeatureBuilder::fit(table)?;
                (
                    fitted.matrix,
                    fitted.targets,
                    false,
                    false,
                    Vec::new(),
                    Vec::new(),
                    0,
                    fitted.skipped_rows,
                )
            }
        };

        let predictions = registered.model.predict(&features)?;
        let evaluation = Evaluator::evaluate(&predictions, &targets, None)?;

        let registered_mape = registered.metadata.metric(metric_names::MAPE);
        let mape_drift = registered_mape.map(|m| evaluation.mape - m);

        info!(
            "Backtest: {} MAE {:.2}, MAPE {:.2}%, R2 {:.4} on {} samples",
            version, evaluation.mae, evaluation.mape, evaluation.r2, evaluation.n_samples
        );
        if let Some(drift) = mape_drift {
            info!("Backtest: MAPE drift vs registration {:+.2} pp", drift);
        }

        Ok(BacktestReport {
            version,
            evaluation,
            schema_verified,
            vocabulary_verified,
            added_columns: added,
            dropped_columns: dropped,
            unseen_categories: unseen,
            skipped_rows: skipped,
            registered_mape,
            mape_drift,
        })
    }
}
