use crate::domain::errors::EvaluationError;
use crate::domain::valuation::model_metadata::{ModelMetrics, metric_names};
use serde::Serialize;
use statrs::statistics::{Data, Median};
use tracing::warn;

/// Accuracy of a set of price predictions.
///
/// `mape` and `mdape` are percentages (already multiplied by 100); `mae` and
/// `rmse` are in currency units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub n_samples: usize,
    pub mae: f64,
    pub mape: f64,
    pub mdape: f64,
    pub rmse: f64,
    /// Coefficient of determination. With constant targets it is 1.0 for a
    /// perfect fit and -inf otherwise.
    pub r2: f64,
    pub train_mape: Option<f64>,
    /// `|mape - train_mape|`, a cheap overfitting signal.
    pub train_test_delta: Option<f64>,
}

impl EvaluationReport {
    /// Registry metrics. Non-finite values are recorded as absent.
    pub fn to_metrics(&self) -> ModelMetrics {
        let entries = [
            (metric_names::MAE, Some(self.mae)),
            (metric_names::MAPE, Some(self.mape)),
            (metric_names::MDAPE, Some(self.mdape)),
            (metric_names::RMSE, Some(self.rmse)),
            (metric_names::R2, Some(self.r2)),
            (metric_names::TRAIN_MAPE, self.train_mape),
            (metric_names::TRAIN_TEST_DELTA, self.train_test_delta),
        ];

        entries
            .into_iter()
            .map(|(name, value)| {
                let value = value.filter(|v| {
                    let finite = v.is_finite();
                    if !finite {
                        warn!("Evaluator: metric {} is {}, recording as absent", name, v);
                    }
                    finite
                });
                (name.to_string(), value)
            })
            .collect()
    }
}

pub struct Evaluator;

impl Evaluator {
    pub fn evaluate(
        predictions: &[f64],
        actuals: &[f64],
        train_mape: Option<f64>,
    ) -> Result<EvaluationReport, EvaluationError> {
        check_lengths(predictions, actuals)?;
        let n = predictions.len() as f64;

        let errors: Vec<f64> = predictions.iter().zip(actuals).map(|(p, a)| p - a).collect();
        let ape = Self::absolute_percentage_errors(predictions, actuals)?;

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let rmse = (ss_res / n).sqrt();
        let mape = ape.iter().sum::<f64>() / n;
        let mdape = Data::new(ape).median();

        let mean = actuals.iter().sum::<f64>() / n;
        let ss_tot: f64 = actuals.iter().map(|a| (a - mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            f64::NEG_INFINITY
        };

        Ok(EvaluationReport {
            n_samples: predictions.len(),
            mae,
            mape,
            mdape,
            rmse,
            r2,
            train_mape,
            train_test_delta: train_mape.map(|t| (mape - t).abs()),
        })
    }

    /// Mean absolute percentage error, as a percentage.
    pub fn mape(predictions: &[f64], actuals: &[f64]) -> Result<f64, EvaluationError> {
        check_lengths(predictions, actuals)?;
        let ape = Self::absolute_percentage_errors(predictions, actuals)?;
        Ok(ape.iter().sum::<f64>() / ape.len() as f64)
    }

    fn absolute_percentage_errors(
        predictions: &[f64],
        actuals: &[f64],
    ) -> Result<Vec<f64>, EvaluationError> {
        predictions
            .iter()
            .zip(actuals)
            .enumerate()
            .map(|(index, (p, a))| {
                if *a == 0.0 {
                    Err(EvaluationError::ZeroActual { index })
                } else {
                    Ok(((p - a) / a).abs() * 100.0)
                }
            })
            .collect()
    }
}

fn check_lengths(predictions: &[f64], actuals: &[f64]) -> Result<(), EvaluationError> {
    if predictions.len() != actuals.len() {
        return Err(EvaluationError::LengthMismatch {
            predictions: predictions.len(),
            actuals: actuals.len(),
        });
    }
    if predictions.is_empty() {
        return Err(EvaluationError::Empty);
    }
    Ok(())
}
