//! Gradient-boosted regression trees on top of smartcore decision trees.
//!
//! Squared-error boosting: the ensemble starts at the target mean and every
//! stage fits a tree on the current residuals of a seeded row subsample,
//! restricted to a seeded column subsample. Stage outputs are shrunk by the
//! learning rate.

use super::predictor::PricePredictor;
use crate::domain::errors::ModelError;
use crate::domain::valuation::feature_matrix::FeatureMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::fmt;
use tracing::debug;

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Boosting hyperparameters. Serialized into model metadata as `parameters`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub n_estimators: usize,
    pub max_depth: u16,
    pub learning_rate: f64,
    /// Fraction of rows drawn (without replacement) per stage.
    pub subsample: f64,
    /// Fraction of columns drawn per stage.
    pub colsample: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 5,
            learning_rate: 0.05,
            subsample: 0.8,
            colsample: 0.8,
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

/// Validation rows used to monitor a fit.
pub struct Validation<'a> {
    pub rows: &'a [Vec<f64>],
    pub targets: &'a [f64],
}

#[derive(Default)]
pub struct FitOptions<'a> {
    pub seed: u64,
    pub validation: Option<Validation<'a>>,
    /// Stop after this many stages without validation improvement and keep
    /// the best prefix. Ignored without validation data.
    pub early_stopping_rounds: Option<usize>,
}

/// Validation MAE after each stage, when monitored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitHistory {
    pub validation_mae: Vec<f64>,
    pub best_stage: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct BoostingStage {
    columns: Vec<usize>,
    tree: Tree,
}

#[derive(Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    hyperparameters: Hyperparameters,
    n_features: usize,
    base_score: f64,
    stages: Vec<BoostingStage>,
}

impl fmt::Debug for GradientBoostedRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientBoostedRegressor")
            .field("hyperparameters", &self.hyperparameters)
            .field("n_features", &self.n_features)
            .field("base_score", &self.base_score)
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl GradientBoostedRegressor {
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        hyperparameters: Hyperparameters,
        options: FitOptions<'_>,
    ) -> Result<(Self, FitHistory), ModelError> {
        let n = rows.len();
        if n == 0 || n != targets.len() {
            return Err(ModelError::Fit {
                reason: format!("{} rows for {} targets", n, targets.len()),
            });
        }
        let n_features = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != n_features) {
            return Err(ModelError::DimensionMismatch {
                expected: n_features,
                actual: bad.len(),
            });
        }
        if n_features == 0 {
            return Err(ModelError::Fit {
                reason: "rows have no feature columns".to_string(),
            });
        }

        let mut rng = StdRng::seed_from_u64(options.seed);
        let tree_params = DecisionTreeRegressorParameters::default()
            .with_max_depth(hyperparameters.max_depth)
            .with_min_samples_split(hyperparameters.min_samples_split)
            .with_min_samples_leaf(hyperparameters.min_samples_leaf);

        let base_score = targets.iter().sum::<f64>() / n as f64;
        let mut model = Self {
            hyperparameters,
            n_features,
            base_score,
            stages: Vec::with_capacity(hyperparameters.n_estimators),
        };

        let row_count = sample_size(n, hyperparameters.subsample);
        let col_count = sample_size(n_features, hyperparameters.colsample);

        let mut train_pred = vec![base_score; n];
        let mut val_pred = options
            .validation
            .as_ref()
            .map(|v| vec![base_score; v.rows.len()]);
        let mut history = FitHistory::default();
        let mut best_mae = f64::INFINITY;

        for stage_idx in 0..hyperparameters.n_estimators {
            let sampled_rows = draw(&mut rng, n, row_count);
            let columns = draw(&mut rng, n_features, col_count);

            let x: Vec<Vec<f64>> = sampled_rows
                .iter()
                .map(|&i| project(&rows[i], &columns))
                .collect();
            let residuals: Vec<f64> = sampled_rows
                .iter()
                .map(|&i| targets[i] - train_pred[i])
                .collect();

            let x = to_matrix(&x)?;
            let tree = Tree::fit(&x, &residuals, tree_params.clone()).map_err(|e| {
                ModelError::Fit {
                    reason: e.to_string(),
                }
            })?;
            let stage = BoostingStage { columns, tree };

            let lr = hyperparameters.learning_rate;
            for (p, delta) in train_pred.iter_mut().zip(stage.predict(rows)?) {
                *p += lr * delta;
            }

            if let (Some(validation), Some(preds)) = (&options.validation, val_pred.as_mut()) {
                for (p, delta) in preds.iter_mut().zip(stage.predict(validation.rows)?) {
                    *p += lr * delta;
                }
                let mae = mean_absolute_error(preds, validation.targets);
                history.validation_mae.push(mae);
                if mae < best_mae {
                    best_mae = mae;
                    history.best_stage = Some(stage_idx);
                }
            }

            model.stages.push(stage);

            if let (Some(rounds), Some(best)) = (options.early_stopping_rounds, history.best_stage)
                && stage_idx >= best + rounds
            {
                debug!(
                    "GBM: early stop at stage {} (best stage {}, val MAE {:.2})",
                    stage_idx, best, best_mae
                );
                break;
            }
        }

        if let (Some(_), Some(best)) = (options.early_stopping_rounds, history.best_stage) {
            model.stages.truncate(best + 1);
        }

        Ok((model, history))
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if let Some(bad) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(ModelError::DimensionMismatch {
                expected: self.n_features,
                actual: bad.len(),
            });
        }
        let mut out = vec![self.base_score; rows.len()];
        if rows.is_empty() {
            return Ok(out);
        }
        let lr = self.hyperparameters.learning_rate;
        for stage in &self.stages {
            for (p, delta) in out.iter_mut().zip(stage.predict(rows)?) {
                *p += lr * delta;
            }
        }
        Ok(out)
    }
}

impl PricePredictor for GradientBoostedRegressor {
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        self.predict_rows(features.rows())
    }

    fn name(&self) -> &str {
        "SmartCore Gradient Boosted Trees"
    }
}

impl BoostingStage {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let x: Vec<Vec<f64>> = rows.iter().map(|r| project(r, &self.columns)).collect();
        self.tree
            .predict(&to_matrix(&x)?)
            .map_err(|e| ModelError::Predict {
                reason: e.to_string(),
            })
    }
}

fn sample_size(total: usize, fraction: f64) -> usize {
    ((total as f64 * fraction).round() as usize).clamp(1, total)
}

/// Sorted sample without replacement; the identity when `amount == total`.
fn draw(rng: &mut StdRng, total: usize, amount: usize) -> Vec<usize> {
    if amount >= total {
        return (0..total).collect();
    }
    let mut picked = index::sample(rng, total, amount).into_vec();
    picked.sort_unstable();
    picked
}

fn project(row: &[f64], columns: &[usize]) -> Vec<f64> {
    columns.iter().map(|&c| row[c]).collect()
}

fn to_matrix(rows: &Vec<Vec<f64>>) -> Result<DenseMatrix<f64>, ModelError> {
    DenseMatrix::from_2d_vec(rows).map_err(|e| ModelError::Matrix {
        reason: e.to_string(),
    })
}

fn mean_absolute_error(pred: &[f64], actual: &[f64]) -> f64 {
    pred.iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum::<f64>()
        / pred.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// y = 3*x0 - 2*x1 + 5, noise-free.
    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| vec![(i % 17) as f64, (i % 5) as f64, 1.0])
            .collect();
        let y = rows.iter().map(|r| 3.0 * r[0] - 2.0 * r[1] + 5.0).collect();
        (rows, y)
    }

    fn small_params() -> Hyperparameters {
        Hyperparameters {
            n_estimators: 60,
            max_depth: 4,
            learning_rate: 0.2,
            subsample: 0.8,
            colsample: 1.0,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn test_boosting_reduces_error() {
        let (x, y) = linear_data(200);
        let (model, _) =
            GradientBoostedRegressor::fit(&x, &y, small_params(), FitOptions::default()).unwrap();

        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let baseline: f64 = y.iter().map(|v| (v - mean).abs()).sum::<f64>() / y.len() as f64;
        let pred = model.predict_rows(&x).unwrap();
        let mae = mean_absolute_error(&pred, &y);

        assert_eq!(model.n_stages(), 60);
        assert!(mae < baseline * 0.2, "mae {} vs baseline {}", mae, baseline);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = linear_data(120);
        let opts = || FitOptions {
            seed: 7,
            ..Default::default()
        };
        let (a, _) = GradientBoostedRegressor::fit(&x, &y, small_params(), opts()).unwrap();
        let (b, _) = GradientBoostedRegressor::fit(&x, &y, small_params(), opts()).unwrap();
        assert_eq!(a.predict_rows(&x).unwrap(), b.predict_rows(&x).unwrap());
    }

    #[test]
    fn test_serde_roundtrip_preserves_predictions() {
        let (x, y) = linear_data(100);
        let (model, _) =
            GradientBoostedRegressor::fit(&x, &y, small_params(), FitOptions::default()).unwrap();
        let json = serde_json::to_vec(&model).unwrap();
        let back: GradientBoostedRegressor = serde_json::from_slice(&json).unwrap();
        assert_eq!(
            model.predict_rows(&x).unwrap(),
            back.predict_rows(&x).unwrap()
        );
        assert_eq!(back.hyperparameters(), model.hyperparameters());
    }

    #[test]
    fn test_validation_history_and_early_stopping() {
        let (x, y) = linear_data(150);
        let (vx, vy) = linear_data(40);
        let params = Hyperparameters {
            n_estimators: 300,
            ..small_params()
        };
        let (model, history) = GradientBoostedRegressor::fit(
            &x,
            &y,
            params,
            FitOptions {
                seed: 1,
                validation: Some(Validation {
                    rows: &vx,
                    targets: &vy,
                }),
                early_stopping_rounds: Some(5),
            },
        )
        .unwrap();

        let best = history.best_stage.unwrap();
        assert!(!history.validation_mae.is_empty());
        assert_eq!(model.n_stages(), best + 1);
        assert!(history.validation_mae.len() <= 300);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let (x, y) = linear_data(30);
        let (model, _) =
            GradientBoostedRegressor::fit(&x, &y, small_params(), FitOptions::default()).unwrap();
        let err = model.predict_rows(&[vec![1.0, 2.0]]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_zero_width_rows_rejected() {
        let rows: Vec<Vec<f64>> = vec![Vec::new(); 5];
        let targets = vec![1.0; 5];
        let err =
            GradientBoostedRegressor::fit(&rows, &targets, small_params(), FitOptions::default())
                .unwrap_err();
        assert!(matches!(err, ModelError::Fit { .. }));
    }

    #[test]
    fn test_sample_size_bounds() {
        assert_eq!(sample_size(10, 0.8), 8);
        assert_eq!(sample_size(10, 0.01), 1);
        assert_eq!(sample_size(10, 1.0), 10);
        assert_eq!(sample_size(3, 0.5), 2);
    }
}
