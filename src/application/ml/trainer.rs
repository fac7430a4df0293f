use super::cross_validation::{KFold, LabeledSet};
use super::gradient_boosting::{
    FitHistory, FitOptions, GradientBoostedRegressor, Hyperparameters, Validation,
};
use crate::domain::errors::TrainingError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Hyperparameter grid for cross-validated search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<u16>,
    pub learning_rate: Vec<f64>,
    pub subsample: Vec<f64>,
    pub colsample: Vec<f64>,
}

impl Default for ParameterGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 300],
            max_depth: vec![3, 5],
            learning_rate: vec![0.05, 0.1],
            subsample: vec![0.8, 1.0],
            colsample: vec![0.8, 1.0],
        }
    }
}

impl ParameterGrid {
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.learning_rate.len()
            * self.subsample.len()
            * self.colsample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All combinations in a fixed nesting order; settings the grid does not
    /// cover are taken from `base`.
    pub fn combinations(&self, base: &Hyperparameters) -> Vec<Hyperparameters> {
        let mut combinations = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &learning_rate in &self.learning_rate {
                    for &subsample in &self.subsample {
                        for &colsample in &self.colsample {
                            combinations.push(Hyperparameters {
                                n_estimators,
                                max_depth,
                                learning_rate,
                                subsample,
                                colsample,
                                ..*base
                            });
                        }
                    }
                }
            }
        }
        combinations
    }
}

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub tune: bool,
    pub seed: u64,
    pub cv_folds: usize,
    pub grid: ParameterGrid,
    /// Used as-is without tuning, and as the base for grid candidates.
    pub fixed: Hyperparameters,
    pub early_stopping_rounds: Option<usize>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            tune: true,
            seed: 42,
            cv_folds: 3,
            grid: ParameterGrid::default(),
            fixed: Hyperparameters::default(),
            early_stopping_rounds: None,
        }
    }
}

/// Cross-validated score of one grid candidate (negative MAE, higher is better)
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub hyperparameters: Hyperparameters,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

#[derive(Debug)]
pub struct TrainingResult {
    pub model: GradientBoostedRegressor,
    pub hyperparameters: Hyperparameters,
    /// Grid candidates in grid order; empty when tuning is off.
    pub search: Vec<CandidateScore>,
    pub history: FitHistory,
}

pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fits a model on `train`. `validation` is only monitored, never fitted on.
    pub fn train(
        &self,
        train: &LabeledSet,
        validation: Option<&LabeledSet>,
    ) -> Result<TrainingResult, TrainingError> {
        if train.is_empty() {
            return Err(TrainingError::EmptyTrainingSet);
        }

        let (hyperparameters, search) = if self.config.tune {
            let search = self.grid_search(train)?;
            let best = best_candidate(&search).ok_or(TrainingError::EmptyGrid)?;
            info!(
                "GridSearch: best candidate {:?} (CV MAE {:.2})",
                best.hyperparameters, -best.mean_score
            );
            (best.hyperparameters, search)
        } else {
            info!(
                "Trainer: tuning disabled, using fixed hyperparameters {:?}",
                self.config.fixed
            );
            (self.config.fixed, Vec::new())
        };

        let options = FitOptions {
            seed: self.config.seed,
            validation: validation.map(|v| Validation {
                rows: v.features.rows(),
                targets: &v.targets,
            }),
            early_stopping_rounds: self.config.early_stopping_rounds,
        };
        let (model, history) = GradientBoostedRegressor::fit(
            train.features.rows(),
            &train.targets,
            hyperparameters,
            options,
        )?;

        if let Some(last) = history.validation_mae.last() {
            info!(
                "Trainer: fitted {} stages on {} rows, validation MAE {:.2}",
                model.n_stages(),
                train.len(),
                last
            );
        }

        Ok(TrainingResult {
            model,
            hyperparameters,
            search,
            history,
        })
    }

    /// Scores every grid candidate with k-fold CV.
    ///
    /// (candidate, fold) units are independent and run on the rayon pool.
    /// Each unit's seed depends only on the run seed and its position, so the
    /// result does not depend on scheduling.
    pub fn grid_search(&self, train: &LabeledSet) -> Result<Vec<CandidateScore>, TrainingError> {
        let candidates = self.config.grid.combinations(&self.config.fixed);
        if candidates.is_empty() {
            return Err(TrainingError::EmptyGrid);
        }
        let folds = KFold::new(self.config.cv_folds, self.config.seed).splits(train.len())?;
        let fold_sets: Vec<(LabeledSet, LabeledSet)> = folds
            .iter()
            .map(|(fit_idx, score_idx)| (train.select(fit_idx), train.select(score_idx)))
            .collect();

        info!(
            "GridSearch: {} candidates x {} folds = {} fits",
            candidates.len(),
            fold_sets.len(),
            candidates.len() * fold_sets.len()
        );

        let units: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..fold_sets.len()).map(move |f| (c, f)))
            .collect();

        let scores = units
            .par_iter()
            .map(|&(c, f)| -> Result<f64, TrainingError> {
                let (fit_set, score_set) = &fold_sets[f];
                let options = FitOptions {
                    seed: unit_seed(self.config.seed, c, f),
                    ..Default::default()
                };
                let (model, _) = GradientBoostedRegressor::fit(
                    fit_set.features.rows(),
                    &fit_set.targets,
                    candidates[c],
                    options,
                )?;
                let pred = model.predict_rows(score_set.features.rows())?;
                let mae = pred
                    .iter()
                    .zip(&score_set.targets)
                    .map(|(p, t)| (p - t).abs())
                    .sum::<f64>()
                    / pred.len() as f64;
                Ok(-mae)
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let results: Vec<CandidateScore> = candidates
            .into_iter()
            .zip(scores.chunks(fold_sets.len()))
            .map(|(hyperparameters, fold_scores)| {
                let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                debug!(
                    "GridSearch: {:?} -> mean score {:.2}",
                    hyperparameters, mean_score
                );
                CandidateScore {
                    hyperparameters,
                    fold_scores: fold_scores.to_vec(),
                    mean_score,
                }
            })
            .collect();

        Ok(results)
    }
}

/// Highest mean score; ties go to the earliest candidate in grid order.
pub fn best_candidate(scores: &[CandidateScore]) -> Option<&CandidateScore> {
    scores.iter().fold(None, |best, candidate| match best {
        Some(b) if b.mean_score >= candidate.mean_score => Some(b),
        _ => Some(candidate),
    })
}

fn unit_seed(seed: u64, candidate: usize, fold: usize) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add(((candidate as u64) << 8) | fold as u64)
}
