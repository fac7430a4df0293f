//! Training configuration parsing from environment variables.

use std::env;

#[derive(Debug, Clone)]
pub struct TrainingEnvConfig {
    pub seed: u64,
    /// Held-out fraction, applied once for the test split and again for
    /// the validation split.
    pub test_size: f64,
    pub cv_folds: usize,
    pub early_stopping_rounds: Option<usize>,
}

impl Default for TrainingEnvConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            cv_folds: 3,
            early_stopping_rounds: None,
        }
    }
}

impl TrainingEnvConfig {
    pub fn from_env() -> Self {
        Self {
            seed: env::var("TRAINING_SEED")
                .unwrap_or_else(|_| "42".to_string())
                .parse::<u64>()
                .unwrap_or(42),
            test_size: env::var("TRAINING_TEST_SIZE")
                .unwrap_or_else(|_| "0.2".to_string())
                .parse::<f64>()
                .unwrap_or(0.2),
            cv_folds: env::var("TRAINING_CV_FOLDS")
                .unwrap_or_else(|_| "3".to_string())
                .parse::<usize>()
                .unwrap_or(3),
            early_stopping_rounds: env::var("TRAINING_EARLY_STOPPING_ROUNDS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|&rounds| rounds > 0),
        }
    }
}
