//! Seeded train/test splitting and k-fold partitioning.

use crate::domain::errors::TrainingError;
use crate::domain::valuation::feature_matrix::FeatureMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Feature matrix with its row-aligned targets.
#[derive(Debug, Clone)]
pub struct LabeledSet {
    pub features: FeatureMatrix,
    pub targets: Vec<f64>,
}

impl LabeledSet {
    pub fn new(features: FeatureMatrix, targets: Vec<f64>) -> Self {
        debug_assert_eq!(features.n_rows(), targets.len());
        Self { features, targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(indices),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Shuffled split into `(remainder, held_out)` with `ceil(n * fraction)`
    /// rows held out.
    pub fn split(&self, fraction: f64, seed: u64) -> Result<(Self, Self), TrainingError> {
        let (keep, hold) = train_test_indices(self.len(), fraction, seed)?;
        Ok((self.select(&keep), self.select(&hold)))
    }
}

/// Shuffled index split. Both sides are guaranteed non-empty.
pub fn train_test_indices(
    n: usize,
    fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), TrainingError> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(TrainingError::InvalidFraction { value: fraction });
    }
    if n < 2 {
        return Err(TrainingError::TooFewSamples {
            folds: 2,
            samples: n,
        });
    }

    let n_test = ((n as f64 * fraction).ceil() as usize).clamp(1, n - 1);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));

    let test = indices.split_off(n - n_test);
    Ok((indices, test))
}

/// Shuffled k-fold partition. The first `n % k` folds get one extra row.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    pub folds: usize,
    pub seed: u64,
}

impl KFold {
    pub fn new(folds: usize, seed: u64) -> Self {
        Self { folds, seed }
    }

    /// `(train, test)` index pairs, one per fold.
    pub fn splits(&self, n: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>, TrainingError> {
        if self.folds < 2 || n < self.folds {
            return Err(TrainingError::TooFewSamples {
                folds: self.folds,
                samples: n,
            });
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(self.seed));

        let base = n / self.folds;
        let extra = n % self.folds;
        let mut out = Vec::with_capacity(self.folds);
        let mut start = 0;
        for fold in 0..self.folds {
            let size = base + usize::from(fold < extra);
            let test = indices[start..start + size].to_vec();
            let train = indices[..start]
                .iter()
                .chain(&indices[start + size..])
                .copied()
                .collect();
            out.push((train, test));
            start += size;
        }
        Ok(out)
    }
}
