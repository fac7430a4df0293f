//! Configuration module for propval.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by concern: Registry, Training, and Observability. Command-line flags
//! in the binaries override these values.

mod observability_config;
mod registry_config;
mod training_config;

pub use observability_config::ObservabilityEnvConfig;
pub use registry_config::RegistryEnvConfig;
pub use training_config::TrainingEnvConfig;

use anyhow::Result;

/// Main application configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub registry: RegistryEnvConfig,
    pub training: TrainingEnvConfig,
    pub observability: ObservabilityEnvConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            registry: RegistryEnvConfig::from_env(),
            training: TrainingEnvConfig::from_env(),
            observability: ObservabilityEnvConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let test_size = self.training.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            anyhow::bail!(
                "Invalid TRAINING_TEST_SIZE: {}. Must lie strictly between 0 and 1",
                test_size
            );
        }
        if self.training.cv_folds < 2 {
            anyhow::bail!(
                "Invalid TRAINING_CV_FOLDS: {}. Need at least 2 folds",
                self.training.cv_folds
            );
        }
        if self.registry.directory.as_os_str().is_empty() {
            anyhow::bail!("MODEL_REGISTRY_DIR must not be empty");
        }
        Ok(())
    }
}
