//! Model registry configuration parsing from environment variables.

use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RegistryEnvConfig {
    /// Root directory holding one sub-directory per model version.
    pub directory: PathBuf,
    /// Recorded as the author of newly registered models.
    pub author: String,
}

impl Default for RegistryEnvConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/models"),
            author: "unknown".to_string(),
        }
    }
}

impl RegistryEnvConfig {
    pub fn from_env() -> Self {
        Self {
            directory: env::var("MODEL_REGISTRY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/models")),
            author: env::var("MODEL_AUTHOR")
                .or_else(|_| env::var("USER"))
                .unwrap_or_else(|_| "unknown".to_string()),
        }
    }
}
