use super::feature_schema::{FeatureEncoding, FeatureSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metric name → value. `None` means "not computed" and is never coerced to a
/// number; selection logic skips it.
pub type ModelMetrics = BTreeMap<String, Option<f64>>;

pub mod metric_names {
    pub const MAE: &str = "mae";
    pub const MAPE: &str = "mape";
    pub const MDAPE: &str = "mdape";
    pub const R2: &str = "r2";
    pub const RMSE: &str = "rmse";
    pub const TRAIN_MAPE: &str = "train_mape";
    pub const TRAIN_TEST_DELTA: &str = "train_test_delta";
    pub const VALIDATION_MAE: &str = "validation_mae";
}

/// Unique, time-ordered identifier of a registered model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(String);

impl ModelVersion {
    pub const FORMAT: &'static str = "v_%Y%m%d_%H%M%S_%6f";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `v_<date>_<time>_<microseconds>`, lexicographically ordered like the timestamp.
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp.format(Self::FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive record for one registered version. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: ModelVersion,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub metrics: ModelMetrics,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub feature_schema: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_encoding: Option<FeatureEncoding>,
}

impl ModelMetadata {
    /// Present value of `name`, if recorded.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().flatten()
    }

    /// The schema the model was trained with.
    ///
    /// `None` when the metadata carries no column list (or an empty one);
    /// such a model cannot be safely fed a freshly built matrix.
    pub fn feature_schema(&self) -> Option<FeatureSchema> {
        let columns = self.feature_schema.as_ref().filter(|c| !c.is_empty())?;
        Some(match &self.feature_encoding {
            Some(encoding) => FeatureSchema::new(columns.clone(), encoding.clone()),
            None => FeatureSchema::from_columns(columns.clone()),
        })
    }
}
