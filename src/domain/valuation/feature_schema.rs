use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Encoding state captured when a schema is fitted.
///
/// `vocabulary` holds the sorted categories of each categorical field; the
/// first entry is the implicit baseline and has no indicator column.
/// `medians` holds the per-field imputation medians of the fitting batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoding {
    pub vocabulary: BTreeMap<String, Vec<String>>,
    pub medians: BTreeMap<String, f64>,
}

impl FeatureEncoding {
    pub fn baseline(&self, field: &str) -> Option<&str> {
        self.vocabulary
            .get(field)
            .and_then(|c| c.first())
            .map(String::as_str)
    }

    /// Categories that get an indicator column, in column order.
    pub fn indicator_categories(&self, field: &str) -> &[String] {
        match self.vocabulary.get(field) {
            Some(categories) if !categories.is_empty() => &categories[1..],
            _ => &[],
        }
    }
}

/// Ordered engineered columns a trained model expects as input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoding: Option<FeatureEncoding>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>, encoding: FeatureEncoding) -> Self {
        Self {
            columns,
            encoding: Some(encoding),
        }
    }

    /// A schema known only by its column names, e.g. recovered from metadata
    /// written without encoding state. Re-encoding a batch against it has to
    /// go through [`crate::domain::valuation::feature_matrix::FeatureMatrix::reindex`].
    pub fn from_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            encoding: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn encoding(&self) -> Option<&FeatureEncoding> {
        self.encoding.as_ref()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}
