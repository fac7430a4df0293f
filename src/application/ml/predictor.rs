use crate::domain::errors::ModelError;
use crate::domain::valuation::feature_matrix::FeatureMatrix;

/// Interface for price regressors
pub trait PricePredictor: Send + Sync {
    /// Predict one price per row. Columns must follow the model's feature schema.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;

    /// Get model name/type
    fn name(&self) -> &str;
}
