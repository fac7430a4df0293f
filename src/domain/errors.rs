use thiserror::Error;

/// Errors raised while turning record tables into feature matrices
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Schema error: required fields missing from input table: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Invalid value {value:?} for field {field} at row {row}")]
    InvalidValue {
        field: String,
        row: usize,
        value: String,
    },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Input table has no rows with a target value")]
    NoTargets,
}

/// Errors raised by the regressor itself
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Matrix error: {reason}")]
    Matrix { reason: String },

    #[error("Fit failed: {reason}")]
    Fit { reason: String },

    #[error("Prediction failed: {reason}")]
    Predict { reason: String },

    #[error("Feature width mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to model training and hyperparameter search
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Need at least {folds} samples for {folds}-fold cross-validation, got {samples}")]
    TooFewSamples { folds: usize, samples: usize },

    #[error("Hyperparameter grid is empty")]
    EmptyGrid,

    #[error("Invalid fraction {value}: must lie in (0, 1)")]
    InvalidFraction { value: f64 },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors related to accuracy metrics
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// MAPE divides by the ground truth; a zero actual has no defined percentage error.
    #[error("Division error: ground truth is zero at index {index}, MAPE is undefined")]
    ZeroActual { index: usize },

    #[error("Length mismatch: {predictions} predictions vs {actuals} actuals")]
    LengthMismatch { predictions: usize, actuals: usize },

    #[error("Cannot evaluate an empty sample")]
    Empty,
}

/// Errors related to the model registry
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Persistence error for {version}: {reason}")]
    Persistence { version: String, reason: String },

    #[error("Refusing to register {version}: {reason}")]
    InvalidSchema { version: String, reason: String },

    /// The version is registered but its artifact is missing or undecodable.
    #[error("Model {version} is registered but its artifact could not be loaded")]
    ArtifactUnavailable { version: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Store(#[from] std::io::Error),
}

/// Errors related to backtesting a registered model
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("No registered model has a value for metric '{metric}'")]
    NoModel { metric: String },

    #[error("Model {version} has no recoverable feature schema")]
    SchemaMissing { version: String },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
