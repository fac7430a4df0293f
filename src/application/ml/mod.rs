// Feature engineering
pub mod feature_builder;

// Model, training and evaluation
pub mod cross_validation;
pub mod evaluator;
pub mod gradient_boosting;
pub mod predictor;
pub mod trainer;

// Versioned persistence and re-validation
pub mod backtest;
pub mod registry;

// Orchestration and output
pub mod pipeline;
pub mod reporting;
pub mod synthetic;
