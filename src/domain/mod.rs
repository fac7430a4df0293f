// Domain-specific error types
pub mod errors;

// Port interfaces
pub mod ports;

// Valuation domain: records, schemas, model metadata
pub mod valuation;
