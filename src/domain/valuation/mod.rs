pub mod feature_matrix;
pub mod feature_schema;
pub mod model_metadata;
pub mod record_table;
pub mod transaction;
