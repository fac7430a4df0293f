pub mod csv_source;
pub mod observability;
pub mod persistence;
pub mod repositories;

pub use csv_source::CsvTableSource;
pub use persistence::FileSystemStore;
pub use repositories::InMemoryArtifactStore;
