use std::io;

/// Directory/blob namespace backing the model registry.
///
/// Storage is organised in units (one per model version), each holding named
/// objects. Implementations must make `write` atomic per object: a reader
/// either sees the complete object or none at all.
pub trait ArtifactStore: Send + Sync {
    /// Writes an object, replacing any previous content.
    fn write(&self, unit: &str, name: &str, bytes: &[u8]) -> io::Result<()>;

    /// Reads an object; `Ok(None)` when it does not exist.
    fn read(&self, unit: &str, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Whether the object is present and readable on the backing store.
    fn exists(&self, unit: &str, name: &str) -> io::Result<bool>;

    /// Names of all units currently in the namespace, in no particular order.
    fn list_units(&self) -> io::Result<Vec<String>>;

    /// Removes a unit with everything in it. Returns `false` if it did not exist.
    fn remove_unit(&self, unit: &str) -> io::Result<bool>;

    /// Human-readable location, for log lines.
    fn describe(&self) -> String;
}
