//! In-memory artifact store.
//!
//! Thread-safe (`RwLock` over a map of units) and lost on restart. Used by
//! unit tests and by callers that want a throwaway registry.

use crate::domain::ports::ArtifactStore;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::{PoisonError, RwLock};

type Unit = BTreeMap<String, Vec<u8>>;

#[derive(Default)]
pub struct InMemoryArtifactStore {
    units: RwLock<HashMap<String, Unit>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units currently stored, complete or not.
    pub fn unit_count(&self) -> usize {
        self.units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn write(&self, unit: &str, name: &str, bytes: &[u8]) -> io::Result<()> {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        units
            .entry(unit.to_string())
            .or_default()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, unit: &str, name: &str) -> io::Result<Option<Vec<u8>>> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        Ok(units.get(unit).and_then(|u| u.get(name)).cloned())
    }

    fn exists(&self, unit: &str, name: &str) -> io::Result<bool> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        Ok(units.get(unit).is_some_and(|u| u.contains_key(name)))
    }

    fn list_units(&self) -> io::Result<Vec<String>> {
        let units = self.units.read().unwrap_or_else(PoisonError::into_inner);
        Ok(units.keys().cloned().collect())
    }

    fn remove_unit(&self, unit: &str) -> io::Result<bool> {
        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        Ok(units.remove(unit).is_some())
    }

    fn describe(&self) -> String {
        "in-memory store".to_string()
    }
}
