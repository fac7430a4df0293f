//! Directory-backed artifact store: `<root>/<unit>/<name>`.

use crate::domain::ports::ArtifactStore;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    /// Does not touch the disk; the root is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unit_dir(&self, unit: &str) -> io::Result<PathBuf> {
        validate_segment(unit)?;
        Ok(self.root.join(unit))
    }

    fn object_path(&self, unit: &str, name: &str) -> io::Result<PathBuf> {
        validate_segment(name)?;
        Ok(self.unit_dir(unit)?.join(name))
    }
}

/// Unit and object names are single path segments.
fn validate_segment(segment: &str) -> io::Result<()> {
    let invalid = segment.is_empty()
        || segment.starts_with('.')
        || segment.contains(['/', '\\'])
        || segment.contains("..");
    if invalid {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("invalid storage name {:?}", segment),
        ));
    }
    Ok(())
}

impl ArtifactStore for FileSystemStore {
    fn write(&self, unit: &str, name: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.object_path(unit, name)?;
        let dir = self.unit_dir(unit)?;
        fs::create_dir_all(&dir)?;

        // Atomic write: write to temp file then rename
        let temp_path = dir.join(format!(".{}.tmp", name));
        fs::write(&temp_path, bytes)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            fs::remove_file(&temp_path).ok();
            return Err(e);
        }

        debug!("FileSystemStore: wrote {:?} ({} bytes)", path, bytes.len());
        Ok(())
    }

    fn read(&self, unit: &str, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.object_path(unit, name)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, unit: &str, name: &str) -> io::Result<bool> {
        match fs::metadata(self.object_path(unit, name)?) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list_units(&self) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut units = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                units.push(name.to_string());
            }
        }
        Ok(units)
    }

    fn remove_unit(&self, unit: &str) -> io::Result<bool> {
        // No unit can be stored under an invalid name.
        let Ok(dir) = self.unit_dir(unit) else {
            return Ok(false);
        };
        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
