//! Byte storage for uploaded files
//!
//! Uploads are written once under a caller-supplied unique key (typically the
//! request id plus extension) and removed after the recognition pipeline has
//! consumed them.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key/byte-sequence store
pub trait FileStore: Send + Sync {
    /// Persist `bytes` under `key`, returning the stored location
    fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Remove a previously written location
    fn remove(&self, location: &Path) -> Result<()>;
}

/// Store backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Open a store rooted at `root`, creating the directory if missing
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            info!("Creating upload directory: {}", root.display());
            std::fs::create_dir_all(&root)?;
        }
        Ok(Self { root })
    }

    /// Directory holding stored files
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validate_key(key: &str) -> Result<()> {
        let invalid = key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\', '\0']);
        if invalid {
            return Err(Error::InvalidInput(format!("Invalid storage key: {:?}", key)));
        }
        Ok(())
    }
}

impl FileStore for LocalFileStore {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        Self::validate_key(key)?;
        let path = self.root.join(key);
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Stored upload");
        Ok(path)
    }

    fn remove(&self, location: &Path) -> Result<()> {
        if !location.starts_with(&self.root) {
            return Err(Error::InvalidInput(format!(
                "Location outside upload directory: {}",
                location.display()
            )));
        }
        match std::fs::remove_file(location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(location.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();

        let location = store.write("request-1.wav", b"RIFF\x00\x01").unwrap();

        assert_eq!(location, dir.path().join("request-1.wav"));
        assert_eq!(std::fs::read(&location).unwrap(), b"RIFF\x00\x01");
    }

    #[test]
    fn test_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("uploads").join("audio");

        let store = LocalFileStore::new(&nested).unwrap();

        assert!(nested.is_dir());
        assert_eq!(store.root(), nested.as_path());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();

        for key in ["", "..", "../escape.wav", "nested/file.wav", "a\\b.wav"] {
            assert!(
                matches!(store.write(key, b"x"), Err(Error::InvalidInput(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        let location = store.write("gone.mp3", b"data").unwrap();

        store.remove(&location).unwrap();

        assert!(!location.exists());
        assert!(matches!(store.remove(&location), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_remove_outside_root_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).unwrap();
        let outside = other.path().join("keep.wav");
        std::fs::write(&outside, b"keep").unwrap();

        assert!(matches!(store.remove(&outside), Err(Error::InvalidInput(_))));
        assert!(outside.exists());
    }
}
