use std::fs;
use std::path::{Path, PathBuf};

use crate::error::BlobError;
use crate::traits::BlobStore;

fn io(e: std::io::Error) -> BlobError {
    BlobError::Io(e.to_string())
}

/// FileStore is a BlobStore implementation backed by the local filesystem.
///
/// Keys are mapped to paths under `base_dir`; parent directories are created
/// on `put`. Keys that would resolve outside `base_dir` are refused.
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a new FileStore rooted at `base_dir`, creating the directory.
    pub fn open(base_dir: &Path) -> Result<Self, BlobError> {
        fs::create_dir_all(base_dir).map_err(io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a key to a filesystem path. Rejects keys that escape base_dir.
    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
            return Err(BlobError::InvalidKey(format!("{key:?}")));
        }
        if key.split(['/', '\\']).any(|part| part == "..") {
            return Err(BlobError::InvalidKey(format!("path traversal in {key:?}")));
        }

        let path = self.base_dir.join(key);
        let canonical_base = self.base_dir.canonicalize().map_err(io)?;

        // Symlinked parents can still point elsewhere; check what exists.
        let existing = path
            .ancestors()
            .find(|p| p.exists())
            .map(|p| p.canonicalize())
            .transpose()
            .map_err(io)?;
        if let Some(existing) = existing {
            if !existing.starts_with(&canonical_base) {
                return Err(BlobError::InvalidKey(format!("path traversal in {key:?}")));
            }
        }

        Ok(path)
    }
}

impl BlobStore for FileStore {
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io)?;
        }
        fs::write(&path, data).map_err(io)?;
        tracing::debug!(key, bytes = data.len(), "stored blob");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path).map(Some).map_err(io)
    }

    fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        if path.is_file() {
            fs::remove_file(&path).map_err(io)?;
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, BlobError> {
        Ok(self.resolve(key)?.is_file())
    }
}
