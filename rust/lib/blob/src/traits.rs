use crate::error::BlobError;

/// BlobStore stores uploaded files by key.
///
/// Keys are flat or path-like strings (`field-1718000000000-123456789.pdf`).
/// The default implementation (`FileStore`) maps keys to local filesystem paths
/// that `docketd` serves statically.
pub trait BlobStore: Send + Sync {
    /// Store a blob. Overwrites if the key already exists.
    fn put(&self, key: &str, data: &[u8]) -> Result<(), BlobError>;

    /// Retrieve a blob. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. No-op if the key does not exist.
    fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Check whether a blob exists.
    fn exists(&self, key: &str) -> Result<bool, BlobError>;
}
