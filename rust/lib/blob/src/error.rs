use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// Upload refused by the file-type filter.
    #[error("{0}")]
    Rejected(String),
}
