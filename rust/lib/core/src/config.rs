use std::path::{Path, PathBuf};

/// On-disk layout of a docket deployment.
///
/// Everything lives under one data directory unless a path is overridden.
#[derive(Debug, Clone, Default)]
pub struct DataPaths {
    /// Root directory for all persistent state.
    pub data_dir: PathBuf,

    /// SQLite database holding every record table.
    /// Defaults to `{data_dir}/docket.sqlite`.
    pub sqlite_path: Option<PathBuf>,

    /// redb database holding the payment order ledger.
    /// Defaults to `{data_dir}/ledger.redb`.
    pub ledger_path: Option<PathBuf>,

    /// Directory uploaded form files are written to and served from.
    /// Defaults to `{data_dir}/uploads/`.
    pub upload_dir: Option<PathBuf>,
}

impl DataPaths {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Resolve the SQLite database path.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("docket.sqlite"))
    }

    /// Resolve the redb ledger path.
    pub fn resolve_ledger_path(&self) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("ledger.redb"))
    }

    /// Resolve the upload directory.
    pub fn resolve_upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads"))
    }
}
