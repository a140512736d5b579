/// Directory-tree backend.
pub mod fs;
/// In-process backend.
pub mod memory;
/// SQLite backend.
pub mod sqlite;

use std::io;

/// Errors raised by a [`Storage`] backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key or directory is missing or cannot be read.
    #[error("cannot read {key}: {source}")]
    Read {
        /// Key or directory that was read.
        key: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },
    /// The key cannot be written (missing parent directory, permissions, ...).
    #[error("cannot write {key}: {source}")]
    Write {
        /// Key or directory that was written.
        key: String,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    pub(crate) fn read(key: &str, source: io::Error) -> Self {
        Self::Read {
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn write(key: &str, source: io::Error) -> Self {
        Self::Write {
            key: key.to_string(),
            source,
        }
    }

    /// True when the failure is a missing key or directory.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
        }
    }
}

/// Result alias for storage backends.
pub type StorageResult<T> = Result<T, StorageError>;

/// Document storage addressed by `/`-separated keys relative to a root.
///
/// Contract shared by all backends:
/// - `write_atomic` replaces the whole document or leaves the old one intact;
///   readers never observe a half-written document.
/// - `write_atomic` fails with [`StorageError::Write`] when the parent
///   directory of `key` does not exist. Directories are never created implicitly.
/// - `list_entries` returns entry names (not full keys) sorted by name. That
///   order is the listing order observed by the merge job.
pub trait Storage: Send + Sync {
    /// Reads the whole document at `key`.
    fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Atomically replaces the document at `key` with `bytes`.
    fn write_atomic(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Lists entry names directly under `dir`.
    fn list_entries(&self, dir: &str) -> StorageResult<Vec<String>>;

    /// Removes the document at `key`. Returns `true` if it existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Creates `dir` and any missing parents. Succeeds if it already exists.
    fn create_dir(&self, dir: &str) -> StorageResult<()>;
}

/// Joins a directory and an entry name into a key.
pub fn join_key(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Parent directory of `key`, or `""` for top-level keys.
pub(crate) fn parent_of(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}
