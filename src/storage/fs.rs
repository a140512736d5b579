//! Filesystem backend rooted at a directory.

use std::{
    fs, io,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use super::{Storage, StorageError, StorageResult, parent_of};

/// [`Storage`] over a real directory tree.
///
/// Writes go to a temp file in the target's directory and are renamed over the
/// target, so a crash mid-write leaves the previous document in place.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Uses `root` as the base for all keys. The directory must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for `key`.
    pub fn path_of(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl Storage for FsStorage {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        fs::read(self.path_of(key)).map_err(|e| StorageError::read(key, e))
    }

    fn write_atomic(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let dir = self.path_of(parent_of(key));
        let target = self.path_of(key);

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StorageError::write(key, e))?;
        tmp.write_all(bytes).map_err(|e| StorageError::write(key, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::write(key, e))?;
        tmp.persist(&target)
            .map_err(|e| StorageError::write(key, e.error))?;

        tracing::debug!(key, bytes = bytes.len(), "document replaced");
        Ok(())
    }

    fn list_entries(&self, dir: &str) -> StorageResult<Vec<String>> {
        let read_dir = fs::read_dir(self.path_of(dir)).map_err(|e| StorageError::read(dir, e))?;

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| StorageError::read(dir, e))?;
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => tracing::warn!(dir, name = ?raw, "skipping non-utf8 entry"),
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        match fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::write(key, e)),
        }
    }

    fn create_dir(&self, dir: &str) -> StorageResult<()> {
        fs::create_dir_all(self.path_of(dir)).map_err(|e| StorageError::write(dir, e))
    }
}
