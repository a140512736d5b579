//! In-memory backend for tests and benches.

use std::{io, sync::Mutex};

use hashbrown::{HashMap, HashSet};

use super::{Storage, StorageError, StorageResult, join_key, parent_of};

#[derive(Debug, Default)]
struct Inner {
    docs: HashMap<String, Vec<u8>>,
    dirs: HashSet<String>,
}

/// [`Storage`] kept entirely in process memory.
///
/// The root directory (`""`) always exists; other directories must be created
/// with [`Storage::create_dir`] before documents can be written into them.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Empty storage with only the root directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document, creating parent directories.
    pub fn with_document(self, key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        {
            let mut inner = self.lock();
            add_dirs(&mut inner.dirs, parent_of(key));
            inner.docs.insert(key.to_string(), bytes.into());
        }
        self
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    /// True when no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.lock()
            .docs
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::read(key, io::ErrorKind::NotFound.into()))
    }

    fn write_atomic(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let mut inner = self.lock();
        let dir = parent_of(key);
        if !dir.is_empty() && !inner.dirs.contains(dir) {
            return Err(StorageError::write(key, io::ErrorKind::NotFound.into()));
        }
        if inner.dirs.contains(key) {
            return Err(StorageError::write(key, io::ErrorKind::IsADirectory.into()));
        }
        inner.docs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list_entries(&self, dir: &str) -> StorageResult<Vec<String>> {
        let inner = self.lock();
        let dir = dir.trim_end_matches('/');
        if !dir.is_empty() && !inner.dirs.contains(dir) {
            return Err(StorageError::read(dir, io::ErrorKind::NotFound.into()));
        }

        let mut names: Vec<String> = inner
            .docs
            .keys()
            .chain(inner.dirs.iter())
            .filter(|key| parent_of(key) == dir && !key.is_empty())
            .map(|key| key.rsplit('/').next().unwrap_or(key.as_str()).to_string())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.lock().docs.remove(key).is_some())
    }

    fn create_dir(&self, dir: &str) -> StorageResult<()> {
        let mut inner = self.lock();
        if inner.docs.contains_key(dir) {
            return Err(StorageError::write(dir, io::ErrorKind::AlreadyExists.into()));
        }
        add_dirs(&mut inner.dirs, dir);
        Ok(())
    }
}

fn add_dirs(dirs: &mut HashSet<String>, dir: &str) {
    let mut current = String::new();
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        current = join_key(&current, part);
        dirs.insert(current.clone());
    }
}
