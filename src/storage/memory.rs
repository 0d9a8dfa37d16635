use super::{normalize, Storage, StorageError};
use chrono::Utc;
use std::{
    collections::BTreeMap,
    io,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::debug;

#[derive(Debug, Clone)]
enum Entry {
    Directory { modified: i64 },
    File { content: Vec<u8>, modified: i64 },
}

/// An in process disk. Every operation runs under a single lock, so the
/// exclusive writes are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryDisk {
    /// Keyed by disk relative path. The root is implicit.
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of the file at `path`, if there is one.
    #[cfg(test)]
    pub(crate) fn read(&self, path: &str) -> Option<Vec<u8>> {
        match self.entries().get(&normalize(path)) {
            Some(Entry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }

    fn entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn entries_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn list(&self, folder: &str, directories: bool) -> Vec<String> {
        let folder = normalize(folder);
        self.entries()
            .iter()
            .filter(|(path, entry)| {
                parent(path) == folder && matches!(entry, Entry::Directory { .. }) == directories
            })
            .map(|(path, _)| path.clone())
            .collect()
    }
}

impl Storage for MemoryDisk {
    fn directories(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.list(folder, true))
    }

    fn files(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.list(folder, false))
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let path = normalize(path);
        Ok(path.is_empty() || self.entries().contains_key(&path))
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        match self.entries().get(&normalize(path)) {
            Some(Entry::File { content, .. }) => Ok(content.len() as u64),
            Some(Entry::Directory { .. }) => Ok(0),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    fn last_modified(&self, path: &str) -> Result<i64, StorageError> {
        match self.entries().get(&normalize(path)) {
            Some(Entry::File { modified, .. } | Entry::Directory { modified }) => Ok(*modified),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    fn make_directory(&self, path: &str) -> Result<(), StorageError> {
        let rel = normalize(path);
        let mut entries = self.entries_mut();

        if rel.is_empty() || entries.contains_key(&rel) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        insert_parents(&mut entries, &rel)?;

        debug!("Creating directory {rel}");

        entries.insert(
            rel,
            Entry::Directory {
                modified: Utc::now().timestamp(),
            },
        );

        Ok(())
    }

    fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        let rel = normalize(path);
        let mut entries = self.entries_mut();

        match entries.get(&rel) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => return Err(StorageError::InvalidPath(path.to_string())),
            None => return Err(StorageError::NotFound(path.to_string())),
        }

        if entries.keys().any(|key| parent(key) == rel) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("{path}: directory not empty"),
            )));
        }

        debug!("Removing directory {rel}");
        entries.remove(&rel);

        Ok(())
    }

    fn put(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let rel = normalize(path);
        if rel.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        let mut entries = self.entries_mut();

        if entries.contains_key(&rel) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        insert_parents(&mut entries, &rel)?;

        debug!("Writing {} bytes to {rel}", content.len());

        entries.insert(
            rel,
            Entry::File {
                content: content.to_vec(),
                modified: Utc::now().timestamp(),
            },
        );

        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let rel = normalize(path);
        let mut entries = self.entries_mut();

        match entries.get(&rel) {
            Some(Entry::File { .. }) => {}
            Some(Entry::Directory { .. }) => {
                return Err(StorageError::InvalidPath(path.to_string()))
            }
            None => return Err(StorageError::NotFound(path.to_string())),
        }

        debug!("Removing file {rel}");
        entries.remove(&rel);

        Ok(())
    }
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

/// Create every missing ancestor of `path`. Fails if one of them is a file.
fn insert_parents(entries: &mut BTreeMap<String, Entry>, path: &str) -> Result<(), StorageError> {
    let mut current = path;

    let mut missing = vec![];

    while let Some((ancestor, _)) = current.rsplit_once('/') {
        match entries.get(ancestor) {
            Some(Entry::Directory { .. }) => break,
            Some(Entry::File { .. }) => return Err(StorageError::InvalidPath(path.to_string())),
            None => missing.push(ancestor.to_string()),
        }
        current = ancestor;
    }

    let now = Utc::now().timestamp();
    for ancestor in missing {
        entries.insert(ancestor, Entry::Directory { modified: now });
    }

    Ok(())
}
