use crate::{
    config::{StorageDriver, UploadsConfig},
    error::UploadsError,
};
use std::{fmt::Debug, io, sync::Arc};
use thiserror::Error;

mod local;
mod memory;

pub use local::LocalDisk;
pub use memory::MemoryDisk;

/// A path addressed byte store with directory semantics.
///
/// Paths are slash delimited and relative to the disk root. A leading `/` is
/// accepted and ignored. Listings return disk relative paths without a
/// leading slash, e.g. `"photos/2019"`, sorted.
///
/// Listing a folder that does not exist yields an empty list.
///
/// `make_directory` and `put` are exclusive: if the target already exists they
/// must fail with [StorageError::AlreadyExists] instead of succeeding.
pub trait Storage: Debug + Send + Sync {
    /// Immediate subdirectories of `folder`.
    fn directories(&self, folder: &str) -> Result<Vec<String>, StorageError>;

    /// Immediate files of `folder`.
    fn files(&self, folder: &str) -> Result<Vec<String>, StorageError>;

    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Size in bytes.
    fn size(&self, path: &str) -> Result<u64, StorageError>;

    /// Last modification as seconds since the Unix epoch.
    fn last_modified(&self, path: &str) -> Result<i64, StorageError>;

    /// Create `path`, including any missing parents.
    fn make_directory(&self, path: &str) -> Result<(), StorageError>;

    /// Remove an empty directory.
    fn delete_directory(&self, path: &str) -> Result<(), StorageError>;

    /// Write a new file, creating missing parent directories.
    fn put(&self, path: &str, content: &[u8]) -> Result<(), StorageError>;

    fn delete(&self, path: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}: not found")]
    NotFound(String),

    #[error("{0}: already exists")]
    AlreadyExists(String),

    #[error("{0}: invalid path")]
    InvalidPath(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

impl StorageError {
    /// Attach `path` to the io errors callers are expected to branch on.
    pub fn from_io(path: &str, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_string()),
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path.to_string()),
            _ => Self::Io(error),
        }
    }
}

/// Open the disk selected by the uploads configuration.
pub fn disk(config: &UploadsConfig) -> Result<Arc<dyn Storage>, UploadsError> {
    match config.storage {
        StorageDriver::Local => {
            let Some(ref root) = config.root else {
                return Err(UploadsError::Config(
                    "the local storage driver requires `root`".to_string(),
                ));
            };
            Ok(Arc::new(LocalDisk::new(root)?))
        }
        StorageDriver::Memory => Ok(Arc::new(MemoryDisk::new())),
    }
}

/// Split a disk path into its segments, skipping empty ones and `.`.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Disk relative form of `path`, e.g. `"/a//b/"` becomes `"a/b"`.
fn normalize(path: &str) -> String {
    segments(path).collect::<Vec<_>>().join("/")
}

fn join(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}
