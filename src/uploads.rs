use crate::{
    mime::MimeRegistry,
    storage::{Storage, StorageError},
};
use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Arc};

pub use models::{Breadcrumb, FileDetails, FolderInfo, Outcome};

pub mod models;

pub const NOT_EMPTY: &str = "Directory must be empty to delete it.";
pub const FILE_EXISTS: &str = "File already exists.";
pub const FILE_MISSING: &str = "File does not exist.";

/// Where uploaded files are published.
#[derive(Debug, Clone, Default)]
pub struct WebPaths {
    /// Prefix joined with a file's disk path, e.g. `/uploads`.
    pub webpath: String,

    /// Base URL relative web paths are resolved against.
    pub url: Option<String>,
}

/// Browses and edits the uploads disk.
///
/// Holds no state of its own, every call reads the disk. The guards in front
/// of writes check before they act; the disk's exclusive writes cover the gap
/// between the check and the write, a lost race is reported the same way as
/// a failed check.
#[derive(Debug, Clone)]
pub struct UploadsManager {
    disk: Arc<dyn Storage>,
    mime: Arc<dyn MimeRegistry>,
    web: WebPaths,
}

impl UploadsManager {
    pub fn new(disk: Arc<dyn Storage>, mime: Arc<dyn MimeRegistry>, web: WebPaths) -> Self {
        Self { disk, mime, web }
    }

    /// Describe the contents of `folder`. A folder that does not exist is
    /// described as empty.
    pub fn folder_info(&self, folder: &str) -> Result<FolderInfo, StorageError> {
        let folder = clean_folder(folder);

        let mut breadcrumbs = breadcrumbs(&folder);
        let folder_name = breadcrumbs
            .pop()
            .map(|crumb| crumb.label)
            .unwrap_or_else(|| "root".to_string());

        let subfolders = self
            .disk
            .directories(&folder)?
            .into_iter()
            .map(|subfolder| {
                let name = basename(&subfolder).to_string();
                (format!("/{subfolder}"), name)
            })
            .collect::<BTreeMap<_, _>>();

        let files = self
            .disk
            .files(&folder)?
            .iter()
            .map(|path| self.file_details(path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FolderInfo {
            folder,
            folder_name,
            breadcrumbs,
            subfolders,
            files,
        })
    }

    pub fn file_details(&self, path: &str) -> Result<FileDetails, StorageError> {
        let path = format!("/{}", path.trim_start_matches('/'));

        Ok(FileDetails {
            name: basename(&path).to_string(),
            web_path: self.file_web_path(&path),
            mime_type: self.file_mime_type(&path),
            size: self.file_size(&path)?,
            modified: self.file_modified(&path)?,
            full_path: path,
        })
    }

    /// The URL a file is published under.
    pub fn file_web_path(&self, path: &str) -> String {
        let path = format!(
            "{}/{}",
            self.web.webpath.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        if path.contains("://") {
            return path;
        }

        match self.web.url {
            Some(ref url) => format!(
                "{}/{}",
                url.trim_end_matches('/'),
                path.trim_start_matches('/')
            ),
            None => path,
        }
    }

    pub fn file_mime_type(&self, path: &str) -> Option<String> {
        self.mime.find_type(extension(path)).map(String::from)
    }

    pub fn file_size(&self, path: &str) -> Result<u64, StorageError> {
        self.disk.size(path)
    }

    pub fn file_modified(&self, path: &str) -> Result<DateTime<Utc>, StorageError> {
        let timestamp = self.disk.last_modified(path)?;
        DateTime::from_timestamp(timestamp, 0).ok_or(StorageError::InvalidTimestamp(timestamp))
    }

    pub fn create_directory(&self, folder: &str) -> Result<Outcome, StorageError> {
        let folder = clean_folder(folder);
        let exists = Outcome::Refused(format!("Folder '{folder}' already exists."));

        if self.disk.exists(&folder)? {
            return Ok(exists);
        }

        match self.disk.make_directory(&folder) {
            Ok(()) => Ok(Outcome::Done),
            Err(StorageError::AlreadyExists(_)) => Ok(exists),
            Err(e) => Err(e),
        }
    }

    /// Delete `folder` if it is empty. Never deletes recursively.
    pub fn delete_directory(&self, folder: &str) -> Result<Outcome, StorageError> {
        let folder = clean_folder(folder);

        if !self.disk.directories(&folder)?.is_empty() || !self.disk.files(&folder)?.is_empty() {
            return Ok(Outcome::Refused(NOT_EMPTY.to_string()));
        }

        self.disk.delete_directory(&folder)?;

        Ok(Outcome::Done)
    }

    /// Store a new file. Existing files are never overwritten.
    pub fn save_file(&self, path: &str, content: &[u8]) -> Result<Outcome, StorageError> {
        let path = clean_folder(path);

        if self.disk.exists(&path)? {
            return Ok(Outcome::Refused(FILE_EXISTS.to_string()));
        }

        match self.disk.put(&path, content) {
            Ok(()) => Ok(Outcome::Done),
            Err(StorageError::AlreadyExists(_)) => Ok(Outcome::Refused(FILE_EXISTS.to_string())),
            Err(e) => Err(e),
        }
    }

    pub fn delete_file(&self, path: &str) -> Result<Outcome, StorageError> {
        let path = clean_folder(path);

        if !self.disk.exists(&path)? {
            return Ok(Outcome::Refused(FILE_MISSING.to_string()));
        }

        match self.disk.delete(&path) {
            Ok(()) => Ok(Outcome::Done),
            Err(StorageError::NotFound(_)) => Ok(Outcome::Refused(FILE_MISSING.to_string())),
            Err(e) => Err(e),
        }
    }
}

/// Strip every `..`, then surrounding slashes, and root the result at `/`.
///
/// This only removes the `..` substring. It does not resolve `.` or collapse
/// repeated slashes, the disk is expected to refuse anything outside its root.
pub fn clean_folder(folder: &str) -> String {
    format!("/{}", folder.replace("..", "").trim_matches('/'))
}

/// Trail from the root to `folder`, the folder itself included.
pub fn breadcrumbs(folder: &str) -> Vec<Breadcrumb> {
    let folder = folder.trim_matches('/');
    let mut crumbs = vec![Breadcrumb::new("/", "root")];

    if folder.is_empty() {
        return crumbs;
    }

    let mut build = String::new();
    for segment in folder.split('/') {
        build.push('/');
        build.push_str(segment);
        crumbs.push(Breadcrumb::new(build.clone(), segment));
    }

    crumbs
}

fn basename(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Everything after the last dot of the file name, empty if there is none.
fn extension(path: &str) -> &str {
    basename(path)
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("")
}
