use super::{join, normalize, segments, Storage, StorageError};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::{debug, warn};

/// Prefix of files still being written by `put`. Hidden from listings.
const PARTIAL_PREFIX: &str = ".partial-";

/// A disk backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    /// Open a disk at `root`, creating the directory if it is missing.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = fs::canonicalize(root)?;
        debug!("Opened local disk at {}", root.display());
        Ok(Self { root })
    }

    /// Map a disk path onto the filesystem. Refuses parent components, and
    /// any path whose deepest existing ancestor resolves outside of `root`
    /// once symlinks are followed.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut full = self.root.clone();
        for segment in segments(path) {
            if segment == ".." {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
            full.push(segment);
        }

        let mut existing = full.as_path();
        while fs::symlink_metadata(existing).is_err() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }

        // Dangling links fail to canonicalize
        let Ok(real) = fs::canonicalize(existing) else {
            return Err(StorageError::InvalidPath(path.to_string()));
        };

        if !real.starts_with(&self.root) {
            warn!("{path} resolves to {}, outside of the disk", real.display());
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        Ok(full)
    }

    fn list(&self, folder: &str, directories: bool) -> Result<Vec<String>, StorageError> {
        let folder = normalize(folder);
        let dir = self.resolve(&folder)?;

        if !dir.is_dir() {
            debug!("Listing missing directory {}", dir.display());
            return Ok(vec![]);
        }

        let entries = fs::read_dir(&dir)
            .map_err(|e| StorageError::from_io(&folder, e))?
            .filter_map(Result::ok);

        let mut paths = vec![];

        for entry in entries {
            if entry.path().is_dir() != directories {
                continue;
            }

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!("Skipping {name:?}: not valid utf-8");
                continue;
            };

            if name.starts_with(PARTIAL_PREFIX) {
                continue;
            }

            paths.push(join(&folder, name));
        }

        paths.sort();

        Ok(paths)
    }
}

impl Storage for LocalDisk {
    fn directories(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        self.list(folder, true)
    }

    fn files(&self, folder: &str) -> Result<Vec<String>, StorageError> {
        self.list(folder, false)
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.resolve(path)?.exists())
    }

    fn size(&self, path: &str) -> Result<u64, StorageError> {
        let meta =
            fs::metadata(self.resolve(path)?).map_err(|e| StorageError::from_io(path, e))?;
        Ok(meta.len())
    }

    fn last_modified(&self, path: &str) -> Result<i64, StorageError> {
        let modified = fs::metadata(self.resolve(path)?)
            .and_then(|meta| meta.modified())
            .map_err(|e| StorageError::from_io(path, e))?;

        Ok(unix_seconds(modified))
    }

    fn make_directory(&self, path: &str) -> Result<(), StorageError> {
        let rel = normalize(path);
        if rel.is_empty() {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }

        let full = self.resolve(&rel)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!("Creating directory {}", full.display());

        // Not `create_dir_all`, a directory that already exists has to fail
        fs::create_dir(&full).map_err(|e| StorageError::from_io(path, e))
    }

    fn delete_directory(&self, path: &str) -> Result<(), StorageError> {
        let rel = normalize(path);
        if rel.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        let full = self.resolve(&rel)?;
        debug!("Removing directory {}", full.display());
        fs::remove_dir(full).map_err(|e| StorageError::from_io(path, e))
    }

    fn put(&self, path: &str, content: &[u8]) -> Result<(), StorageError> {
        let rel = normalize(path);
        if rel.is_empty() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        let full = self.resolve(&rel)?;
        let Some(parent) = full.parent() else {
            return Err(StorageError::InvalidPath(path.to_string()));
        };
        fs::create_dir_all(parent)?;

        debug!("Writing {} bytes to {}", content.len(), full.display());

        // Written next to the target and moved into place only when complete,
        // a failed write leaves nothing behind
        let mut file = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(parent)?;

        file.write_all(content)?;
        file.flush()?;

        file.persist_noclobber(&full).map_err(|e| StorageError::from_io(path, e.error))?;

        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        debug!("Removing file {}", full.display());
        fs::remove_file(full).map_err(|e| StorageError::from_io(path, e))
    }
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk() -> (tempfile::TempDir, LocalDisk) {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).unwrap();
        (dir, disk)
    }

    #[test]
    fn lists_relative_sorted_paths() {
        let (dir, disk) = disk();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::create_dir_all(dir.path().join("a/c")).unwrap();
        fs::write(dir.path().join("a/z.txt"), "z").unwrap();
        fs::write(dir.path().join("a/report.pdf"), "pdf").unwrap();

        assert_eq!(vec!["a/b", "a/c"], disk.directories("/a").unwrap());
        assert_eq!(vec!["a/report.pdf", "a/z.txt"], disk.files("/a/").unwrap());
        assert_eq!(vec!["a"], disk.directories("/").unwrap());
        assert!(disk.files("").unwrap().is_empty());
    }

    #[test]
    fn missing_folder_lists_empty() {
        let (_dir, disk) = disk();
        assert!(disk.directories("/nope").unwrap().is_empty());
        assert!(disk.files("/nope/deeper").unwrap().is_empty());
    }

    #[test]
    fn refuses_parent_components() {
        let (_dir, disk) = disk();
        assert!(matches!(
            disk.exists("/a/../../etc"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            disk.put("../escape.txt", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn put_is_exclusive() {
        let (dir, disk) = disk();
        disk.put("/a/b/file.txt", b"first").unwrap();

        assert!(matches!(
            disk.put("/a/b/file.txt", b"second"),
            Err(StorageError::AlreadyExists(_))
        ));
        assert_eq!(
            "first",
            fs::read_to_string(dir.path().join("a/b/file.txt")).unwrap()
        );
        assert_eq!(5, disk.size("/a/b/file.txt").unwrap());
    }

    #[test]
    fn make_directory_is_exclusive() {
        let (dir, disk) = disk();
        disk.make_directory("/x/y").unwrap();
        assert!(dir.path().join("x/y").is_dir());

        assert!(matches!(
            disk.make_directory("/x/y"),
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            disk.make_directory("/"),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn delete_directory_is_not_recursive() {
        let (_dir, disk) = disk();
        disk.put("/full/file.txt", b"x").unwrap();

        assert!(matches!(
            disk.delete_directory("/full"),
            Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty
        ));
        assert!(disk.exists("/full/file.txt").unwrap());

        disk.delete("/full/file.txt").unwrap();
        disk.delete_directory("/full").unwrap();
        assert!(!disk.exists("/full").unwrap());
    }

    #[test]
    fn metadata_of_missing_file() {
        let (_dir, disk) = disk();
        assert!(matches!(
            disk.size("/missing.txt"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            disk.last_modified("/missing.txt"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn last_modified_is_recent() {
        let (_dir, disk) = disk();
        disk.put("/now.txt", b"now").unwrap();
        let now = unix_seconds(SystemTime::now());
        let modified = disk.last_modified("/now.txt").unwrap();
        assert!((now - modified).abs() < 60);
    }

    #[test]
    fn refused_put_leaves_no_partial_file() {
        let (dir, disk) = disk();
        disk.put("/a/file.txt", b"first").unwrap();

        assert!(disk.put("/a/file.txt", b"second").is_err());

        let names = fs::read_dir(dir.path().join("a"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(vec!["file.txt"], names);
    }

    #[test]
    fn listings_hide_partial_files() {
        let (dir, disk) = disk();
        fs::write(dir.path().join(".partial-abc123"), "half").unwrap();
        fs::write(dir.path().join("done.txt"), "done").unwrap();

        assert_eq!(vec!["done.txt"], disk.files("/").unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_cannot_leave_root() {
        let (dir, disk) = disk();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        assert!(matches!(
            disk.put("/link/pwned.txt", b"escaped"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(!outside.path().join("pwned.txt").exists());

        assert!(matches!(
            disk.delete("/link/secret.txt"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(outside.path().join("secret.txt").exists());

        assert!(matches!(
            disk.size("/link/secret.txt"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            disk.files("/link"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            disk.make_directory("/link/sub"),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_inside_root_are_followed() {
        let (dir, disk) = disk();
        fs::create_dir_all(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        disk.put("/alias/file.txt", b"x").unwrap();
        assert!(dir.path().join("real/file.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlinks_are_refused() {
        let (dir, disk) = disk();
        std::os::unix::fs::symlink(dir.path().join("nowhere"), dir.path().join("dangling"))
            .unwrap();

        assert!(matches!(
            disk.put("/dangling/file.txt", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
    }
}
