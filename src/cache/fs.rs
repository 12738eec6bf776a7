//! Filesystem abstraction for the local store
//!
//! The store only needs a handful of primitives: whole-file and prefix reads, creating
//! a brand new file, atomic rename, directory creation and enumeration.
//! [`OsFs`] maps them onto `std::fs`; [`MemFs`] keeps everything in memory.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

/// Filesystem operations used by the local store
pub trait CacheFs: Send + Sync {
    /// Read a whole file
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Read at most `limit` bytes from the start of a file
    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>>;

    /// Create `path`, which must not exist yet, with `data` fully flushed
    fn write_new(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Atomically move `from` over `to`, replacing any existing file
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create a directory and its parents; succeeds if it already exists
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn is_file(&self, path: &Path) -> bool;

    /// Last modification time of a file
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// All regular files below `root`, recursively; empty if `root` is missing
    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

/// OS-backed filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl CacheFs for OsFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        let mut head = Vec::new();
        File::open(path)?
            .take(limit as u64)
            .read_to_end(&mut head)?;
        Ok(head)
    }

    fn write_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        fs::metadata(path)?.modified()
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !root.is_dir() {
            return Ok(files);
        }

        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    files.push(entry.path());
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

#[derive(Debug, Clone)]
struct MemFile {
    data: Vec<u8>,
    modified: SystemTime,
}

/// In-memory filesystem
///
/// Directories are implicit: any path can hold a file.
#[derive(Debug, Default)]
pub struct MemFs {
    files: RwLock<BTreeMap<PathBuf, MemFile>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a file's modification time
    pub fn set_modified(&self, path: &Path, modified: SystemTime) -> io::Result<()> {
        let mut files = self.files_mut();
        let file = files.get_mut(path).ok_or_else(|| not_found(path))?;
        file.modified = modified;
        Ok(())
    }

    fn files(&self) -> RwLockReadGuard<'_, BTreeMap<PathBuf, MemFile>> {
        self.files.read().unwrap_or_else(|e| e.into_inner())
    }

    fn files_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<PathBuf, MemFile>> {
        self.files.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

impl CacheFs for MemFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files()
            .get(path)
            .map(|f| f.data.clone())
            .ok_or_else(|| not_found(path))
    }

    fn read_head(&self, path: &Path, limit: usize) -> io::Result<Vec<u8>> {
        self.files()
            .get(path)
            .map(|f| f.data[..f.data.len().min(limit)].to_vec())
            .ok_or_else(|| not_found(path))
    }

    fn write_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut files = self.files_mut();
        if files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        files.insert(
            path.to_path_buf(),
            MemFile {
                data: data.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut files = self.files_mut();
        let file = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), file);
        Ok(())
    }

    fn create_dir_all(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.files_mut()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        self.files()
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| not_found(path))
    }

    fn walk_files(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files()
            .keys()
            .filter(|p| p.starts_with(root))
            .cloned()
            .collect())
    }
}
