//! Directory-backed content store
//!
//! Each entry is a single file at the key's relative path:
//!
//! ```text
//! apkcache-entry/1\n
//! {"key":...,"size":...,"checksum":...,"fetched_at":...,"source":...}\n
//! <payload>
//! ```
//!
//! The file is written under a uniquely named temporary and renamed into
//! place, so one rename is the whole commit. Readers never take a lock and
//! see either the previous entry or the new one.

use crate::cache::fs::CacheFs;
use crate::cache::key::CacheKey;
use crate::error::{CacheError, CacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use uuid::Uuid;

const MAGIC: &[u8] = b"apkcache-entry/1\n";
const TMP_SUFFIX: &str = ".tmp";

/// Upper bound on the header line; keys are a few hundred bytes at most
const HEADER_LIMIT: usize = 64 * 1024;

/// Metadata of a committed cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Logical identity the entry was stored under
    pub key: CacheKey,
    /// Location of the entry file (not persisted, derived from the root)
    #[serde(skip)]
    pub path: PathBuf,
    /// Payload size in bytes
    pub size: u64,
    /// Lowercase hex SHA-256 of the payload
    pub checksum: String,
    /// When the payload was fetched and stored
    pub fetched_at: DateTime<Utc>,
    /// Where the payload was fetched from
    pub source: String,
}

/// Compute the content fingerprint stored with every entry
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn encode(entry: &CacheEntry, data: &[u8]) -> CacheResult<Vec<u8>> {
    // Compact JSON escapes control characters, so the header stays one line
    let header = serde_json::to_vec(entry)
        .map_err(|e| CacheError::Internal(format!("serializing cache metadata: {}", e)))?;

    let mut out = Vec::with_capacity(MAGIC.len() + header.len() + 1 + data.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&header);
    out.push(b'\n');
    out.extend_from_slice(data);
    Ok(out)
}

/// Parse the header, returning the entry and the payload offset
fn decode_header(raw: &[u8]) -> Result<(CacheEntry, usize), String> {
    let rest = raw
        .strip_prefix(MAGIC)
        .ok_or_else(|| "missing entry header".to_string())?;
    let end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| "truncated entry header".to_string())?;
    let entry = serde_json::from_slice(&rest[..end])
        .map_err(|e| format!("unreadable metadata: {}", e))?;
    Ok((entry, MAGIC.len() + end + 1))
}

/// Removes the temporary on every exit path; a renamed one is already gone
struct TempFile<'a> {
    fs: &'a dyn CacheFs,
    path: PathBuf,
}

impl Drop for TempFile<'_> {
    fn drop(&mut self) {
        match self.fs.remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temporary {}: {}", self.path.display(), e),
        }
    }
}

/// Content store rooted at the cache directory
#[derive(Clone)]
pub struct LocalStore {
    root: PathBuf,
    fs: Arc<dyn CacheFs>,
}

impl LocalStore {
    /// Create a store over `root` using the given filesystem
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn CacheFs>) -> Self {
        Self {
            root: root.into(),
            fs,
        }
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a key's entry file
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Whether a committed entry exists for `key`
    ///
    /// Only a completed rename puts a file at the final path, so presence
    /// is commitment. Content is checked by [`read`](Self::read).
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.fs.is_file(&self.path_for(key))
    }

    /// Read an entry, verifying size and fingerprint
    pub fn read(&self, key: &CacheKey) -> CacheResult<(Vec<u8>, CacheEntry)> {
        let path = self.path_for(key);
        let mut raw = self.fs.read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CacheError::NotFound(key.to_string())
            } else {
                CacheError::io(format!("reading {}", path.display()), e)
            }
        })?;

        let (mut entry, offset) =
            decode_header(&raw).map_err(|reason| CacheError::corrupt(key, reason))?;

        if entry.key != *key {
            return Err(CacheError::corrupt(
                key,
                format!("entry belongs to {}", entry.key),
            ));
        }

        let data = raw.split_off(offset);
        if data.len() as u64 != entry.size {
            return Err(CacheError::corrupt(
                key,
                format!("expected {} bytes, found {}", entry.size, data.len()),
            ));
        }

        let actual = fingerprint(&data);
        if actual != entry.checksum {
            return Err(CacheError::corrupt(
                key,
                format!("checksum mismatch (expected {}, found {})", entry.checksum, actual),
            ));
        }

        entry.path = path;
        debug!("Read {} ({} bytes) from cache", key, entry.size);
        Ok((data, entry))
    }

    /// Store `data` for `key`, replacing any previous entry wholesale
    ///
    /// On failure the previous entry, if any, is untouched.
    pub fn write(&self, key: &CacheKey, data: &[u8], source: &str) -> CacheResult<CacheEntry> {
        let path = self.path_for(key);

        if let Some(parent) = path.parent() {
            self.fs.create_dir_all(parent).map_err(|e| {
                CacheError::io(format!("creating cache directory {}", parent.display()), e)
            })?;
        }

        let entry = CacheEntry {
            key: key.clone(),
            path: path.clone(),
            size: data.len() as u64,
            checksum: fingerprint(data),
            fetched_at: Utc::now(),
            source: source.to_string(),
        };
        let contents = encode(&entry, data)?;

        let tmp = TempFile {
            fs: self.fs.as_ref(),
            path: append_suffix(&path, &format!(".{}{}", Uuid::new_v4().simple(), TMP_SUFFIX)),
        };
        self.fs.write_new(&tmp.path, &contents).map_err(|e| {
            CacheError::io(format!("writing temporary {}", tmp.path.display()), e)
        })?;
        self.fs
            .rename(&tmp.path, &path)
            .map_err(|e| CacheError::io(format!("publishing {}", path.display()), e))?;

        debug!("Stored {} ({} bytes) at {}", key, entry.size, path.display());
        Ok(entry)
    }

    /// Delete an entry; absent entries are not an error
    pub fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        let path = self.path_for(key);
        match self.fs.remove_file(&path) {
            Ok(()) => debug!("Removed cache entry {}", key),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(format!("removing {}", path.display()), e)),
        }
        Ok(())
    }

    /// Enumerate committed entries from their headers
    ///
    /// Payloads are not verified here and unreadable headers are skipped
    /// with a warning; `read` reports both.
    pub fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        let files = self
            .fs
            .walk_files(&self.root)
            .map_err(|e| CacheError::io(format!("listing {}", self.root.display()), e))?;

        let mut entries = Vec::new();
        for path in files {
            if path.to_string_lossy().ends_with(TMP_SUFFIX) {
                continue;
            }

            let head = match self.fs.read_head(&path, HEADER_LIMIT) {
                Ok(head) => head,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            match decode_header(&head) {
                Ok((mut entry, _)) => {
                    entry.path = path;
                    entries.push(entry);
                }
                Err(reason) => warn!("Skipping {}: {}", path.display(), reason),
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Temporaries left behind by writers that died before publishing
    pub fn stale_temporaries(&self, older_than: Duration) -> CacheResult<Vec<PathBuf>> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let files = self
            .fs
            .walk_files(&self.root)
            .map_err(|e| CacheError::io(format!("listing {}", self.root.display()), e))?;

        Ok(files
            .into_iter()
            .filter(|p| p.to_string_lossy().ends_with(TMP_SUFFIX))
            .filter(|p| {
                self.fs
                    .modified(p)
                    .map(|modified| modified <= cutoff)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Remove stale temporaries, returning the paths removed
    pub fn sweep_temporaries(&self, older_than: Duration) -> CacheResult<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for path in self.stale_temporaries(older_than)? {
            match self.fs.remove_file(&path) {
                Ok(()) => removed.push(path),
                // Another sweeper got there first
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CacheError::io(format!("removing {}", path.display()), e));
                }
            }
        }
        debug!("Swept {} stale temporaries", removed.len());
        Ok(removed)
    }
}
