//! Online/offline cache policy and the immutable cache directory value

use crate::config::schema::CacheConfig;
use crate::error::{CacheError, CacheResult};
use std::path::{Path, PathBuf};

/// Directory name used under the per-user cache location
pub const DEFAULT_CACHE_SUBDIR: &str = "apkcache";

/// Whether a cache miss may go to the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Misses are fetched and stored
    Online,
    /// Only cached objects are served; misses fail
    Offline,
}

impl CachePolicy {
    pub fn from_offline(offline: bool) -> Self {
        if offline {
            Self::Offline
        } else {
            Self::Online
        }
    }

    /// Whether a miss may trigger a fetch
    pub fn may_fetch(self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Cache root and offline flag, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirectory {
    root: PathBuf,
    offline: bool,
}

impl CacheDirectory {
    pub fn new(root: impl Into<PathBuf>, offline: bool) -> Self {
        Self {
            root: root.into(),
            offline,
        }
    }

    /// Resolve from the `[cache]` config section
    ///
    /// An unset directory falls back to `<user cache dir>/apkcache`.
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        let root = match &config.dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .ok_or(CacheError::NoCacheDir)?
                .join(DEFAULT_CACHE_SUBDIR),
        };
        Ok(Self::new(root, config.offline))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    pub fn policy(&self) -> CachePolicy {
        CachePolicy::from_offline(self.offline)
    }
}
