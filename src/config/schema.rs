//! Configuration schema for apkcache
//!
//! Configuration is stored at `~/.config/apkcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache location and mode
    pub cache: CacheConfig,

    /// Network fetch settings
    pub fetch: FetchConfig,

    /// Default repositories
    pub repository: RepositoryConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (default: per-user cache dir + "apkcache")
    pub dir: Option<PathBuf>,

    /// Serve only from the cache; never touch the network
    pub offline: bool,

    /// Reject fetched objects that are not gzip streams
    pub verify_gzip: bool,

    /// Temporaries older than this are swept by `gc` (hours)
    pub tmp_max_age_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            offline: false,
            verify_gzip: true,
            tmp_max_age_hours: 24,
        }
    }
}

/// Network fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent to repositories
    pub user_agent: String,

    /// Maximum objects fetched concurrently by one command
    pub max_parallel: usize,

    /// Extra attempts after a transient network failure
    pub retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: format!("apkcache/{}", env!("CARGO_PKG_VERSION")),
            max_parallel: 8,
            retries: 2,
        }
    }
}

/// Repository defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository URLs used when none are given on the command line
    pub urls: Vec<String>,

    /// Architecture (default: host architecture)
    pub arch: Option<String>,
}
