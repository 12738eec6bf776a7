//! Configuration management for apkcache

pub mod schema;

pub use schema::Config;

use crate::error::{CacheError, CacheResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// Locates, loads and writes the apkcache config file
///
/// The file is optional: a missing file yields [`Config::default`], so
/// `config init` is only needed to get an editable starting point.
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Use `explicit` (from `--config` or `APKCACHE_CONFIG`) when given,
    /// else the per-user default location
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        match explicit {
            Some(path) => Self::at(path),
            None => Self {
                config_path: Self::default_config_path(),
                explicit: false,
            },
        }
    }

    /// Manage the file at `path`
    pub fn at(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// `<user config dir>/apkcache/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("apkcache")
            .join("config.toml")
    }

    /// Load configuration, using defaults if the file does not exist
    ///
    /// Does not log, so it can run before the subscriber is installed; see
    /// [`describe`](Self::describe).
    pub async fn load(&self) -> CacheResult<Config> {
        let content = match fs::read_to_string(&self.config_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => {
                return Err(CacheError::io(
                    format!("reading config from {}", self.config_path.display()),
                    e,
                ))
            }
        };

        toml::from_str(&content).map_err(|e| CacheError::ConfigInvalid {
            path: self.config_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Write `config` as the whole file, creating its directory
    pub async fn save(&self, config: &Config) -> CacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: Arc::new(e),
                })?;
        }

        let content = toml::to_string_pretty(config)
            .map_err(|e| CacheError::Internal(format!("serializing config: {}", e)))?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            CacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Where the config comes from, for diagnostics
    pub fn describe(&self) -> String {
        let origin = if self.explicit { "explicit" } else { "default" };
        if self.config_path.exists() {
            format!("{} ({})", self.config_path.display(), origin)
        } else {
            format!(
                "{} ({}, not found, using defaults)",
                self.config_path.display(),
                origin
            )
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
