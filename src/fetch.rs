//! Network fetcher collaborator
//!
//! The cache treats fetching as an opaque blocking call. [`HttpFetcher`] is
//! the transport the CLI uses; tests and embedders can pass any closure of
//! the shape `Fn(&CacheKey) -> Result<Vec<u8>, FetchError>`.

use crate::cache::CacheKey;
use crate::config::schema::FetchConfig;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Largest body accepted from a repository (APK archives can be large)
const MAX_BODY_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Errors reported by a [`Fetcher`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {code} from {url}")]
    Status { url: String, code: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { code, .. } => *code >= 500 || *code == 408 || *code == 429,
            Self::Timeout | Self::Cancelled | Self::Transport(_) => true,
        }
    }
}

/// Retrieves the raw bytes of a remote object
pub trait Fetcher: Send + Sync {
    fn fetch(&self, key: &CacheKey) -> Result<Vec<u8>, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&CacheKey) -> Result<Vec<u8>, FetchError> + Send + Sync,
{
    fn fetch(&self, key: &CacheKey) -> Result<Vec<u8>, FetchError> {
        self(key)
    }
}

/// Blocking HTTP fetcher backed by a shared `ureq` agent
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher from the `[fetch]` config section
    pub fn new(config: &FetchConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, key: &CacheKey) -> Result<Vec<u8>, FetchError> {
        let url = key.remote_url();
        debug!("GET {}", url);

        let mut response = self
            .agent
            .get(&url)
            .header("User-Agent", self.user_agent.as_str())
            .call()
            .map_err(|e| map_ureq_error(&url, e))?;

        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| map_ureq_error(&url, e))?;

        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

fn map_ureq_error(url: &str, err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(code) => FetchError::Status {
            url: url.to_string(),
            code,
        },
        ureq::Error::Timeout(_) => FetchError::Timeout,
        other => FetchError::Transport(other.to_string()),
    }
}
