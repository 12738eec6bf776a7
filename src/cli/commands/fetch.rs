//! Fetch command - cache package archives

use super::{fetch_and_report, resolve_arch};
use crate::cache::CacheKey;
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::validate::DigestValidator;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> CacheResult<()> {
    let repository = match args.repository {
        Some(repo) => repo,
        None => config.repository.urls.first().cloned().ok_or_else(|| {
            CacheError::User(
                "no --repository given and [repository].urls is empty".to_string(),
            )
        })?,
    };

    let arch = resolve_arch(config);
    let keys = args
        .packages
        .iter()
        .map(|(name, version)| CacheKey::archive(&repository, &arch, name, version))
        .collect::<CacheResult<Vec<_>>>()?;

    let digests = match (args.sha256, keys.as_slice()) {
        (None, _) => DigestValidator::new(),
        (Some(sha256), [key]) => DigestValidator::new().expect(key.clone(), &sha256),
        (Some(_), _) => {
            return Err(CacheError::User(
                "--sha256 applies to exactly one package".to_string(),
            ))
        }
    };

    fetch_and_report(config, "packages", keys, digests).await
}
