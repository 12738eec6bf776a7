//! Index command - cache repository indexes

use super::{fetch_and_report, resolve_arch};
use crate::cache::CacheKey;
use crate::cli::args::IndexArgs;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::validate::DigestValidator;

/// Execute the index command
pub async fn execute(args: IndexArgs, config: &Config) -> CacheResult<()> {
    let repositories = if args.repositories.is_empty() {
        config.repository.urls.clone()
    } else {
        args.repositories
    };

    if repositories.is_empty() {
        return Err(CacheError::User(
            "no repository given and [repository].urls is empty".to_string(),
        ));
    }

    let keys = index_keys(&repositories, &resolve_arch(config))?;
    fetch_and_report(config, "indexes", keys, DigestValidator::new()).await
}

fn index_keys(repositories: &[String], arch: &str) -> CacheResult<Vec<CacheKey>> {
    repositories
        .iter()
        .map(|repo| CacheKey::index(repo, arch))
        .collect()
}
