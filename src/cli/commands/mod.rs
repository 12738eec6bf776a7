//! CLI command implementations

pub mod config;
pub mod fetch;
pub mod gc;
pub mod index;
pub mod list;
pub mod verify;

pub use config::execute as config;
pub use fetch::execute as fetch;
pub use gc::execute as gc;
pub use index::execute as index;
pub use list::execute as list;
pub use verify::execute as verify;

use crate::cache::{arch_to_apk, default_arch, CacheDirectory, CacheKey, FetchCoordinator};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::ui::{self, format_bytes, FetchProgress, UiContext};
use crate::validate::{DigestValidator, GzipValidator, Validator, ValidatorChain};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Build the coordinator described by the effective configuration
pub(crate) fn open_cache(config: &Config) -> CacheResult<FetchCoordinator> {
    open_cache_with(config, DigestValidator::new())
}

/// As [`open_cache`], also holding fetched objects to `digests`
pub(crate) fn open_cache_with(
    config: &Config,
    digests: DigestValidator,
) -> CacheResult<FetchCoordinator> {
    let mut validators = ValidatorChain::new();
    if config.cache.verify_gzip {
        validators = validators.with(GzipValidator);
    }
    if !digests.is_empty() {
        validators = validators.with(digests);
    }

    let mut coordinator = FetchCoordinator::new(CacheDirectory::from_config(&config.cache)?);
    if !validators.is_empty() {
        coordinator = coordinator.with_validator(validators);
    }

    let directory = coordinator.directory();
    debug!(
        "Cache root {} ({})",
        directory.root().display(),
        if directory.offline() { "offline" } else { "online" }
    );
    Ok(coordinator)
}

/// Architecture from config or the host, in APK naming
pub(crate) fn resolve_arch(config: &Config) -> String {
    match config.repository.arch {
        Some(ref arch) => arch_to_apk(arch).to_string(),
        None => default_arch().to_string(),
    }
}

/// Result of one object in a batch
pub(crate) struct FetchOutcome {
    pub key: CacheKey,
    pub was_cached: bool,
    pub result: CacheResult<usize>,
}

/// Fetch every key through the coordinator, at most `max_parallel` at a time
///
/// Outcomes come back in completion order.
pub(crate) async fn fetch_all(
    coordinator: Arc<FetchCoordinator>,
    fetcher: Arc<dyn Fetcher>,
    keys: Vec<CacheKey>,
    max_parallel: usize,
    retries: u32,
    progress: &FetchProgress,
) -> Vec<FetchOutcome> {
    let mut pending = stream::iter(keys)
        .map(|key| {
            let coordinator = Arc::clone(&coordinator);
            let fetcher = Arc::clone(&fetcher);
            async move {
                let was_cached = coordinator.store().exists(&key);
                let task_key = key.clone();
                let result = tokio::task::spawn_blocking(move || {
                    get_with_retry(&coordinator, &task_key, &*fetcher, retries)
                })
                .await
                .unwrap_or_else(|e| Err(CacheError::Internal(format!("fetch task failed: {}", e))));

                FetchOutcome {
                    key,
                    was_cached,
                    result,
                }
            }
        })
        .buffer_unordered(max_parallel.max(1));

    let mut outcomes = Vec::new();
    while let Some(outcome) = pending.next().await {
        progress.advance(outcome.key.name());
        outcomes.push(outcome);
    }
    outcomes
}

fn get_with_retry(
    coordinator: &FetchCoordinator,
    key: &CacheKey,
    fetcher: &dyn Fetcher,
    retries: u32,
) -> CacheResult<usize> {
    let mut attempt = 0;
    loop {
        match coordinator.get(key, fetcher) {
            Ok(data) => return Ok(data.len()),
            Err(e) if e.is_retryable() && attempt < retries => {
                attempt += 1;
                warn!("Retrying {} ({}/{}): {}", key, attempt, retries, e);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Pinned objects already in the cache must match their digest too
///
/// Hits never reach the coordinator's validators. Unreadable entries are
/// left to the coordinator, which refetches and validates them.
fn check_pinned_hits(
    coordinator: &FetchCoordinator,
    digests: &DigestValidator,
    keys: &[CacheKey],
) -> CacheResult<()> {
    let store = coordinator.store();
    for key in keys.iter().filter(|k| digests.pins(k) && store.exists(k)) {
        if let Ok((data, _)) = store.read(key) {
            digests
                .validate(key, &data)
                .map_err(|reason| CacheError::Validation {
                    key: key.to_string(),
                    reason,
                })?;
        }
    }
    Ok(())
}

/// Fetch a batch of keys with the configured HTTP fetcher and report results
///
/// Returns the first failure after every object has been attempted.
pub(crate) async fn fetch_and_report(
    config: &Config,
    label: &str,
    keys: Vec<CacheKey>,
    digests: DigestValidator,
) -> CacheResult<()> {
    let ctx = UiContext::detect();
    check_pinned_hits(&open_cache(config)?, &digests, &keys)?;
    let coordinator = Arc::new(open_cache_with(config, digests)?);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch));

    let progress = FetchProgress::new(&ctx, label, keys.len() as u64);
    let outcomes = fetch_all(
        coordinator,
        fetcher,
        keys,
        config.fetch.max_parallel,
        config.fetch.retries,
        &progress,
    )
    .await;
    progress.finish();

    report(&ctx, outcomes)
}

fn report(ctx: &UiContext, outcomes: Vec<FetchOutcome>) -> CacheResult<()> {
    let total = outcomes.len();
    let mut first_error = None;
    let mut failed = 0;

    for outcome in outcomes {
        let label = format!("{}/{}", outcome.key.arch(), outcome.key.file_name());
        match outcome.result {
            Ok(size) => {
                let state = if outcome.was_cached { "cached" } else { "fetched" };
                ui::step_ok_detail(ctx, &label, &format!("{}, {}", state, format_bytes(size as u64)));
            }
            Err(e) => {
                failed += 1;
                ui::step_error_detail(ctx, &label, &e.to_string());
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => {
            if total > 1 {
                ui::remark(ctx, &format!("{} of {} object(s) failed", failed, total));
            }
            Err(e)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{fingerprint, MemFs};
    use crate::fetch::FetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REPO: &str = "https://dl-cdn.alpinelinux.org/alpine/edge/main";

    fn coordinator(offline: bool) -> Arc<FetchCoordinator> {
        let directory = CacheDirectory::new("/cache", offline);
        Arc::new(FetchCoordinator::with_fs(directory, Arc::new(MemFs::new())))
    }

    #[test]
    fn resolve_arch_maps_config_value() {
        let mut config = Config::default();
        config.repository.arch = Some("amd64".to_string());
        assert_eq!(resolve_arch(&config), "x86_64");

        config.repository.arch = None;
        assert_eq!(resolve_arch(&config), default_arch());
    }

    #[tokio::test]
    async fn fetch_all_reports_every_key() {
        let coordinator = coordinator(false);
        let fetcher: Arc<dyn Fetcher> = Arc::new(|key: &CacheKey| -> Result<Vec<u8>, FetchError> {
            Ok(key.name().as_bytes().to_vec())
        });
        let keys = vec![
            CacheKey::index(REPO, "x86_64").unwrap(),
            CacheKey::archive(REPO, "x86_64", "busybox", "1.36.1-r0").unwrap(),
            CacheKey::archive(REPO, "x86_64", "zlib", "1.3.1-r0").unwrap(),
        ];

        let progress = FetchProgress::new(&UiContext::non_interactive(), "test", 3);
        let outcomes = fetch_all(coordinator.clone(), fetcher, keys, 2, 0, &progress).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.result.is_ok() && !o.was_cached));
        assert_eq!(coordinator.store().entries().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fetch_all_offline_fails_without_fetching() {
        let coordinator = coordinator(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher: Arc<dyn Fetcher> = Arc::new(move |_: &CacheKey| -> Result<Vec<u8>, FetchError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        });

        let keys = vec![CacheKey::index(REPO, "aarch64").unwrap()];
        let progress = FetchProgress::new(&UiContext::non_interactive(), "test", 1);
        let outcomes = fetch_all(coordinator, fetcher, keys, 4, 2, &progress).await;

        assert!(matches!(outcomes[0].result, Err(CacheError::Offline { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn transient_failures_are_retried() {
        let coordinator = coordinator(false);
        let calls = AtomicUsize::new(0);
        let fetcher = |_: &CacheKey| -> Result<Vec<u8>, FetchError> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FetchError::Timeout)
            } else {
                Ok(b"index".to_vec())
            }
        };

        let key = CacheKey::index(REPO, "x86_64").unwrap();
        assert_eq!(get_with_retry(&coordinator, &key, &fetcher, 2).unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let coordinator = coordinator(false);
        let calls = AtomicUsize::new(0);
        let fetcher = |key: &CacheKey| -> Result<Vec<u8>, FetchError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Status {
                url: key.remote_url(),
                code: 404,
            })
        };

        let key = CacheKey::archive(REPO, "x86_64", "missing", "0-r0").unwrap();
        let err = get_with_retry(&coordinator, &key, &fetcher, 3).unwrap_err();
        assert!(matches!(err, CacheError::Fetch { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pinned_fetch_rejects_wrong_digest() {
        let key = CacheKey::archive(REPO, "x86_64", "busybox", "1.36.1-r0").unwrap();
        let digests = DigestValidator::new().expect(key.clone(), &fingerprint(b"expected"));
        let coordinator = FetchCoordinator::with_fs(
            CacheDirectory::new("/cache", false),
            Arc::new(MemFs::new()),
        )
        .with_validator(digests);
        let served = |_: &CacheKey| -> Result<Vec<u8>, FetchError> { Ok(b"swapped".to_vec()) };

        let err = coordinator.get(&key, &served).unwrap_err();
        assert!(
            matches!(err, CacheError::Validation { ref reason, .. } if reason.contains("sha256 mismatch"))
        );
        assert!(!coordinator.store().exists(&key));
    }

    #[test]
    fn pinned_hits_are_checked() {
        let key = CacheKey::archive(REPO, "x86_64", "zlib", "1.3.1-r0").unwrap();
        let coordinator = coordinator(false);
        coordinator.store().write(&key, b"cached", REPO).unwrap();

        let matching = DigestValidator::new().expect(key.clone(), &fingerprint(b"cached"));
        assert!(check_pinned_hits(&coordinator, &matching, &[key.clone()]).is_ok());

        let other = DigestValidator::new().expect(key.clone(), &fingerprint(b"other"));
        let err = check_pinned_hits(&coordinator, &other, &[key.clone()]).unwrap_err();
        assert!(matches!(err, CacheError::Validation { .. }));

        let unpinned = CacheKey::index(REPO, "x86_64").unwrap();
        assert!(check_pinned_hits(&coordinator, &other, &[unpinned]).is_ok());
    }

    #[test]
    fn open_cache_with_digests_validates_fetches() {
        let temp = tempfile::TempDir::new().unwrap();
        let key = CacheKey::archive(REPO, "x86_64", "musl", "1.2.5-r0").unwrap();
        let mut config = Config::default();
        config.cache.dir = Some(temp.path().to_path_buf());
        config.cache.verify_gzip = false;

        let digests = DigestValidator::new().expect(key.clone(), &fingerprint(b"musl"));
        let coordinator = open_cache_with(&config, digests).unwrap();

        let wrong = |_: &CacheKey| -> Result<Vec<u8>, FetchError> { Ok(b"evil".to_vec()) };
        assert!(matches!(
            coordinator.get(&key, &wrong),
            Err(CacheError::Validation { .. })
        ));
        let right = |_: &CacheKey| -> Result<Vec<u8>, FetchError> { Ok(b"musl".to_vec()) };
        assert_eq!(&*coordinator.get(&key, &right).unwrap(), b"musl");
    }

    #[test]
    fn report_returns_first_failure() {
        let key = CacheKey::index(REPO, "x86_64").unwrap();
        let outcomes = vec![
            FetchOutcome {
                key: key.clone(),
                was_cached: true,
                result: Ok(10),
            },
            FetchOutcome {
                key: key.clone(),
                was_cached: false,
                result: Err(CacheError::Offline {
                    key: key.to_string(),
                }),
            },
        ];

        let err = report(&UiContext::non_interactive(), outcomes).unwrap_err();
        assert!(matches!(err, CacheError::Offline { .. }));
    }
}
