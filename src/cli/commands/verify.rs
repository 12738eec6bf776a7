//! Verify command - check cached objects against their recorded checksums

use super::open_cache;
use crate::cache::{CacheEntry, LocalStore};
use crate::cli::args::VerifyArgs;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::ui::{self, UiContext};
use tracing::debug;

/// Execute the verify command
pub async fn execute(args: VerifyArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let coordinator = open_cache(config)?;
    let store = coordinator.store();
    let entries = store.entries()?;

    ui::section(&ctx, &format!("Verifying {} object(s)", entries.len()));
    ui::key_value(&ctx, "root", &store.root().display().to_string());

    let report = verify_entries(store, &entries, args.remove)?;
    for (entry, reason) in &report.corrupt {
        let label = format!("{}/{}", entry.key.arch(), entry.key.file_name());
        ui::step_error_detail(&ctx, &label, reason);
    }

    if report.removed > 0 {
        ui::step_ok(&ctx, &format!("Removed {} corrupt object(s)", report.removed));
    }
    ui::remark(
        &ctx,
        &format!("{} ok, {} corrupt", report.ok, report.corrupt.len()),
    );

    match report.corrupt.into_iter().next() {
        Some((entry, reason)) if !args.remove => Err(CacheError::corrupt(&entry.key, reason)),
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
struct VerifyReport {
    ok: usize,
    corrupt: Vec<(CacheEntry, String)>,
    removed: usize,
}

fn verify_entries(
    store: &LocalStore,
    entries: &[CacheEntry],
    remove: bool,
) -> CacheResult<VerifyReport> {
    let mut report = VerifyReport::default();

    for entry in entries {
        match store.read(&entry.key) {
            Ok(_) => report.ok += 1,
            Err(CacheError::Corrupt { reason, .. }) => {
                debug!("Corrupt entry {}: {}", entry.key, reason);
                if remove {
                    store.remove(&entry.key)?;
                    report.removed += 1;
                }
                report.corrupt.push((entry.clone(), reason));
            }
            // Removed by someone else since the listing
            Err(CacheError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheFs, CacheKey, MemFs};
    use std::sync::Arc;

    const REPO: &str = "https://packages.wolfi.dev/os";

    fn populated() -> (Arc<MemFs>, LocalStore, CacheKey, CacheKey) {
        let fs = Arc::new(MemFs::new());
        let store = LocalStore::new("/cache", fs.clone());
        let good = CacheKey::index(REPO, "x86_64").unwrap();
        let bad = CacheKey::archive(REPO, "x86_64", "glibc", "2.39-r1").unwrap();
        store.write(&good, b"index", REPO).unwrap();
        store.write(&bad, b"archive", REPO).unwrap();
        (fs, store, good, bad)
    }

    /// Rewrite the stored file in place, keeping its header intact
    fn tamper(fs: &MemFs, path: &std::path::Path, edit: impl FnOnce(&mut Vec<u8>)) {
        let mut raw = fs.read(path).unwrap();
        edit(&mut raw);
        fs.remove_file(path).unwrap();
        fs.write_new(path, &raw).unwrap();
    }

    #[test]
    fn tampered_entry_is_reported() {
        let (fs, store, _, bad) = populated();
        let path = store.path_for(&bad);
        tamper(&fs, &path, |raw| {
            let last = raw.len() - 1;
            raw[last] ^= 0x20;
        });

        let entries = store.entries().unwrap();
        let report = verify_entries(&store, &entries, false).unwrap();
        assert_eq!(report.ok, 1);
        assert_eq!(report.corrupt.len(), 1);
        assert_eq!(report.corrupt[0].0.key, bad);
        assert!(store.exists(&bad));
    }

    #[test]
    fn remove_discards_corrupt_entries() {
        let (fs, store, good, bad) = populated();
        let path = store.path_for(&bad);
        tamper(&fs, &path, |raw| raw.truncate(raw.len() - 2));

        let entries = store.entries().unwrap();
        let report = verify_entries(&store, &entries, true).unwrap();
        assert_eq!(report.removed, 1);
        assert!(!store.exists(&bad));
        assert!(store.exists(&good));
    }

    #[test]
    fn clean_cache_verifies() {
        let (_, store, _, _) = populated();
        let entries = store.entries().unwrap();
        let report = verify_entries(&store, &entries, false).unwrap();
        assert_eq!(report.ok, 2);
        assert!(report.corrupt.is_empty());
    }
}
