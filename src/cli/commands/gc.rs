//! Gc command - sweep temporaries left by interrupted writes

use super::open_cache;
use crate::cli::args::GcArgs;
use crate::config::Config;
use crate::error::CacheResult;
use console::style;
use std::time::Duration;

/// Execute the gc command
pub async fn execute(args: GcArgs, config: &Config) -> CacheResult<()> {
    let hours = args.hours.unwrap_or(config.cache.tmp_max_age_hours);
    let older_than = Duration::from_secs(u64::from(hours) * 3600);

    let coordinator = open_cache(config)?;
    let store = coordinator.store();

    let stale = store.stale_temporaries(older_than)?;
    if stale.is_empty() {
        println!("No temporaries older than {} hour(s).", hours);
        return Ok(());
    }

    println!(
        "Found {} temporar{} older than {} hour(s):",
        stale.len(),
        if stale.len() == 1 { "y" } else { "ies" },
        hours
    );
    for path in &stale {
        println!("  {} {}", style("•").red(), path.display());
    }

    if args.dry_run {
        println!();
        println!("Dry run - nothing removed.");
        return Ok(());
    }

    let removed = store.sweep_temporaries(older_than)?;
    println!();
    println!("{} removed {} file(s)", style("✓").green(), removed.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.cache.dir = Some(dir.to_path_buf());
        config
    }

    #[tokio::test]
    async fn gc_removes_old_temporaries() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("repo").join("x86_64");
        std::fs::create_dir_all(&nested).unwrap();
        let tmp = nested.join("APKINDEX.tar.gz.1234.tmp");
        std::fs::write(&tmp, b"partial").unwrap();

        let args = GcArgs {
            hours: Some(0),
            dry_run: false,
        };
        execute(args, &config_for(temp.path())).await.unwrap();
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn gc_dry_run_keeps_files() {
        let temp = TempDir::new().unwrap();
        let tmp = temp.path().join("busybox-1.36.1-r0.apk.abcd.tmp");
        std::fs::write(&tmp, b"partial").unwrap();

        let args = GcArgs {
            hours: Some(0),
            dry_run: true,
        };
        execute(args, &config_for(temp.path())).await.unwrap();
        assert!(tmp.exists());
    }

    #[tokio::test]
    async fn gc_keeps_recent_temporaries() {
        let temp = TempDir::new().unwrap();
        let tmp = temp.path().join("APKINDEX.tar.gz.5678.tmp");
        std::fs::write(&tmp, b"in progress").unwrap();

        let args = GcArgs {
            hours: None,
            dry_run: false,
        };
        execute(args, &config_for(temp.path())).await.unwrap();
        assert!(tmp.exists());
    }
}
