//! List command - show cached objects

use super::open_cache;
use crate::cache::{CacheEntry, ObjectKind};
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::ui::{self, format_bytes, UiContext};
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> CacheResult<()> {
    let coordinator = open_cache(config)?;
    let entries = coordinator.store().entries()?;

    if entries.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::remark(
                    &ctx,
                    &format!("No cached objects in {}", coordinator.store().root().display()),
                );
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&entries),
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry]) {
    println!(
        "{:<8} {:<8} {:<36} {:>10} {:<17} {}",
        style("KIND").bold(),
        style("ARCH").bold(),
        style("NAME").bold(),
        style("SIZE").bold(),
        style("FETCHED").bold(),
        style("REPOSITORY").bold()
    );
    println!("{}", "-".repeat(100));

    let mut total = 0;
    for entry in entries {
        let kind = match entry.key.kind() {
            ObjectKind::Index => style("index").cyan(),
            ObjectKind::Archive => style("archive").green(),
        };

        println!(
            "{:<8} {:<8} {:<36} {:>10} {:<17} {}",
            kind,
            entry.key.arch(),
            entry.key.name(),
            format_bytes(entry.size),
            entry.fetched_at.format("%Y-%m-%d %H:%M"),
            entry.key.repository()
        );
        total += entry.size;
    }

    println!();
    println!("{} object(s), {}", entries.len(), format_bytes(total));
}

#[derive(serde::Serialize)]
struct EntryJson<'a> {
    repository: &'a str,
    arch: &'a str,
    kind: String,
    name: &'a str,
    path: String,
    size: u64,
    checksum: &'a str,
    fetched_at: String,
    source: &'a str,
}

fn to_json(entries: &[CacheEntry]) -> CacheResult<String> {
    let rows: Vec<EntryJson<'_>> = entries
        .iter()
        .map(|e| EntryJson {
            repository: e.key.repository(),
            arch: e.key.arch(),
            kind: e.key.kind().to_string(),
            name: e.key.name(),
            path: e.path.display().to_string(),
            size: e.size,
            checksum: &e.checksum,
            fetched_at: e.fetched_at.to_rfc3339(),
            source: &e.source,
        })
        .collect();

    serde_json::to_string_pretty(&rows)
        .map_err(|e| CacheError::Internal(format!("serializing listing: {}", e)))
}

fn print_json(entries: &[CacheEntry]) -> CacheResult<()> {
    println!("{}", to_json(entries)?);
    Ok(())
}

fn print_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.path.display());
    }
}
