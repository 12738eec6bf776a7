//! CLI argument definitions using clap derive

use crate::config::Config;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// apkcache - local cache for APK repository indexes and packages
///
/// Fetches APKINDEX files and .apk archives once, then serves them from
/// disk. With --offline, only cached objects are served.
#[derive(Parser, Debug)]
#[command(name = "apkcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "APKCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory (overrides [cache].dir)
    #[arg(long, global = true, env = "APKCACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Serve only from the cache, never touch the network
    #[arg(long, global = true)]
    pub offline: bool,

    /// Architecture (overrides [repository].arch, default: host)
    #[arg(long, global = true)]
    pub arch: Option<String>,
}

impl Cli {
    /// Apply global flags on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref dir) = self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        if self.offline {
            config.cache.offline = true;
        }
        if let Some(ref arch) = self.arch {
            config.repository.arch = Some(arch.clone());
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch repository indexes (APKINDEX.tar.gz) into the cache
    Index(IndexArgs),

    /// Fetch package archives into the cache
    Fetch(FetchArgs),

    /// List cached objects
    List(ListArgs),

    /// Verify cached objects against their recorded checksums
    Verify(VerifyArgs),

    /// Remove temporaries left by interrupted downloads
    Gc(GcArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the index command
#[derive(Parser, Debug)]
pub struct IndexArgs {
    /// Repository URLs (defaults to [repository].urls)
    pub repositories: Vec<String>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Repository URL (defaults to the first of [repository].urls)
    #[arg(short, long)]
    pub repository: Option<String>,

    /// Packages as NAME=VERSION (e.g. busybox=1.36.1-r0)
    #[arg(required = true, value_parser = parse_package_spec)]
    pub packages: Vec<(String, String)>,

    /// Expected SHA-256 of the archive (single package only)
    #[arg(long, value_name = "HEX", value_parser = parse_sha256)]
    pub sha256: Option<String>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Remove entries that fail verification
    #[arg(long)]
    pub remove: bool,
}

/// Arguments for the gc command
#[derive(Parser, Debug)]
pub struct GcArgs {
    /// Minimum temporary age in hours (overrides [cache].tmp_max_age_hours)
    #[arg(long)]
    pub hours: Option<u32>,

    /// Show what would be removed without removing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON array
    Json,
    /// One path per line
    Plain,
}

/// Parse `NAME=VERSION`
fn parse_package_spec(s: &str) -> Result<(String, String), String> {
    let (name, version) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VERSION, got '{}'", s))?;
    let (name, version) = (name.trim(), version.trim());
    if name.is_empty() || version.is_empty() {
        return Err(format!("expected NAME=VERSION, got '{}'", s));
    }
    Ok((name.to_string(), version.to_string()))
}

/// Parse a hex SHA-256 digest
fn parse_sha256(s: &str) -> Result<String, String> {
    let s = s.trim();
    if s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(s.to_ascii_lowercase())
    } else {
        Err(format!("expected 64 hex characters, got '{}'", s))
    }
}
