//! Cache keys for remote repository objects
//!
//! A key names a remote object by its logical identity (repository,
//! architecture, kind, name) and maps it to a filesystem-safe relative path.
//! Key construction is pure: the same identity always yields the same path,
//! across processes and restarts.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// File stem of a repository index when no explicit name is given
pub const DEFAULT_INDEX_NAME: &str = "APKINDEX";

/// Escaped components longer than this are shortened with a digest suffix
const MAX_COMPONENT_LEN: usize = 200;

/// Kind of remote object held in the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Repository index (`APKINDEX.tar.gz`)
    Index,
    /// Single package archive (`<name>-<version>.apk`)
    Archive,
}

impl ObjectKind {
    /// Extension appended to the object name, both remotely and on disk
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Index => "tar.gz",
            Self::Archive => "apk",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "index"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// Logical identity of a remote object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    repository: String,
    arch: String,
    kind: ObjectKind,
    name: String,
}

impl CacheKey {
    /// Build a key from its logical identity
    ///
    /// Index keys may leave `name` empty, in which case the conventional
    /// `APKINDEX` name is used. Archive keys require a name, usually
    /// `<package>-<version>`.
    pub fn new(
        repository: &str,
        arch: &str,
        kind: ObjectKind,
        name: &str,
    ) -> CacheResult<Self> {
        let repository = repository.trim().trim_end_matches('/');
        if repository.is_empty() {
            return Err(CacheError::InvalidKey(
                "repository identity is empty".to_string(),
            ));
        }

        if arch.is_empty() {
            return Err(CacheError::InvalidKey("architecture is empty".to_string()));
        }
        if arch.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(CacheError::InvalidKey(format!(
                "architecture '{}' contains whitespace or '/'",
                arch
            )));
        }

        let name = name.trim();
        let name = match kind {
            ObjectKind::Index if name.is_empty() => DEFAULT_INDEX_NAME,
            ObjectKind::Archive if name.is_empty() => {
                return Err(CacheError::InvalidKey(
                    "archive name is empty".to_string(),
                ));
            }
            _ => name,
        };

        Ok(Self {
            repository: repository.to_string(),
            arch: arch.to_string(),
            kind,
            name: name.to_string(),
        })
    }

    /// Key for a repository's `APKINDEX.tar.gz`
    pub fn index(repository: &str, arch: &str) -> CacheResult<Self> {
        Self::new(repository, arch, ObjectKind::Index, "")
    }

    /// Key for a package archive
    pub fn archive(repository: &str, arch: &str, package: &str, version: &str) -> CacheResult<Self> {
        if package.trim().is_empty() || version.trim().is_empty() {
            return Err(CacheError::InvalidKey(format!(
                "archive needs a package and a version (got '{}' / '{}')",
                package, version
            )));
        }
        Self::new(
            repository,
            arch,
            ObjectKind::Archive,
            &format!("{}-{}", package.trim(), version.trim()),
        )
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Escaped file name of the object inside its repository/arch directory
    pub fn file_name(&self) -> String {
        format!("{}.{}", escape_component(&self.name), self.kind.extension())
    }

    /// Path of the object relative to the cache root
    ///
    /// Layout: `<repository>/<arch>/<file>`, each component escaped.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(escape_component(&self.repository))
            .join(escape_component(&self.arch))
            .join(self.file_name())
    }

    /// URL the object is served from
    pub fn remote_url(&self) -> String {
        format!(
            "{}/{}/{}.{}",
            self.repository,
            self.arch,
            self.name,
            self.kind.extension()
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.remote_url())
    }
}

/// Escape one path component
///
/// Bytes outside `[A-Za-z0-9._-]` become `%XX`, as does a leading `.`.
/// `%` is always escaped, which keeps the mapping injective. Overlong results
/// keep a readable prefix and append `~` plus the SHA-256 of the raw input;
/// `~` never appears in a regular escape.
fn escape_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let safe = byte.is_ascii_alphanumeric()
            || byte == b'-'
            || byte == b'_'
            || (byte == b'.' && i > 0);
        if safe {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }

    if out.len() <= MAX_COMPONENT_LEN {
        return out;
    }

    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    // Escapes are ASCII, so any byte offset is a char boundary.
    format!("{}~{}", &out[..64], digest)
}

/// Map a Rust or Go architecture name to the APK architecture name
pub fn arch_to_apk(arch: &str) -> &str {
    match arch {
        "amd64" | "x86_64" => "x86_64",
        "arm64" | "aarch64" => "aarch64",
        "arm" => "armv7",
        "386" | "x86" => "x86",
        "ppc64le" | "powerpc64" => "ppc64le",
        "loong64" | "loongarch64" => "loongarch64",
        other => other,
    }
}

/// APK architecture of the running host
pub fn default_arch() -> &'static str {
    arch_to_apk(std::env::consts::ARCH)
}
