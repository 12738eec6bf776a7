//! apkcache - local artifact cache for APK repositories
//!
//! Caches repository indexes and package archives on disk, deduplicates
//! concurrent downloads, and can run fully offline from a populated cache.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ui;
pub mod validate;

pub use cache::{CacheDirectory, CacheKey, FetchCoordinator, ObjectKind};
pub use error::{CacheError, CacheResult};
