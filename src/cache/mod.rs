//! Package artifact cache
//!
//! Serves repository indexes and package archives from a local directory,
//! fetching misses through a [`Fetcher`](crate::fetch::Fetcher) unless the
//! cache is offline.
//!
//! # Layout
//!
//! ```text
//! <root>/<repository>/<arch>/APKINDEX.tar.gz
//! <root>/<repository>/<arch>/<name>-<version>.apk
//! <root>/<repository>/<arch>/<file>.<uuid>.tmp
//! ```
//!
//! Path components are escaped so arbitrary repository URLs map to a single
//! directory name. Each committed file carries its own metadata header ahead
//! of the payload; see [`store`].
//!
//! # Entry States
//!
//! | On disk | `exists` | `get` online | `get` offline |
//! |---------|----------|--------------|---------------|
//! | nothing / temporaries only | false | fetch | `Offline` |
//! | entry, checksum matches | true | hit | hit |
//! | entry, unreadable or mismatched | true | fetch, replaced | `Offline`, kept |
//!
//! Corrupt entries are only deleted by `verify --remove`.

pub mod coordinator;
pub mod fs;
pub mod key;
pub mod policy;
pub mod store;

pub use coordinator::FetchCoordinator;
pub use fs::{CacheFs, MemFs, OsFs};
pub use key::{arch_to_apk, default_arch, CacheKey, ObjectKind};
pub use policy::{CacheDirectory, CachePolicy};
pub use store::{fingerprint, CacheEntry, LocalStore};
