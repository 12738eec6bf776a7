//! Fetch coordination: hit/miss, offline policy and in-flight deduplication
//!
//! Within one process, concurrent `get` calls for the same key share a single
//! fetch: the first caller becomes the leader of a flight, later callers wait
//! on it and receive a clone of its result. Across processes nothing is
//! shared except the store, whose atomic publish makes racing writers safe.

use crate::cache::fs::{CacheFs, OsFs};
use crate::cache::key::CacheKey;
use crate::cache::policy::CacheDirectory;
use crate::cache::store::LocalStore;
use crate::error::{CacheError, CacheResult};
use crate::fetch::{FetchError, Fetcher};
use crate::validate::Validator;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

type SharedResult = CacheResult<Arc<[u8]>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A fetch in progress that other callers can wait on
#[derive(Default)]
struct Flight {
    slot: Mutex<Option<SharedResult>>,
    done: Condvar,
    waiters: AtomicUsize,
}

impl Flight {
    fn wait(&self) -> SharedResult {
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let mut slot = lock(&self.slot);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.done.wait(slot).unwrap_or_else(|e| e.into_inner());
        }
    }

    fn complete(&self, result: SharedResult) {
        let mut slot = lock(&self.slot);
        if slot.is_none() {
            *slot = Some(result);
        }
        self.done.notify_all();
    }
}

/// Held by the leader; completes the flight even if the leader unwinds
struct FlightGuard<'a> {
    coordinator: &'a FetchCoordinator,
    key: &'a CacheKey,
    flight: Arc<Flight>,
    finished: bool,
}

impl FlightGuard<'_> {
    fn finish(mut self, result: SharedResult) {
        self.coordinator.finish_inflight(self.key, &self.flight, result);
        self.finished = true;
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Fetch of {} ended without a result", self.key);
            let cancelled = Err(CacheError::Cancelled {
                key: self.key.to_string(),
            });
            self.coordinator
                .finish_inflight(self.key, &self.flight, cancelled);
        }
    }
}

/// Serves cached objects and fetches misses
pub struct FetchCoordinator {
    directory: CacheDirectory,
    store: LocalStore,
    validator: Option<Arc<dyn Validator>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<Flight>>>,
}

impl FetchCoordinator {
    /// Coordinator over the OS filesystem
    pub fn new(directory: CacheDirectory) -> Self {
        Self::with_fs(directory, Arc::new(OsFs))
    }

    /// Coordinator over a custom filesystem
    pub fn with_fs(directory: CacheDirectory, fs: Arc<dyn CacheFs>) -> Self {
        let store = LocalStore::new(directory.root(), fs);
        Self {
            directory,
            store,
            validator: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Validate fetched content before it is stored
    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn directory(&self) -> &CacheDirectory {
        &self.directory
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Return the object for `key`, fetching and storing it on a miss
    ///
    /// Offline misses fail with [`CacheError::Offline`] without touching the
    /// fetcher. Fetch and validation failures leave the store unchanged.
    pub fn get(&self, key: &CacheKey, fetcher: &dyn Fetcher) -> CacheResult<Arc<[u8]>> {
        if let Some(data) = self.lookup(key)? {
            return Ok(data);
        }

        let (flight, is_leader) = self.join_inflight(key);
        if !is_leader {
            debug!("Waiting on in-flight fetch of {}", key);
            return flight.wait();
        }

        let guard = FlightGuard {
            coordinator: self,
            key,
            flight,
            finished: false,
        };
        let result = self.fetch_and_store(key, fetcher);
        guard.finish(result.clone());
        result
    }

    /// Serve a committed entry; corrupt entries count as misses
    ///
    /// A corrupt file is left in place: a refetch replaces it by rename, and
    /// offline it stays on disk for `verify` to report.
    fn lookup(&self, key: &CacheKey) -> CacheResult<Option<Arc<[u8]>>> {
        if !self.store.exists(key) {
            return Ok(None);
        }

        match self.store.read(key) {
            Ok((data, entry)) => {
                debug!("Cache hit for {} (fetched {})", key, entry.fetched_at);
                Ok(Some(Arc::from(data)))
            }
            // Removed between the existence check and the read
            Err(CacheError::NotFound(_)) => Ok(None),
            Err(CacheError::Corrupt { reason, .. }) => {
                warn!("Ignoring corrupt cache entry {}: {}", key, reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn join_inflight(&self, key: &CacheKey) -> (Arc<Flight>, bool) {
        let mut in_flight = lock(&self.in_flight);
        if let Some(flight) = in_flight.get(key) {
            return (Arc::clone(flight), false);
        }
        let flight = Arc::new(Flight::default());
        in_flight.insert(key.clone(), Arc::clone(&flight));
        (flight, true)
    }

    fn finish_inflight(&self, key: &CacheKey, flight: &Arc<Flight>, result: SharedResult) {
        {
            let mut in_flight = lock(&self.in_flight);
            if in_flight
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, flight))
            {
                in_flight.remove(key);
            }
        }

        let waiters = flight.waiters.load(Ordering::SeqCst);
        if waiters > 0 {
            debug!("Sharing result for {} with {} waiting callers", key, waiters);
        }
        flight.complete(result);
    }

    fn fetch_and_store(&self, key: &CacheKey, fetcher: &dyn Fetcher) -> SharedResult {
        // A previous leader may have committed after our first lookup.
        if let Some(data) = self.lookup(key)? {
            return Ok(data);
        }

        if !self.directory.policy().may_fetch() {
            debug!("Offline miss for {}", key);
            return Err(CacheError::Offline {
                key: key.to_string(),
            });
        }

        info!("Fetching {}", key);
        let data = fetcher.fetch(key).map_err(|source| match source {
            FetchError::Cancelled => CacheError::Cancelled {
                key: key.to_string(),
            },
            source => CacheError::Fetch {
                key: key.to_string(),
                source,
            },
        })?;

        if let Some(validator) = &self.validator {
            validator
                .validate(key, &data)
                .map_err(|reason| CacheError::Validation {
                    key: key.to_string(),
                    reason,
                })?;
        }

        self.store.write(key, &data, &key.remote_url())?;
        Ok(Arc::from(data))
    }
}
