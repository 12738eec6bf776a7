//! Content validation collaborators
//!
//! A validator inspects fetched bytes before they are committed to the
//! store. Returning `Err(reason)` keeps the bytes out of the cache.

use crate::cache::store::fingerprint;
use crate::cache::CacheKey;
use std::collections::HashMap;
use std::sync::Arc;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Checks fetched content before it is stored
pub trait Validator: Send + Sync {
    fn validate(&self, key: &CacheKey, data: &[u8]) -> Result<(), String>;
}

impl<F> Validator for F
where
    F: Fn(&CacheKey, &[u8]) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, key: &CacheKey, data: &[u8]) -> Result<(), String> {
        self(key, data)
    }
}

/// Requires a gzip stream, the container format of both APKINDEX and .apk
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipValidator;

impl Validator for GzipValidator {
    fn validate(&self, _key: &CacheKey, data: &[u8]) -> Result<(), String> {
        if data.starts_with(&GZIP_MAGIC) {
            Ok(())
        } else if data.is_empty() {
            Err("empty response".to_string())
        } else {
            Err("not a gzip stream".to_string())
        }
    }
}

/// Checks known objects against an expected SHA-256
///
/// Keys without an expectation pass.
#[derive(Debug, Clone, Default)]
pub struct DigestValidator {
    expected: HashMap<CacheKey, String>,
}

impl DigestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect `sha256` (hex, any case) for `key`
    pub fn expect(mut self, key: CacheKey, sha256: &str) -> Self {
        self.expected.insert(key, sha256.to_ascii_lowercase());
        self
    }

    /// Whether `key` has an expected digest
    pub fn pins(&self, key: &CacheKey) -> bool {
        self.expected.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }
}

impl Validator for DigestValidator {
    fn validate(&self, key: &CacheKey, data: &[u8]) -> Result<(), String> {
        let Some(expected) = self.expected.get(key) else {
            return Ok(());
        };
        let actual = fingerprint(data);
        if &actual == expected {
            Ok(())
        } else {
            Err(format!(
                "sha256 mismatch (expected {}, got {})",
                expected, actual
            ))
        }
    }
}

/// Runs validators in order, stopping at the first failure
#[derive(Clone, Default)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl Validator for ValidatorChain {
    fn validate(&self, key: &CacheKey, data: &[u8]) -> Result<(), String> {
        self.validators
            .iter()
            .try_for_each(|v| v.validate(key, data))
    }
}
