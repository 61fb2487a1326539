//! Read-through caching layer.
//!
//! This module provides:
//!
//! - **Backend Abstraction**: a TTL key/value store (in-memory or Redis)
//! - **Deterministic Keys**: `<entity>:<indexKind>:<value>` keys with a TTL bucket
//! - **Invalidation Sets**: every key a mutation makes stale
//! - **Read-through access**: `get_or_populate` used by every data-access path
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                    ReadThroughCache                        │
//! │   get_or_populate(key, fetch)      invalidate(keys)        │
//! ├───────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐          ┌─────────────────────────────┐ │
//! │  │  CacheKey   │          │     InvalidationEvent        │ │
//! │  └──────┬──────┘          └──────────────┬──────────────┘ │
//! │         ▼                                ▼                │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │                 CacheBackend Trait                   │  │
//! │  └───────────────┬──────────────────────┬──────────────┘  │
//! │                  ▼                      ▼                 │
//! │          ┌─────────────┐        ┌─────────────┐           │
//! │          │  In-Memory  │        │    Redis    │           │
//! │          └─────────────┘        └─────────────┘           │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure policy
//!
//! The backend is an optimization, never a source of truth:
//! - a failed or timed-out read, or an undecodable entry, is a miss;
//! - a failed write-back is logged and the fetched value is still returned;
//! - a failed invalidation is an error, since leaving a stale entry behind
//!   would serve outdated data for a full TTL.
//!
//! Concurrent misses on one key each run `fetch` and each write the result.
//!
//! # Usage
//!
//! ```rust,ignore
//! use teachtrack_core::cache::{CacheKey, InMemoryBackend, ReadThroughCache};
//!
//! let cache = ReadThroughCache::new(Arc::new(InMemoryBackend::default()), settings.into());
//!
//! let tenant: Option<Tenant> = cache
//!     .get_or_populate(&CacheKey::tenant_by_subdomain("acme"), || async {
//!         store.find_by_subdomain("acme").await
//!     })
//!     .await?;
//!
//! cache.invalidate(&InvalidationEvent::tenant(id, "acme").keys()).await?;
//! ```

pub mod backend;
pub mod invalidation;
pub mod key;

pub use backend::{
    CacheBackend, CacheEntry, CacheStats,
    InMemoryBackend, InMemoryConfig,
    RedisBackend, RedisConfig,
};
pub use invalidation::{InvalidationEvent, InvalidationSet};
pub use key::{CacheKey, IndexKind, KeyType, TtlBucket};

use metrics::counter;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{CacheBackendKind, CacheSettings, RedisConfig as RedisSettings};
use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Configuration
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for single-record entries
    pub default_ttl: Duration,

    /// TTL for listing entries
    pub content_ttl: Duration,

    /// Prefix prepended to every key (empty for none)
    pub namespace_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(600),
            content_ttl: Duration::from_secs(600),
            namespace_prefix: String::new(),
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            default_ttl: settings.default_ttl,
            content_ttl: settings.content_ttl,
            namespace_prefix: settings.namespace_prefix.clone(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, bucket: TtlBucket) -> Duration {
        match bucket {
            TtlBucket::Default => self.default_ttl,
            TtlBucket::Content => self.content_ttl,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Read-Through Cache
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache-aside access over an injected backend.
#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    /// Cache over a fresh in-memory backend with default TTLs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::default()), CacheConfig::default())
    }

    /// Build the configured backend.
    ///
    /// With Redis the namespace moves into the backend's key prefix, so that
    /// `flush` only removes this service's keys from a shared database.
    pub async fn connect(settings: &CacheSettings, redis: &RedisSettings) -> Result<Self> {
        let config = CacheConfig::from(settings);
        match settings.backend {
            CacheBackendKind::Memory => Ok(Self::new(Arc::new(InMemoryBackend::default()), config)),
            CacheBackendKind::Redis => {
                let key_prefix = if config.namespace_prefix.is_empty() {
                    String::new()
                } else {
                    format!("{}:", config.namespace_prefix)
                };
                let backend = RedisBackend::new(RedisConfig {
                    url: redis.url.clone(),
                    key_prefix,
                    command_timeout: redis.command_timeout,
                    ..RedisConfig::default()
                })
                .await?;
                Ok(Self::new(
                    Arc::new(backend),
                    CacheConfig {
                        namespace_prefix: String::new(),
                        ..config
                    },
                ))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `key`, or run `fetch` and cache what it yields.
    ///
    /// A `None` from `fetch` is returned as-is and not cached. Errors from
    /// `fetch` propagate; backend errors never do.
    #[instrument(skip(self, fetch), fields(key = %key))]
    pub async fn get_or_populate<T, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let full_key = self.build_key(key);

        if let Some(value) = self.read::<T>(&full_key).await {
            debug!(key = %full_key, "Cache hit");
            return Ok(Some(value));
        }

        debug!(key = %full_key, "Cache miss");
        let Some(value) = fetch().await? else {
            return Ok(None);
        };

        self.write_back(&full_key, &value, self.config.ttl_for(key.bucket()))
            .await;
        Ok(Some(value))
    }

    /// Delete every key in the set. Deleting an absent key succeeds.
    ///
    /// A failed delete does not stop the remaining ones; the first error is
    /// returned once every key has been attempted.
    #[instrument(skip(self, keys), fields(count = keys.len()))]
    pub async fn invalidate(&self, keys: &InvalidationSet) -> Result<()> {
        let mut first_error = None;
        for key in keys.iter() {
            let full_key = self.prefixed(key);
            match self.backend.delete(&full_key).await {
                Ok(_) => {
                    counter!("cache_invalidations_total", "backend" => self.backend.name())
                        .increment(1);
                }
                Err(e) => {
                    error!(key = %full_key, error = %e, "Cache invalidation failed");
                    self.record_error("invalidate");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                debug!(count = keys.len(), "Cache keys invalidated");
                Ok(())
            }
        }
    }

    /// Drop every entry owned by the backend.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<()> {
        info!(backend = self.backend.name(), "Flushing cache");
        self.backend.clear().await
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.backend.stats().await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Read and decode, collapsing every failure into a miss.
    async fn read<T: DeserializeOwned>(&self, full_key: &str) -> Option<T> {
        let bytes = match self.backend.get(full_key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache read failed, treating as miss");
                self.record_error("get");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Undecodable cache entry, treating as miss");
                self.record_error("decode");
                None
            }
        }
    }

    async fn write_back<T: Serialize>(&self, full_key: &str, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to encode value for cache");
                self.record_error("encode");
                return;
            }
        };

        if let Err(e) = self.backend.set(full_key, bytes, ttl).await {
            warn!(key = %full_key, error = %e, "Cache write-back failed");
            self.record_error("set");
        }
    }

    fn record_error(&self, op: &'static str) {
        counter!("cache_errors_total", "backend" => self.backend.name(), "op" => op).increment(1);
    }

    fn build_key(&self, key: &CacheKey) -> String {
        key.build(Some(&self.config.namespace_prefix))
    }

    fn prefixed(&self, key: &str) -> String {
        if self.config.namespace_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.config.namespace_prefix, key)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
