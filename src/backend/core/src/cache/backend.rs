//! Cache backend implementations.
//!
//! This module provides pluggable key/value stores with TTL:
//! - **InMemoryBackend**: process-local store used in tests and single-node setups
//! - **RedisBackend**: shared store used in production
//!
//! Backends only move bytes. Serialization, TTL bucket selection and the
//! degrade-to-miss policy live in [`ReadThroughCache`](super::ReadThroughCache).

use crate::error::{ErrorCode, Result, TrackError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Entry
// ═══════════════════════════════════════════════════════════════════════════════

/// A cached value with its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized data
    pub data: Vec<u8>,

    /// Time-to-live
    pub ttl: Duration,

    /// When this entry was written
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            ttl,
            created_at: Utc::now(),
        }
    }

    /// Check if the entry has expired.
    pub fn is_expired(&self) -> bool {
        let elapsed = Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        elapsed >= self.ttl
    }

    /// Get the remaining TTL.
    pub fn remaining_ttl(&self) -> Option<Duration> {
        let elapsed = Utc::now()
            .signed_duration_since(self.created_at)
            .to_std()
            .ok()?;
        self.ttl.checked_sub(elapsed)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Statistics
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub evictions: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
}

impl CacheStats {
    /// Calculate the hit rate.
    pub fn calculate_hit_rate(&mut self) {
        let total = self.hits + self.misses;
        self.hit_rate = if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        };
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Backend Trait
// ═══════════════════════════════════════════════════════════════════════════════

/// Key/value store with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the raw bytes stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Delete a key. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get cache statistics.
    async fn stats(&self) -> Result<CacheStats>;

    /// Remove every entry owned by this backend.
    async fn clear(&self) -> Result<()>;

    /// Get the backend name (used as a metrics label).
    fn name(&self) -> &'static str;
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-Memory Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for in-memory cache.
#[derive(Debug, Clone)]
pub struct InMemoryConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// In-memory cache backend.
///
/// Expired entries are dropped lazily on read and eagerly when the store
/// reaches capacity; after that the oldest entries are evicted first.
pub struct InMemoryBackend {
    entries: DashMap<String, CacheEntry>,
    config: InMemoryConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl InMemoryBackend {
    /// Create a new in-memory backend.
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Number of live (possibly expired but not yet collected) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove expired entries and return how many were dropped.
    pub fn cleanup_expired(&self) -> u64 {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let expired = before.saturating_sub(self.entries.len()) as u64;
        if expired > 0 {
            debug!("Cleaned up {} expired cache entries", expired);
        }
        expired
    }

    fn maybe_evict(&self) {
        if (self.entries.len() as u64) < self.config.max_capacity {
            return;
        }

        self.cleanup_expired();
        if (self.entries.len() as u64) < self.config.max_capacity {
            return;
        }

        let to_evict = (self.config.max_capacity / 10).max(1) as usize;
        let mut by_age: Vec<(String, DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().created_at))
            .collect();
        by_age.sort_by_key(|(_, created_at)| *created_at);

        let mut evicted = 0u64;
        for (key, _) in by_age.into_iter().take(to_evict) {
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }

        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        debug!("Evicted {} entries from cache", evicted);
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

#[async_trait]
impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let found = self.entries.get(key).map(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.data.clone())
            }
        });

        match found {
            Some(Some(data)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                counter!("cache_hits_total", "backend" => "in_memory").increment(1);
                Ok(Some(data))
            }
            Some(None) => {
                self.entries.remove_if(key, |_, entry| entry.is_expired());
                self.misses.fetch_add(1, Ordering::Relaxed);
                counter!("cache_misses_total", "backend" => "in_memory", "reason" => "expired").increment(1);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                counter!("cache_misses_total", "backend" => "in_memory", "reason" => "not_found").increment(1);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.maybe_evict();

        let size = value.len();
        self.entries.insert(key.to_string(), CacheEntry::new(value, ttl));

        counter!("cache_sets_total", "backend" => "in_memory").increment(1);
        histogram!("cache_entry_size_bytes", "backend" => "in_memory").record(size as f64);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let removed = self.entries.remove(key).is_some();
        if removed {
            counter!("cache_deletes_total", "backend" => "in_memory").increment(1);
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self
            .entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false))
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len() as u64,
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate: 0.0,
        };
        stats.calculate_hit_rate();

        gauge!("cache_entries", "backend" => "in_memory").set(stats.entries as f64);
        gauge!("cache_hit_rate", "backend" => "in_memory").set(stats.hit_rate);

        Ok(stats)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        counter!("cache_clears_total", "backend" => "in_memory").increment(1);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redis Backend
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration for Redis cache.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Key prefix; when empty, `clear` flushes the whole database
    pub key_prefix: String,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Command timeout
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: String::new(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(2),
        }
    }
}

/// Redis cache backend.
///
/// Holds one `ConnectionManager` opened at construction, which reconnects
/// after the server drops the link. Every command runs on a clone of it and
/// is bounded by `command_timeout`.
pub struct RedisBackend {
    conn: ConnectionManager,
    config: RedisConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RedisBackend {
    /// Connect to Redis and verify the connection with PING.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            TrackError::with_internal(
                ErrorCode::CacheConnectionFailed,
                "Failed to create Redis client",
                e.to_string(),
            )
        })?;

        let mut conn = tokio::time::timeout(
            config.connect_timeout,
            client.get_connection_manager(),
        )
        .await
        .map_err(|_| {
            TrackError::with_internal(
                ErrorCode::CacheConnectionFailed,
                "Failed to connect to Redis",
                format!("connect timed out after {:?}", config.connect_timeout),
            )
        })?
        .map_err(|e| {
            TrackError::with_internal(
                ErrorCode::CacheConnectionFailed,
                "Failed to connect to Redis",
                e.to_string(),
            )
        })?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            TrackError::with_internal(
                ErrorCode::CacheConnectionFailed,
                "Redis ping failed",
                e.to_string(),
            )
        })?;

        info!("Redis cache backend connected to {}", config.url);

        Ok(Self {
            conn,
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Run a command future under the configured command timeout.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.command_timeout, fut).await {
            Ok(result) => result.map_err(TrackError::from),
            Err(_) => Err(TrackError::with_internal(
                ErrorCode::CacheError,
                "Cache operation timed out",
                format!("redis {} exceeded {:?}", op, self.config.command_timeout),
            )),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);

        let data: Option<Vec<u8>> = self.bounded("GET", conn.get(&full_key)).await?;

        if data.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            counter!("cache_hits_total", "backend" => "redis").increment(1);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!("cache_misses_total", "backend" => "redis", "reason" => "not_found").increment(1);
        }
        Ok(data)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);
        let size = value.len();
        let ttl_secs = ttl.as_secs().max(1);

        self.bounded::<(), _>("SETEX", conn.set_ex(&full_key, value, ttl_secs))
            .await?;

        counter!("cache_sets_total", "backend" => "redis").increment(1);
        histogram!("cache_entry_size_bytes", "backend" => "redis").record(size as f64);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);

        let deleted: i64 = self.bounded("DEL", conn.del(&full_key)).await?;

        if deleted > 0 {
            counter!("cache_deletes_total", "backend" => "redis").increment(1);
        }
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);
        self.bounded("EXISTS", conn.exists(&full_key)).await
    }

    async fn stats(&self) -> Result<CacheStats> {
        let mut conn = self.conn.clone();
        let dbsize: u64 = self
            .bounded("DBSIZE", redis::cmd("DBSIZE").query_async(&mut conn))
            .await?;

        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: dbsize,
            evictions: 0,
            hit_rate: 0.0,
        };
        stats.calculate_hit_rate();

        gauge!("cache_entries", "backend" => "redis").set(dbsize as f64);
        gauge!("cache_hit_rate", "backend" => "redis").set(stats.hit_rate);

        Ok(stats)
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();

        if self.config.key_prefix.is_empty() {
            let _: () = self
                .bounded("FLUSHDB", redis::cmd("FLUSHDB").query_async(&mut conn))
                .await?;
            info!("Flushed Redis cache database");
        } else {
            // Only our own keys when sharing a database.
            let pattern = format!("{}*", self.config.key_prefix);
            let mut cursor: u64 = 0;
            let mut total_deleted = 0i64;

            loop {
                let (new_cursor, keys): (u64, Vec<String>) = self
                    .bounded(
                        "SCAN",
                        redis::cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(&pattern)
                            .arg("COUNT")
                            .arg(100)
                            .query_async(&mut conn),
                    )
                    .await?;

                if !keys.is_empty() {
                    let mut del_conn = self.conn.clone();
                    let deleted: i64 = self.bounded("DEL", del_conn.del(&keys)).await?;
                    total_deleted += deleted;
                }

                cursor = new_cursor;
                if cursor == 0 {
                    break;
                }
            }

            info!("Cleared {} Redis cache entries", total_deleted);
        }

        counter!("cache_clears_total", "backend" => "redis").increment(1);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_entry_expiration() {
        let entry = CacheEntry {
            data: vec![1, 2, 3],
            ttl: Duration::from_millis(100),
            created_at: Utc::now() - chrono::Duration::milliseconds(200),
        };

        assert!(entry.is_expired());
        assert!(entry.remaining_ttl().is_none());
    }

    #[test]
    fn test_cache_entry_not_expired() {
        let entry = CacheEntry::new(vec![1, 2, 3], Duration::from_secs(600));

        assert!(!entry.is_expired());
        assert!(entry.remaining_ttl().is_some());
    }

    #[tokio::test]
    async fn test_in_memory_backend() {
        let backend = InMemoryBackend::new(InMemoryConfig { max_capacity: 100 });

        backend
            .set("tenant:id:1", b"school".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let retrieved = backend.get("tenant:id:1").await.unwrap();
        assert_eq!(retrieved, Some(b"school".to_vec()));
        assert!(backend.exists("tenant:id:1").await.unwrap());

        assert!(backend.delete("tenant:id:1").await.unwrap());
        assert!(!backend.exists("tenant:id:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_delete_absent_key() {
        let backend = InMemoryBackend::default();
        assert!(!backend.delete("user:id:missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_never_returns_expired() {
        let backend = InMemoryBackend::default();
        backend
            .set("user:id:1", b"stale".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(backend.get("user:id:1").await.unwrap(), None);
        assert!(!backend.exists("user:id:1").await.unwrap());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_eviction() {
        let backend = InMemoryBackend::new(InMemoryConfig { max_capacity: 5 });

        for i in 0..10u8 {
            backend
                .set(&format!("key-{}", i), vec![i], Duration::from_secs(60))
                .await
                .unwrap();
        }

        let stats = backend.stats().await.unwrap();
        assert!(stats.entries <= 5);
        assert!(stats.evictions > 0);
        // The newest write always survives.
        assert!(backend.exists("key-9").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_clear() {
        let backend = InMemoryBackend::default();
        backend.set("a", vec![1], Duration::from_secs(60)).await.unwrap();
        backend.set("b", vec![2], Duration::from_secs(60)).await.unwrap();

        backend.clear().await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_cache_stats() {
        let backend = InMemoryBackend::default();

        backend.set("key1", b"test".to_vec(), Duration::from_secs(60)).await.unwrap();
        backend.get("key1").await.unwrap(); // Hit
        backend.get("key2").await.unwrap(); // Miss

        let stats = backend.stats().await.unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert!((stats.hit_rate - 0.5).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_redis_unreachable_fails_within_connect_timeout() {
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            connect_timeout: Duration::from_millis(300),
            ..Default::default()
        };

        let started = std::time::Instant::now();
        let err = match RedisBackend::new(config).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(e) => e,
        };
        assert_eq!(err.code(), ErrorCode::CacheConnectionFailed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
