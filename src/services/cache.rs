use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::core::text;
use crate::models::{Classification, ClassificationRequest};

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Immutable memoized classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub fingerprint: String,
    pub classification: Classification,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(fingerprint: impl Into<String>, classification: Classification, ttl: Duration) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            classification,
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(self.ttl_secs.min(u32::MAX as u64) as i64)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at() - now).to_std().unwrap_or(Duration::ZERO)
    }
}

/// Expires each L1 entry at its own created_at + ttl
struct EntryExpiry;

impl Expiry<String, Arc<CacheEntry>> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &Arc<CacheEntry>, _created_at: Instant) -> Option<Duration> {
        Some(value.remaining(Utc::now()))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Arc<CacheEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining(Utc::now()))
    }
}

/// How a `get_or_compute` call was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// This call ran the computation
    Computed,
    /// Served from L1, from L2, or by waiting on another caller's computation
    Shared,
}

/// Fingerprint-keyed classification cache
///
/// L1 is an in-process moka cache with per-entry TTL and coalescing inserts,
/// which gives at most one in-flight computation per fingerprint. L2 is an
/// optional Redis instance shared across processes; its failures are logged
/// and treated as misses.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: Cache<String, Arc<CacheEntry>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
}

impl CacheManager {
    /// In-memory cache only
    pub fn in_memory(l1_size: u64, ttl: Duration) -> Self {
        let l1_cache = Cache::builder()
            .max_capacity(l1_size)
            .expire_after(EntryExpiry)
            .build();

        Self {
            redis: None,
            l1_cache,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            computations: AtomicU64::new(0),
        }
    }

    /// In-memory cache backed by Redis
    pub async fn with_redis(redis_url: &str, l1_size: u64, ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = ConnectionManager::new(client).await?;

        let mut manager = Self::in_memory(l1_size, ttl);
        manager.redis = Some(Arc::new(tokio::sync::Mutex::new(redis)));
        Ok(manager)
    }

    /// Cached entry for a fingerprint; expired entries are misses
    pub async fn get(&self, fingerprint: &str) -> Option<Arc<CacheEntry>> {
        let now = Utc::now();

        if let Some(entry) = self.l1_cache.get(fingerprint).await {
            if !entry.is_expired(now) {
                tracing::trace!("L1 cache hit: {}", fingerprint);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry);
            }
            self.l1_cache.invalidate(fingerprint).await;
        }

        if let Some(entry) = self.l2_get(fingerprint).await {
            tracing::trace!("L2 cache hit: {}", fingerprint);
            self.hits.fetch_add(1, Ordering::Relaxed);
            self.l1_cache.insert(fingerprint.to_string(), entry.clone()).await;
            return Some(entry);
        }

        tracing::trace!("Cache miss: {}", fingerprint);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a classification, replacing any previous entry
    pub async fn put(&self, fingerprint: &str, classification: Classification, ttl: Duration) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry::new(fingerprint, classification, ttl));
        self.l1_cache.insert(fingerprint.to_string(), entry.clone()).await;
        self.l2_put(&entry).await;
        tracing::trace!("Cache set: {}", fingerprint);
        entry
    }

    /// Cached entry or the result of `compute`, running `compute` at most
    /// once across concurrent callers with the same fingerprint
    pub async fn get_or_compute<F>(&self, fingerprint: &str, compute: F) -> (Arc<CacheEntry>, CacheLookup)
    where
        F: Future<Output = Classification>,
    {
        if let Some(entry) = self.get(fingerprint).await {
            return (entry, CacheLookup::Shared);
        }

        let computed = AtomicBool::new(false);
        let entry = self
            .l1_cache
            .entry_by_ref(fingerprint)
            .or_insert_with(async {
                if let Some(entry) = self.l2_get(fingerprint).await {
                    return entry;
                }
                computed.store(true, Ordering::Relaxed);
                self.computations.fetch_add(1, Ordering::Relaxed);
                let entry = Arc::new(CacheEntry::new(fingerprint, compute.await, self.ttl));
                self.l2_put(&entry).await;
                entry
            })
            .await;

        let lookup = if entry.is_fresh() && computed.load(Ordering::Relaxed) {
            CacheLookup::Computed
        } else {
            CacheLookup::Shared
        };
        (entry.into_value(), lookup)
    }

    pub async fn invalidate(&self, fingerprint: &str) {
        self.l1_cache.invalidate(fingerprint).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            if let Err(e) = redis::cmd("DEL")
                .arg(fingerprint)
                .query_async::<()>(&mut *conn)
                .await
            {
                tracing::warn!("Redis DEL failed for {}: {}", fingerprint, e);
            }
        }
    }

    async fn l2_get(&self, fingerprint: &str) -> Option<Arc<CacheEntry>> {
        let redis = self.redis.as_ref()?;

        let mut conn = redis.lock().await;
        let value: Result<Option<String>, redis::RedisError> =
            redis::cmd("GET").arg(fingerprint).query_async(&mut *conn).await;
        drop(conn);

        let json = match value {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Redis GET failed for {}: {}", fingerprint, e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&json) {
            Ok(entry) if !entry.is_expired(Utc::now()) => Some(Arc::new(entry)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry {}: {}", fingerprint, e);
                None
            }
        }
    }

    async fn l2_put(&self, entry: &CacheEntry) {
        let Some(redis) = &self.redis else {
            return;
        };
        if entry.ttl_secs == 0 {
            return;
        }

        let json = match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {}: {}", entry.fingerprint, e);
                return;
            }
        };

        let mut conn = redis.lock().await;
        if let Err(e) = redis::cmd("SETEX")
            .arg(&entry.fingerprint)
            .arg(entry.ttl_secs)
            .arg(json)
            .query_async::<()>(&mut *conn)
            .await
        {
            tracing::warn!("Redis SETEX failed for {}: {}", entry.fingerprint, e);
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            hit_count: hits,
            miss_count: misses,
            computations: self.computations.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 },
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub l1_size: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub computations: u64,
    pub hit_rate: f64,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Stable fingerprint of the normalized request fields
    pub fn fingerprint(request: &ClassificationRequest) -> String {
        let request = request.normalized();
        let url = request
            .website_url()
            .map(|u| u.trim_end_matches('/').to_lowercase())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        for field in [
            text::normalize(request.business_name()),
            text::normalize(request.description()),
            url,
            request.declared_region().unwrap_or_default().to_string(),
        ] {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }

        format!("classify:{}", hex::encode(hasher.finalize()))
    }
}
