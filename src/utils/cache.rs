//! In-memory risk report cache
//!
//! DashMap-backed TTL cache keyed by lowercase address. Only successful
//! lookups are stored, so a backend outage is retried on the next token
//! instead of being remembered as HIGH_RISK. Expired entries are swept every
//! `CACHE_CLEANUP_INTERVAL` misses so the map stays bounded by the live set.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::models::{RiskReport, ScreenResult};
use crate::providers::RiskClassifier;
use crate::utils::constants::CACHE_CLEANUP_INTERVAL;

#[derive(Clone, Debug)]
struct CacheEntry {
    report: RiskReport,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

#[derive(Debug)]
pub struct RiskCache {
    store: DashMap<String, CacheEntry>,
    ttl: Duration,
    cleanup_every: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RiskCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
            cleanup_every: CACHE_CLEANUP_INTERVAL,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Sweep expired entries every `misses` cache misses (at least 1)
    pub fn with_cleanup_interval(mut self, misses: u64) -> Self {
        self.cleanup_every = misses.max(1);
        self
    }

    #[inline]
    fn normalize_address(address: &str) -> String {
        address.to_lowercase()
    }

    pub fn get(&self, address: &str) -> Option<RiskReport> {
        let key = Self::normalize_address(address);

        let hit = match self.store.get(&key) {
            Some(entry) if !entry.is_expired(self.ttl) => Some(entry.report.clone()),
            Some(entry) => {
                drop(entry);
                self.store.remove(&key);
                debug!("📭 CACHE MISS (expired): {}", key);
                None
            }
            None => None,
        };

        match hit {
            Some(report) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("✅ CACHE HIT: {}", key);
                Some(report)
            }
            None => {
                let misses = self.misses.fetch_add(1, Ordering::Relaxed) + 1;
                if misses % self.cleanup_every == 0 {
                    self.cleanup_expired();
                }
                None
            }
        }
    }

    pub fn set(&self, address: &str, report: RiskReport) {
        let key = Self::normalize_address(address);
        self.store.insert(
            key,
            CacheEntry {
                report,
                created_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, address: &str) {
        self.store.remove(&Self::normalize_address(address));
    }

    pub fn cleanup_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired(self.ttl));
        let removed = before - self.store.len();
        if removed > 0 {
            info!("🧹 CACHE CLEANUP: {} expired entries removed", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            hits,
            misses,
            hit_rate,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

/// Classifier decorator that answers repeated addresses from a `RiskCache`
pub struct CachedClassifier {
    inner: Arc<dyn RiskClassifier>,
    cache: RiskCache,
}

impl CachedClassifier {
    pub fn new(inner: Arc<dyn RiskClassifier>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: RiskCache::new(ttl),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &RiskCache {
        &self.cache
    }
}

#[async_trait]
impl RiskClassifier for CachedClassifier {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn lookup(&self, address: &str) -> ScreenResult<RiskReport> {
        if let Some(report) = self.cache.get(address) {
            return Ok(report);
        }

        let report = self.inner.lookup(address).await?;
        self.cache.set(address, report.clone());
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;
    use crate::providers::StaticClassifier;

    #[test]
    fn test_address_normalization() {
        let cache = RiskCache::new(Duration::from_secs(60));
        cache.set("0xDAC17F958D2EE523A2206206994597C13D831EC7", RiskReport::new(RiskLevel::Safe));

        let hit = cache.get("0xdac17f958d2ee523a2206206994597c13d831ec7");
        assert_eq!(hit.map(|r| r.risk_level), Some(RiskLevel::Safe));
    }

    #[test]
    fn test_expired_entries_miss() {
        let cache = RiskCache::new(Duration::ZERO);
        cache.set("0xabc", RiskReport::new(RiskLevel::Safe));
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("0xabc").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_cleanup_and_stats() {
        let cache = RiskCache::new(Duration::from_secs(60));
        cache.set("0xa", RiskReport::new(RiskLevel::Safe));
        cache.get("0xa");
        cache.get("0xb");
        cache.invalidate("0xA");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate, 50.0);
        assert_eq!(stats.entries, 0);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_misses_sweep_expired_entries() {
        let cache = RiskCache::new(Duration::ZERO).with_cleanup_interval(2);
        for address in ["0xa", "0xb", "0xc"] {
            cache.set(address, RiskReport::new(RiskLevel::Safe));
        }
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("0xunseen1").is_none());
        assert_eq!(cache.stats().entries, 3);
        assert!(cache.get("0xunseen2").is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_cached_classifier_calls_backend_once() {
        let stub = Arc::new(StaticClassifier::default());
        let cached = CachedClassifier::new(stub.clone(), Duration::from_secs(60));

        cached.classify("0xABC").await;
        let analysis = cached.classify("0xabc").await;

        assert_eq!(analysis.risk_level, RiskLevel::LowRisk);
        assert_eq!(stub.calls(), 1);
        assert_eq!(cached.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let stub = Arc::new(StaticClassifier::failing("down"));
        let cached = CachedClassifier::new(stub.clone(), Duration::from_secs(60));

        assert_eq!(cached.classify("0xabc").await.risk_level, RiskLevel::HighRisk);
        assert_eq!(cached.classify("0xabc").await.risk_level, RiskLevel::HighRisk);

        assert_eq!(stub.calls(), 2);
        assert_eq!(cached.stats().entries, 0);
    }
}
