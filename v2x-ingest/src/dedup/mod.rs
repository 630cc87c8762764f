//! Freshness-windowed duplicate suppression.
//!
//! Each pipeline owns one [`Deduplicator`] seeded with the shared freshness
//! threshold. Keys come from [`content_hash`] (map messages) or
//! [`spatiotemporal_key`] (point beacons); the deduplicator itself only
//! decides fresh-duplicate / aged-out / new and keeps the cache bounded.

mod cache;
mod key;

pub use key::{content_hash, spatiotemporal_key};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::metrics_consts::{CACHE_ENTRIES, CACHE_SWEEPS};
use cache::FreshnessCache;

pub struct Deduplicator {
    cache: Mutex<FreshnessCache>,
    pipeline: &'static str,
}

impl Deduplicator {
    pub fn new(pipeline: &'static str, threshold: Duration) -> Self {
        Self::starting_at(pipeline, threshold, Utc::now())
    }

    fn starting_at(pipeline: &'static str, threshold: Duration, now: DateTime<Utc>) -> Self {
        Self {
            cache: Mutex::new(FreshnessCache::new(threshold, now)),
            pipeline,
        }
    }

    /// True when `key` was accepted within the freshness window, in which
    /// case the caller drops the record and the original timestamp is kept.
    /// An aged-out key is refreshed and accepted again; an unseen key is
    /// recorded, sweeping the cache first if a full window has passed since
    /// the last sweep.
    pub async fn is_duplicate(&self, key: String, now: DateTime<Utc>) -> bool {
        let mut cache = self.cache.lock().await;

        if cache.contains(&key) {
            if cache.seen_recently(&key, now) {
                return true;
            }
            cache.touch(key, now);
        } else {
            if cache.sweep_due(now) {
                cache.sweep(now);
                metrics::counter!(CACHE_SWEEPS, &[("pipeline", self.pipeline)]).increment(1);
            }
            cache.touch(key, now);
        }

        metrics::gauge!(CACHE_ENTRIES, &[("pipeline", self.pipeline)]).set(cache.len() as f64);
        false
    }

    #[cfg(test)]
    async fn entry_count(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 8, 15, 12, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn deduplicator() -> Deduplicator {
        Deduplicator::starting_at("test", Duration::minutes(60), at(0))
    }

    #[tokio::test]
    async fn redelivery_within_window_is_duplicate() {
        let dedup = deduplicator();

        assert!(!dedup.is_duplicate("key".to_string(), at(0)).await);
        assert!(dedup.is_duplicate("key".to_string(), at(1)).await);
        assert!(dedup.is_duplicate("key".to_string(), at(59)).await);
    }

    #[tokio::test]
    async fn aged_out_key_is_accepted_and_refreshed() {
        let dedup = deduplicator();

        assert!(!dedup.is_duplicate("key".to_string(), at(0)).await);
        assert!(!dedup.is_duplicate("key".to_string(), at(60)).await);
        // Refreshed at the second acceptance, so the window restarts there.
        assert!(dedup.is_duplicate("key".to_string(), at(119)).await);
    }

    #[tokio::test]
    async fn fresh_duplicate_does_not_extend_the_window() {
        let dedup = deduplicator();

        assert!(!dedup.is_duplicate("key".to_string(), at(0)).await);
        assert!(dedup.is_duplicate("key".to_string(), at(30)).await);
        // Still keyed to the original acceptance, so the entry ages out at
        // the original deadline rather than 30 minutes later.
        assert!(!dedup.is_duplicate("key".to_string(), at(70)).await);
    }

    #[tokio::test]
    async fn miss_sweeps_once_the_gate_elapses() {
        let dedup = deduplicator();

        assert!(!dedup.is_duplicate("old".to_string(), at(0)).await);
        assert_eq!(dedup.entry_count().await, 1);

        // First unseen key after the gate: stale entries go, new key stays.
        assert!(!dedup.is_duplicate("new".to_string(), at(130)).await);
        assert_eq!(dedup.entry_count().await, 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_collide() {
        let dedup = deduplicator();

        assert!(!dedup.is_duplicate("a".to_string(), at(0)).await);
        assert!(!dedup.is_duplicate("b".to_string(), at(0)).await);
        assert_eq!(dedup.entry_count().await, 2);
    }
}
