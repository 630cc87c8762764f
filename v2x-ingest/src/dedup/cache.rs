use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

/// Key → last-seen map with a freshness window.
///
/// Entry age is recomputed against the window on every lookup, so a stale
/// entry answers like an absent one long before a sweep physically removes
/// it. Sweeps rebuild the map wholesale and carry their own
/// time-since-last-sweep clock; the deduplicator runs one only on a lookup
/// miss once that clock has run out.
pub struct FreshnessCache {
    entries: HashMap<String, DateTime<Utc>>,
    threshold: Duration,
    last_sweep: DateTime<Utc>,
}

impl FreshnessCache {
    pub fn new(threshold: Duration, now: DateTime<Utc>) -> Self {
        Self {
            entries: HashMap::new(),
            threshold,
            last_sweep: now,
        }
    }

    /// True iff `key` was seen within the freshness window ending at `now`.
    pub fn seen_recently(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self.entries.get(key) {
            Some(last_seen) => now - *last_seen < self.threshold,
            None => false,
        }
    }

    /// True iff `key` has an entry at all, fresh or stale.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn touch(&mut self, key: String, now: DateTime<Utc>) {
        self.entries.insert(key, now);
    }

    /// Rebuilds the map keeping only entries still inside the freshness
    /// window, and restarts the sweep clock.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let kept: HashMap<String, DateTime<Utc>> = self
            .entries
            .iter()
            .filter(|(_, last_seen)| now - **last_seen < self.threshold)
            .map(|(key, last_seen)| (key.clone(), *last_seen))
            .collect();
        self.entries = kept;
        self.last_sweep = now;
    }

    /// True once a full window has passed since the previous sweep.
    pub fn sweep_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_sweep >= self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
