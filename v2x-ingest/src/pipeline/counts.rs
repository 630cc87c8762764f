use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::dedup::{content_hash, Deduplicator};
use crate::metrics_consts::COUNT_FLUSH_FAILURES;
use crate::pipeline::{MessagePipeline, Outcome};
use crate::record::{CountReport, MessageKind};
use crate::sinks::CountSink;

/// Tally bucket for messages arriving without an origin address.
const NO_SOURCE: &str = "noIP";
const UNKNOWN_LOCATION: &str = "Unknown";

/// Per-source tallies for one input topic, flushed as report rows each
/// period. Every configured source gets a row per flush, zero or not, so
/// a silent device shows up as a zero instead of a gap.
pub struct CountsPipeline {
    kind: MessageKind,
    dedup: Deduplicator,
    locations: HashMap<String, String>,
    state: Mutex<CountState>,
    sink: Arc<dyn CountSink + Send + Sync>,
}

struct CountState {
    counts: HashMap<String, u64>,
    period_start: DateTime<Utc>,
}

impl CountsPipeline {
    pub fn new(
        kind: MessageKind,
        threshold: Duration,
        locations: HashMap<String, String>,
        sink: Arc<dyn CountSink + Send + Sync>,
    ) -> Self {
        let mut locations = locations;
        locations.insert(NO_SOURCE.to_string(), UNKNOWN_LOCATION.to_string());

        let name = pipeline_name(kind);
        let state = CountState {
            counts: seeded(&locations),
            period_start: Utc::now(),
        };
        Self {
            kind,
            dedup: Deduplicator::new(name, threshold),
            locations,
            state: Mutex::new(state),
            sink,
        }
    }

    /// Swaps the period's tallies for a fresh zero set and publishes them.
    /// A failed publish drops the rows; the new period is already running.
    pub async fn flush(&self, now: DateTime<Utc>) {
        let reports = {
            let mut state = self.state.lock().await;
            let counts = std::mem::replace(&mut state.counts, seeded(&self.locations));
            let period_start = std::mem::replace(&mut state.period_start, now);

            let mut reports: Vec<CountReport> = counts
                .into_iter()
                .map(|(source_id, count)| CountReport {
                    location: self.location_for(&source_id),
                    message_kind: self.kind,
                    period_start,
                    period_end: now,
                    count,
                    source_id,
                })
                .collect();
            reports.sort_by(|a, b| a.source_id.cmp(&b.source_id));
            reports
        };

        if reports.is_empty() {
            return;
        }

        let total: u64 = reports.iter().map(|report| report.count).sum();
        match self.sink.send_batch(reports).await {
            Ok(()) => info!(pipeline = self.name(), total, "flushed count reports"),
            Err(err) => {
                error!(pipeline = self.name(), error = %err, "failed to flush count reports");
                metrics::counter!(COUNT_FLUSH_FAILURES, &[("pipeline", self.name())]).increment(1);
            }
        }
    }

    fn location_for(&self, source_id: &str) -> String {
        self.locations
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_LOCATION.to_string())
    }
}

fn pipeline_name(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Bsm => "counts-bsm",
        MessageKind::Psm => "counts-psm",
        MessageKind::MapIntersection => "counts-map",
    }
}

fn seeded(locations: &HashMap<String, String>) -> HashMap<String, u64> {
    locations.keys().map(|source| (source.clone(), 0)).collect()
}

#[async_trait]
impl MessagePipeline for CountsPipeline {
    fn name(&self) -> &'static str {
        pipeline_name(self.kind)
    }

    async fn handle(&self, raw: &[u8]) -> Outcome {
        let value: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(error) => {
                warn!(pipeline = self.name(), %error, "dropping undecodable message");
                return Outcome::Malformed;
            }
        };

        let key = content_hash(&value);
        if self.dedup.is_duplicate(key, Utc::now()).await {
            return Outcome::Duplicate;
        }

        let source = match value.pointer("/metadata/originIp").and_then(Value::as_str) {
            Some(ip) => ip.to_string(),
            None => {
                warn!(pipeline = self.name(), "message carries no origin address");
                NO_SOURCE.to_string()
            }
        };

        let mut state = self.state.lock().await;
        *state.counts.entry(source).or_insert(0) += 1;
        Outcome::Accepted
    }
}

/// Drives periodic flushes until the task is aborted at shutdown.
pub async fn run_count_flusher(pipeline: Arc<CountsPipeline>, every: std::time::Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately; skip it so the opening period runs
    // full length.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        pipeline.flush(Utc::now()).await;
    }
}
