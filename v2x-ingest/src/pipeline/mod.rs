//! One pipeline per ingestion concern: intersection maps, geo-tagged
//! beacons, and per-source count tallies. Workers drive pipelines through
//! [`MessagePipeline`] without knowing which concern they serve.

mod beacon;
mod counts;
mod map;

pub use beacon::BeaconPipeline;
pub use counts::{run_count_flusher, CountsPipeline};
pub use map::MapPipeline;

use async_trait::async_trait;

/// What became of one pulled message. Workers turn these into metrics;
/// nothing here ever aborts the worker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Duplicate,
    Malformed,
    SinkFailed,
}

#[async_trait]
pub trait MessagePipeline: Send + Sync {
    /// Stable label for logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, raw: &[u8]) -> Outcome;
}
