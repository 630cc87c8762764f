use async_trait::async_trait;
use thiserror::Error;

use crate::record::{CountReport, NormalizedRecord};

pub mod kafka;
pub mod print;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Durable destination for finished geospatial records.
#[async_trait]
pub trait RecordSink {
    async fn send(&self, record: NormalizedRecord) -> Result<(), SinkError>;
}

/// Destination for periodic per-source tally rows.
#[async_trait]
pub trait CountSink {
    async fn send_batch(&self, reports: Vec<CountReport>) -> Result<(), SinkError>;
}
