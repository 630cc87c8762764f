use async_trait::async_trait;
use tracing::info;

use crate::record::{CountReport, NormalizedRecord};
use crate::sinks::{CountSink, RecordSink, SinkError};

/// Stdout stand-in for the Kafka sink, for local runs without a broker.
pub struct PrintSink;

#[async_trait]
impl RecordSink for PrintSink {
    async fn send(&self, record: NormalizedRecord) -> Result<(), SinkError> {
        info!("record: {:?}", record);
        Ok(())
    }
}

#[async_trait]
impl CountSink for PrintSink {
    async fn send_batch(&self, reports: Vec<CountReport>) -> Result<(), SinkError> {
        for report in reports {
            info!("count report: {:?}", report);
        }
        Ok(())
    }
}
