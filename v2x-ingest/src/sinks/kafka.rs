use async_trait::async_trait;
use common_kafka::producer::{send_keyed, KafkaContext, ProduceErr};
use rdkafka::producer::FutureProducer;

use crate::metrics_consts::{COUNT_REPORTS_PUBLISHED, RECORDS_PUBLISHED};
use crate::record::{CountReport, MessageKind, NormalizedRecord};
use crate::sinks::{CountSink, RecordSink, SinkError};

impl From<ProduceErr> for SinkError {
    fn from(err: ProduceErr) -> Self {
        SinkError::Delivery(err.to_string())
    }
}

/// Publishes finished records to one output topic. Intersection records are
/// keyed by source so a compacted topic keeps the latest map per device;
/// beacon records are unkeyed appends.
#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer<KafkaContext>,
    topic: String,
}

impl KafkaSink {
    pub fn new(producer: FutureProducer<KafkaContext>, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl RecordSink for KafkaSink {
    async fn send(&self, record: NormalizedRecord) -> Result<(), SinkError> {
        let key = match record.message_kind {
            MessageKind::MapIntersection => Some(record.source_id.as_str()),
            MessageKind::Bsm | MessageKind::Psm => None,
        };
        send_keyed(&self.producer, &self.topic, key, &record.geometry).await?;

        metrics::counter!(RECORDS_PUBLISHED, &[("kind", record.message_kind.as_str())])
            .increment(1);
        Ok(())
    }
}

#[async_trait]
impl CountSink for KafkaSink {
    async fn send_batch(&self, reports: Vec<CountReport>) -> Result<(), SinkError> {
        let published = reports.len() as u64;
        for report in &reports {
            send_keyed(&self.producer, &self.topic, None, report).await?;
        }

        metrics::counter!(COUNT_REPORTS_PUBLISHED).increment(published);
        Ok(())
    }
}
