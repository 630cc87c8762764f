use health::HealthHandle;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::KafkaConfig;

pub struct KafkaContext {
    liveness: HealthHandle,
}

impl From<HealthHandle> for KafkaContext {
    fn from(value: HealthHandle) -> Self {
        KafkaContext { liveness: value }
    }
}

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, _: rdkafka::Statistics) {
        // The main rdkafka loop is running and calling us, so the producer
        // side of the process is alive.
        self.liveness.report_healthy();
    }
}

pub async fn create_kafka_producer(
    config: &KafkaConfig,
    liveness: HealthHandle,
) -> Result<FutureProducer<KafkaContext>, KafkaError> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_hosts)
        .set("statistics.interval.ms", "10000")
        .set("linger.ms", config.kafka_producer_linger_ms.to_string())
        .set(
            "message.timeout.ms",
            config.kafka_message_timeout_ms.to_string(),
        )
        .set(
            "compression.codec",
            config.kafka_compression_codec.to_owned(),
        )
        .set(
            "queue.buffering.max.kbytes",
            (config.kafka_producer_queue_mib * 1024).to_string(),
        )
        .set(
            "queue.buffering.max.messages",
            config.kafka_producer_queue_messages.to_string(),
        );

    if config.kafka_tls {
        client_config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    };

    debug!("rdkafka configuration: {:?}", client_config);
    let producer: FutureProducer<KafkaContext> =
        client_config.create_with_context(liveness.into())?;

    // "Ping" the brokers by requesting metadata
    match producer
        .client()
        .fetch_metadata(None, std::time::Duration::from_secs(15))
    {
        Ok(metadata) => {
            info!(
                "connected to kafka brokers, found {} topics",
                metadata.topics().len()
            );
        }
        Err(err) => {
            error!("failed to fetch metadata from kafka brokers: {err:?}");
            return Err(err);
        }
    }

    Ok(producer)
}

#[derive(Debug, Error)]
pub enum ProduceErr {
    #[error("failed to serialize payload: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("failed to produce: {0}")]
    Kafka(#[from] KafkaError),
    #[error("delivery confirmation dropped")]
    Canceled,
}

/// Serializes `value` to JSON and publishes it, waiting for the broker ack.
/// A `Some` key pins the partition, and lets compacted topics retain the
/// latest value per key.
pub async fn send_keyed<T>(
    producer: &FutureProducer<KafkaContext>,
    topic: &str,
    key: Option<&str>,
    value: &T,
) -> Result<(), ProduceErr>
where
    T: Serialize,
{
    let payload = serde_json::to_string(value)?;

    let record = FutureRecord {
        topic,
        key,
        payload: Some(&payload),
        timestamp: None,
        partition: None,
        headers: None,
    };

    let ack = match producer.send_result(record) {
        Ok(ack) => ack,
        Err((err, _)) => return Err(err.into()),
    };

    match ack.await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err((err, _))) => Err(err.into()),
        Err(_) => Err(ProduceErr::Canceled),
    }
}
