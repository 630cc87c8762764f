use std::sync::{Arc, Weak};

use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};
use tracing::warn;

use crate::config::KafkaConfig;

/// A stream consumer subscribed to exactly one topic, cheap to clone so any
/// number of worker loops can pull from the same subscription.
#[derive(Clone)]
pub struct SingleTopicConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("received empty payload")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetErr {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("consumer gone")]
    Gone,
}

impl SingleTopicConsumer {
    pub fn new(config: &KafkaConfig, group: &str, topic: &str) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", group);

        // Offsets are stored by hand once a message is handled, then picked
        // up by the auto-commit timer.
        client_config.set("enable.auto.offset.store", "false");

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[topic])?;

        let inner = Inner {
            consumer,
            topic: topic.to_string(),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn topic(&self) -> &str {
        &self.inner.topic
    }

    /// Pulls the next raw payload. Empty payloads store their offset before
    /// returning, so the subscription never re-reads them.
    pub async fn recv(&self) -> Result<(Vec<u8>, Offset), RecvErr> {
        let message = self.inner.consumer.recv().await?;

        let offset = Offset {
            handle: Arc::downgrade(&self.inner),
            partition: message.partition(),
            offset: message.offset(),
        };

        let Some(payload) = message.payload() else {
            if let Err(err) = offset.store() {
                warn!(
                    topic = %self.inner.topic,
                    "failed to store offset for empty payload: {err}"
                );
            }
            return Err(RecvErr::Empty);
        };

        Ok((payload.to_vec(), offset))
    }
}

pub struct Offset {
    handle: Weak<Inner>,
    partition: i32,
    offset: i64,
}

impl Offset {
    pub fn store(self) -> Result<(), OffsetErr> {
        let inner = self.handle.upgrade().ok_or(OffsetErr::Gone)?;
        inner
            .consumer
            .store_offset(&inner.topic, self.partition, self.offset)?;
        Ok(())
    }
}
