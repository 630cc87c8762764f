use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use common_kafka::consumer::SingleTopicConsumer;
use common_kafka::producer::{create_kafka_producer, KafkaContext};
use health::HealthRegistry;
use rdkafka::producer::FutureProducer;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::pipeline::{
    run_count_flusher, BeaconPipeline, CountsPipeline, MapPipeline, MessagePipeline,
};
use crate::record::MessageKind;
use crate::server::{management_router, serve};
use crate::sinks::kafka::KafkaSink;
use crate::sinks::print::PrintSink;
use crate::sinks::{CountSink, RecordSink};
use crate::worker::spawn_workers;

// Workers beat at least every recv keepalive, so this leaves a few missed
// beats before the probe fails.
const WORKER_DEADLINE: Duration = Duration::from_secs(90);
const PRODUCER_DEADLINE: Duration = Duration::from_secs(30);

/// All three ingestion pipelines plus the management server, wired from one
/// config and torn down together.
pub struct IngestService {
    tasks: Vec<JoinHandle<()>>,
    flushers: Vec<JoinHandle<()>>,
    counts: Vec<Arc<CountsPipeline>>,
}

impl IngestService {
    pub async fn start(config: Config) -> Result<Self> {
        let liveness = HealthRegistry::new("liveness");

        let producer_liveness = liveness.register("rdkafka", PRODUCER_DEADLINE);
        let producer = create_kafka_producer(&config.kafka, producer_liveness)
            .await
            .context("failed to connect to kafka brokers")?;

        let locations = config
            .location_labels()
            .context("failed to parse SOURCE_LOCATIONS")?;

        let mut tasks = Vec::new();
        let mut flushers = Vec::new();
        let mut counts = Vec::new();

        let map_sink = record_sink(&config, &producer, config.map_records_topic.clone());
        let map_pipeline: Arc<dyn MessagePipeline> =
            Arc::new(MapPipeline::new(config.freshness_threshold(), map_sink));
        tasks.extend(subscribe(
            &config,
            &liveness,
            "map",
            &config.map_topic,
            map_pipeline,
        )?);

        for (kind, topic) in [
            (MessageKind::Bsm, &config.bsm_topic),
            (MessageKind::Psm, &config.psm_topic),
        ] {
            let sink = record_sink(&config, &producer, config.geo_records_topic.clone());
            let pipeline: Arc<dyn MessagePipeline> =
                Arc::new(BeaconPipeline::new(kind, config.freshness_threshold(), sink));
            tasks.extend(subscribe(&config, &liveness, "geo", topic, pipeline)?);
        }

        for (kind, topic) in [
            (MessageKind::Bsm, &config.bsm_topic),
            (MessageKind::Psm, &config.psm_topic),
            (MessageKind::MapIntersection, &config.map_topic),
        ] {
            let sink = count_sink(&config, &producer);
            let pipeline = Arc::new(CountsPipeline::new(
                kind,
                config.freshness_threshold(),
                locations.clone(),
                sink,
            ));
            counts.push(pipeline.clone());
            flushers.push(tokio::spawn(run_count_flusher(
                pipeline.clone(),
                config.count_flush_period(),
            )));
            tasks.extend(subscribe(&config, &liveness, "counts", topic, pipeline)?);
        }

        let router = management_router(liveness);
        let bind = config.bind_address();
        tasks.push(tokio::spawn(async move {
            if let Err(error) = serve(router, &bind).await {
                error!(%error, "management server failed");
            }
        }));

        Ok(Self {
            tasks,
            flushers,
            counts,
        })
    }

    /// Blocks until ctrl-c, then stops the flushers and publishes whatever
    /// the count pipelines have tallied in the open period.
    pub async fn run_until_shutdown(self) -> Result<()> {
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("received shutdown signal, flushing count reports");

        for flusher in &self.flushers {
            flusher.abort();
        }
        let now = Utc::now();
        for pipeline in &self.counts {
            pipeline.flush(now).await;
        }
        for task in &self.tasks {
            task.abort();
        }

        info!("shutdown complete");
        Ok(())
    }
}

fn subscribe(
    config: &Config,
    liveness: &HealthRegistry,
    concern: &str,
    topic: &str,
    pipeline: Arc<dyn MessagePipeline>,
) -> Result<Vec<JoinHandle<()>>> {
    let group = config.group_for(concern);
    let consumer = SingleTopicConsumer::new(&config.kafka, &group, topic)
        .with_context(|| format!("failed to subscribe to {topic} as {group}"))?;
    let handle = liveness.register(format!("{}-workers", pipeline.name()), WORKER_DEADLINE);

    info!(topic, group, pipeline = pipeline.name(), "subscribed");
    Ok(spawn_workers(
        consumer,
        pipeline,
        config.workers_per_topic,
        handle,
    ))
}

fn record_sink(
    config: &Config,
    producer: &FutureProducer<KafkaContext>,
    topic: String,
) -> Arc<dyn RecordSink + Send + Sync> {
    if config.emit_records {
        Arc::new(KafkaSink::new(producer.clone(), topic))
    } else {
        Arc::new(PrintSink)
    }
}

fn count_sink(
    config: &Config,
    producer: &FutureProducer<KafkaContext>,
) -> Arc<dyn CountSink + Send + Sync> {
    if config.emit_records {
        Arc::new(KafkaSink::new(
            producer.clone(),
            config.counts_topic.clone(),
        ))
    } else {
        Arc::new(PrintSink)
    }
}
