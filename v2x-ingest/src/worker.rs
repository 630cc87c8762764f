use std::sync::Arc;
use std::time::Duration;

use common_kafka::consumer::{RecvErr, SingleTopicConsumer};
use health::HealthHandle;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::metrics_consts::{
    DUPLICATES_DROPPED, EMPTY_PAYLOADS, MALFORMED_DROPPED, MESSAGES_RECEIVED, RECORDS_ACCEPTED,
    SINK_FAILURES, SOURCE_ERRORS,
};
use crate::pipeline::{MessagePipeline, Outcome};

/// Pause before re-polling a subscription that just returned an error.
const SOURCE_ERROR_BACKOFF: Duration = Duration::from_secs(1);
/// Cap on one recv() wait, so workers on idle topics still heartbeat.
const RECV_KEEPALIVE: Duration = Duration::from_secs(30);

/// Starts `count` workers pulling from a shared subscription into one
/// pipeline. Workers only compete for messages; nothing orders them.
pub fn spawn_workers(
    consumer: SingleTopicConsumer,
    pipeline: Arc<dyn MessagePipeline>,
    count: usize,
    liveness: HealthHandle,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|_| {
            tokio::spawn(worker_loop(
                consumer.clone(),
                pipeline.clone(),
                liveness.clone(),
            ))
        })
        .collect()
}

async fn worker_loop(
    consumer: SingleTopicConsumer,
    pipeline: Arc<dyn MessagePipeline>,
    liveness: HealthHandle,
) {
    loop {
        liveness.report_healthy();

        let received = match tokio::time::timeout(RECV_KEEPALIVE, consumer.recv()).await {
            Ok(received) => received,
            // Nothing pulled within the window; beat again and re-poll.
            Err(_) => continue,
        };

        let (payload, offset) = match received {
            Ok(pair) => pair,
            Err(RecvErr::Empty) => {
                metrics::counter!(EMPTY_PAYLOADS, &[("pipeline", pipeline.name())]).increment(1);
                continue;
            }
            Err(RecvErr::Kafka(err)) => {
                // The subscription rejoins on its own; back off instead of
                // spinning against a broker that just went away.
                warn!(pipeline = pipeline.name(), error = %err, "message source error, retrying");
                metrics::counter!(SOURCE_ERRORS, &[("pipeline", pipeline.name())]).increment(1);
                tokio::time::sleep(SOURCE_ERROR_BACKOFF).await;
                continue;
            }
        };

        metrics::counter!(MESSAGES_RECEIVED, &[("pipeline", pipeline.name())]).increment(1);

        let outcome = pipeline.handle(&payload).await;
        metrics::counter!(outcome_metric(outcome), &[("pipeline", pipeline.name())]).increment(1);

        // Stored after handling: a crash mid-message re-reads it, never
        // skips it.
        if let Err(err) = offset.store() {
            error!(pipeline = pipeline.name(), error = %err, "failed to store offset");
        }
    }
}

fn outcome_metric(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Accepted => RECORDS_ACCEPTED,
        Outcome::Duplicate => DUPLICATES_DROPPED,
        Outcome::Malformed => MALFORMED_DROPPED,
        Outcome::SinkFailed => SINK_FAILURES,
    }
}
