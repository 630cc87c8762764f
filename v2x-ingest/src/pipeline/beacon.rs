use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use geojson::{Feature, GeoJson, Geometry, Value as GeoValue};
use serde_json::{json, Map};
use tracing::{error, info, warn};

use crate::dedup::{spatiotemporal_key, Deduplicator};
use crate::pipeline::{MessagePipeline, Outcome};
use crate::record::{format_second_precision, MessageKind, NormalizedRecord};
use crate::sinks::RecordSink;
use crate::wire::{parse_beacon, BeaconMessage};

/// Ingests one beacon topic: parse, bucket-key dedup, point Feature out.
pub struct BeaconPipeline {
    kind: MessageKind,
    dedup: Deduplicator,
    sink: Arc<dyn RecordSink + Send + Sync>,
    processed: AtomicU64,
}

impl BeaconPipeline {
    pub fn new(
        kind: MessageKind,
        threshold: Duration,
        sink: Arc<dyn RecordSink + Send + Sync>,
    ) -> Self {
        let name = pipeline_name(kind);
        Self {
            kind,
            dedup: Deduplicator::new(name, threshold),
            sink,
            processed: AtomicU64::new(0),
        }
    }
}

fn pipeline_name(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Bsm => "geo-bsm",
        MessageKind::Psm => "geo-psm",
        MessageKind::MapIntersection => "geo-map",
    }
}

fn point_feature(beacon: &BeaconMessage) -> Feature {
    let mut properties = Map::new();
    properties.insert("id".to_string(), json!(beacon.source_id));
    properties.insert(
        "timestamp".to_string(),
        json!(format_second_precision(&beacon.observed_at)),
    );
    properties.insert("msg_type".to_string(), json!(beacon.kind.as_str()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::Point(vec![
            beacon.position.longitude,
            beacon.position.latitude,
        ]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[async_trait]
impl MessagePipeline for BeaconPipeline {
    fn name(&self) -> &'static str {
        pipeline_name(self.kind)
    }

    async fn handle(&self, raw: &[u8]) -> Outcome {
        let beacon = match parse_beacon(raw, self.kind) {
            Ok(beacon) => beacon,
            Err(error) => {
                warn!(pipeline = self.name(), %error, "dropping unparsable beacon");
                return Outcome::Malformed;
            }
        };

        let key = spatiotemporal_key(
            beacon.kind,
            &beacon.source_id,
            beacon.observed_at,
            beacon.position,
        );
        if self.dedup.is_duplicate(key, Utc::now()).await {
            return Outcome::Duplicate;
        }

        let record = NormalizedRecord {
            source_id: beacon.source_id.clone(),
            message_kind: beacon.kind,
            observed_at: beacon.observed_at,
            geometry: GeoJson::Feature(point_feature(&beacon)),
        };

        if let Err(error) = self.sink.send(record).await {
            error!(pipeline = self.name(), %error, "failed to deliver record");
            return Outcome::SinkFailed;
        }

        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if processed % 100 == 0 {
            info!("processed {} {} messages", processed, self.kind.as_str());
        }
        Outcome::Accepted
    }
}
