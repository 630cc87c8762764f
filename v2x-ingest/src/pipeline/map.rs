use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use geojson::GeoJson;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::dedup::{content_hash, Deduplicator};
use crate::geometry;
use crate::pipeline::{MessagePipeline, Outcome};
use crate::record::{MessageKind, NormalizedRecord};
use crate::sinks::RecordSink;
use crate::wire::parse_map;

/// Ingests intersection map broadcasts: content-hash dedup, lane geometry
/// reconstruction, one FeatureCollection per intersection out.
pub struct MapPipeline {
    dedup: Deduplicator,
    sink: Arc<dyn RecordSink + Send + Sync>,
}

impl MapPipeline {
    pub fn new(threshold: Duration, sink: Arc<dyn RecordSink + Send + Sync>) -> Self {
        Self {
            dedup: Deduplicator::new("map", threshold),
            sink,
        }
    }
}

#[async_trait]
impl MessagePipeline for MapPipeline {
    fn name(&self) -> &'static str {
        "map"
    }

    async fn handle(&self, raw: &[u8]) -> Outcome {
        let value: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(error) => {
                warn!(pipeline = self.name(), %error, "dropping undecodable map message");
                return Outcome::Malformed;
            }
        };

        // Maps rebroadcast on a fixed schedule, so most deliveries are
        // repeats. Hash before the structural parse to drop them without
        // paying for lane conversion.
        let key = content_hash(&value);
        if self.dedup.is_duplicate(key, Utc::now()).await {
            return Outcome::Duplicate;
        }

        let map = match parse_map(value) {
            Ok(map) => map,
            Err(error) => {
                warn!(pipeline = self.name(), %error, "dropping malformed map message");
                return Outcome::Malformed;
            }
        };

        info!(source = %map.source_id, "new record candidate");

        let geometry = GeoJson::FeatureCollection(geometry::build(&map.source_id, &map.geometry));
        let record = NormalizedRecord {
            source_id: map.source_id,
            message_kind: MessageKind::MapIntersection,
            observed_at: map.observed_at,
            geometry,
        };

        if let Err(error) = self.sink.send(record).await {
            error!(pipeline = self.name(), %error, "failed to deliver record");
            return Outcome::SinkFailed;
        }
        Outcome::Accepted
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::Mutex;

    use crate::sinks::SinkError;

    use super::*;

    #[derive(Default)]
    struct MemorySink {
        records: Mutex<Vec<NormalizedRecord>>,
    }

    #[async_trait]
    impl RecordSink for MemorySink {
        async fn send(&self, record: NormalizedRecord) -> Result<(), SinkError> {
            self.records.lock().await.push(record);
            Ok(())
        }
    }

    fn map_body(received_at: &str, serial: &str) -> Vec<u8> {
        json!({
            "metadata": {
                "originIp": "10.0.0.5",
                "odeReceivedAt": received_at,
                "serialId": {"streamId": serial}
            },
            "payload": {
                "data": {
                    "intersections": {
                        "intersectionGeometry": [{
                            "refPoint": {"latitude": 39.7, "longitude": -105.1},
                            "laneSet": {
                                "GenericLane": [{
                                    "laneID": 1,
                                    "laneAttributes": {
                                        "directionalUse": {"ingressPath": true, "egressPath": false}
                                    },
                                    "nodeList": {
                                        "nodes": {
                                            "NodeXY": [
                                                {"delta": {"nodeXY": {"x": 2.3, "y": 3.4}}}
                                            ]
                                        }
                                    }
                                }]
                            }
                        }]
                    }
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn builds_one_collection_per_accepted_broadcast() {
        let sink = Arc::new(MemorySink::default());
        let pipeline = MapPipeline::new(Duration::minutes(60), sink.clone());

        let outcome = pipeline
            .handle(&map_body("2023-08-15T12:00:00.123456Z", "stream-1"))
            .await;
        assert_eq!(outcome, Outcome::Accepted);

        let records = sink.records.lock().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_id, "10.0.0.5");
        assert_eq!(records[0].message_kind, MessageKind::MapIntersection);

        let GeoJson::FeatureCollection(collection) = &records[0].geometry else {
            panic!("map record should carry a FeatureCollection");
        };
        assert_eq!(collection.features.len(), 1);
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["ip"], json!("10.0.0.5"));
        assert_eq!(properties["laneID"], json!(1));
    }

    #[tokio::test]
    async fn rebroadcast_with_new_receipt_stamp_is_a_duplicate() {
        let sink = Arc::new(MemorySink::default());
        let pipeline = MapPipeline::new(Duration::minutes(60), sink.clone());

        assert_eq!(
            pipeline
                .handle(&map_body("2023-08-15T12:00:00.123456Z", "stream-1"))
                .await,
            Outcome::Accepted
        );
        // Same semantic content, fresh ingestion-time fields.
        assert_eq!(
            pipeline
                .handle(&map_body("2023-08-15T12:09:59.999999Z", "stream-2"))
                .await,
            Outcome::Duplicate
        );

        assert_eq!(sink.records.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn malformed_map_is_dropped_but_still_cached() {
        let sink = Arc::new(MemorySink::default());
        let pipeline = MapPipeline::new(Duration::minutes(60), sink.clone());
        let body = json!({
            "metadata": {
                "originIp": "10.0.0.5",
                "odeReceivedAt": "2023-08-15T12:00:00Z"
            },
            "payload": {"data": {}}
        })
        .to_string()
        .into_bytes();

        // Hashing happens before the shape check, so the redelivery drops
        // as a duplicate instead of re-reporting the malformed body.
        assert_eq!(pipeline.handle(&body).await, Outcome::Malformed);
        assert_eq!(pipeline.handle(&body).await, Outcome::Duplicate);
        assert!(sink.records.lock().await.is_empty());
    }
}
