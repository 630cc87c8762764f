//! Typed views of the JSON message envelopes the ODE publishes.
//!
//! Every kind shares the outer `metadata`/`payload` shape; the `payload.data`
//! body is kind-specific and parsed through a closed dispatch on
//! [`MessageKind`] rather than by probing nested maps.

mod map;

pub use map::{parse_map, MapMessage};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::geometry::GeoPoint;
use crate::record::MessageKind;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid message body: {0}")]
    Body(#[from] serde_json::Error),
    #[error("invalid receipt timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("no beacon shape defined for {0:?} messages")]
    UnsupportedKind(MessageKind),
    #[error("map payload carries no intersection geometry")]
    EmptyIntersections,
}

#[derive(Debug, Deserialize)]
struct WireEnvelope<D> {
    metadata: WireMetadata,
    payload: WirePayload<D>,
}

#[derive(Debug, Deserialize)]
struct WireMetadata {
    #[serde(rename = "originIp")]
    origin_ip: String,
    #[serde(rename = "odeReceivedAt")]
    ode_received_at: String,
}

#[derive(Debug, Deserialize)]
struct WirePayload<D> {
    data: D,
}

#[derive(Debug, Deserialize)]
struct WirePosition {
    longitude: f64,
    latitude: f64,
}

#[derive(Debug, Deserialize)]
struct BsmData {
    #[serde(rename = "coreData")]
    core_data: BsmCoreData,
}

#[derive(Debug, Deserialize)]
struct BsmCoreData {
    position: WirePosition,
}

#[derive(Debug, Deserialize)]
struct PsmData {
    position: WirePosition,
}

/// A parsed point beacon, either vehicle or pedestrian.
#[derive(Debug, Clone)]
pub struct BeaconMessage {
    pub source_id: String,
    pub kind: MessageKind,
    pub observed_at: DateTime<Utc>,
    pub position: GeoPoint,
}

pub fn parse_beacon(raw: &[u8], kind: MessageKind) -> Result<BeaconMessage, ParseError> {
    let (metadata, position) = match kind {
        MessageKind::Bsm => {
            let envelope: WireEnvelope<BsmData> = serde_json::from_slice(raw)?;
            (envelope.metadata, envelope.payload.data.core_data.position)
        }
        MessageKind::Psm => {
            let envelope: WireEnvelope<PsmData> = serde_json::from_slice(raw)?;
            (envelope.metadata, envelope.payload.data.position)
        }
        MessageKind::MapIntersection => return Err(ParseError::UnsupportedKind(kind)),
    };

    Ok(BeaconMessage {
        observed_at: parse_received_at(&metadata.ode_received_at)?,
        source_id: metadata.origin_ip,
        kind,
        position: GeoPoint {
            longitude: position.longitude,
            latitude: position.latitude,
        },
    })
}

// The ODE stamps receipts with more fractional digits than most parsers
// accept; RFC 3339 parsing takes the fraction at any width.
fn parse_received_at(value: &str) -> Result<DateTime<Utc>, ParseError> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}
