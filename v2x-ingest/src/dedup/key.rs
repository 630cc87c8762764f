use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::geometry::GeoPoint;
use crate::record::MessageKind;

/// Reports further apart than this many seconds land in different buckets.
const TIME_RESOLUTION_SECONDS: i64 = 25;
/// Positions further apart than this many degrees (~11 m) land in different
/// buckets.
const COORD_RESOLUTION_DEGREES: f64 = 0.0001;

/// Hashes the message body with its ingestion-time fields removed, so a
/// redelivery that only differs in receipt stamp or serial id collapses to
/// the same key.
pub fn content_hash(message: &Value) -> String {
    let mut canonical = message.clone();
    if let Some(metadata) = canonical.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        metadata.remove("odeReceivedAt");
        metadata.remove("serialId");
    }
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string());
    format!("{:x}", hasher.finalize())
}

/// Approximate identity for point beacons: same source, same ~25-second
/// window, same ~11-meter cell.
pub fn spatiotemporal_key(
    kind: MessageKind,
    source_id: &str,
    observed_at: DateTime<Utc>,
    position: GeoPoint,
) -> String {
    let time_bucket = observed_at.timestamp().div_euclid(TIME_RESOLUTION_SECONDS);
    let x_bucket = (position.longitude / COORD_RESOLUTION_DEGREES).floor() as i64;
    let y_bucket = (position.latitude / COORD_RESOLUTION_DEGREES).floor() as i64;
    format!(
        "{}{}_{}_{}_{}",
        kind.as_str(),
        source_id,
        time_bucket,
        x_bucket,
        y_bucket
    )
}
