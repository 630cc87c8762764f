use chrono::{DateTime, Utc};
use geojson::GeoJson;
use serde::{Serialize, Serializer};

/// The messages this service ingests. Closed set; parsing and key
/// construction dispatch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Bsm,
    Psm,
    MapIntersection,
}

impl MessageKind {
    /// Short label used in dedup keys, record properties, and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Bsm => "Bsm",
            MessageKind::Psm => "Psm",
            MessageKind::MapIntersection => "Map",
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A finished geospatial record. The sink publishes `geometry` as the wire
/// payload: a Point Feature for beacons, a per-lane FeatureCollection for
/// intersections. The other fields drive keying and logging.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub source_id: String,
    pub message_kind: MessageKind,
    pub observed_at: DateTime<Utc>,
    pub geometry: GeoJson,
}

/// One count-flush row: accepted messages from one source over one period.
#[derive(Debug, Clone, Serialize)]
pub struct CountReport {
    pub source_id: String,
    pub location: String,
    pub message_kind: MessageKind,
    #[serde(serialize_with = "serialize_second_precision")]
    pub period_start: DateTime<Utc>,
    #[serde(serialize_with = "serialize_second_precision")]
    pub period_end: DateTime<Utc>,
    pub count: u64,
}

/// Output timestamps are second precision, Z suffixed.
pub fn format_second_precision(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn serialize_second_precision<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_second_precision(ts))
}
