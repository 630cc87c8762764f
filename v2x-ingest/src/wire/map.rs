use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::geometry::{
    DirectionalFlags, GeoPoint, IntersectionGeometry, Lane, LaneNode, PlanarOffset,
};

use super::{parse_received_at, ParseError, WireEnvelope};

#[derive(Debug, Deserialize)]
struct MapData {
    intersections: WireIntersections,
}

#[derive(Debug, Deserialize)]
struct WireIntersections {
    #[serde(rename = "intersectionGeometry")]
    intersection_geometry: Vec<WireIntersectionGeometry>,
}

#[derive(Debug, Deserialize)]
struct WireIntersectionGeometry {
    #[serde(rename = "refPoint")]
    ref_point: WireRefPoint,
    #[serde(rename = "laneSet")]
    lane_set: WireLaneSet,
}

#[derive(Debug, Deserialize)]
struct WireRefPoint {
    latitude: f64,
    longitude: f64,
}

// Lanes stay raw here so one unparsable lane drops alone instead of
// failing the whole intersection.
#[derive(Debug, Deserialize)]
struct WireLaneSet {
    #[serde(rename = "GenericLane", default)]
    generic_lane: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireLane {
    #[serde(rename = "laneID")]
    lane_id: i64,
    #[serde(rename = "laneAttributes", default)]
    lane_attributes: WireLaneAttributes,
    #[serde(rename = "ingressApproach", default)]
    ingress_approach: i64,
    #[serde(rename = "egressApproach", default)]
    egress_approach: i64,
    #[serde(rename = "connectsTo", default)]
    connects_to: WireConnectsTo,
    #[serde(rename = "nodeList", default)]
    node_list: WireNodeList,
}

#[derive(Debug, Default, Deserialize)]
struct WireLaneAttributes {
    #[serde(rename = "directionalUse", default)]
    directional_use: WireDirectionalUse,
}

#[derive(Debug, Default, Deserialize)]
struct WireDirectionalUse {
    #[serde(rename = "ingressPath", default)]
    ingress_path: bool,
    #[serde(rename = "egressPath", default)]
    egress_path: bool,
}

#[derive(Debug, Default, Deserialize)]
struct WireConnectsTo {
    #[serde(rename = "connectsTo", default)]
    connections: Vec<WireConnection>,
}

#[derive(Debug, Deserialize)]
struct WireConnection {
    #[serde(rename = "connectingLane")]
    connecting_lane: WireConnectingLane,
}

#[derive(Debug, Deserialize)]
struct WireConnectingLane {
    lane: i64,
}

#[derive(Debug, Default, Deserialize)]
struct WireNodeList {
    #[serde(default)]
    nodes: WireNodes,
}

#[derive(Debug, Default, Deserialize)]
struct WireNodes {
    #[serde(rename = "NodeXY", default)]
    node_xy: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireNode {
    delta: WireDelta,
}

#[derive(Debug, Deserialize)]
enum WireDelta {
    #[serde(rename = "nodeLatLon")]
    NodeLatLon { lat: f64, lon: f64 },
    #[serde(rename = "nodeXY")]
    NodeXy { x: f64, y: f64 },
}

impl WireDelta {
    fn into_node(self) -> LaneNode {
        match self {
            WireDelta::NodeLatLon { lat, lon } => LaneNode::Absolute {
                latitude_e7: lat,
                longitude_e7: lon,
            },
            WireDelta::NodeXy { x, y } => LaneNode::Offset(PlanarOffset { x_cm: x, y_cm: y }),
        }
    }
}

impl WireLane {
    fn into_lane(self) -> Lane {
        let nodes = self
            .node_list
            .nodes
            .node_xy
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<WireNode>(raw) {
                Ok(node) => Some(node.delta.into_node()),
                Err(error) => {
                    debug!(%error, "skipping unrecognized lane node");
                    None
                }
            })
            .collect();

        Lane {
            id: self.lane_id,
            flags: DirectionalFlags {
                ingress: self.lane_attributes.directional_use.ingress_path,
                egress: self.lane_attributes.directional_use.egress_path,
            },
            ingress_approach: self.ingress_approach,
            egress_approach: self.egress_approach,
            connected_lane_ids: self
                .connects_to
                .connections
                .into_iter()
                .map(|conn| conn.connecting_lane.lane)
                .collect(),
            nodes,
        }
    }
}

impl WireIntersectionGeometry {
    fn into_geometry(self) -> IntersectionGeometry {
        let lanes = self
            .lane_set
            .generic_lane
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<WireLane>(raw) {
                Ok(lane) => Some(lane.into_lane()),
                Err(error) => {
                    warn!(%error, "skipping unparsable lane");
                    None
                }
            })
            .collect();

        IntersectionGeometry {
            reference_point: GeoPoint {
                longitude: self.ref_point.longitude,
                latitude: self.ref_point.latitude,
            },
            lanes,
        }
    }
}

/// A parsed intersection map broadcast.
#[derive(Debug, Clone)]
pub struct MapMessage {
    pub source_id: String,
    pub observed_at: DateTime<Utc>,
    pub geometry: IntersectionGeometry,
}

/// Extracts the first intersection from an already-decoded map message.
/// Takes the decoded value rather than bytes because the caller has parsed
/// it once for content hashing.
pub fn parse_map(message: Value) -> Result<MapMessage, ParseError> {
    let envelope: WireEnvelope<MapData> = serde_json::from_value(message)?;
    let geometry = envelope
        .payload
        .data
        .intersections
        .intersection_geometry
        .into_iter()
        .next()
        .ok_or(ParseError::EmptyIntersections)?;

    Ok(MapMessage {
        observed_at: parse_received_at(&envelope.metadata.ode_received_at)?,
        source_id: envelope.metadata.origin_ip,
        geometry: geometry.into_geometry(),
    })
}
