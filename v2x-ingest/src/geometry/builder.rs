use geojson::{Feature, FeatureCollection, Geometry, Value as GeoValue};
use serde_json::{json, Map};

use crate::geometry::projector::{project, GeoPoint, PlanarOffset};

/// One node in a lane path. Absolute nodes carry the wire's 1e7-scaled
/// coordinates; offset nodes are centimeter displacements from the running
/// anchor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneNode {
    Absolute { latitude_e7: f64, longitude_e7: f64 },
    Offset(PlanarOffset),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionalFlags {
    pub ingress: bool,
    pub egress: bool,
}

#[derive(Debug, Clone)]
pub struct Lane {
    pub id: i64,
    pub flags: DirectionalFlags,
    pub ingress_approach: i64,
    pub egress_approach: i64,
    pub connected_lane_ids: Vec<i64>,
    pub nodes: Vec<LaneNode>,
}

/// One intersection's lane set. Every lane's node chain restarts at the
/// shared reference point rather than continuing from the previous lane.
#[derive(Debug, Clone)]
pub struct IntersectionGeometry {
    pub reference_point: GeoPoint,
    pub lanes: Vec<Lane>,
}

/// Converts an intersection into a GeoJSON FeatureCollection with one
/// LineString Feature per lane, in lane order. A lane without resolvable
/// nodes still gets its Feature, with an empty coordinate list.
pub fn build(source_id: &str, geometry: &IntersectionGeometry) -> FeatureCollection {
    let features = geometry
        .lanes
        .iter()
        .map(|lane| lane_feature(source_id, geometry.reference_point, lane))
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn lane_feature(source_id: &str, reference_point: GeoPoint, lane: &Lane) -> Feature {
    let mut anchor = reference_point;
    let mut coordinates = Vec::with_capacity(lane.nodes.len());
    for node in &lane.nodes {
        match *node {
            LaneNode::Absolute {
                latitude_e7,
                longitude_e7,
            } => {
                // An absolute node emits its descaled coordinate but anchors
                // the rest of the chain at the raw scaled values.
                coordinates.push(vec![longitude_e7 / 1.0e7, latitude_e7 / 1.0e7]);
                anchor = GeoPoint {
                    longitude: longitude_e7,
                    latitude: latitude_e7,
                };
            }
            LaneNode::Offset(offset) => {
                let point = project(anchor, offset);
                coordinates.push(vec![point.longitude, point.latitude]);
                anchor = point;
            }
        }
    }

    let mut properties = Map::new();
    properties.insert("laneID".to_string(), json!(lane.id));
    properties.insert("ingressPath".to_string(), json!(flag_str(lane.flags.ingress)));
    properties.insert("egressPath".to_string(), json!(flag_str(lane.flags.egress)));
    properties.insert("egressApproach".to_string(), json!(lane.egress_approach));
    properties.insert("ingressApproach".to_string(), json!(lane.ingress_approach));
    properties.insert("ip".to_string(), json!(source_id));
    properties.insert("connectedLanes".to_string(), json!(lane.connected_lane_ids));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::LineString(coordinates))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Directional flags ride as literal strings, which is what downstream map
/// consumers already expect.
fn flag_str(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_eq;

    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn reference_point() -> GeoPoint {
        GeoPoint {
            longitude: 5.8,
            latitude: 6.8,
        }
    }

    fn line_coordinates(feature: &Feature) -> Vec<Vec<f64>> {
        match feature.geometry.as_ref().map(|g| &g.value) {
            Some(GeoValue::LineString(coordinates)) => coordinates.clone(),
            other => panic!("expected a LineString, got {other:?}"),
        }
    }

    #[test]
    fn single_lane_intersection_builds_expected_feature() {
        let geometry = IntersectionGeometry {
            reference_point: reference_point(),
            lanes: vec![Lane {
                id: 1,
                flags: DirectionalFlags {
                    ingress: true,
                    egress: false,
                },
                ingress_approach: 1,
                egress_approach: 2,
                connected_lane_ids: vec![2],
                nodes: vec![
                    LaneNode::Absolute {
                        latitude_e7: 6.8,
                        longitude_e7: 5.8,
                    },
                    LaneNode::Offset(PlanarOffset {
                        x_cm: 2.3,
                        y_cm: 3.4,
                    }),
                ],
            }],
        };

        let collection = build("10.0.0.5", &geometry);
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        let coordinates = line_coordinates(feature);
        let expected = [
            [5.8e-7, 6.8e-7],
            [5.800000208466664, 6.800000306000306],
        ];
        assert_eq!(coordinates.len(), expected.len());
        for (actual, expected) in coordinates.iter().zip(expected.iter()) {
            assert!((actual[0] - expected[0]).abs() < TOLERANCE);
            assert!((actual[1] - expected[1]).abs() < TOLERANCE);
        }

        assert_json_eq!(
            serde_json::Value::Object(feature.properties.clone().unwrap()),
            serde_json::json!({
                "laneID": 1,
                "ingressPath": "true",
                "egressPath": "false",
                "egressApproach": 2,
                "ingressApproach": 1,
                "ip": "10.0.0.5",
                "connectedLanes": [2],
            })
        );
    }

    #[test]
    fn lanes_keep_input_order_and_count() {
        let lane = |id: i64, nodes: Vec<LaneNode>| Lane {
            id,
            flags: DirectionalFlags::default(),
            ingress_approach: 0,
            egress_approach: 0,
            connected_lane_ids: vec![],
            nodes,
        };
        let geometry = IntersectionGeometry {
            reference_point: reference_point(),
            lanes: vec![
                lane(
                    3,
                    vec![LaneNode::Offset(PlanarOffset {
                        x_cm: 10.0,
                        y_cm: 0.0,
                    })],
                ),
                lane(7, vec![]),
                lane(
                    5,
                    vec![LaneNode::Offset(PlanarOffset {
                        x_cm: 0.0,
                        y_cm: 10.0,
                    })],
                ),
            ],
        };

        let collection = build("10.0.0.5", &geometry);
        assert_eq!(collection.features.len(), 3);

        let ids: Vec<_> = collection
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["laneID"].clone())
            .collect();
        assert_eq!(ids, vec![json!(3), json!(7), json!(5)]);

        // The zero-node lane still yields a Feature, with no coordinates.
        assert!(line_coordinates(&collection.features[1]).is_empty());
    }

    #[test]
    fn each_lane_restarts_from_the_reference_point() {
        let offset_lane = |id: i64| Lane {
            id,
            flags: DirectionalFlags::default(),
            ingress_approach: 0,
            egress_approach: 0,
            connected_lane_ids: vec![],
            nodes: vec![LaneNode::Offset(PlanarOffset {
                x_cm: 100.0,
                y_cm: 100.0,
            })],
        };
        let geometry = IntersectionGeometry {
            reference_point: reference_point(),
            lanes: vec![offset_lane(1), offset_lane(2)],
        };

        let collection = build("10.0.0.5", &geometry);
        let first = line_coordinates(&collection.features[0]);
        let second = line_coordinates(&collection.features[1]);
        // Identical offsets resolve identically because neither lane chains
        // off the other.
        assert_eq!(first, second);
    }

    #[test]
    fn offsets_chain_within_a_lane() {
        let step = LaneNode::Offset(PlanarOffset {
            x_cm: 0.0,
            y_cm: 111_111.0,
        });
        let geometry = IntersectionGeometry {
            reference_point: reference_point(),
            lanes: vec![Lane {
                id: 1,
                flags: DirectionalFlags::default(),
                ingress_approach: 0,
                egress_approach: 0,
                connected_lane_ids: vec![],
                nodes: vec![step, step],
            }],
        };

        let collection = build("10.0.0.5", &geometry);
        let coordinates = line_coordinates(&collection.features[0]);
        // 111,111 cm of northing is exactly 0.01 degrees; the second node
        // walks on from the first.
        assert!((coordinates[0][1] - 6.81).abs() < TOLERANCE);
        assert!((coordinates[1][1] - 6.82).abs() < TOLERANCE);
    }
}
