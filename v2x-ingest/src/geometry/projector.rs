/// Absolute geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

/// Planar displacement from an anchor point, in centimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarOffset {
    pub x_cm: f64,
    pub y_cm: f64,
}

/// Meters per degree of latitude under the spherical approximation.
const DEGREE_METERS: f64 = 111_111.0;

/// Resolves `offset` against `anchor` with the quick equirectangular
/// approximation: one degree of latitude is ~111,111 m and a degree of
/// longitude shrinks with cos(latitude). Plenty accurate for the
/// few-hundred-meter offsets lane geometry carries.
///
/// Undefined at the poles, where cos(latitude) vanishes; anchors stay
/// strictly inside (-90, 90).
pub fn project(anchor: GeoPoint, offset: PlanarOffset) -> GeoPoint {
    let dy_deg = (offset.y_cm * 0.01) / DEGREE_METERS;
    let dx_deg = (offset.x_cm * 0.01) / (anchor.latitude.to_radians().cos() * DEGREE_METERS);
    GeoPoint {
        longitude: anchor.longitude + dx_deg,
        latitude: anchor.latitude + dy_deg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn zero_offset_returns_anchor() {
        let anchor = GeoPoint {
            longitude: -104.98,
            latitude: 39.74,
        };
        let result = project(anchor, PlanarOffset { x_cm: 0.0, y_cm: 0.0 });
        assert_eq!(result, anchor);
    }

    #[test]
    fn known_offset_resolves_to_expected_point() {
        let anchor = GeoPoint {
            longitude: 5.8,
            latitude: 6.8,
        };
        let result = project(
            anchor,
            PlanarOffset {
                x_cm: 2.3,
                y_cm: 3.4,
            },
        );
        assert!((result.longitude - 5.800000208466664).abs() < TOLERANCE);
        assert!((result.latitude - 6.800000306000306).abs() < TOLERANCE);
    }

    #[test]
    fn longitude_grows_with_easting() {
        let anchor = GeoPoint {
            longitude: 5.8,
            latitude: 6.8,
        };
        let near = project(
            anchor,
            PlanarOffset {
                x_cm: 100.0,
                y_cm: 0.0,
            },
        );
        let far = project(
            anchor,
            PlanarOffset {
                x_cm: 200.0,
                y_cm: 0.0,
            },
        );
        assert!(near.longitude > anchor.longitude);
        assert!(far.longitude > near.longitude);
        assert_eq!(near.latitude, anchor.latitude);
    }

    #[test]
    fn negative_offsets_move_west_and_south() {
        let anchor = GeoPoint {
            longitude: 5.8,
            latitude: 6.8,
        };
        let result = project(
            anchor,
            PlanarOffset {
                x_cm: -250.0,
                y_cm: -250.0,
            },
        );
        assert!(result.longitude < anchor.longitude);
        assert!(result.latitude < anchor.latitude);
    }

    #[test]
    fn easting_stretches_toward_high_latitudes() {
        let offset = PlanarOffset {
            x_cm: 1000.0,
            y_cm: 0.0,
        };
        let equator = project(
            GeoPoint {
                longitude: 0.0,
                latitude: 0.0,
            },
            offset,
        );
        let northern = project(
            GeoPoint {
                longitude: 0.0,
                latitude: 60.0,
            },
            offset,
        );
        // The same easting covers about twice the degrees at 60°N.
        assert!(northern.longitude > 1.9 * equator.longitude);
        assert!(northern.longitude < 2.1 * equator.longitude);
    }
}
