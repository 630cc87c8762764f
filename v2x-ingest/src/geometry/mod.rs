mod builder;
mod projector;

pub use builder::{build, DirectionalFlags, IntersectionGeometry, Lane, LaneNode};
pub use projector::{project, GeoPoint, PlanarOffset};
