use serde::{Deserialize, Serialize};

use super::ShotId;
use crate::math::{Vec2, Vec3};

/// One pixel observation of a ground control point in one shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcpObservation {
    pub shot_id: ShotId,
    /// Pixel location in normalized image coordinates.
    pub projection: Vec2,
}

/// A surveyed ground control point.
///
/// The geodetic coordinate is optional; surveyed points without one can
/// still constrain the reconstruction through their triangulated position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundControlPoint {
    pub id: String,
    pub observations: Vec<GcpObservation>,
    /// Geodetic `[lat, lon, alt]` if surveyed.
    pub lla: Option<Vec3>,
    /// Whether the altitude component of `lla` is trustworthy.
    pub has_altitude: bool,
}

impl GroundControlPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            observations: Vec::new(),
            lla: None,
            has_altitude: false,
        }
    }
}
