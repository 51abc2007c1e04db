use std::collections::{HashMap, HashSet};

use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

use super::{CameraId, LandmarkId, RigCameraId, RigInstanceId, ShotId};
use crate::math::{Real, Vec2, Vec3};
use crate::pose::Pose;

/// A 2D feature observation linking one shot to one landmark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Pixel location in normalized image coordinates.
    pub point: Vec2,
    /// Detection scale, used as the observation's standard deviation.
    pub scale: Real,
    /// Optional metric depth prior along the camera ray.
    pub depth_prior: Option<Real>,
}

impl Observation {
    pub fn new(point: Vec2, scale: Real) -> Self {
        Self {
            point,
            scale,
            depth_prior: None,
        }
    }
}

/// Per-shot sensor measurements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShotMeasurements {
    pub gps_position: Option<Vec3>,
    pub gps_accuracy: Option<Real>,
}

/// One camera exposure.
///
/// A shot never stores its own world pose; it is derived from its rig
/// instance pose and rig camera offset via [`crate::Map::shot_pose`].
#[derive(Debug, Clone)]
pub struct Shot {
    pub id: ShotId,
    pub camera_id: CameraId,
    pub rig_camera_id: RigCameraId,
    pub rig_instance_id: RigInstanceId,
    pub measurements: ShotMeasurements,
    pub(super) landmark_observations: HashMap<LandmarkId, Observation>,
}

impl Shot {
    /// Landmark→observation links of this shot.
    pub fn landmark_observations(&self) -> &HashMap<LandmarkId, Observation> {
        &self.landmark_observations
    }
}

/// Fixed offset pose of one physical camera within a rig.
#[derive(Debug, Clone)]
pub struct RigCamera {
    pub id: RigCameraId,
    /// `cam_from_rig` offset.
    pub pose: Pose,
}

/// A rigid group of shots sharing one world pose at one moment.
#[derive(Debug, Clone)]
pub struct RigInstance {
    pub id: RigInstanceId,
    /// `rig_from_world` pose.
    pub pose: Pose,
    pub(super) shot_rig_cameras: HashMap<ShotId, RigCameraId>,
}

impl RigInstance {
    /// Member shot → rig camera mapping.
    pub fn shot_rig_cameras(&self) -> &HashMap<ShotId, RigCameraId> {
        &self.shot_rig_cameras
    }

    /// Ids of the member shots.
    pub fn shot_ids(&self) -> impl Iterator<Item = &ShotId> {
        self.shot_rig_cameras.keys()
    }
}

/// A triangulated 3D scene point.
#[derive(Debug, Clone)]
pub struct Landmark {
    pub id: LandmarkId,
    pub global_position: Vec3,
    pub(super) observing_shots: HashSet<ShotId>,
    /// Per-shot reprojection residuals attached after a solve.
    pub reprojection_errors: HashMap<ShotId, Vec2>,
}

impl Landmark {
    /// Shots observing this landmark.
    pub fn observing_shots(&self) -> impl Iterator<Item = &ShotId> {
        self.observing_shots.iter()
    }
}

/// Similarity transform compensating a per-camera GPS bias.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Similarity {
    pub scale: Real,
    /// Angle-axis rotation vector.
    pub rotation: Vec3,
    pub translation: Vec3,
}

impl Similarity {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            rotation: Vec3::zeros(),
            translation: Vec3::zeros(),
        }
    }

    /// Apply `p' = s · R(rotation) · p + t`.
    pub fn transform(&self, p: &Vec3) -> Vec3 {
        let rot = UnitQuaternion::from_scaled_axis(self.rotation);
        self.scale * (rot * p) + self.translation
    }

    pub fn is_finite(&self) -> bool {
        self.scale.is_finite()
            && self.rotation.iter().all(|v| v.is_finite())
            && self.translation.iter().all(|v| v.is_finite())
    }
}

impl Default for Similarity {
    fn default() -> Self {
        Self::identity()
    }
}
