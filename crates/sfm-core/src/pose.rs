use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};

use crate::math::{Iso3, Mat3, Vec3};

/// Rigid transform mapping world coordinates into a local frame.
///
/// Shot poses are `cam_from_world`, rig instance poses are `rig_from_world`,
/// and rig camera offsets are `cam_from_rig`. A shot's world pose is the
/// composition `cam_from_rig ∘ rig_from_world`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose(Iso3);

impl Pose {
    /// Identity transform.
    pub fn identity() -> Self {
        Self(Iso3::identity())
    }

    /// Build from a world→local isometry.
    pub fn from_world_to_local(iso: Iso3) -> Self {
        Self(iso)
    }

    /// Build from rotation and translation of the world→local map.
    pub fn from_parts(rotation: UnitQuaternion<f64>, translation: Vec3) -> Self {
        Self(Iso3::from_parts(translation.into(), rotation))
    }

    /// The underlying world→local isometry.
    pub fn as_iso(&self) -> &Iso3 {
        &self.0
    }

    /// Map a world-frame point into the local frame.
    pub fn transform(&self, p: &Vec3) -> Vec3 {
        self.0.rotation * p + self.0.translation.vector
    }

    /// Position of the local-frame origin expressed in world coordinates.
    pub fn origin(&self) -> Vec3 {
        self.0.rotation.inverse() * (-self.0.translation.vector)
    }

    /// Rotation mapping local-frame directions into world directions.
    pub fn rotation_to_world(&self) -> Mat3 {
        self.0
            .rotation
            .to_rotation_matrix()
            .into_inner()
            .transpose()
    }

    /// Compose two world→local maps: `(self ∘ rhs)(p) = self(rhs(p))`.
    ///
    /// With `self = cam_from_rig` and `rhs = rig_from_world` this yields the
    /// shot's `cam_from_world`.
    pub fn compose(&self, rhs: &Pose) -> Pose {
        Pose(self.0 * rhs.0)
    }

    /// Returns `true` if every rotation and translation component is finite.
    pub fn is_finite(&self) -> bool {
        let q = self.0.rotation.coords;
        let t = self.0.translation.vector;
        q.iter().chain(t.iter()).all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn origin_inverts_translation() {
        let pose = Pose::from_parts(
            UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
            Vector3::new(1.0, 2.0, -0.5),
        );
        let o = pose.origin();
        let back = pose.transform(&o);
        assert!(back.norm() < 1e-12, "origin should map to zero: {back}");
    }

    #[test]
    fn composition_matches_chained_transform() {
        let cam_from_rig = Pose::from_parts(
            UnitQuaternion::from_euler_angles(0.0, 0.1, 0.0),
            Vector3::new(0.1, 0.0, 0.0),
        );
        let rig_from_world = Pose::from_parts(
            UnitQuaternion::from_euler_angles(0.2, 0.0, -0.1),
            Vector3::new(-1.0, 0.5, 2.0),
        );
        let composed = cam_from_rig.compose(&rig_from_world);
        let p = Vector3::new(0.3, -0.7, 4.0);
        let expected = cam_from_rig.transform(&rig_from_world.transform(&p));
        assert!((composed.transform(&p) - expected).norm() < 1e-12);
    }
}
