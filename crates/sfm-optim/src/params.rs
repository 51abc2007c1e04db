//! Parameter vector conversions for the solver backends.

use anyhow::{ensure, Result};
use nalgebra::{DVector, DVectorView, Quaternion, UnitQuaternion, Vector3};
use sfm_core::{Camera, Pose, Similarity};

/// Convert a [`Pose`] into a 7D SE(3) vector `[qx, qy, qz, qw, tx, ty, tz]`.
pub fn pose_to_se3_dvec(pose: &Pose) -> DVector<f64> {
    let iso = pose.as_iso();
    let q = iso.rotation.into_inner();
    let t = iso.translation.vector;
    nalgebra::dvector![q.coords[0], q.coords[1], q.coords[2], q.coords[3], t.x, t.y, t.z]
}

/// Convert a 7D SE(3) vector `[qx, qy, qz, qw, tx, ty, tz]` into a [`Pose`].
pub fn se3_dvec_to_pose(v: DVectorView<'_, f64>) -> Result<Pose> {
    ensure!(v.len() == 7, "expected se3 vector of length 7, got {}", v.len());
    let quat = Quaternion::new(v[3], v[0], v[1], v[2]);
    let rot = UnitQuaternion::from_quaternion(quat);
    let trans = Vector3::new(v[4], v[5], v[6]);
    Ok(Pose::from_parts(rot, trans))
}

/// Convert a bias [`Similarity`] into `[rx, ry, rz, tx, ty, tz, s]`.
pub fn similarity_to_dvec(bias: &Similarity) -> DVector<f64> {
    nalgebra::dvector![
        bias.rotation.x,
        bias.rotation.y,
        bias.rotation.z,
        bias.translation.x,
        bias.translation.y,
        bias.translation.z,
        bias.scale
    ]
}

/// Convert `[rx, ry, rz, tx, ty, tz, s]` into a bias [`Similarity`].
pub fn dvec_to_similarity(v: DVectorView<'_, f64>) -> Result<Similarity> {
    ensure!(
        v.len() == 7,
        "expected similarity vector of length 7, got {}",
        v.len()
    );
    Ok(Similarity {
        rotation: Vector3::new(v[0], v[1], v[2]),
        translation: Vector3::new(v[3], v[4], v[5]),
        scale: v[6],
    })
}

/// Camera intrinsics as a parameter vector `[focal, k1, k2, cx, cy]`.
pub fn camera_to_dvec(camera: &Camera) -> DVector<f64> {
    DVector::from_row_slice(&camera.to_params())
}
