//! Backend-independent residual evaluators.
//!
//! Every evaluator is generic over [`RealField`] so backends can run them on
//! dual numbers for automatic differentiation. Pose parameters are 7D SE(3)
//! vectors `[qx, qy, qz, qw, tx, ty, tz]` of world→local maps.

use nalgebra::{DVector, DVectorView, Quaternion, RealField, SVector, UnitQuaternion, Vector2, Vector3};

use crate::ir::FactorKind;

fn constant<T: RealField>(v: f64) -> T {
    T::from_f64(v).unwrap()
}

fn vec3_constant<T: RealField>(v: [f64; 3]) -> Vector3<T> {
    Vector3::new(constant(v[0]), constant(v[1]), constant(v[2]))
}

/// Rotation and translation of a 7D SE(3) parameter vector.
pub fn se3_rotation_translation<T: RealField>(
    pose: DVectorView<'_, T>,
) -> (UnitQuaternion<T>, Vector3<T>) {
    let quat = Quaternion::new(
        pose[3].clone(),
        pose[0].clone(),
        pose[1].clone(),
        pose[2].clone(),
    );
    let rot = UnitQuaternion::from_quaternion(quat);
    let t = Vector3::new(pose[4].clone(), pose[5].clone(), pose[6].clone());
    (rot, t)
}

/// World point mapped through the rig chain into the camera frame.
fn point_in_camera<T: RealField>(
    rig_camera: DVectorView<'_, T>,
    rig_instance: DVectorView<'_, T>,
    point: DVectorView<'_, T>,
) -> Vector3<T> {
    let (r_ri, t_ri) = se3_rotation_translation(rig_instance);
    let (r_rc, t_rc) = se3_rotation_translation(rig_camera);
    let p = Vector3::new(point[0].clone(), point[1].clone(), point[2].clone());
    let p_rig = r_ri.transform_vector(&p) + t_ri;
    r_rc.transform_vector(&p_rig) + t_rc
}

/// World origin of a rig instance pose (`rig_from_world`).
fn instance_origin<T: RealField>(rig_instance: DVectorView<'_, T>) -> Vector3<T> {
    let (rot, t) = se3_rotation_translation(rig_instance);
    rot.inverse_transform_vector(&(-t))
}

/// Perspective projection with two-coefficient radial distortion.
fn project<T: RealField>(camera: DVectorView<'_, T>, p_cam: &Vector3<T>) -> Vector2<T> {
    let focal = camera[0].clone();
    let k1 = camera[1].clone();
    let k2 = camera[2].clone();
    let cx = camera[3].clone();
    let cy = camera[4].clone();

    let x = p_cam.x.clone() / p_cam.z.clone();
    let y = p_cam.y.clone() / p_cam.z.clone();
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let d = T::one() + r2.clone() * (k1 + r2 * k2);
    Vector2::new(
        focal.clone() * d.clone() * x + cx,
        focal * d * y + cy,
    )
}

/// Rodrigues rotation of `p` by the angle-axis vector `r`.
///
/// Uses the series expansion near zero so the map stays differentiable.
fn rotate_angle_axis<T: RealField>(r: &Vector3<T>, p: &Vector3<T>) -> Vector3<T> {
    let theta2 = r.norm_squared();
    let eps = constant(1e-12);
    let (a, b) = if theta2.clone() < eps {
        (
            T::one() - theta2.clone() / constant(6.0),
            constant::<T>(0.5) - theta2 / constant(24.0),
        )
    } else {
        let theta = theta2.clone().sqrt();
        (
            theta.clone().sin() / theta.clone(),
            (T::one() - theta.cos()) / theta2,
        )
    };
    let cross = r.cross(p);
    let cross2 = r.cross(&cross);
    p + cross * a + cross2 * b
}

/// Reprojection residual through the rig chain, in pixel-scale units.
pub fn rig_reprojection_residual<T: RealField>(
    camera: DVectorView<'_, T>,
    rig_camera: DVectorView<'_, T>,
    rig_instance: DVectorView<'_, T>,
    point: DVectorView<'_, T>,
    uv: [f64; 2],
    scale: f64,
) -> SVector<T, 2> {
    let p_cam = point_in_camera(rig_camera, rig_instance, point);
    let proj = project(camera, &p_cam);
    let inv_scale = constant::<T>(1.0 / scale);
    SVector::<T, 2>::new(
        (proj.x - constant(uv[0])) * inv_scale.clone(),
        (proj.y - constant(uv[1])) * inv_scale,
    )
}

/// Camera-frame depth residual for an observation with a depth prior.
pub fn point_depth_residual<T: RealField>(
    rig_camera: DVectorView<'_, T>,
    rig_instance: DVectorView<'_, T>,
    point: DVectorView<'_, T>,
    depth: f64,
    scale: f64,
) -> SVector<T, 1> {
    let p_cam = point_in_camera(rig_camera, rig_instance, point);
    SVector::<T, 1>::new((p_cam.z - constant(depth)) * constant(1.0 / scale))
}

/// Absolute position prior on a point.
pub fn point_position_residual<T: RealField>(
    point: DVectorView<'_, T>,
    position: [f64; 3],
    sd: [f64; 3],
    has_altitude: bool,
) -> SVector<T, 3> {
    let rx = (point[0].clone() - constant(position[0])) / constant(sd[0]);
    let ry = (point[1].clone() - constant(position[1])) / constant(sd[1]);
    let rz = if has_altitude {
        (point[2].clone() - constant(position[2])) / constant(sd[2])
    } else {
        T::zero()
    };
    SVector::<T, 3>::new(rx, ry, rz)
}

/// Absolute position prior on a rig instance origin.
pub fn instance_position_residual<T: RealField>(
    rig_instance: DVectorView<'_, T>,
    position: [f64; 3],
    sd: [f64; 3],
) -> SVector<T, 3> {
    let origin = instance_origin(rig_instance);
    let measured = vec3_constant(position);
    SVector::<T, 3>::new(
        (origin.x.clone() - measured.x.clone()) / constant(sd[0]),
        (origin.y.clone() - measured.y.clone()) / constant(sd[1]),
        (origin.z.clone() - measured.z.clone()) / constant(sd[2]),
    )
}

/// Position prior on a rig instance origin through a bias similarity.
///
/// Bias parameters are `[rx, ry, rz, tx, ty, tz, s]` with angle-axis
/// rotation; the prior compares `s · R · origin + t` against the measured
/// position.
pub fn biased_instance_position_residual<T: RealField>(
    rig_instance: DVectorView<'_, T>,
    bias: DVectorView<'_, T>,
    position: [f64; 3],
    sd: [f64; 3],
) -> SVector<T, 3> {
    let origin = instance_origin(rig_instance);
    let r = Vector3::new(bias[0].clone(), bias[1].clone(), bias[2].clone());
    let t = Vector3::new(bias[3].clone(), bias[4].clone(), bias[5].clone());
    let s = bias[6].clone();
    let mapped = rotate_angle_axis(&r, &origin) * s + t;
    let measured = vec3_constant(position);
    SVector::<T, 3>::new(
        (mapped.x.clone() - measured.x.clone()) / constant(sd[0]),
        (mapped.y.clone() - measured.y.clone()) / constant(sd[1]),
        (mapped.z.clone() - measured.z.clone()) / constant(sd[2]),
    )
}

/// Soft alignment of the shot's camera-frame up direction.
///
/// The world up vector rotated into the camera frame is compared against
/// `(0, -1, 0)`, the up direction of a level camera (image y points down).
pub fn up_vector_residual<T: RealField>(
    rig_camera: DVectorView<'_, T>,
    rig_instance: DVectorView<'_, T>,
    up: [f64; 3],
    sd: f64,
) -> SVector<T, 3> {
    let (r_ri, _) = se3_rotation_translation(rig_instance);
    let (r_rc, _) = se3_rotation_translation(rig_camera);
    let acting = (r_rc * r_ri).transform_vector(&vec3_constant(up));
    let inv_sd = constant::<T>(1.0 / sd);
    SVector::<T, 3>::new(
        acting.x.clone() * inv_sd.clone(),
        (acting.y.clone() + T::one()) * inv_sd.clone(),
        acting.z.clone() * inv_sd,
    )
}

/// Regularization of camera intrinsics toward their prior values.
pub fn camera_prior_residual<T: RealField>(
    camera: DVectorView<'_, T>,
    prior: [f64; 5],
    sd: [f64; 5],
) -> SVector<T, 5> {
    SVector::<T, 5>::from_fn(|i, _| (camera[i].clone() - constant(prior[i])) / constant(sd[i]))
}

/// Regularization of a rig camera offset toward its prior pose.
pub fn rig_camera_prior_residual<T: RealField>(
    rig_camera: DVectorView<'_, T>,
    prior: [f64; 7],
    rotation_sd: f64,
    translation_sd: f64,
) -> SVector<T, 6> {
    let (rot, t) = se3_rotation_translation(rig_camera);
    let prior_quat = Quaternion::new(
        constant(prior[3]),
        constant(prior[0]),
        constant(prior[1]),
        constant(prior[2]),
    );
    let prior_rot = UnitQuaternion::from_quaternion(prior_quat);

    let err = (prior_rot.inverse() * rot).into_inner();
    let (w, v) = (err.scalar(), err.vector().clone_owned());
    let (w, v) = if w < T::zero() { (-w, -v) } else { (w, v) };
    let two = constant::<T>(2.0);
    let vn2 = v.norm_squared();
    let rot_vec = if vn2.clone() < constant(1e-16) {
        v * two
    } else {
        let vn = vn2.sqrt();
        v * (two * vn.clone().atan2(w) / vn)
    };

    let inv_rot = constant::<T>(1.0 / rotation_sd);
    let inv_trans = constant::<T>(1.0 / translation_sd);
    SVector::<T, 6>::new(
        rot_vec.x.clone() * inv_rot.clone(),
        rot_vec.y.clone() * inv_rot.clone(),
        rot_vec.z.clone() * inv_rot,
        (t.x.clone() - constant(prior[4])) * inv_trans.clone(),
        (t.y.clone() - constant(prior[5])) * inv_trans.clone(),
        (t.z.clone() - constant(prior[6])) * inv_trans,
    )
}

/// Evaluate a factor kind on its parameter blocks.
pub fn evaluate<T: RealField>(factor: &FactorKind, params: &[DVector<T>]) -> DVector<T> {
    match factor {
        FactorKind::RigReprojection { uv, scale } => {
            let r = rig_reprojection_residual(
                params[0].as_view(),
                params[1].as_view(),
                params[2].as_view(),
                params[3].as_view(),
                *uv,
                *scale,
            );
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::PointDepthPrior { depth, scale } => {
            let r = point_depth_residual(
                params[0].as_view(),
                params[1].as_view(),
                params[2].as_view(),
                *depth,
                *scale,
            );
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::PointPositionPrior {
            position,
            sd,
            has_altitude,
        } => {
            let r = point_position_residual(params[0].as_view(), *position, *sd, *has_altitude);
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::InstancePositionPrior { position, sd } => {
            let r = instance_position_residual(params[0].as_view(), *position, *sd);
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::BiasedInstancePositionPrior { position, sd } => {
            let r = biased_instance_position_residual(
                params[0].as_view(),
                params[1].as_view(),
                *position,
                *sd,
            );
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::AbsoluteUpVector { up, sd } => {
            let r = up_vector_residual(params[0].as_view(), params[1].as_view(), *up, *sd);
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::CameraPrior { prior, sd } => {
            let r = camera_prior_residual(params[0].as_view(), *prior, *sd);
            DVector::from_row_slice(r.as_slice())
        }
        FactorKind::RigCameraPrior {
            prior,
            rotation_sd,
            translation_sd,
        } => {
            let r = rig_camera_prior_residual(
                params[0].as_view(),
                *prior,
                *rotation_sd,
                *translation_sd,
            );
            DVector::from_row_slice(r.as_slice())
        }
    }
}
