//! Validated writeback of solved parameters into the scene graph.
//!
//! There is no rollback: values committed before a failure stay applied, so
//! a failed writeback leaves the scene graph partially updated and the
//! caller decides whether that is acceptable.

use thiserror::Error;

use sfm_core::{LandmarkId, Map, RigInstanceId};
use sfm_optim::BundleAdjuster;

/// Writeback failure tagged by the offending entity.
#[derive(Debug, Error)]
pub enum WritebackError {
    #[error("camera {0} has NaN or infinite values")]
    Camera(String),
    #[error("bias {0} has NaN or infinite values")]
    Bias(String),
    #[error("rig instance {0} has NaN or infinite values")]
    RigInstance(String),
    #[error("rig camera {0} has NaN or infinite values")]
    RigCamera(String),
    #[error("point {0} has NaN or infinite values")]
    Point(String),
    /// An entity expected in the solved problem was missing from it.
    #[error("no solved value for {0}")]
    Missing(String),
}

/// Commit every solved entity back into the scene graph.
///
/// Cameras are only written when they were free in the problem.
pub fn update_map(
    adjuster: &BundleAdjuster,
    map: &mut Map,
    update_cameras: bool,
) -> Result<(), WritebackError> {
    if update_cameras {
        let camera_ids: Vec<_> = map.cameras().keys().cloned().collect();
        for camera_id in camera_ids {
            let camera = adjuster
                .get_camera(&camera_id)
                .map_err(|_| WritebackError::Missing(format!("camera {camera_id}")))?;
            let params = camera.to_params();
            if !params.iter().all(|v| v.is_finite()) {
                return Err(WritebackError::Camera(camera_id));
            }
            let _ = map.set_camera_params(&camera_id, &params);
        }
    }

    let camera_ids: Vec<_> = map.biases().keys().cloned().collect();
    for camera_id in camera_ids {
        let bias = adjuster
            .get_bias(&camera_id)
            .map_err(|_| WritebackError::Missing(format!("bias {camera_id}")))?;
        if !bias.is_finite() {
            return Err(WritebackError::Bias(camera_id));
        }
        let _ = map.set_bias(&camera_id, bias);
    }

    let instance_ids: Vec<_> = map.rig_instances().keys().cloned().collect();
    update_rig_instances(adjuster, map, &instance_ids)?;

    let rig_camera_ids: Vec<_> = map.rig_cameras().keys().cloned().collect();
    for rig_camera_id in rig_camera_ids {
        let pose = adjuster
            .get_rig_camera(&rig_camera_id)
            .map_err(|_| WritebackError::Missing(format!("rig camera {rig_camera_id}")))?;
        if !pose.is_finite() {
            return Err(WritebackError::RigCamera(rig_camera_id));
        }
        let _ = map.set_rig_camera_pose(&rig_camera_id, pose);
    }

    let landmark_ids: Vec<_> = map.landmarks().keys().cloned().collect();
    update_points(adjuster, map, &landmark_ids)?;

    Ok(())
}

/// Commit solved rig-instance poses for the given ids.
pub fn update_rig_instances(
    adjuster: &BundleAdjuster,
    map: &mut Map,
    instance_ids: &[RigInstanceId],
) -> Result<(), WritebackError> {
    for instance_id in instance_ids {
        let pose = adjuster
            .get_rig_instance(instance_id)
            .map_err(|_| WritebackError::Missing(format!("rig instance {instance_id}")))?;
        if !pose.is_finite() {
            return Err(WritebackError::RigInstance(instance_id.clone()));
        }
        let _ = map.set_rig_instance_pose(instance_id, pose);
    }
    Ok(())
}

/// Commit solved point positions and their reprojection diagnostics.
pub fn update_points(
    adjuster: &BundleAdjuster,
    map: &mut Map,
    landmark_ids: &[LandmarkId],
) -> Result<(), WritebackError> {
    for landmark_id in landmark_ids {
        let point = adjuster
            .get_point(landmark_id)
            .map_err(|_| WritebackError::Missing(format!("point {landmark_id}")))?;
        if !point.position.iter().all(|v| v.is_finite()) {
            return Err(WritebackError::Point(landmark_id.clone()));
        }
        let _ = map.set_landmark_position(landmark_id, point.position);
        let _ = map.set_landmark_reprojection_errors(landmark_id, point.reprojection_errors);
    }
    Ok(())
}
