//! The three bundle orchestration entry points.
//!
//! All three share the same shape (add entities under a fixed/free policy,
//! add observations, configure the solver, run, write back) and differ in
//! policy:
//!
//! | mode               | cameras      | rig cameras        | points          | rig instances            |
//! |--------------------|--------------|--------------------|-----------------|--------------------------|
//! | [`bundle`]         | config       | under-observation  | free            | free                     |
//! | [`bundle_local`]   | fixed        | fixed              | interior free   | fixed if boundary member |
//! | [`bundle_shot_poses`] | fixed     | fixed              | fixed           | fixed if contains target |

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use anyhow::{anyhow, Result};
use log::debug;
use sfm_core::{
    Camera, CameraId, GroundControlPoint, LandmarkId, Map, Pose, RigCameraId, RigInstanceId,
    ShotId, Vec3,
};
use sfm_optim::{BundleAdjuster, LinearStrategy};

use crate::alignment::detect_alignment_constraints;
use crate::config::{AlignMethod, BundleConfig, OrientationPrior};
use crate::gcp::add_gcp_to_bundle;
use crate::neighborhood::shot_neighborhood;
use crate::report::{BundleReport, LocalBundleReport, WallTimes};
use crate::session::{add_rig_instances, InstanceFixRule, InstanceSetupOptions};
use crate::writeback::{update_map, update_points, update_rig_instances};

/// Standard deviation of the soft per-shot up-vector constraint.
const UP_VECTOR_SD: f64 = 1e-3;
/// Iteration cap of the windowed and pose-only modes.
const LOCAL_MAX_ITERATIONS: usize = 10;
/// Rigs averaging at most this many shots per rig camera stay fixed.
const MIN_SHOTS_PER_RIG_CAMERA: usize = 10;

/// Globally refine the whole reconstruction.
///
/// Cameras are fixed unless camera-parameter optimization is enabled; all
/// landmarks and rig instances are free; rig cameras stay fixed when their
/// rig is under-observed or aliases a raw camera id (leverarm). Optionally
/// folds in ground control constraints and per-camera GPS-bias terms.
pub fn bundle(
    map: &mut Map,
    camera_priors: &HashMap<CameraId, Camera>,
    rig_camera_priors: &HashMap<RigCameraId, Pose>,
    gcps: &[GroundControlPoint],
    config: &BundleConfig,
) -> Result<BundleReport> {
    let start = Instant::now();
    let mut ba = BundleAdjuster::new();
    ba.set_use_analytic_derivatives(config.bundle_analytic_derivatives);

    let fix_cameras = !config.optimize_camera_parameters;
    for (camera_id, camera) in map.cameras() {
        let prior = camera_prior(camera_priors, camera_id)?;
        ba.add_camera(camera_id, camera, prior, fix_cameras);
    }

    for (landmark_id, landmark) in map.landmarks() {
        ba.add_point(landmark_id, landmark.global_position, false);
    }

    let align_method = match config.align_method {
        AlignMethod::Auto => detect_alignment_constraints(map, config, gcps),
        method => method,
    };
    let up_vector = (align_method == AlignMethod::OrientationPrior)
        .then(|| orientation_up_vector(config.align_orientation_prior));

    // Rig cameras only move once enough shots observe them; rig cameras
    // aliasing a raw camera id (leverarm) always stay fixed for now.
    let shots_per_rig_camera = if map.rig_cameras().is_empty() {
        1
    } else {
        map.num_shots() / map.rig_cameras().len()
    };
    let lock_rig_cameras = shots_per_rig_camera <= MIN_SHOTS_PER_RIG_CAMERA;
    for (rig_camera_id, rig_camera) in map.rig_cameras() {
        let is_leverarm = map.cameras().contains_key(rig_camera_id);
        let prior = rig_camera_prior(rig_camera_priors, rig_camera_id)?;
        ba.add_rig_camera(
            rig_camera_id,
            &rig_camera.pose,
            prior,
            is_leverarm || lock_rig_cameras,
        );
    }

    add_rig_instances(
        &mut ba,
        map,
        map.rig_instances().keys(),
        &InstanceSetupOptions {
            fix_rule: InstanceFixRule::Never,
            use_gps: config.bundle_use_gps,
            strict_gps_accuracy: true,
        },
    )?;

    let mut num_reprojections = 0usize;
    for (shot_id, shot) in map.shots() {
        if let Some(up) = up_vector {
            ba.add_absolute_up_vector(shot_id, up, UP_VECTOR_SD);
        }
        for (landmark_id, obs) in shot.landmark_observations() {
            ba.add_point_projection_observation(
                shot_id,
                landmark_id,
                obs.point,
                obs.scale,
                obs.depth_prior,
            );
            num_reprojections += 1;
        }
    }

    if config.bundle_use_gcp && !gcps.is_empty() {
        add_gcp_to_bundle(&mut ba, map, gcps, config);
    }

    if config.bundle_compensate_gps_bias {
        for (camera_id, bias) in map.biases() {
            ba.set_camera_bias(camera_id, bias);
        }
    }

    configure_solver(
        &mut ba,
        config,
        LinearStrategy::SparseSchur,
        config.bundle_max_iterations,
    );
    let timer_setup = Instant::now();

    ba.run()?;
    let timer_run = Instant::now();

    update_map(&ba, map, !fix_cameras)?;
    let timer_teardown = Instant::now();

    debug!("global bundle: {}", ba.brief_report());
    Ok(BundleReport {
        brief_report: ba.brief_report(),
        wall_times: WallTimes {
            setup: (timer_setup - start).as_secs_f64(),
            run: (timer_run - timer_setup).as_secs_f64(),
            teardown: (timer_teardown - timer_run).as_secs_f64(),
        },
        num_images: map.num_shots(),
        num_points: map.landmarks().len(),
        num_reprojections,
    })
}

/// Refine a neighborhood around one shot, anchored by its boundary.
///
/// Cameras and rig cameras stay fixed; a rig instance is fixed in its
/// entirety when any member shot lies in the boundary. Only landmarks
/// observed from interior shots are free points; boundary shots anchor the
/// geometry without introducing new points. Returns the ids of refined
/// points alongside the report.
pub fn bundle_local(
    map: &mut Map,
    camera_priors: &HashMap<CameraId, Camera>,
    rig_camera_priors: &HashMap<RigCameraId, Pose>,
    gcps: &[GroundControlPoint],
    central_shot_id: &ShotId,
    config: &BundleConfig,
) -> Result<(Vec<LandmarkId>, LocalBundleReport)> {
    let start = Instant::now();
    let (interior, boundary) = shot_neighborhood(
        map,
        central_shot_id,
        config.local_bundle_radius,
        config.local_bundle_min_common_points,
        config.local_bundle_max_shots,
    );

    let mut ba = BundleAdjuster::new();
    ba.set_use_analytic_derivatives(config.bundle_analytic_derivatives);

    for (camera_id, camera) in map.cameras() {
        let prior = camera_prior(camera_priors, camera_id)?;
        ba.add_camera(camera_id, camera, prior, true);
    }

    let mut rig_camera_ids: HashSet<RigCameraId> = HashSet::new();
    let mut instance_ids: HashSet<RigInstanceId> = HashSet::new();
    for shot_id in interior.union(&boundary) {
        if let Some(shot) = map.shot(shot_id) {
            rig_camera_ids.insert(shot.rig_camera_id.clone());
            instance_ids.insert(shot.rig_instance_id.clone());
        }
    }

    for rig_camera_id in &rig_camera_ids {
        let rig_camera = map
            .rig_camera(rig_camera_id)
            .ok_or_else(|| anyhow!("missing rig camera {rig_camera_id}"))?;
        let prior = rig_camera_prior(rig_camera_priors, rig_camera_id)?;
        ba.add_rig_camera(rig_camera_id, &rig_camera.pose, prior, true);
    }

    add_rig_instances(
        &mut ba,
        map,
        &instance_ids,
        &InstanceSetupOptions {
            fix_rule: InstanceFixRule::AnyMemberIn(&boundary),
            use_gps: config.bundle_use_gps,
            strict_gps_accuracy: false,
        },
    )?;

    // Interior shots add their points and every observation; boundary shots
    // only observe points the interior already brought in.
    let mut point_ids: Vec<LandmarkId> = Vec::new();
    let mut added_points: HashSet<LandmarkId> = HashSet::new();
    let mut num_reprojections = 0usize;
    for shot_id in &interior {
        let Some(shot) = map.shot(shot_id) else {
            continue;
        };
        for (landmark_id, obs) in shot.landmark_observations() {
            if added_points.insert(landmark_id.clone()) {
                let landmark = map
                    .landmark(landmark_id)
                    .ok_or_else(|| anyhow!("observation references missing point {landmark_id}"))?;
                ba.add_point(landmark_id, landmark.global_position, false);
                point_ids.push(landmark_id.clone());
            }
            ba.add_point_projection_observation(
                shot_id,
                landmark_id,
                obs.point,
                obs.scale,
                obs.depth_prior,
            );
            num_reprojections += 1;
        }
    }
    for shot_id in &boundary {
        let Some(shot) = map.shot(shot_id) else {
            continue;
        };
        for (landmark_id, obs) in shot.landmark_observations() {
            if added_points.contains(landmark_id) {
                ba.add_point_projection_observation(
                    shot_id,
                    landmark_id,
                    obs.point,
                    obs.scale,
                    obs.depth_prior,
                );
                num_reprojections += 1;
            }
        }
    }

    if config.bundle_use_gcp && !gcps.is_empty() {
        add_gcp_to_bundle(&mut ba, map, gcps, config);
    }

    configure_solver(&mut ba, config, LinearStrategy::DenseSchur, LOCAL_MAX_ITERATIONS);
    let timer_setup = Instant::now();

    ba.run()?;
    let timer_run = Instant::now();

    // Cameras and rig cameras were fixed; only instance poses and point
    // positions are committed.
    let instance_id_list: Vec<RigInstanceId> = instance_ids.into_iter().collect();
    update_rig_instances(&ba, map, &instance_id_list)?;
    update_points(&ba, map, &point_ids)?;
    let timer_teardown = Instant::now();

    debug!("local bundle around {central_shot_id}: {}", ba.brief_report());
    let report = LocalBundleReport {
        brief_report: ba.brief_report(),
        wall_times: WallTimes {
            setup: (timer_setup - start).as_secs_f64(),
            run: (timer_run - timer_setup).as_secs_f64(),
            teardown: (timer_teardown - timer_run).as_secs_f64(),
        },
        num_images: interior.len(),
        num_interior_images: interior.len(),
        num_boundary_images: boundary.len(),
        num_other_images: map
            .num_shots()
            .saturating_sub(interior.len())
            .saturating_sub(boundary.len()),
        num_points: point_ids.len(),
        num_reprojections,
    };
    Ok((point_ids, report))
}

/// Re-localize a set of shots against an otherwise frozen map.
///
/// Cameras, rig cameras and every observed landmark stay fixed; a rig
/// instance is fixed in its entirety when it contains a targeted shot, so
/// targeted shots cannot move through other free members. Only targeted
/// shots contribute observations; writeback touches rig-instance poses
/// only.
pub fn bundle_shot_poses(
    map: &mut Map,
    shot_ids: &HashSet<ShotId>,
    camera_priors: &HashMap<CameraId, Camera>,
    rig_camera_priors: &HashMap<RigCameraId, Pose>,
    config: &BundleConfig,
) -> Result<BundleReport> {
    let start = Instant::now();
    let mut ba = BundleAdjuster::new();
    ba.set_use_analytic_derivatives(config.bundle_analytic_derivatives);

    let mut instance_ids: HashSet<RigInstanceId> = HashSet::new();
    for shot_id in shot_ids {
        if let Some(shot) = map.shot(shot_id) {
            instance_ids.insert(shot.rig_instance_id.clone());
        }
    }

    let mut rig_camera_ids: HashSet<RigCameraId> = HashSet::new();
    let mut camera_ids: HashSet<CameraId> = HashSet::new();
    for instance_id in &instance_ids {
        let Some(instance) = map.rig_instance(instance_id) else {
            continue;
        };
        for (member_id, rig_camera_id) in instance.shot_rig_cameras() {
            rig_camera_ids.insert(rig_camera_id.clone());
            if let Some(member) = map.shot(member_id) {
                camera_ids.insert(member.camera_id.clone());
            }
        }
    }

    for rig_camera_id in &rig_camera_ids {
        let rig_camera = map
            .rig_camera(rig_camera_id)
            .ok_or_else(|| anyhow!("missing rig camera {rig_camera_id}"))?;
        let prior = rig_camera_prior(rig_camera_priors, rig_camera_id)?;
        ba.add_rig_camera(rig_camera_id, &rig_camera.pose, prior, true);
    }
    for camera_id in &camera_ids {
        let camera = map
            .camera(camera_id)
            .ok_or_else(|| anyhow!("missing camera {camera_id}"))?;
        let prior = camera_prior(camera_priors, camera_id)?;
        ba.add_camera(camera_id, camera, prior, true);
    }

    // The observed landmarks act as fixed reference geometry.
    let mut landmark_ids: HashSet<LandmarkId> = HashSet::new();
    for shot_id in shot_ids {
        if let Some(shot) = map.shot(shot_id) {
            landmark_ids.extend(shot.landmark_observations().keys().cloned());
        }
    }
    for landmark_id in &landmark_ids {
        let landmark = map
            .landmark(landmark_id)
            .ok_or_else(|| anyhow!("observation references missing point {landmark_id}"))?;
        ba.add_point(landmark_id, landmark.global_position, true);
    }

    add_rig_instances(
        &mut ba,
        map,
        &instance_ids,
        &InstanceSetupOptions {
            fix_rule: InstanceFixRule::ContainsTarget(shot_ids),
            use_gps: config.bundle_use_gps,
            strict_gps_accuracy: false,
        },
    )?;

    let mut num_reprojections = 0usize;
    for shot_id in shot_ids {
        let Some(shot) = map.shot(shot_id) else {
            continue;
        };
        for (landmark_id, obs) in shot.landmark_observations() {
            ba.add_point_projection_observation(
                shot_id,
                landmark_id,
                obs.point,
                obs.scale,
                obs.depth_prior,
            );
            num_reprojections += 1;
        }
    }

    configure_solver(&mut ba, config, LinearStrategy::DenseQr, LOCAL_MAX_ITERATIONS);
    let timer_setup = Instant::now();

    ba.run()?;
    let timer_run = Instant::now();

    let instance_id_list: Vec<RigInstanceId> = instance_ids.into_iter().collect();
    update_rig_instances(&ba, map, &instance_id_list)?;
    let timer_teardown = Instant::now();

    debug!("pose-only bundle of {} shots: {}", shot_ids.len(), ba.brief_report());
    Ok(BundleReport {
        brief_report: ba.brief_report(),
        wall_times: WallTimes {
            setup: (timer_setup - start).as_secs_f64(),
            run: (timer_run - timer_setup).as_secs_f64(),
            teardown: (timer_teardown - timer_run).as_secs_f64(),
        },
        num_images: shot_ids.len(),
        num_points: landmark_ids.len(),
        num_reprojections,
    })
}

fn camera_prior<'a>(
    priors: &'a HashMap<CameraId, Camera>,
    camera_id: &CameraId,
) -> Result<&'a Camera> {
    priors
        .get(camera_id)
        .ok_or_else(|| anyhow!("missing camera prior for {camera_id}"))
}

fn rig_camera_prior<'a>(
    priors: &'a HashMap<RigCameraId, Pose>,
    rig_camera_id: &RigCameraId,
) -> Result<&'a Pose> {
    priors
        .get(rig_camera_id)
        .ok_or_else(|| anyhow!("missing rig camera prior for {rig_camera_id}"))
}

fn orientation_up_vector(prior: OrientationPrior) -> Vec3 {
    match prior {
        OrientationPrior::Vertical => Vec3::new(0.0, 0.0, -1.0),
        OrientationPrior::Horizontal => Vec3::new(0.0, -1.0, 0.0),
    }
}

fn configure_solver(
    adjuster: &mut BundleAdjuster,
    config: &BundleConfig,
    strategy: LinearStrategy,
    max_iterations: usize,
) {
    adjuster.set_point_projection_loss_function(
        &config.loss_function,
        config.loss_function_threshold,
    );
    adjuster.set_internal_parameters_prior_sd(
        config.focal_prior_sd,
        config.principal_point_sd,
        config.radial_distortion_k1_sd,
        config.radial_distortion_k2_sd,
    );
    adjuster.set_rig_parameters_prior_sd(config.rig_translation_sd, config.rig_rotation_sd);
    adjuster.set_num_threads(config.processes);
    adjuster.set_max_num_iterations(max_iterations);
    adjuster.set_linear_solver_type(strategy);
}
