//! Ground-control-point triangulation and constraint assembly.

use log::debug;
use sfm_core::{triangulate_bearings_midpoint, GroundControlPoint, Map, Real, Vec3};
use sfm_optim::BundleAdjuster;

use crate::config::BundleConfig;

/// Per-ray angular reprojection threshold, pixel-scale units.
const REPROJECTION_THRESHOLD: Real = 1.0;
/// Minimum divergence between any two rays, degrees.
const MIN_RAY_ANGLE_DEG: Real = 0.1;
/// Ground control points sit at least 1 mm in front of the camera.
const MIN_DEPTH: Real = 1e-3;
/// Pixel-noise scale of surveyed observations.
const GCP_PIXEL_SCALE: Real = 0.001;

/// Robustly triangulate a ground control point from its pixel observations.
///
/// Observations on shots absent from the scene graph are ignored; at least
/// two valid rays with sufficient divergence and positive depth are required.
pub fn triangulate_gcp(map: &Map, point: &GroundControlPoint) -> Option<Vec3> {
    let mut origins = Vec::with_capacity(point.observations.len());
    let mut bearings = Vec::with_capacity(point.observations.len());
    for obs in &point.observations {
        let Some(shot) = map.shot(&obs.shot_id) else {
            continue;
        };
        let Some(pose) = map.shot_pose(&obs.shot_id) else {
            continue;
        };
        let Some(camera) = map.camera(&shot.camera_id) else {
            continue;
        };
        bearings.push(pose.rotation_to_world() * camera.bearing(&obs.projection));
        origins.push(pose.origin());
    }
    if origins.len() < 2 {
        return None;
    }
    let thresholds = vec![REPROJECTION_THRESHOLD; origins.len()];
    triangulate_bearings_midpoint(
        &origins,
        &bearings,
        &thresholds,
        MIN_RAY_ANGLE_DEG.to_radians(),
        MIN_DEPTH,
    )
}

/// Add ground control constraints to the bundle problem.
///
/// Each point prefers its triangulated coordinate and falls back to the
/// topocentric projection of its geodetic coordinate; points with neither
/// are skipped. Constraint weights are balanced against the rest of the
/// problem through a global weight, so GCP influence stays independent of
/// how many surveyed points exist. Returns the number of reprojection terms
/// added.
pub fn add_gcp_to_bundle(
    adjuster: &mut BundleAdjuster,
    map: &Map,
    gcps: &[GroundControlPoint],
    config: &BundleConfig,
) -> usize {
    let dominant_terms = adjuster.num_rig_instances()
        + adjuster.num_projection_terms()
        + adjuster.num_motion_terms();

    let mut total_terms = 0usize;
    for point in gcps {
        if triangulate_gcp(map, point).is_some() || point.lla.is_some() {
            total_terms += 1;
        }
        for obs in &point.observations {
            if map.shot(&obs.shot_id).is_some() {
                total_terms += 1;
            }
        }
    }
    let global_weight =
        config.gcp_global_weight * dominant_terms as Real / total_terms.max(1) as Real;

    let mut added_observations = 0usize;
    for point in gcps {
        let point_id = format!("gcp-{}", point.id);
        let coordinates = match triangulate_gcp(map, point) {
            Some(coordinates) => coordinates,
            None => match map.gcp_topocentric(point) {
                Some(coordinates) => coordinates,
                None => {
                    debug!("ground control point {} has no usable coordinates", point.id);
                    continue;
                }
            },
        };
        adjuster.add_point(&point_id, coordinates, false);

        if let Some(measured) = map.gcp_topocentric(point) {
            let sd = Vec3::new(
                config.gcp_horizontal_sd,
                config.gcp_horizontal_sd,
                config.gcp_vertical_sd,
            ) / global_weight;
            adjuster.add_point_prior(&point_id, measured, sd, point.has_altitude);
        }

        for obs in &point.observations {
            if map.shot(&obs.shot_id).is_some() {
                adjuster.add_point_projection_observation(
                    &obs.shot_id,
                    &point_id,
                    obs.projection,
                    GCP_PIXEL_SCALE / global_weight,
                    None,
                );
                added_observations += 1;
            }
        }
    }
    added_observations
}
