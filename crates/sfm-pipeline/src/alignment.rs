//! Rigid-alignment strategy detection.
//!
//! Full rigid alignment needs measured/reconstructed correspondences whose
//! reconstructed positions span three dimensions; a near-colinear set makes
//! the alignment ill-conditioned, in which case the orientation prior is the
//! safe fallback.

use nalgebra::SymmetricEigen;
use sfm_core::{GroundControlPoint, Map, Mat3, Real, Vec3};

use crate::config::{AlignMethod, BundleConfig};
use crate::gcp::triangulate_gcp;

/// Absolute eigenvalue floor below which an axis counts as collapsed.
const EPSILON_ABS: Real = 1e-10;
/// Largest-to-middle eigenvalue ratio above which the cloud is a line.
const EPSILON_RATIO: Real = 5e3;

/// Parallel `(measured, reconstructed)` correspondence arrays.
///
/// Triangulated GCPs carrying geodetic coordinates contribute when GCP use
/// is enabled; GPS-carrying shots contribute their measured position against
/// the shot's reconstructed origin when GPS use is enabled.
pub fn alignment_constraints(
    map: &Map,
    config: &BundleConfig,
    gcps: &[GroundControlPoint],
) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut measured = Vec::new();
    let mut reconstructed = Vec::new();

    if config.bundle_use_gcp {
        for point in gcps {
            let Some(topocentric) = map.gcp_topocentric(point) else {
                continue;
            };
            if let Some(coordinates) = triangulate_gcp(map, point) {
                measured.push(topocentric);
                reconstructed.push(coordinates);
            }
        }
    }
    if config.bundle_use_gps {
        for (shot_id, shot) in map.shots() {
            let Some(position) = shot.measurements.gps_position else {
                continue;
            };
            if let Some(pose) = map.shot_pose(shot_id) {
                measured.push(position);
                reconstructed.push(pose.origin());
            }
        }
    }
    (measured, reconstructed)
}

/// Choose an alignment strategy from the available correspondences.
///
/// Fewer than 3 pairs, or a degenerate/colinear reconstructed cloud, falls
/// back to [`AlignMethod::OrientationPrior`]; otherwise full rigid alignment
/// is well conditioned and [`AlignMethod::Naive`] is returned.
pub fn detect_alignment_constraints(
    map: &Map,
    config: &BundleConfig,
    gcps: &[GroundControlPoint],
) -> AlignMethod {
    let (_, reconstructed) = alignment_constraints(map, config, gcps);
    classify_spread(&reconstructed)
}

fn classify_spread(points: &[Vec3]) -> AlignMethod {
    if points.len() < 3 {
        return AlignMethod::OrientationPrior;
    }

    let mean = points.iter().fold(Vec3::zeros(), |acc, p| acc + p) / points.len() as Real;
    let mut scatter = Mat3::zeros();
    for point in points {
        let centered = point - mean;
        scatter += centered * centered.transpose();
    }

    let mut eigenvalues: Vec<Real> = SymmetricEigen::new(scatter)
        .eigenvalues
        .iter()
        .copied()
        .collect();
    eigenvalues.sort_by(Real::total_cmp);

    let ratio = (eigenvalues[2] / eigenvalues[1]).abs();
    let collapsed = eigenvalues.iter().filter(|v| **v < EPSILON_ABS).count();
    if collapsed > 1 || ratio > EPSILON_RATIO {
        AlignMethod::OrientationPrior
    } else {
        AlignMethod::Naive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_points_fall_back_to_orientation_prior() {
        let points = vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
        assert_eq!(classify_spread(&points), AlignMethod::OrientationPrior);
    }

    #[test]
    fn colinear_points_fall_back_to_orientation_prior() {
        let points: Vec<Vec3> = (0..20)
            .map(|i| Vec3::new(i as Real * 0.5, 0.0, 0.0))
            .collect();
        assert_eq!(classify_spread(&points), AlignMethod::OrientationPrior);
    }

    #[test]
    fn nearly_colinear_points_fall_back_by_ratio() {
        // Large spread along x, tiny but nonzero spread elsewhere.
        let points: Vec<Vec3> = (0..20)
            .map(|i| {
                let t = i as Real;
                Vec3::new(t * 100.0, (t * 0.37).sin() * 1e-4, (t * 0.61).cos() * 1e-4)
            })
            .collect();
        assert_eq!(classify_spread(&points), AlignMethod::OrientationPrior);
    }

    #[test]
    fn isotropic_cloud_selects_naive() {
        let mut points = Vec::new();
        for x in -2..=2 {
            for y in -2..=2 {
                for z in -2..=2 {
                    points.push(Vec3::new(x as Real, y as Real, z as Real));
                }
            }
        }
        assert_eq!(classify_spread(&points), AlignMethod::Naive);
    }
}
