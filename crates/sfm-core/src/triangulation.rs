//! Robust midpoint triangulation of bearing rays.
//!
//! Solves for the 3D point minimizing the summed squared distances to a set
//! of rays, then validates ray divergence, per-ray angular reprojection
//! error, and positive depth.

use crate::math::{Mat3, Real, Vec3};

/// Triangulate a point from `(origin, bearing)` ray pairs.
///
/// Fails (`None`) when fewer than two rays are given, when no ray pair
/// diverges by at least `min_ray_angle` radians, when the midpoint system is
/// singular, or when any ray sees the solution at an angular error above its
/// threshold or at a depth below `min_depth`.
pub fn triangulate_bearings_midpoint(
    origins: &[Vec3],
    bearings: &[Vec3],
    thresholds: &[Real],
    min_ray_angle: Real,
    min_depth: Real,
) -> Option<Vec3> {
    let n = origins.len();
    if n < 2 || bearings.len() != n || thresholds.len() != n {
        return None;
    }

    let mut max_angle: Real = 0.0;
    for i in 0..n {
        for j in (i + 1)..n {
            max_angle = max_angle.max(angle_between(&bearings[i], &bearings[j]));
        }
    }
    if max_angle < min_ray_angle {
        return None;
    }

    // Least-squares midpoint: sum_i (I - b bᵀ) x = sum_i (I - b bᵀ) o_i.
    let mut lhs = Mat3::zeros();
    let mut rhs = Vec3::zeros();
    for (o, b) in origins.iter().zip(bearings) {
        let d = b.normalize();
        let proj = Mat3::identity() - d * d.transpose();
        lhs += proj;
        rhs += proj * o;
    }
    let point = lhs.lu().solve(&rhs)?;

    for ((o, b), threshold) in origins.iter().zip(bearings).zip(thresholds) {
        let to_point = point - o;
        if to_point.dot(b) < min_depth {
            return None;
        }
        if angle_between(&to_point, b) > *threshold {
            return None;
        }
    }
    Some(point)
}

fn angle_between(a: &Vec3, b: &Vec3) -> Real {
    let denom = a.norm() * b.norm();
    if denom <= 0.0 {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_converging_rays_meet_at_point() {
        let target = Vec3::new(0.5, 0.2, 4.0);
        let o1 = Vec3::zeros();
        let o2 = Vec3::new(1.0, 0.0, 0.0);
        let b1 = (target - o1).normalize();
        let b2 = (target - o2).normalize();

        let p = triangulate_bearings_midpoint(
            &[o1, o2],
            &[b1, b2],
            &[1.0, 1.0],
            0.1_f64.to_radians(),
            1e-3,
        )
        .unwrap();
        assert!((p - target).norm() < 1e-9);
    }

    #[test]
    fn parallel_rays_fail() {
        let b = Vec3::new(0.0, 0.0, 1.0);
        let res = triangulate_bearings_midpoint(
            &[Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0)],
            &[b, b],
            &[1.0, 1.0],
            0.1_f64.to_radians(),
            1e-3,
        );
        assert!(res.is_none());
    }

    #[test]
    fn point_behind_a_ray_fails() {
        // Rays diverge but the least-squares point lies behind the second origin.
        let o1 = Vec3::zeros();
        let o2 = Vec3::new(0.0, 0.0, 5.0);
        let b1 = Vec3::new(0.0, 0.0, 1.0);
        let b2 = Vec3::new(0.1, 0.0, 1.0).normalize();
        let res = triangulate_bearings_midpoint(
            &[o1, o2],
            &[b1, b2],
            &[1.0, 1.0],
            0.1_f64.to_radians(),
            1e-3,
        );
        assert!(res.is_none());
    }

    #[test]
    fn single_ray_fails() {
        let res = triangulate_bearings_midpoint(
            &[Vec3::zeros()],
            &[Vec3::new(0.0, 0.0, 1.0)],
            &[1.0],
            0.1_f64.to_radians(),
            1e-3,
        );
        assert!(res.is_none());
    }
}
