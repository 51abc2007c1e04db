use serde::{Deserialize, Serialize};

use crate::math::{Real, Vec2, Vec3};

/// Fixed-point iterations for radial undistortion.
const UNDISTORT_ITERS: usize = 20;

/// Perspective camera with two-coefficient radial distortion.
///
/// Intrinsics are expressed in normalized image coordinates:
/// `pixel = focal * distort(x/z, y/z) + principal_point`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub id: String,
    pub focal: Real,
    pub k1: Real,
    pub k2: Real,
    pub principal_point: Vec2,
}

impl Camera {
    /// Ambient dimension of the parameter vector `[focal, k1, k2, cx, cy]`.
    pub const PARAM_DIM: usize = 5;

    /// A distortion-free camera with the given focal length.
    pub fn perspective(id: impl Into<String>, focal: Real) -> Self {
        Self {
            id: id.into(),
            focal,
            k1: 0.0,
            k2: 0.0,
            principal_point: Vec2::zeros(),
        }
    }

    /// Project a camera-frame point to normalized pixel coordinates.
    ///
    /// Returns `None` for points at or behind the optical center.
    pub fn project(&self, p_cam: &Vec3) -> Option<Vec2> {
        if p_cam.z <= 0.0 {
            return None;
        }
        let x = p_cam.x / p_cam.z;
        let y = p_cam.y / p_cam.z;
        let r2 = x * x + y * y;
        let d = 1.0 + r2 * (self.k1 + r2 * self.k2);
        Some(Vec2::new(
            self.focal * d * x + self.principal_point.x,
            self.focal * d * y + self.principal_point.y,
        ))
    }

    /// Unit ray in the camera frame for a pixel coordinate.
    ///
    /// Undistortion uses fixed-point iteration on the radial model.
    pub fn bearing(&self, pixel: &Vec2) -> Vec3 {
        let xd = (pixel.x - self.principal_point.x) / self.focal;
        let yd = (pixel.y - self.principal_point.y) / self.focal;

        let mut x = xd;
        let mut y = yd;
        for _ in 0..UNDISTORT_ITERS {
            let r2 = x * x + y * y;
            let d = 1.0 + r2 * (self.k1 + r2 * self.k2);
            x = xd / d;
            y = yd / d;
        }
        Vec3::new(x, y, 1.0).normalize()
    }

    /// Parameter vector `[focal, k1, k2, cx, cy]`.
    pub fn to_params(&self) -> [Real; Self::PARAM_DIM] {
        [
            self.focal,
            self.k1,
            self.k2,
            self.principal_point.x,
            self.principal_point.y,
        ]
    }

    /// Overwrite intrinsics from a parameter vector.
    pub fn set_params(&mut self, params: &[Real]) {
        self.focal = params[0];
        self.k1 = params[1];
        self.k2 = params[2];
        self.principal_point.x = params[3];
        self.principal_point.y = params[4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearing_inverts_projection() {
        let mut cam = Camera::perspective("cam", 0.85);
        cam.k1 = -0.1;
        cam.k2 = 0.01;
        cam.principal_point = Vec2::new(0.01, -0.005);

        let p_cam = Vec3::new(0.2, -0.15, 2.0);
        let pixel = cam.project(&p_cam).unwrap();
        let ray = cam.bearing(&pixel);

        let angle = ray.angle(&p_cam.normalize());
        assert!(angle < 1e-8, "bearing deviates by {angle} rad");
    }

    #[test]
    fn behind_camera_does_not_project() {
        let cam = Camera::perspective("cam", 1.0);
        assert!(cam.project(&Vec3::new(0.0, 0.0, -1.0)).is_none());
        assert!(cam.project(&Vec3::new(0.1, 0.1, 0.0)).is_none());
    }
}
