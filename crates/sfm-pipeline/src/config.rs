use serde::{Deserialize, Serialize};

/// Rigid-alignment strategy for the global bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMethod {
    /// Pick between the other two from the shape of the correspondences.
    Auto,
    /// Assume a known up axis from camera orientation.
    OrientationPrior,
    /// Full rigid alignment against measured positions.
    Naive,
}

/// Up-axis assumption used with [`AlignMethod::OrientationPrior`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationPrior {
    /// Cameras pointing down; world up is `(0, 0, -1)`.
    Vertical,
    /// Level cameras; world up is `(0, -1, 0)`.
    Horizontal,
}

/// Consumed configuration keys for bundle orchestration.
///
/// Loading is up to the host; every field has a default so partial
/// configurations deserialize cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Neighborhood expansion radius for the windowed bundle.
    pub local_bundle_radius: usize,
    /// Minimum shared landmarks between neighborhood layers.
    pub local_bundle_min_common_points: usize,
    /// Interior size cap for the windowed bundle.
    pub local_bundle_max_shots: usize,

    /// Robust loss applied to reprojection terms.
    pub loss_function: String,
    pub loss_function_threshold: f64,

    /// Prior standard deviations for free camera intrinsics.
    pub focal_prior_sd: f64,
    pub principal_point_sd: f64,
    pub radial_distortion_k1_sd: f64,
    pub radial_distortion_k2_sd: f64,

    /// Prior standard deviations for free rig camera offsets.
    pub rig_translation_sd: f64,
    pub rig_rotation_sd: f64,

    /// Solver-internal worker threads.
    pub processes: usize,
    /// Iteration cap for the global bundle.
    pub bundle_max_iterations: usize,

    pub bundle_use_gps: bool,
    pub bundle_use_gcp: bool,
    pub gcp_horizontal_sd: f64,
    pub gcp_vertical_sd: f64,
    pub gcp_global_weight: f64,

    pub align_method: AlignMethod,
    pub align_orientation_prior: OrientationPrior,

    pub bundle_analytic_derivatives: bool,
    pub optimize_camera_parameters: bool,
    pub bundle_compensate_gps_bias: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            local_bundle_radius: 3,
            local_bundle_min_common_points: 20,
            local_bundle_max_shots: 30,
            loss_function: "HuberLoss".to_string(),
            loss_function_threshold: 1.0,
            focal_prior_sd: 0.01,
            principal_point_sd: 0.01,
            radial_distortion_k1_sd: 0.01,
            radial_distortion_k2_sd: 0.01,
            rig_translation_sd: 0.1,
            rig_rotation_sd: 0.1,
            processes: 1,
            bundle_max_iterations: 100,
            bundle_use_gps: true,
            bundle_use_gcp: false,
            gcp_horizontal_sd: 0.01,
            gcp_vertical_sd: 0.1,
            gcp_global_weight: 1.0,
            align_method: AlignMethod::Auto,
            align_orientation_prior: OrientationPrior::Horizontal,
            bundle_analytic_derivatives: true,
            optimize_camera_parameters: true,
            bundle_compensate_gps_bias: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: BundleConfig =
            serde_json::from_str(r#"{"align_method": "orientation_prior", "processes": 4}"#)
                .unwrap();
        assert_eq!(config.align_method, AlignMethod::OrientationPrior);
        assert_eq!(config.processes, 4);
        assert_eq!(config.local_bundle_radius, 3);
        assert!(config.bundle_use_gps);
    }
}
