use serde::Serialize;

/// Phase timings in seconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct WallTimes {
    pub setup: f64,
    pub run: f64,
    pub teardown: f64,
}

/// Report of a global or pose-only bundle run.
#[derive(Debug, Clone, Serialize)]
pub struct BundleReport {
    /// Solver summary; the only visibility into convergence quality.
    pub brief_report: String,
    pub wall_times: WallTimes,
    pub num_images: usize,
    pub num_points: usize,
    pub num_reprojections: usize,
}

/// Report of a windowed bundle run.
#[derive(Debug, Clone, Serialize)]
pub struct LocalBundleReport {
    pub brief_report: String,
    pub wall_times: WallTimes,
    pub num_images: usize,
    pub num_interior_images: usize,
    pub num_boundary_images: usize,
    pub num_other_images: usize,
    pub num_points: usize,
    pub num_reprojections: usize,
}
