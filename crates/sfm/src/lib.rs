//! Umbrella crate for `sfm-rs`.
//!
//! Re-exports the scene graph ([`core`]), the solver facade ([`optim`]) and
//! the bundle orchestration entry points ([`pipeline`]).

pub use sfm_core as core;
pub use sfm_optim as optim;
pub use sfm_pipeline as pipeline;

pub use sfm_core::{Camera, Map, Pose, TopocentricConverter};
pub use sfm_optim::BundleAdjuster;
pub use sfm_pipeline::{bundle, bundle_local, bundle_shot_poses, BundleConfig};
