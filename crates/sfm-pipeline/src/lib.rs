//! Bundle-adjustment orchestration for `sfm-rs`.
//!
//! Three entry points assemble, solve, and commit bundle problems over the
//! scene graph:
//!
//! - [`bundle`]: global refinement of the whole reconstruction,
//! - [`bundle_local`]: windowed refinement of a neighborhood around one
//!   shot, anchored by its boundary,
//! - [`bundle_shot_poses`]: pose-only refinement against a frozen map.
//!
//! The fixed/free policy of each mode is explicit: cameras, rig cameras and
//! points carry plain flags, and rig instances follow an
//! [`InstanceFixRule`](session::InstanceFixRule). Solved values are committed
//! through a validating writeback that reports the first non-finite entity.

/// Alignment strategy detection.
pub mod alignment;
/// The three bundle entry points.
pub mod bundle;
/// Consumed configuration keys.
pub mod config;
/// Ground-control-point triangulation and constraint assembly.
pub mod gcp;
/// Bounded neighborhood selection on the shot/landmark graph.
pub mod neighborhood;
/// Solver reports.
pub mod report;
/// Shared bundle session assembly.
pub mod session;
/// Validated writeback of solved parameters.
pub mod writeback;

pub use alignment::{alignment_constraints, detect_alignment_constraints};
pub use bundle::{bundle, bundle_local, bundle_shot_poses};
pub use config::{AlignMethod, BundleConfig, OrientationPrior};
pub use gcp::{add_gcp_to_bundle, triangulate_gcp};
pub use neighborhood::{direct_shot_neighbors, shot_neighborhood};
pub use report::{BundleReport, LocalBundleReport, WallTimes};
pub use session::InstanceFixRule;
pub use writeback::{update_map, WritebackError};
