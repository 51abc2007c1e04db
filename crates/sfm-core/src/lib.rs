//! Core scene-graph and geometry primitives for `sfm-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec3`, `Iso3`, ...),
//! - the perspective camera model with pixel↔bearing maps,
//! - world→local pose helpers and rig pose composition,
//! - the geodetic→topocentric converter,
//! - robust midpoint triangulation of bearing rays,
//! - the id-keyed scene graph arena ([`Map`]).
//!
//! Shot world poses are always derived:
//! `cam_from_world = cam_from_rig ∘ rig_from_world`.

/// Perspective camera model.
pub mod camera;
/// Geodetic to topocentric coordinate conversion.
pub mod geo;
/// Linear algebra type aliases.
pub mod math;
/// World→local rigid transforms.
pub mod pose;
/// Scene graph entities and the owning arena.
pub mod scene;
/// Midpoint triangulation of bearing rays.
pub mod triangulation;

pub use camera::Camera;
pub use geo::TopocentricConverter;
pub use math::*;
pub use pose::Pose;
pub use scene::*;
pub use triangulation::triangulate_bearings_midpoint;
