//! Scene graph entities and the owning arena.
//!
//! All cross-references between entities are by id; the [`Map`] arena owns
//! every entity and is the only mutation point. Neighborhood selection and
//! bundle assembly work on id sets, never on references into the arena.

mod entities;
mod gcp;
mod map;

pub use entities::{
    Landmark, Observation, RigCamera, RigInstance, Shot, ShotMeasurements, Similarity,
};
pub use gcp::{GcpObservation, GroundControlPoint};
pub use map::{Map, SceneError};

/// Camera intrinsics id.
pub type CameraId = String;
/// Rig camera (offset within a rig) id.
pub type RigCameraId = String;
/// Rig instance (rig at one moment) id.
pub type RigInstanceId = String;
/// Shot (single exposure) id.
pub type ShotId = String;
/// Landmark (triangulated scene point) id.
pub type LandmarkId = String;
