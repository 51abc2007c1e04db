use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::entities::{
    Landmark, Observation, RigCamera, RigInstance, Shot, ShotMeasurements, Similarity,
};
use super::gcp::GroundControlPoint;
use super::{CameraId, LandmarkId, RigCameraId, RigInstanceId, ShotId};
use crate::camera::Camera;
use crate::geo::TopocentricConverter;
use crate::math::{Vec2, Vec3};
use crate::pose::Pose;

/// Errors raised by scene graph mutations referencing missing entities.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown camera {0}")]
    UnknownCamera(CameraId),
    #[error("unknown rig camera {0}")]
    UnknownRigCamera(RigCameraId),
    #[error("unknown rig instance {0}")]
    UnknownRigInstance(RigInstanceId),
    #[error("unknown shot {0}")]
    UnknownShot(ShotId),
    #[error("unknown landmark {0}")]
    UnknownLandmark(LandmarkId),
    #[error("shot {0} already exists")]
    DuplicateShot(ShotId),
}

/// The owning arena for all scene graph entities.
///
/// Every entity lives in an id-keyed table; cross-references are ids that
/// are validated on insertion. Observation links are kept bidirectional
/// (shot→landmark and landmark→shot).
#[derive(Debug, Default)]
pub struct Map {
    cameras: HashMap<CameraId, Camera>,
    biases: HashMap<CameraId, Similarity>,
    rig_cameras: HashMap<RigCameraId, RigCamera>,
    rig_instances: HashMap<RigInstanceId, RigInstance>,
    shots: HashMap<ShotId, Shot>,
    landmarks: HashMap<LandmarkId, Landmark>,
    reference: TopocentricConverter,
}

impl Map {
    pub fn new(reference: TopocentricConverter) -> Self {
        Self {
            reference,
            ..Default::default()
        }
    }

    /// Topocentric reference of this reconstruction.
    pub fn reference(&self) -> &TopocentricConverter {
        &self.reference
    }

    // ── Entity creation ────────────────────────────────────────────────

    /// Register a camera; its GPS bias starts as identity.
    pub fn create_camera(&mut self, camera: Camera) {
        self.biases
            .entry(camera.id.clone())
            .or_insert_with(Similarity::identity);
        self.cameras.insert(camera.id.clone(), camera);
    }

    pub fn create_rig_camera(&mut self, rig_camera: RigCamera) {
        self.rig_cameras
            .insert(rig_camera.id.clone(), rig_camera);
    }

    pub fn create_rig_instance(&mut self, id: impl Into<RigInstanceId>, pose: Pose) {
        let id = id.into();
        self.rig_instances.insert(
            id.clone(),
            RigInstance {
                id,
                pose,
                shot_rig_cameras: HashMap::new(),
            },
        );
    }

    /// Create a shot and register it with its rig instance.
    pub fn create_shot(
        &mut self,
        id: impl Into<ShotId>,
        camera_id: impl Into<CameraId>,
        rig_camera_id: impl Into<RigCameraId>,
        rig_instance_id: impl Into<RigInstanceId>,
    ) -> Result<(), SceneError> {
        let id = id.into();
        let camera_id = camera_id.into();
        let rig_camera_id = rig_camera_id.into();
        let rig_instance_id = rig_instance_id.into();

        if self.shots.contains_key(&id) {
            return Err(SceneError::DuplicateShot(id));
        }
        if !self.cameras.contains_key(&camera_id) {
            return Err(SceneError::UnknownCamera(camera_id));
        }
        if !self.rig_cameras.contains_key(&rig_camera_id) {
            return Err(SceneError::UnknownRigCamera(rig_camera_id));
        }
        let instance = self
            .rig_instances
            .get_mut(&rig_instance_id)
            .ok_or(SceneError::UnknownRigInstance(rig_instance_id.clone()))?;
        instance
            .shot_rig_cameras
            .insert(id.clone(), rig_camera_id.clone());

        self.shots.insert(
            id.clone(),
            Shot {
                id,
                camera_id,
                rig_camera_id,
                rig_instance_id,
                measurements: ShotMeasurements::default(),
                landmark_observations: HashMap::new(),
            },
        );
        Ok(())
    }

    pub fn create_landmark(&mut self, id: impl Into<LandmarkId>, position: Vec3) {
        let id = id.into();
        self.landmarks.insert(
            id.clone(),
            Landmark {
                id,
                global_position: position,
                observing_shots: HashSet::new(),
                reprojection_errors: HashMap::new(),
            },
        );
    }

    /// Link a shot and a landmark through an observation (both directions).
    pub fn add_observation(
        &mut self,
        shot_id: &ShotId,
        landmark_id: &LandmarkId,
        observation: Observation,
    ) -> Result<(), SceneError> {
        let shot = self
            .shots
            .get_mut(shot_id)
            .ok_or_else(|| SceneError::UnknownShot(shot_id.clone()))?;
        let landmark = self
            .landmarks
            .get_mut(landmark_id)
            .ok_or_else(|| SceneError::UnknownLandmark(landmark_id.clone()))?;
        shot.landmark_observations
            .insert(landmark_id.clone(), observation);
        landmark.observing_shots.insert(shot_id.clone());
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn camera(&self, id: &str) -> Option<&Camera> {
        self.cameras.get(id)
    }

    pub fn cameras(&self) -> &HashMap<CameraId, Camera> {
        &self.cameras
    }

    pub fn bias(&self, camera_id: &str) -> Option<&Similarity> {
        self.biases.get(camera_id)
    }

    pub fn biases(&self) -> &HashMap<CameraId, Similarity> {
        &self.biases
    }

    pub fn rig_camera(&self, id: &str) -> Option<&RigCamera> {
        self.rig_cameras.get(id)
    }

    pub fn rig_cameras(&self) -> &HashMap<RigCameraId, RigCamera> {
        &self.rig_cameras
    }

    pub fn rig_instance(&self, id: &str) -> Option<&RigInstance> {
        self.rig_instances.get(id)
    }

    pub fn rig_instances(&self) -> &HashMap<RigInstanceId, RigInstance> {
        &self.rig_instances
    }

    pub fn shot(&self, id: &str) -> Option<&Shot> {
        self.shots.get(id)
    }

    pub fn shots(&self) -> &HashMap<ShotId, Shot> {
        &self.shots
    }

    pub fn num_shots(&self) -> usize {
        self.shots.len()
    }

    pub fn landmark(&self, id: &str) -> Option<&Landmark> {
        self.landmarks.get(id)
    }

    pub fn landmarks(&self) -> &HashMap<LandmarkId, Landmark> {
        &self.landmarks
    }

    /// Derived world pose of a shot: `cam_from_rig ∘ rig_from_world`.
    pub fn shot_pose(&self, shot_id: &str) -> Option<Pose> {
        let shot = self.shots.get(shot_id)?;
        let rig_camera = self.rig_cameras.get(&shot.rig_camera_id)?;
        let instance = self.rig_instances.get(&shot.rig_instance_id)?;
        Some(rig_camera.pose.compose(&instance.pose))
    }

    /// Project a ground control point's geodetic coordinate into the
    /// topocentric frame, if it has one.
    pub fn gcp_topocentric(&self, gcp: &GroundControlPoint) -> Option<Vec3> {
        gcp.lla.as_ref().map(|lla| self.reference.to_topocentric(lla))
    }

    // ── Mutation (writeback) ───────────────────────────────────────────

    pub fn set_shot_measurements(
        &mut self,
        shot_id: &ShotId,
        measurements: ShotMeasurements,
    ) -> Result<(), SceneError> {
        self.shots
            .get_mut(shot_id)
            .ok_or_else(|| SceneError::UnknownShot(shot_id.clone()))?
            .measurements = measurements;
        Ok(())
    }

    pub fn set_camera_params(&mut self, id: &CameraId, params: &[f64]) -> Result<(), SceneError> {
        self.cameras
            .get_mut(id)
            .ok_or_else(|| SceneError::UnknownCamera(id.clone()))?
            .set_params(params);
        Ok(())
    }

    pub fn set_bias(&mut self, camera_id: &CameraId, bias: Similarity) -> Result<(), SceneError> {
        if !self.cameras.contains_key(camera_id) {
            return Err(SceneError::UnknownCamera(camera_id.clone()));
        }
        self.biases.insert(camera_id.clone(), bias);
        Ok(())
    }

    pub fn set_rig_instance_pose(
        &mut self,
        id: &RigInstanceId,
        pose: Pose,
    ) -> Result<(), SceneError> {
        self.rig_instances
            .get_mut(id)
            .ok_or_else(|| SceneError::UnknownRigInstance(id.clone()))?
            .pose = pose;
        Ok(())
    }

    pub fn set_rig_camera_pose(&mut self, id: &RigCameraId, pose: Pose) -> Result<(), SceneError> {
        self.rig_cameras
            .get_mut(id)
            .ok_or_else(|| SceneError::UnknownRigCamera(id.clone()))?
            .pose = pose;
        Ok(())
    }

    pub fn set_landmark_position(
        &mut self,
        id: &LandmarkId,
        position: Vec3,
    ) -> Result<(), SceneError> {
        self.landmarks
            .get_mut(id)
            .ok_or_else(|| SceneError::UnknownLandmark(id.clone()))?
            .global_position = position;
        Ok(())
    }

    pub fn set_landmark_reprojection_errors(
        &mut self,
        id: &LandmarkId,
        errors: HashMap<ShotId, Vec2>,
    ) -> Result<(), SceneError> {
        self.landmarks
            .get_mut(id)
            .ok_or_else(|| SceneError::UnknownLandmark(id.clone()))?
            .reprojection_errors = errors;
        Ok(())
    }
}
