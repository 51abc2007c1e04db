//! The bundle adjuster facade.
//!
//! Entities are registered with explicit fixed/free flags, observations and
//! priors accumulate as terms, and [`BundleAdjuster::run`] compiles
//! everything into the problem IR and executes a solver backend. Getters
//! read solved values back out; reprojection residuals are re-evaluated
//! after the solve to produce per-point diagnostics.

use std::collections::HashMap;

use anyhow::{anyhow, bail, ensure, Result};
use nalgebra::DVector;
use sfm_core::{Camera, CameraId, Pose, RigCameraId, RigInstanceId, ShotId, Similarity, Vec2, Vec3};

use crate::backend::{solve_with_backend, BackendKind, LinearStrategy, Solution, SolveOptions};
use crate::factors;
use crate::ir::{FactorKind, ManifoldKind, ParamId, ProblemIR, ResidualBlock, RobustLoss};
use crate::params::{
    camera_to_dvec, dvec_to_similarity, pose_to_se3_dvec, se3_dvec_to_pose, similarity_to_dvec,
};

/// Solved point position plus per-shot reprojection residuals in pixels.
#[derive(Debug, Clone)]
pub struct PointResult {
    pub position: Vec3,
    pub reprojection_errors: HashMap<ShotId, Vec2>,
}

#[derive(Debug, Clone)]
struct CameraEntry {
    value: Camera,
    prior: Camera,
    fixed: bool,
}

#[derive(Debug, Clone)]
struct PointEntry {
    position: Vec3,
    fixed: bool,
}

#[derive(Debug, Clone)]
struct RigCameraEntry {
    pose: Pose,
    prior: Pose,
    fixed: bool,
}

#[derive(Debug, Clone)]
struct InstanceEntry {
    pose: Pose,
    shot_cameras: HashMap<ShotId, CameraId>,
    fixed: bool,
}

#[derive(Debug, Clone)]
struct ShotLink {
    camera_id: CameraId,
    rig_camera_id: RigCameraId,
    rig_instance_id: RigInstanceId,
}

#[derive(Debug, Clone)]
struct ProjectionTerm {
    shot_id: ShotId,
    point_id: String,
    pixel: Vec2,
    scale: f64,
    depth_prior: Option<f64>,
}

#[derive(Debug, Clone)]
struct PointPriorTerm {
    point_id: String,
    position: Vec3,
    sd: Vec3,
    has_altitude: bool,
}

#[derive(Debug, Clone)]
struct InstancePriorTerm {
    instance_id: RigInstanceId,
    position: Vec3,
    sd: Vec3,
}

#[derive(Debug, Clone)]
struct UpVectorTerm {
    shot_id: ShotId,
    up: Vec3,
    sd: f64,
}

#[derive(Debug, Clone)]
struct InternalParameterSd {
    focal: f64,
    principal_point: f64,
    k1: f64,
    k2: f64,
}

impl Default for InternalParameterSd {
    fn default() -> Self {
        Self {
            focal: 0.01,
            principal_point: 0.01,
            k1: 0.01,
            k2: 0.01,
        }
    }
}

struct SolveState {
    solution: Solution,
    reprojection_errors: HashMap<String, HashMap<ShotId, Vec2>>,
    num_params: usize,
    num_residuals: usize,
}

/// Incrementally constructed bundle adjustment problem.
#[derive(Default)]
pub struct BundleAdjuster {
    cameras: HashMap<CameraId, CameraEntry>,
    points: HashMap<String, PointEntry>,
    rig_cameras: HashMap<RigCameraId, RigCameraEntry>,
    rig_instances: HashMap<RigInstanceId, InstanceEntry>,
    shots: HashMap<ShotId, ShotLink>,
    biases: HashMap<CameraId, Similarity>,
    bias_compensation: bool,

    projections: Vec<ProjectionTerm>,
    point_priors: Vec<PointPriorTerm>,
    instance_priors: Vec<InstancePriorTerm>,
    up_vectors: Vec<UpVectorTerm>,

    loss_name: String,
    loss_threshold: f64,
    internal_sd: InternalParameterSd,
    rig_translation_sd: f64,
    rig_rotation_sd: f64,
    options: SolveOptions,

    state: Option<SolveState>,
}

impl BundleAdjuster {
    pub fn new() -> Self {
        Self {
            loss_name: "TrivialLoss".to_string(),
            loss_threshold: 1.0,
            rig_translation_sd: 0.1,
            rig_rotation_sd: 0.1,
            ..Default::default()
        }
    }

    // ── Entity registration ────────────────────────────────────────────

    pub fn add_camera(&mut self, id: &CameraId, value: &Camera, prior: &Camera, fixed: bool) {
        self.biases
            .entry(id.clone())
            .or_insert_with(Similarity::identity);
        self.cameras.insert(
            id.clone(),
            CameraEntry {
                value: value.clone(),
                prior: prior.clone(),
                fixed,
            },
        );
    }

    pub fn add_point(&mut self, id: impl Into<String>, position: Vec3, fixed: bool) {
        self.points.insert(id.into(), PointEntry { position, fixed });
    }

    pub fn add_rig_camera(&mut self, id: &RigCameraId, pose: &Pose, prior: &Pose, fixed: bool) {
        self.rig_cameras.insert(
            id.clone(),
            RigCameraEntry {
                pose: *pose,
                prior: *prior,
                fixed,
            },
        );
    }

    /// Register a rig instance and link its member shots into the problem.
    pub fn add_rig_instance(
        &mut self,
        id: &RigInstanceId,
        pose: &Pose,
        shot_cameras: &HashMap<ShotId, CameraId>,
        shot_rig_cameras: &HashMap<ShotId, RigCameraId>,
        fixed: bool,
    ) {
        for (shot_id, camera_id) in shot_cameras {
            if let Some(rig_camera_id) = shot_rig_cameras.get(shot_id) {
                self.shots.insert(
                    shot_id.clone(),
                    ShotLink {
                        camera_id: camera_id.clone(),
                        rig_camera_id: rig_camera_id.clone(),
                        rig_instance_id: id.clone(),
                    },
                );
            }
        }
        self.rig_instances.insert(
            id.clone(),
            InstanceEntry {
                pose: *pose,
                shot_cameras: shot_cameras.clone(),
                fixed,
            },
        );
    }

    // ── Terms ──────────────────────────────────────────────────────────

    pub fn add_point_projection_observation(
        &mut self,
        shot_id: &ShotId,
        point_id: impl Into<String>,
        pixel: Vec2,
        scale: f64,
        depth_prior: Option<f64>,
    ) {
        self.projections.push(ProjectionTerm {
            shot_id: shot_id.clone(),
            point_id: point_id.into(),
            pixel,
            scale,
            depth_prior,
        });
    }

    pub fn add_point_prior(
        &mut self,
        point_id: impl Into<String>,
        position: Vec3,
        sd: Vec3,
        has_altitude: bool,
    ) {
        self.point_priors.push(PointPriorTerm {
            point_id: point_id.into(),
            position,
            sd,
            has_altitude,
        });
    }

    pub fn add_rig_instance_position_prior(
        &mut self,
        instance_id: &RigInstanceId,
        position: Vec3,
        sd: Vec3,
    ) {
        self.instance_priors.push(InstancePriorTerm {
            instance_id: instance_id.clone(),
            position,
            sd,
        });
    }

    pub fn add_absolute_up_vector(&mut self, shot_id: &ShotId, up: Vec3, sd: f64) {
        self.up_vectors.push(UpVectorTerm {
            shot_id: shot_id.clone(),
            up,
            sd,
        });
    }

    /// Register a camera's GPS bias and enable bias compensation terms.
    pub fn set_camera_bias(&mut self, camera_id: &CameraId, bias: &Similarity) {
        self.biases.insert(camera_id.clone(), *bias);
        self.bias_compensation = true;
    }

    // ── Options ────────────────────────────────────────────────────────

    pub fn set_point_projection_loss_function(&mut self, name: &str, threshold: f64) {
        self.loss_name = name.to_string();
        self.loss_threshold = threshold;
    }

    pub fn set_internal_parameters_prior_sd(
        &mut self,
        focal_sd: f64,
        principal_point_sd: f64,
        k1_sd: f64,
        k2_sd: f64,
    ) {
        self.internal_sd = InternalParameterSd {
            focal: focal_sd,
            principal_point: principal_point_sd,
            k1: k1_sd,
            k2: k2_sd,
        };
    }

    pub fn set_rig_parameters_prior_sd(&mut self, translation_sd: f64, rotation_sd: f64) {
        self.rig_translation_sd = translation_sd;
        self.rig_rotation_sd = rotation_sd;
    }

    pub fn set_use_analytic_derivatives(&mut self, enabled: bool) {
        self.options.analytic_derivatives = enabled;
    }

    pub fn set_num_threads(&mut self, threads: usize) {
        self.options.num_threads = threads;
    }

    pub fn set_max_num_iterations(&mut self, iterations: usize) {
        self.options.max_iterations = iterations;
    }

    pub fn set_linear_solver_type(&mut self, strategy: LinearStrategy) {
        self.options.linear_strategy = strategy;
    }

    // ── Counts ─────────────────────────────────────────────────────────

    pub fn num_rig_instances(&self) -> usize {
        self.rig_instances.len()
    }

    pub fn num_projection_terms(&self) -> usize {
        self.projections.len()
    }

    /// Relative-motion constraints are not part of this problem surface.
    pub fn num_motion_terms(&self) -> usize {
        0
    }

    // ── Solve ──────────────────────────────────────────────────────────

    pub fn run(&mut self) -> Result<()> {
        let (ir, initial) = self.build_ir()?;
        let solution = solve_with_backend(BackendKind::TinySolver, &ir, &initial, &self.options)?;

        let reprojection_errors = self.evaluate_reprojection_errors(&solution.params)?;
        self.state = Some(SolveState {
            num_params: ir.params.len(),
            num_residuals: ir.residuals.len(),
            solution,
            reprojection_errors,
        });
        Ok(())
    }

    /// One-line summary of the last solve.
    pub fn brief_report(&self) -> String {
        match &self.state {
            Some(state) => format!(
                "{} parameter blocks, {} residual blocks, cost {:.6e} -> {:.6e}",
                state.num_params,
                state.num_residuals,
                state.solution.initial_cost,
                state.solution.final_cost
            ),
            None => "not solved".to_string(),
        }
    }

    fn build_ir(&self) -> Result<(ProblemIR, HashMap<String, DVector<f64>>)> {
        let mut ir = ProblemIR::new();
        let mut initial = HashMap::new();
        let projection_loss = robust_loss(&self.loss_name, self.loss_threshold)?;

        let mut camera_ids: HashMap<&str, ParamId> = HashMap::new();
        for (id, entry) in &self.cameras {
            let key = camera_key(id);
            let param = ir.add_param_block(&key, Camera::PARAM_DIM, ManifoldKind::Euclidean, entry.fixed);
            initial.insert(key, camera_to_dvec(&entry.value));
            camera_ids.insert(id.as_str(), param);

            if !entry.fixed {
                let sd = &self.internal_sd;
                ir.add_residual_block(ResidualBlock {
                    params: vec![param],
                    loss: RobustLoss::None,
                    factor: FactorKind::CameraPrior {
                        prior: entry.prior.to_params(),
                        sd: [sd.focal, sd.k1, sd.k2, sd.principal_point, sd.principal_point],
                    },
                });
            }
        }

        let mut point_ids: HashMap<&str, ParamId> = HashMap::new();
        for (id, entry) in &self.points {
            let key = point_key(id);
            let param = ir.add_param_block(&key, 3, ManifoldKind::Euclidean, entry.fixed);
            initial.insert(key, DVector::from_row_slice(entry.position.as_slice()));
            point_ids.insert(id.as_str(), param);
        }

        let mut rig_camera_ids: HashMap<&str, ParamId> = HashMap::new();
        for (id, entry) in &self.rig_cameras {
            let key = rig_camera_key(id);
            let param = ir.add_param_block(&key, 7, ManifoldKind::SE3, entry.fixed);
            initial.insert(key, pose_to_se3_dvec(&entry.pose));
            rig_camera_ids.insert(id.as_str(), param);

            if !entry.fixed {
                let prior = pose_to_se3_dvec(&entry.prior);
                ir.add_residual_block(ResidualBlock {
                    params: vec![param],
                    loss: RobustLoss::None,
                    factor: FactorKind::RigCameraPrior {
                        prior: [
                            prior[0], prior[1], prior[2], prior[3], prior[4], prior[5], prior[6],
                        ],
                        rotation_sd: self.rig_rotation_sd,
                        translation_sd: self.rig_translation_sd,
                    },
                });
            }
        }

        let mut instance_ids: HashMap<&str, ParamId> = HashMap::new();
        for (id, entry) in &self.rig_instances {
            let key = instance_key(id);
            let param = ir.add_param_block(&key, 7, ManifoldKind::SE3, entry.fixed);
            initial.insert(key, pose_to_se3_dvec(&entry.pose));
            instance_ids.insert(id.as_str(), param);
        }

        // Bias blocks only exist when an instance prior links to them.
        let mut bias_ids: HashMap<CameraId, ParamId> = HashMap::new();
        for term in &self.instance_priors {
            if let Some(camera_id) = self.bias_camera_for_instance(&term.instance_id) {
                if !bias_ids.contains_key(&camera_id) {
                    let key = bias_key(&camera_id);
                    let param = ir.add_param_block(&key, 7, ManifoldKind::Euclidean, false);
                    initial.insert(key, similarity_to_dvec(&self.biases[&camera_id]));
                    bias_ids.insert(camera_id, param);
                }
            }
        }

        for term in &self.projections {
            let link = self.shots.get(&term.shot_id).ok_or_else(|| {
                anyhow!("projection references unregistered shot {}", term.shot_id)
            })?;
            let camera = *camera_ids
                .get(link.camera_id.as_str())
                .ok_or_else(|| anyhow!("shot {} references missing camera", term.shot_id))?;
            let rig_camera = *rig_camera_ids
                .get(link.rig_camera_id.as_str())
                .ok_or_else(|| anyhow!("shot {} references missing rig camera", term.shot_id))?;
            let instance = *instance_ids
                .get(link.rig_instance_id.as_str())
                .ok_or_else(|| anyhow!("shot {} references missing rig instance", term.shot_id))?;
            let point = *point_ids
                .get(term.point_id.as_str())
                .ok_or_else(|| anyhow!("projection references missing point {}", term.point_id))?;

            ir.add_residual_block(ResidualBlock {
                params: vec![camera, rig_camera, instance, point],
                loss: projection_loss,
                factor: FactorKind::RigReprojection {
                    uv: [term.pixel.x, term.pixel.y],
                    scale: term.scale,
                },
            });
            if let Some(depth) = term.depth_prior {
                ir.add_residual_block(ResidualBlock {
                    params: vec![rig_camera, instance, point],
                    loss: RobustLoss::None,
                    factor: FactorKind::PointDepthPrior {
                        depth,
                        scale: term.scale,
                    },
                });
            }
        }

        for term in &self.point_priors {
            let point = *point_ids
                .get(term.point_id.as_str())
                .ok_or_else(|| anyhow!("point prior references missing point {}", term.point_id))?;
            ir.add_residual_block(ResidualBlock {
                params: vec![point],
                loss: RobustLoss::None,
                factor: FactorKind::PointPositionPrior {
                    position: [term.position.x, term.position.y, term.position.z],
                    sd: [term.sd.x, term.sd.y, term.sd.z],
                    has_altitude: term.has_altitude,
                },
            });
        }

        for term in &self.instance_priors {
            let instance = *instance_ids.get(term.instance_id.as_str()).ok_or_else(|| {
                anyhow!(
                    "position prior references missing rig instance {}",
                    term.instance_id
                )
            })?;
            let position = [term.position.x, term.position.y, term.position.z];
            let sd = [term.sd.x, term.sd.y, term.sd.z];
            match self
                .bias_camera_for_instance(&term.instance_id)
                .and_then(|camera_id| bias_ids.get(&camera_id).copied())
            {
                Some(bias) => ir.add_residual_block(ResidualBlock {
                    params: vec![instance, bias],
                    loss: RobustLoss::None,
                    factor: FactorKind::BiasedInstancePositionPrior { position, sd },
                }),
                None => ir.add_residual_block(ResidualBlock {
                    params: vec![instance],
                    loss: RobustLoss::None,
                    factor: FactorKind::InstancePositionPrior { position, sd },
                }),
            }
        }

        for term in &self.up_vectors {
            let link = self.shots.get(&term.shot_id).ok_or_else(|| {
                anyhow!("up-vector prior references unregistered shot {}", term.shot_id)
            })?;
            let rig_camera = *rig_camera_ids
                .get(link.rig_camera_id.as_str())
                .ok_or_else(|| anyhow!("shot {} references missing rig camera", term.shot_id))?;
            let instance = *instance_ids
                .get(link.rig_instance_id.as_str())
                .ok_or_else(|| anyhow!("shot {} references missing rig instance", term.shot_id))?;
            ir.add_residual_block(ResidualBlock {
                params: vec![rig_camera, instance],
                loss: RobustLoss::None,
                factor: FactorKind::AbsoluteUpVector {
                    up: [term.up.x, term.up.y, term.up.z],
                    sd: term.sd,
                },
            });
        }

        ir.validate()?;
        Ok((ir, initial))
    }

    /// Camera whose bias applies to an instance's position prior.
    ///
    /// Instances are single-camera in practice; the lexicographically first
    /// member shot keeps the choice deterministic when they are not.
    fn bias_camera_for_instance(&self, instance_id: &RigInstanceId) -> Option<CameraId> {
        if !self.bias_compensation {
            return None;
        }
        let entry = self.rig_instances.get(instance_id)?;
        let camera_id = entry
            .shot_cameras
            .iter()
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, camera_id)| camera_id.clone())?;
        self.biases.contains_key(&camera_id).then_some(camera_id)
    }

    fn evaluate_reprojection_errors(
        &self,
        params: &HashMap<String, DVector<f64>>,
    ) -> Result<HashMap<String, HashMap<ShotId, Vec2>>> {
        let lookup = |key: String| {
            params
                .get(&key)
                .ok_or_else(|| anyhow!("missing solved parameter {key}"))
        };
        let mut errors: HashMap<String, HashMap<ShotId, Vec2>> = HashMap::new();
        for term in &self.projections {
            let link = self
                .shots
                .get(&term.shot_id)
                .ok_or_else(|| anyhow!("unregistered shot {}", term.shot_id))?;
            let camera = lookup(camera_key(&link.camera_id))?;
            let rig_camera = lookup(rig_camera_key(&link.rig_camera_id))?;
            let instance = lookup(instance_key(&link.rig_instance_id))?;
            let point = lookup(point_key(&term.point_id))?;

            let residual = factors::rig_reprojection_residual(
                camera.as_view(),
                rig_camera.as_view(),
                instance.as_view(),
                point.as_view(),
                [term.pixel.x, term.pixel.y],
                term.scale,
            );
            errors
                .entry(term.point_id.clone())
                .or_default()
                .insert(term.shot_id.clone(), residual * term.scale);
        }
        Ok(errors)
    }

    // ── Result getters ─────────────────────────────────────────────────

    fn solved_params(&self) -> Result<&HashMap<String, DVector<f64>>> {
        self.state
            .as_ref()
            .map(|s| &s.solution.params)
            .ok_or_else(|| anyhow!("bundle adjuster has not been run"))
    }

    pub fn get_camera(&self, id: &CameraId) -> Result<Camera> {
        let entry = self
            .cameras
            .get(id)
            .ok_or_else(|| anyhow!("unknown camera {id}"))?;
        let params = self.solved_params()?;
        let values = params
            .get(&camera_key(id))
            .ok_or_else(|| anyhow!("no solution for camera {id}"))?;
        let mut camera = entry.value.clone();
        camera.set_params(values.as_slice());
        Ok(camera)
    }

    pub fn get_point(&self, id: &str) -> Result<PointResult> {
        ensure!(self.points.contains_key(id), "unknown point {id}");
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| anyhow!("bundle adjuster has not been run"))?;
        let values = state
            .solution
            .params
            .get(&point_key(id))
            .ok_or_else(|| anyhow!("no solution for point {id}"))?;
        Ok(PointResult {
            position: Vec3::new(values[0], values[1], values[2]),
            reprojection_errors: state
                .reprojection_errors
                .get(id)
                .cloned()
                .unwrap_or_default(),
        })
    }

    pub fn get_rig_camera(&self, id: &RigCameraId) -> Result<Pose> {
        ensure!(self.rig_cameras.contains_key(id), "unknown rig camera {id}");
        let params = self.solved_params()?;
        let values = params
            .get(&rig_camera_key(id))
            .ok_or_else(|| anyhow!("no solution for rig camera {id}"))?;
        se3_dvec_to_pose(values.as_view())
    }

    pub fn get_rig_instance(&self, id: &RigInstanceId) -> Result<Pose> {
        ensure!(
            self.rig_instances.contains_key(id),
            "unknown rig instance {id}"
        );
        let params = self.solved_params()?;
        let values = params
            .get(&instance_key(id))
            .ok_or_else(|| anyhow!("no solution for rig instance {id}"))?;
        se3_dvec_to_pose(values.as_view())
    }

    /// Solved bias for a camera, or the registered value when the bias never
    /// entered the problem.
    pub fn get_bias(&self, camera_id: &CameraId) -> Result<Similarity> {
        let registered = self
            .biases
            .get(camera_id)
            .ok_or_else(|| anyhow!("unknown bias for camera {camera_id}"))?;
        let params = self.solved_params()?;
        match params.get(&bias_key(camera_id)) {
            Some(values) => dvec_to_similarity(values.as_view()),
            None => Ok(*registered),
        }
    }
}

fn camera_key(id: &str) -> String {
    format!("cam/{id}")
}

fn point_key(id: &str) -> String {
    format!("point/{id}")
}

fn rig_camera_key(id: &str) -> String {
    format!("rig_cam/{id}")
}

fn instance_key(id: &str) -> String {
    format!("rig_inst/{id}")
}

fn bias_key(camera_id: &str) -> String {
    format!("bias/{camera_id}")
}

fn robust_loss(name: &str, threshold: f64) -> Result<RobustLoss> {
    match name {
        "TrivialLoss" | "" => Ok(RobustLoss::None),
        "HuberLoss" => Ok(RobustLoss::Huber { scale: threshold }),
        "CauchyLoss" => Ok(RobustLoss::Cauchy { scale: threshold }),
        "ArctanLoss" => Ok(RobustLoss::Arctan { scale: threshold }),
        other => bail!("unsupported loss function {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    fn single_shot_setup(adjuster: &mut BundleAdjuster, fix_point: bool) {
        let camera = Camera::perspective("cam", 0.9);
        let cam_id = "cam".to_string();
        adjuster.add_camera(&cam_id, &camera, &camera, true);

        let identity = Pose::identity();
        let rc_id = "rc".to_string();
        adjuster.add_rig_camera(&rc_id, &identity, &identity, true);

        let ri_id = "ri".to_string();
        let shot_cameras: HashMap<ShotId, CameraId> =
            [("shot".to_string(), cam_id.clone())].into();
        let shot_rig_cameras: HashMap<ShotId, RigCameraId> =
            [("shot".to_string(), rc_id.clone())].into();
        adjuster.add_rig_instance(&ri_id, &identity, &shot_cameras, &shot_rig_cameras, true);

        adjuster.add_point("pt", Vec3::new(0.0, 0.0, 2.0), fix_point);
    }

    #[test]
    fn fully_fixed_problem_returns_inputs() {
        let mut adjuster = BundleAdjuster::new();
        single_shot_setup(&mut adjuster, true);
        adjuster.add_point_projection_observation(
            &"shot".to_string(),
            "pt",
            Vec2::new(0.0, 0.0),
            0.004,
            None,
        );
        adjuster.run().unwrap();

        let point = adjuster.get_point("pt").unwrap();
        assert_eq!(point.position, Vec3::new(0.0, 0.0, 2.0));
        assert!(point.reprojection_errors.contains_key("shot"));
        assert!(adjuster.brief_report().contains("parameter blocks"));
    }

    #[test]
    fn free_point_moves_toward_observations() {
        let mut adjuster = BundleAdjuster::new();
        single_shot_setup(&mut adjuster, false);

        // Second shot offset along x so the point is constrained in 3D.
        let identity = Pose::identity();
        let rc2 = "rc2".to_string();
        let offset = Pose::from_parts(UnitQuaternion::identity(), Vec3::new(-0.5, 0.0, 0.0));
        adjuster.add_rig_camera(&rc2, &offset, &offset, true);
        let ri2 = "ri2".to_string();
        let shot_cameras: HashMap<ShotId, CameraId> =
            [("shot2".to_string(), "cam".to_string())].into();
        let shot_rig_cameras: HashMap<ShotId, RigCameraId> =
            [("shot2".to_string(), rc2.clone())].into();
        adjuster.add_rig_instance(&ri2, &identity, &shot_cameras, &shot_rig_cameras, true);

        // Observations of a ground-truth point at (0.1, 0, 2); the initial
        // point estimate is offset.
        let truth = Vec3::new(0.1, 0.0, 2.0);
        let camera = Camera::perspective("cam", 0.9);
        let uv1 = camera.project(&truth).unwrap();
        let uv2 = camera.project(&(truth + Vec3::new(-0.5, 0.0, 0.0))).unwrap();
        adjuster.add_point_projection_observation(&"shot".to_string(), "pt", uv1, 0.004, None);
        adjuster.add_point_projection_observation(&"shot2".to_string(), "pt", uv2, 0.004, None);

        adjuster.run().unwrap();
        let point = adjuster.get_point("pt").unwrap();
        assert!(
            (point.position - truth).norm() < 1e-4,
            "triangulated point off: {}",
            point.position
        );
    }

    #[test]
    fn unknown_loss_function_fails_at_run() {
        let mut adjuster = BundleAdjuster::new();
        single_shot_setup(&mut adjuster, true);
        adjuster.set_point_projection_loss_function("SoftLOneLoss", 1.0);
        assert!(adjuster.run().is_err());
    }
}
