use anyhow::{ensure, Result};

/// Identifier for a parameter block in the IR.
///
/// Stable within one `ProblemIR` instance; residual blocks use it to
/// reference their parameter dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(pub usize);

/// Supported manifold types for parameter blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifoldKind {
    /// Standard Euclidean vector space.
    Euclidean,
    /// SE(3) pose stored as `[qx, qy, qz, qw, tx, ty, tz]`.
    SE3,
}

impl ManifoldKind {
    /// Returns `true` if the ambient dimension matches the manifold storage.
    pub fn compatible_dim(self, dim: usize) -> bool {
        match self {
            ManifoldKind::Euclidean => true,
            ManifoldKind::SE3 => dim == 7,
        }
    }
}

/// Robust loss applied to a residual block.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
    Cauchy {
        scale: f64,
    },
    Arctan {
        scale: f64,
    },
}

/// Backend-agnostic factor kinds.
///
/// Each factor kind implies its parameter layout and residual dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum FactorKind {
    /// Reprojection of a point through a rig chain.
    ///
    /// Parameters: [camera, rig_camera, rig_instance, point].
    /// Residual: `(project(cam_from_rig ∘ rig_from_world · p) - uv) / scale`.
    RigReprojection { uv: [f64; 2], scale: f64 },
    /// Camera-frame depth prior on an observation.
    ///
    /// Parameters: [rig_camera, rig_instance, point].
    PointDepthPrior { depth: f64, scale: f64 },
    /// Absolute position prior on a point.
    ///
    /// Parameters: [point]. The altitude row is dropped when the measured
    /// altitude is untrusted.
    PointPositionPrior {
        position: [f64; 3],
        sd: [f64; 3],
        has_altitude: bool,
    },
    /// Absolute position prior on a rig instance origin.
    ///
    /// Parameters: [rig_instance].
    InstancePositionPrior { position: [f64; 3], sd: [f64; 3] },
    /// Position prior on a rig instance origin through a bias similarity.
    ///
    /// Parameters: [rig_instance, bias].
    BiasedInstancePositionPrior { position: [f64; 3], sd: [f64; 3] },
    /// Soft prior aligning a shot's camera-frame up direction with a world
    /// up vector.
    ///
    /// Parameters: [rig_camera, rig_instance].
    AbsoluteUpVector { up: [f64; 3], sd: f64 },
    /// Regularization of free camera intrinsics toward their prior.
    ///
    /// Parameters: [camera].
    CameraPrior { prior: [f64; 5], sd: [f64; 5] },
    /// Regularization of a free rig camera offset toward its prior pose.
    ///
    /// Parameters: [rig_camera].
    RigCameraPrior {
        prior: [f64; 7],
        rotation_sd: f64,
        translation_sd: f64,
    },
}

impl FactorKind {
    /// Residual dimension implied by the factor.
    pub fn residual_dim(&self) -> usize {
        match self {
            FactorKind::RigReprojection { .. } => 2,
            FactorKind::PointDepthPrior { .. } => 1,
            FactorKind::PointPositionPrior { .. } => 3,
            FactorKind::InstancePositionPrior { .. } => 3,
            FactorKind::BiasedInstancePositionPrior { .. } => 3,
            FactorKind::AbsoluteUpVector { .. } => 3,
            FactorKind::CameraPrior { .. } => 5,
            FactorKind::RigCameraPrior { .. } => 6,
        }
    }

    /// Expected `(dim, manifold)` layout of the parameter blocks.
    fn param_layout(&self) -> &'static [(usize, ManifoldKind)] {
        use ManifoldKind::{Euclidean, SE3};
        match self {
            FactorKind::RigReprojection { .. } => {
                &[(5, Euclidean), (7, SE3), (7, SE3), (3, Euclidean)]
            }
            FactorKind::PointDepthPrior { .. } => &[(7, SE3), (7, SE3), (3, Euclidean)],
            FactorKind::PointPositionPrior { .. } => &[(3, Euclidean)],
            FactorKind::InstancePositionPrior { .. } => &[(7, SE3)],
            FactorKind::BiasedInstancePositionPrior { .. } => &[(7, SE3), (7, Euclidean)],
            FactorKind::AbsoluteUpVector { .. } => &[(7, SE3), (7, SE3)],
            FactorKind::CameraPrior { .. } => &[(5, Euclidean)],
            FactorKind::RigCameraPrior { .. } => &[(7, SE3)],
        }
    }
}

/// Parameter block definition in the IR.
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub id: ParamId,
    pub name: String,
    pub dim: usize,
    pub manifold: ManifoldKind,
    pub fixed: bool,
}

/// Residual block definition in the IR.
///
/// The order of `params` must match the factor's expected parameter order.
#[derive(Debug, Clone)]
pub struct ResidualBlock {
    pub params: Vec<ParamId>,
    pub loss: RobustLoss,
    pub factor: FactorKind,
}

/// Backend-agnostic bundle problem representation.
#[derive(Debug, Default, Clone)]
pub struct ProblemIR {
    pub params: Vec<ParamBlock>,
    pub residuals: Vec<ResidualBlock>,
}

impl ProblemIR {
    /// Creates an empty IR.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter block and returns its `ParamId`.
    pub fn add_param_block(
        &mut self,
        name: impl Into<String>,
        dim: usize,
        manifold: ManifoldKind,
        fixed: bool,
    ) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(ParamBlock {
            id,
            name: name.into(),
            dim,
            manifold,
            fixed,
        });
        id
    }

    /// Adds a residual block to the IR.
    pub fn add_residual_block(&mut self, residual: ResidualBlock) {
        self.residuals.push(residual);
    }

    /// Returns `true` if every parameter block is fixed.
    pub fn is_fully_fixed(&self) -> bool {
        self.params.iter().all(|p| p.fixed)
    }

    /// Validates internal consistency and factor parameter layouts.
    pub fn validate(&self) -> Result<()> {
        for (idx, param) in self.params.iter().enumerate() {
            ensure!(
                param.id.0 == idx,
                "param id mismatch: expected {}, got {:?}",
                idx,
                param.id
            );
            ensure!(
                param.manifold.compatible_dim(param.dim),
                "param {} manifold {:?} incompatible with dim {}",
                param.name,
                param.manifold,
                param.dim
            );
        }

        for (r_idx, residual) in self.residuals.iter().enumerate() {
            let layout = residual.factor.param_layout();
            ensure!(
                residual.params.len() == layout.len(),
                "residual {} expects {} params, got {}",
                r_idx,
                layout.len(),
                residual.params.len()
            );
            for (param_id, (dim, manifold)) in residual.params.iter().zip(layout) {
                ensure!(
                    param_id.0 < self.params.len(),
                    "residual {} references missing param {:?}",
                    r_idx,
                    param_id
                );
                let param = &self.params[param_id.0];
                ensure!(
                    param.dim == *dim && param.manifold == *manifold,
                    "residual {} param {} expects dim {} {:?}, got dim {} {:?}",
                    r_idx,
                    param.name,
                    dim,
                    manifold,
                    param.dim,
                    param.manifold
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_layout_mismatch() {
        let mut ir = ProblemIR::new();
        let cam = ir.add_param_block("cam/0", 5, ManifoldKind::Euclidean, true);
        let point = ir.add_param_block("point/0", 3, ManifoldKind::Euclidean, false);
        ir.add_residual_block(ResidualBlock {
            // rig chain params missing on purpose
            params: vec![cam, point],
            loss: RobustLoss::None,
            factor: FactorKind::RigReprojection {
                uv: [0.0, 0.0],
                scale: 1.0,
            },
        });
        assert!(ir.validate().is_err());
    }

    #[test]
    fn validate_accepts_full_rig_chain() {
        let mut ir = ProblemIR::new();
        let cam = ir.add_param_block("cam/0", 5, ManifoldKind::Euclidean, true);
        let rc = ir.add_param_block("rig_cam/0", 7, ManifoldKind::SE3, true);
        let ri = ir.add_param_block("rig_inst/0", 7, ManifoldKind::SE3, false);
        let point = ir.add_param_block("point/0", 3, ManifoldKind::Euclidean, false);
        ir.add_residual_block(ResidualBlock {
            params: vec![cam, rc, ri, point],
            loss: RobustLoss::Huber { scale: 1.0 },
            factor: FactorKind::RigReprojection {
                uv: [0.1, -0.2],
                scale: 0.004,
            },
        });
        assert!(ir.validate().is_ok());
        assert!(!ir.is_fully_fixed());
    }
}
