//! Backend adapters that compile the IR into solver-specific problems.
//!
//! Backends translate the IR into solver-native residual graphs, apply
//! manifolds and fixed parameters, and return a solved parameter map.

mod tiny;

use std::collections::HashMap;

use anyhow::Result;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::ir::ProblemIR;

pub use tiny::TinySolverBackend;

/// Linear solver strategy requested by the orchestration layer.
///
/// Adapters map these onto the factorizations their solver supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearStrategy {
    /// Schur-complement style elimination for large sparse problems.
    SparseSchur,
    /// Dense elimination for small windowed problems.
    DenseSchur,
    /// Dense QR for small pose-only problems.
    DenseQr,
}

/// Backend-agnostic solver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOptions {
    /// Iteration cap; the sole stopping control exposed to callers.
    pub max_iterations: usize,
    /// Solver-internal worker threads; opaque to the orchestration layer.
    pub num_threads: usize,
    /// Linear solver strategy.
    pub linear_strategy: LinearStrategy,
    /// Verbosity level (backend-specific).
    pub verbosity: usize,
    /// Prefer analytic derivatives where the backend offers them.
    pub analytic_derivatives: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            num_threads: 1,
            linear_strategy: LinearStrategy::SparseSchur,
            verbosity: 0,
            analytic_derivatives: false,
        }
    }
}

/// Solver output from a backend.
///
/// `params` covers every IR parameter block: solved values for blocks the
/// optimizer touched, initial values for the rest.
#[derive(Debug, Clone)]
pub struct Solution {
    pub params: HashMap<String, DVector<f64>>,
    pub initial_cost: f64,
    pub final_cost: f64,
}

/// Backend interface implemented by solver adapters.
pub trait OptimBackend {
    /// Solve a compiled IR with the provided initial parameters.
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &SolveOptions,
    ) -> Result<Solution>;
}

/// Supported solver backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// tiny-solver Levenberg-Marquardt backend.
    TinySolver,
}

/// Solve a problem using the selected backend.
pub fn solve_with_backend(
    backend: BackendKind,
    ir: &ProblemIR,
    initial: &HashMap<String, DVector<f64>>,
    opts: &SolveOptions,
) -> Result<Solution> {
    match backend {
        BackendKind::TinySolver => TinySolverBackend.solve(ir, initial, opts),
    }
}
