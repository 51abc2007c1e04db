use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{anyhow, ensure, Result};
use log::debug;
use nalgebra::DVector;
use tiny_solver::factors::Factor;
use tiny_solver::loss_functions::{ArctanLoss, CauchyLoss, HuberLoss, Loss};
use tiny_solver::manifold::se3::SE3Manifold;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::{linear::sparse::LinearSolverType, LevenbergMarquardtOptimizer};

use super::{LinearStrategy, OptimBackend, Solution, SolveOptions};
use crate::factors::evaluate;
use crate::ir::{FactorKind, ManifoldKind, ProblemIR, RobustLoss};

/// tiny-solver backend adapter.
#[derive(Debug, Clone, Copy)]
pub struct TinySolverBackend;

impl TinySolverBackend {
    fn compile(&self, ir: &ProblemIR, initial: &HashMap<String, DVector<f64>>) -> Result<Problem> {
        ir.validate()?;

        let mut problem = Problem::new();

        for param in &ir.params {
            let init = initial.get(&param.name).ok_or_else(|| {
                anyhow!(
                    "initial values missing parameter {} (id {:?})",
                    param.name,
                    param.id
                )
            })?;
            ensure!(
                init.len() == param.dim,
                "initial dimension mismatch for {}: expected {}, got {}",
                param.name,
                param.dim,
                init.len()
            );

            if let (ManifoldKind::SE3, false) = (param.manifold, param.fixed) {
                problem.set_variable_manifold(&param.name, Arc::new(SE3Manifold));
            }
            if param.fixed {
                // Fully fixed blocks get per-index ambient fixing and no
                // manifold, so the solver treats them as constants.
                for idx in 0..param.dim {
                    problem.fix_variable(&param.name, idx);
                }
            }
        }

        for residual in &ir.residuals {
            let loss = compile_loss(residual.loss)?;
            let factor = IrFactor {
                kind: residual.factor.clone(),
            };
            let param_names: Vec<String> = residual
                .params
                .iter()
                .map(|id| ir.params[id.0].name.clone())
                .collect();
            let param_refs: Vec<&str> = param_names.iter().map(|s| s.as_str()).collect();
            problem.add_residual_block(
                residual.factor.residual_dim(),
                &param_refs,
                Box::new(factor),
                loss,
            );
        }

        Ok(problem)
    }
}

impl OptimBackend for TinySolverBackend {
    fn solve(
        &self,
        ir: &ProblemIR,
        initial: &HashMap<String, DVector<f64>>,
        opts: &SolveOptions,
    ) -> Result<Solution> {
        let problem = self.compile(ir, initial)?;

        if opts.analytic_derivatives {
            debug!("analytic derivatives requested; tiny-solver differentiates automatically");
        }
        if opts.num_threads > 1 {
            debug!(
                "worker thread count {} is managed internally by the solver",
                opts.num_threads
            );
        }

        // Only blocks referenced by a residual exist inside the solver.
        let referenced: HashSet<&str> = ir
            .residuals
            .iter()
            .flat_map(|r| r.params.iter())
            .map(|id| ir.params[id.0].name.as_str())
            .collect();
        let active: HashMap<String, DVector<f64>> = initial
            .iter()
            .filter(|(name, _)| referenced.contains(name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let initial_cost = cost(&problem, &active);

        let mut params = initial.clone();
        let final_cost = if ir.is_fully_fixed() {
            debug!("all parameter blocks fixed; skipping optimizer run");
            initial_cost
        } else {
            let optimizer = LevenbergMarquardtOptimizer::default();
            let options = to_optimizer_options(opts);
            let solution = optimizer
                .optimize(&problem, &active, Some(options))
                .ok_or_else(|| anyhow!("tiny-solver failed to produce a solution"))?;
            let final_cost = cost(&problem, &solution);
            params.extend(solution);
            final_cost
        };

        Ok(Solution {
            params,
            initial_cost,
            final_cost,
        })
    }
}

fn cost(problem: &Problem, params: &HashMap<String, DVector<f64>>) -> f64 {
    let param_blocks = problem.initialize_parameter_blocks(params);
    let residuals = problem.compute_residuals(&param_blocks, true);
    0.5 * residuals.as_ref().squared_norm_l2()
}

fn to_optimizer_options(opts: &SolveOptions) -> OptimizerOptions {
    let mut options = OptimizerOptions {
        max_iteration: opts.max_iterations,
        verbosity_level: opts.verbosity,
        ..OptimizerOptions::default()
    };
    options.linear_solver_type = match opts.linear_strategy {
        LinearStrategy::SparseSchur | LinearStrategy::DenseSchur => {
            LinearSolverType::SparseCholesky
        }
        LinearStrategy::DenseQr => LinearSolverType::SparseQR,
    };
    options
}

fn compile_loss(loss: RobustLoss) -> Result<Option<Box<dyn Loss + Send>>> {
    match loss {
        RobustLoss::None => Ok(None),
        RobustLoss::Huber { scale } => {
            ensure!(scale > 0.0, "Huber scale must be positive");
            Ok(Some(Box::new(HuberLoss::new(scale))))
        }
        RobustLoss::Cauchy { scale } => {
            ensure!(scale > 0.0, "Cauchy scale must be positive");
            Ok(Some(Box::new(CauchyLoss::new(scale))))
        }
        RobustLoss::Arctan { scale } => {
            ensure!(scale > 0.0, "Arctan scale must be positive");
            Ok(Some(Box::new(ArctanLoss::new(scale))))
        }
    }
}

#[derive(Debug, Clone)]
struct IrFactor {
    kind: FactorKind,
}

impl<T: nalgebra::RealField> Factor<T> for IrFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        evaluate(&self.kind, params)
    }
}
