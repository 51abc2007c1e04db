//! Backend-independent intermediate representation of bundle problems.

mod types;

pub use types::{FactorKind, ManifoldKind, ParamBlock, ParamId, ProblemIR, ResidualBlock, RobustLoss};
