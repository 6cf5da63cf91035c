//! Configuration and driver of the iterative linear solver.

use crate::{fe::system::LinearSystem, Error, Result};

pub use common::linalg::krylov::PcgReport as SolveReport;
use common::linalg::{
  amg::{AmgOptions, AmgPreconditioner},
  krylov::{pcg, IdentityPreconditioner, JacobiPreconditioner},
};

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreconditionerKind {
  None,
  Jacobi,
  #[default]
  Amg,
}

/// What happens when the solver stops without reaching the tolerance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConvergencePolicy {
  /// Log a warning and continue with the last iterate.
  #[default]
  Warn,
  /// Fail with [`Error::NotConverged`].
  Require,
}

#[derive(Debug, Clone)]
pub struct SolverOptions {
  pub rel_tol: f64,
  pub max_iter: usize,
  pub preconditioner: PreconditionerKind,
  pub convergence: ConvergencePolicy,
  pub amg: AmgOptions,
}

impl Default for SolverOptions {
  fn default() -> Self {
    Self {
      rel_tol: 1e-14,
      max_iter: 200,
      preconditioner: PreconditionerKind::default(),
      convergence: ConvergencePolicy::default(),
      amg: AmgOptions::default(),
    }
  }
}

impl SolverOptions {
  pub fn with_rel_tol(mut self, rel_tol: f64) -> Self {
    self.rel_tol = rel_tol;
    self
  }
  pub fn with_max_iter(mut self, max_iter: usize) -> Self {
    self.max_iter = max_iter;
    self
  }
  pub fn with_preconditioner(mut self, preconditioner: PreconditionerKind) -> Self {
    self.preconditioner = preconditioner;
    self
  }
  pub fn with_convergence(mut self, convergence: ConvergencePolicy) -> Self {
    self.convergence = convergence;
    self
  }
  pub fn with_amg(mut self, amg: AmgOptions) -> Self {
    self.amg = amg;
    self
  }
}

/// Runs PCG on the system, leaving the last iterate in `system.solution`.
pub fn solve_linear_system(
  system: &mut LinearSystem,
  options: &SolverOptions,
) -> Result<SolveReport> {
  let LinearSystem {
    matrix,
    rhs,
    solution,
    ..
  } = system;
  let (rel_tol, max_iter) = (options.rel_tol, options.max_iter);

  let report = match options.preconditioner {
    PreconditionerKind::None => {
      pcg(matrix, rhs, solution, &IdentityPreconditioner, rel_tol, max_iter)?
    }
    PreconditionerKind::Jacobi => {
      let precond = JacobiPreconditioner::new(matrix)?;
      pcg(matrix, rhs, solution, &precond, rel_tol, max_iter)?
    }
    PreconditionerKind::Amg => {
      let precond = AmgPreconditioner::new(matrix, &options.amg)?;
      pcg(matrix, rhs, solution, &precond, rel_tol, max_iter)?
    }
  };

  info!(
    iterations = report.iterations,
    initial_residual = report.initial_residual,
    final_residual = report.final_residual,
    converged = report.converged,
    "pcg finished"
  );
  if !report.converged {
    match options.convergence {
      ConvergencePolicy::Warn => warn!(
        "pcg did not reach the tolerance {rel_tol:e} within {max_iter} iterations (residual {:e})",
        report.final_residual
      ),
      ConvergencePolicy::Require => {
        return Err(Error::NotConverged {
          iterations: report.iterations,
          residual: report.final_residual,
        })
      }
    }
  }
  Ok(report)
}
