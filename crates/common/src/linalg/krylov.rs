//! Preconditioned conjugate gradient method for sparse SPD systems.

use super::{
  nalgebra::{CsrMatrix, CsrMatrixExt, Vector},
  LinalgError,
};

use tracing::trace;

/// Approximate inverse $B approx A^(-1)$ applied to residuals.
///
/// For use inside of PCG the action must be symmetric positive definite.
pub trait Preconditioner {
  fn apply(&self, residual: &Vector) -> Vector;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityPreconditioner;
impl Preconditioner for IdentityPreconditioner {
  fn apply(&self, residual: &Vector) -> Vector {
    residual.clone()
  }
}

#[derive(Debug, Clone)]
pub struct JacobiPreconditioner {
  inv_diag: Vector,
}
impl JacobiPreconditioner {
  pub fn new(matrix: &CsrMatrix) -> Result<Self, LinalgError> {
    let diag = matrix.diagonal();
    if let Some(row) = diag.iter().position(|&d| d == 0.0) {
      return Err(LinalgError::ZeroDiagonal { row });
    }
    Ok(Self {
      inv_diag: diag.map(f64::recip),
    })
  }
}
impl Preconditioner for JacobiPreconditioner {
  fn apply(&self, residual: &Vector) -> Vector {
    residual.component_mul(&self.inv_diag)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcgReport {
  pub iterations: usize,
  pub initial_residual: f64,
  pub final_residual: f64,
  pub converged: bool,
}

/// Solves $A x = b$ starting from the initial guess in `x`.
///
/// Stops once $norm(r_k) <= "rel_tol" dot norm(b)$ or after `max_iter` iterations.
/// A zero right-hand side yields the zero solution without iterating.
pub fn pcg(
  matrix: &CsrMatrix,
  rhs: &Vector,
  x: &mut Vector,
  precond: &impl Preconditioner,
  rel_tol: f64,
  max_iter: usize,
) -> Result<PcgReport, LinalgError> {
  let n = matrix.nrows();
  if matrix.ncols() != n {
    return Err(LinalgError::NotSquare {
      nrows: n,
      ncols: matrix.ncols(),
    });
  }
  for len in [rhs.len(), x.len()] {
    if len != n {
      return Err(LinalgError::DimensionMismatch {
        expected: n,
        found: len,
      });
    }
  }

  let rhs_norm = rhs.norm();
  if rhs_norm == 0.0 {
    x.fill(0.0);
    return Ok(PcgReport {
      iterations: 0,
      initial_residual: 0.0,
      final_residual: 0.0,
      converged: true,
    });
  }
  let threshold = rel_tol * rhs_norm;

  let mut r = rhs - matrix * &*x;
  let initial_residual = r.norm();
  let mut residual = initial_residual;
  if residual <= threshold {
    return Ok(PcgReport {
      iterations: 0,
      initial_residual,
      final_residual: residual,
      converged: true,
    });
  }

  let mut z = precond.apply(&r);
  let mut p = z.clone();
  let mut rz = r.dot(&z);

  for iter in 1..=max_iter {
    let ap = matrix * &p;
    let pap = p.dot(&ap);
    if pap <= 0.0 || !pap.is_finite() {
      trace!("pcg breakdown in iteration {iter}: (p, Ap) = {pap:e}");
      return Ok(PcgReport {
        iterations: iter - 1,
        initial_residual,
        final_residual: residual,
        converged: false,
      });
    }
    let alpha = rz / pap;
    x.axpy(alpha, &p, 1.0);
    r.axpy(-alpha, &ap, 1.0);

    residual = r.norm();
    trace!("pcg iteration {iter}: |r| = {residual:e}");
    if residual <= threshold {
      return Ok(PcgReport {
        iterations: iter,
        initial_residual,
        final_residual: residual,
        converged: true,
      });
    }

    z = precond.apply(&r);
    let rz_next = r.dot(&z);
    let beta = rz_next / rz;
    rz = rz_next;
    p.axpy(1.0, &z, beta);
  }

  Ok(PcgReport {
    iterations: max_iter,
    initial_residual,
    final_residual: residual,
    converged: false,
  })
}
