//! Smoothed aggregation algebraic multigrid.
//!
//! One symmetric V-cycle with damped Jacobi smoothing is used as preconditioner
//! for PCG. The coarsest level is solved directly with a sparse Cholesky factorization.

use super::{
  faer::FaerCholesky,
  krylov::Preconditioner,
  nalgebra::{CooMatrix, CsrMatrix, CsrMatrixExt, Vector},
  LinalgError,
};

use tracing::debug;

#[derive(Debug, Clone)]
pub struct AmgOptions {
  /// Connections with $abs(a_(i j)) >= theta sqrt(a_(i i) a_(j j))$ are strong.
  pub strength_threshold: f64,
  pub max_levels: usize,
  /// Levels with at most this many unknowns are solved directly.
  pub max_coarse_size: usize,
  pub presmooth: usize,
  pub postsmooth: usize,
  pub power_iterations: usize,
}
impl Default for AmgOptions {
  fn default() -> Self {
    Self {
      strength_threshold: 0.08,
      max_levels: 10,
      max_coarse_size: 40,
      presmooth: 2,
      postsmooth: 2,
      power_iterations: 20,
    }
  }
}

struct Level {
  matrix: CsrMatrix,
  inv_diag: Vector,
  omega: f64,
  prolongation: CsrMatrix,
  restriction: CsrMatrix,
}
impl Level {
  fn smooth(&self, x: &mut Vector, rhs: &Vector) {
    let residual = rhs - &self.matrix * &*x;
    x.axpy(self.omega, &residual.component_mul(&self.inv_diag), 1.0);
  }
}

pub struct AmgPreconditioner {
  levels: Vec<Level>,
  coarse: FaerCholesky,
  presmooth: usize,
  postsmooth: usize,
}

impl AmgPreconditioner {
  pub fn new(matrix: &CsrMatrix, options: &AmgOptions) -> Result<Self, LinalgError> {
    if matrix.nrows() != matrix.ncols() {
      return Err(LinalgError::NotSquare {
        nrows: matrix.nrows(),
        ncols: matrix.ncols(),
      });
    }

    let mut levels = Vec::new();
    let mut current = matrix.clone();
    while levels.len() + 1 < options.max_levels && current.nrows() > options.max_coarse_size {
      let diag = current.diagonal();
      if let Some(row) = diag.iter().position(|&d| d <= 0.0) {
        return Err(LinalgError::ZeroDiagonal { row });
      }
      let inv_diag = diag.map(f64::recip);

      let (aggregates, naggregates) = aggregate(&current, &diag, options.strength_threshold);
      if naggregates == 0 || naggregates >= current.nrows() {
        debug!("amg coarsening stalled at {} unknowns", current.nrows());
        break;
      }

      let rho = spectral_radius_estimate(&current, &inv_diag, options.power_iterations);
      let omega = 4.0 / (3.0 * rho);

      let tentative = tentative_prolongator(&aggregates, naggregates);
      let jacobi = current.scale_rows(&(omega * &inv_diag));
      let prolongation = &tentative - &(&jacobi * &tentative);
      let restriction = prolongation.transpose();

      let restricted = &restriction * &current;
      let coarse = &restricted * &prolongation;

      levels.push(Level {
        matrix: current,
        inv_diag,
        omega,
        prolongation,
        restriction,
      });
      current = coarse;
    }

    debug!(
      "amg hierarchy: {} levels, coarsest size {}",
      levels.len() + 1,
      current.nrows()
    );
    let coarse = FaerCholesky::new(current)?;

    Ok(Self {
      levels,
      coarse,
      presmooth: options.presmooth,
      postsmooth: options.postsmooth,
    })
  }

  pub fn nlevels(&self) -> usize {
    self.levels.len() + 1
  }

  fn vcycle(&self, ilevel: usize, rhs: &Vector) -> Vector {
    let Some(level) = self.levels.get(ilevel) else {
      return self.coarse.solve(rhs);
    };

    let mut x = Vector::zeros(rhs.len());
    for _ in 0..self.presmooth {
      level.smooth(&mut x, rhs);
    }

    let residual = rhs - &level.matrix * &x;
    let coarse_rhs = &level.restriction * &residual;
    let coarse_correction = self.vcycle(ilevel + 1, &coarse_rhs);
    x += &level.prolongation * &coarse_correction;

    for _ in 0..self.postsmooth {
      level.smooth(&mut x, rhs);
    }
    x
  }
}

impl Preconditioner for AmgPreconditioner {
  fn apply(&self, residual: &Vector) -> Vector {
    self.vcycle(0, residual)
  }
}

/// Greedy aggregation over the strong connection graph.
///
/// Returns the aggregate of every unknown and the number of aggregates.
fn aggregate(matrix: &CsrMatrix, diag: &Vector, theta: f64) -> (Vec<usize>, usize) {
  const UNASSIGNED: usize = usize::MAX;

  let n = matrix.nrows();
  let strong: Vec<Vec<usize>> = matrix
    .row_iter()
    .enumerate()
    .map(|(i, row)| {
      row
        .col_indices()
        .iter()
        .zip(row.values())
        .filter(|&(&j, &v)| j != i && v.abs() >= theta * (diag[i] * diag[j]).sqrt())
        .map(|(&j, _)| j)
        .collect()
    })
    .collect();

  let mut aggregates = vec![UNASSIGNED; n];
  let mut naggregates = 0;

  // Seed aggregates from nodes with a completely free neighborhood.
  for i in 0..n {
    if aggregates[i] != UNASSIGNED || strong[i].is_empty() {
      continue;
    }
    if strong[i].iter().all(|&j| aggregates[j] == UNASSIGNED) {
      aggregates[i] = naggregates;
      for &j in &strong[i] {
        aggregates[j] = naggregates;
      }
      naggregates += 1;
    }
  }

  // Attach leftovers to a neighboring aggregate.
  let seeded = aggregates.clone();
  for i in 0..n {
    if aggregates[i] != UNASSIGNED {
      continue;
    }
    if let Some(&j) = strong[i].iter().find(|&&j| seeded[j] != UNASSIGNED) {
      aggregates[i] = seeded[j];
    }
  }

  // Whatever is still free forms its own aggregates.
  for i in 0..n {
    if aggregates[i] != UNASSIGNED {
      continue;
    }
    aggregates[i] = naggregates;
    for &j in &strong[i] {
      if aggregates[j] == UNASSIGNED {
        aggregates[j] = naggregates;
      }
    }
    naggregates += 1;
  }

  (aggregates, naggregates)
}

fn tentative_prolongator(aggregates: &[usize], naggregates: usize) -> CsrMatrix {
  let mut coo = CooMatrix::new(aggregates.len(), naggregates);
  for (i, &agg) in aggregates.iter().enumerate() {
    coo.push(i, agg, 1.0);
  }
  CsrMatrix::from(&coo)
}

/// Estimates $rho(D^(-1) A)$ by power iteration with the $D$-weighted Rayleigh quotient.
fn spectral_radius_estimate(matrix: &CsrMatrix, inv_diag: &Vector, niterations: usize) -> f64 {
  let n = matrix.nrows();
  let mut v = Vector::from_fn(n, |i, _| 1.0 + ((i * 7919) % 13) as f64 / 13.0);
  let mut rho = 1.0;
  for _ in 0..niterations.max(1) {
    let av = matrix * &v;
    let vav = v.dot(&av);
    let vdv = v.component_div(inv_diag).dot(&v);
    if vdv > 0.0 && vav > 0.0 {
      rho = vav / vdv;
    }
    let next = av.component_mul(inv_diag);
    let norm = next.norm();
    if norm == 0.0 {
      break;
    }
    v = next / norm;
  }
  rho
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::linalg::krylov::{pcg, IdentityPreconditioner};

  use approx::assert_relative_eq;

  fn laplace_2d(m: usize) -> CsrMatrix {
    let n = m * m;
    let idx = |i: usize, j: usize| i * m + j;
    let mut coo = CooMatrix::new(n, n);
    for i in 0..m {
      for j in 0..m {
        coo.push(idx(i, j), idx(i, j), 4.0);
        if i + 1 < m {
          coo.push(idx(i, j), idx(i + 1, j), -1.0);
          coo.push(idx(i + 1, j), idx(i, j), -1.0);
        }
        if j + 1 < m {
          coo.push(idx(i, j), idx(i, j + 1), -1.0);
          coo.push(idx(i, j + 1), idx(i, j), -1.0);
        }
      }
    }
    CsrMatrix::from(&coo)
  }

  #[test]
  fn builds_multilevel_hierarchy() {
    let a = laplace_2d(24);
    let amg = AmgPreconditioner::new(&a, &AmgOptions::default()).unwrap();
    assert!(amg.nlevels() >= 2);
  }

  #[test]
  fn vcycle_is_symmetric() {
    let a = laplace_2d(16);
    let amg = AmgPreconditioner::new(&a, &AmgOptions::default()).unwrap();
    let n = a.nrows();
    let u = Vector::from_fn(n, |i, _| (i as f64 * 0.37).sin());
    let v = Vector::from_fn(n, |i, _| (i as f64 * 0.11).cos());
    let bu = amg.apply(&u);
    let bv = amg.apply(&v);
    assert_relative_eq!(bu.dot(&v), u.dot(&bv), max_relative = 1e-10);
  }

  #[test]
  fn amg_accelerates_cg() {
    let a = laplace_2d(32);
    let n = a.nrows();
    let b = Vector::from_element(n, 1.0);

    let mut x_plain = Vector::zeros(n);
    let plain = pcg(&a, &b, &mut x_plain, &IdentityPreconditioner, 1e-10, 1000).unwrap();

    let amg = AmgPreconditioner::new(&a, &AmgOptions::default()).unwrap();
    let mut x_amg = Vector::zeros(n);
    let accelerated = pcg(&a, &b, &mut x_amg, &amg, 1e-10, 1000).unwrap();

    assert!(plain.converged && accelerated.converged);
    assert!(accelerated.iterations < plain.iterations);
    assert_relative_eq!(x_amg, x_plain, epsilon = 1e-7);
  }

  #[test]
  fn small_systems_are_solved_directly() {
    let a = laplace_2d(4);
    let amg = AmgPreconditioner::new(&a, &AmgOptions::default()).unwrap();
    assert_eq!(amg.nlevels(), 1);
    let b = Vector::from_element(a.nrows(), 1.0);
    let x = amg.apply(&b);
    assert_relative_eq!(&a * &x, b, epsilon = 1e-12);
  }
}
