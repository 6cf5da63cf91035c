pub mod amg;
pub mod faer;
pub mod krylov;
pub mod nalgebra;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinalgError {
  #[error("sparse cholesky factorization failed: matrix is not symmetric positive definite")]
  Cholesky,
  #[error("matrix is not square ({nrows}x{ncols})")]
  NotSquare { nrows: usize, ncols: usize },
  #[error("vanishing diagonal entry at row {row}")]
  ZeroDiagonal { row: usize },
  #[error("dimension mismatch: expected {expected}, got {found}")]
  DimensionMismatch { expected: usize, found: usize },
}

pub fn assert_mat_eq(a: &na::DMatrix<f64>, b: &na::DMatrix<f64>) {
  const TOL: f64 = 10e-12;
  let diff = a - b;
  let error = diff.norm();
  let equal = error <= TOL;
  if !equal {
    println!("Matrix a={a:.3}");
    println!("Matrix b={b:.3}");
    println!("a-b={diff:.3}");
    panic!("Matrices not equal.");
  }
}
