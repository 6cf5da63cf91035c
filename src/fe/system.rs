use super::{
  assemble::{fix_dofs_coeff, GalMat, GalVec},
  DofIdx,
};
use crate::Result;

use common::linalg::{
  nalgebra::{CsrMatrix, Vector},
  LinalgError,
};
use itertools::Itertools;

/// A Galerkin system with essential dofs eliminated.
///
/// The essential rows and columns are replaced by identity rows, which keeps
/// the matrix symmetric positive definite.
#[derive(Debug, Clone)]
pub struct LinearSystem {
  pub matrix: CsrMatrix,
  pub rhs: Vector,
  /// Initial guess on input of the solver, solution on output.
  pub solution: Vector,
  ess_coeffs: Vec<(DofIdx, f64)>,
}

impl LinearSystem {
  pub fn ndofs(&self) -> usize {
    self.rhs.len()
  }
  pub fn ess_coeffs(&self) -> &[(DofIdx, f64)] {
    &self.ess_coeffs
  }

  /// Writes the solution into `x`, with the essential dofs taking exactly
  /// their prescribed values.
  pub fn recover_fem_solution(&self, x: &mut Vector) -> Result<()> {
    if x.len() != self.ndofs() {
      return Err(
        LinalgError::DimensionMismatch {
          expected: self.ndofs(),
          found: x.len(),
        }
        .into(),
      );
    }
    x.copy_from(&self.solution);
    for &(idof, value) in &self.ess_coeffs {
      x[idof] = value;
    }
    Ok(())
  }
}

/// Eliminates the essential dofs of `galmat`, taking their values from `x`.
///
/// `ess_dofs` may be unsorted and contain duplicates.
pub fn form_linear_system(
  galmat: &GalMat,
  ess_dofs: &[DofIdx],
  x: &Vector,
  b: &GalVec,
) -> Result<LinearSystem> {
  let ndofs = galmat.nrows();
  if galmat.ncols() != ndofs {
    return Err(
      LinalgError::NotSquare {
        nrows: ndofs,
        ncols: galmat.ncols(),
      }
      .into(),
    );
  }
  for len in [x.len(), b.len()] {
    if len != ndofs {
      return Err(
        LinalgError::DimensionMismatch {
          expected: ndofs,
          found: len,
        }
        .into(),
      );
    }
  }
  if let Some(&idof) = ess_dofs.iter().find(|&&idof| idof >= ndofs) {
    return Err(
      LinalgError::DimensionMismatch {
        expected: ndofs,
        found: idof,
      }
      .into(),
    );
  }

  let ess_coeffs = ess_dofs
    .iter()
    .copied()
    .sorted_unstable()
    .dedup()
    .map(|idof| (idof, x[idof]))
    .collect_vec();

  let mut galmat = galmat.clone();
  let mut rhs = b.clone();
  fix_dofs_coeff(&ess_coeffs, &mut galmat, &mut rhs);

  let mut solution = x.clone();
  for &(idof, value) in &ess_coeffs {
    solution[idof] = value;
  }

  Ok(LinearSystem {
    matrix: CsrMatrix::from(&galmat),
    rhs,
    solution,
    ess_coeffs,
  })
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    fe::{assemble::assemble_galmat, operators::LaplaceBeltramiElmat},
    mesh::ParMesh,
  };

  use manifold::gen::cartesian::CartesianMeshInfo;

  #[test]
  fn eliminated_system_keeps_prescribed_values() {
    let mesh = ParMesh::serial(CartesianMeshInfo::new_unit(2, 2).compute_mesh());
    let galmat = assemble_galmat(&mesh, LaplaceBeltramiElmat).unwrap();
    let n = galmat.nrows();
    let mut x = Vector::zeros(n);
    x[4] = 3.0;
    let b = Vector::from_element(n, 1.0);

    let system = form_linear_system(&galmat, &[4, 0, 4], &x, &b).unwrap();
    assert_eq!(system.ess_coeffs(), &[(0, 0.0), (4, 3.0)]);
    assert_eq!(system.rhs[4], 3.0);
    assert_eq!(system.rhs[0], 0.0);

    // any solver output is overridden on the essential dofs
    let mut system = system;
    system.solution.fill(7.0);
    let mut recovered = Vector::zeros(n);
    system.recover_fem_solution(&mut recovered).unwrap();
    assert_eq!(recovered[4], 3.0);
    assert_eq!(recovered[0], 0.0);
    assert_eq!(recovered[1], 7.0);
  }

  #[test]
  fn dimension_checks() {
    let mesh = ParMesh::serial(CartesianMeshInfo::new_unit(2, 1).compute_mesh());
    let galmat = assemble_galmat(&mesh, LaplaceBeltramiElmat).unwrap();
    let n = galmat.nrows();
    let x = Vector::zeros(n);
    assert!(form_linear_system(&galmat, &[], &x, &Vector::zeros(n + 1)).is_err());
    assert!(form_linear_system(&galmat, &[n], &x, &x).is_err());
  }
}
