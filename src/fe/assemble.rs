use super::{
  operators::{scalar_mass, ElMatProvider, ElVecProvider},
  DofIdx,
};
use crate::{
  mesh::ParMesh,
  parallel::CommunicatorExt,
  Error, Result,
};

use common::{
  linalg::nalgebra::{CooMatrix, CooMatrixExt, CsrMatrix, Vector},
  util,
};
use manifold::{geometry::coord::simplex::SimplexCoords, Attribute};
use rayon::prelude::*;
use tracing::debug;

pub type GalMat = CooMatrix;
pub type GalVec = Vector;

/// Assembly algorithm for the Galerkin Matrix.
///
/// Every rank computes the element matrices of its owned cells. The triplets
/// are gathered in rank order, so all ranks end up with the same matrix.
/// Collective.
pub fn assemble_galmat(mesh: &ParMesh, elmat: impl ElMatProvider + Sync) -> Result<GalMat> {
  let row_grade = elmat.row_grade();
  let col_grade = elmat.col_grade();

  let complex = mesh.mesh().complex();
  let nsimps_row = complex.nsimplicies(row_grade);
  let nsimps_col = complex.nsimplicies(col_grade);

  let local_triplets: Vec<(usize, usize, f64)> = mesh
    .owned_cells()
    .into_par_iter()
    .flat_map_iter(|icell| {
      let coords = mesh.mesh().cell_coords(icell);
      let elmat = elmat.eval(icell, &coords);

      let row_subs = complex.cell_subsimps(icell, row_grade);
      let col_subs = complex.cell_subsimps(icell, col_grade);

      let mut local_triplets = Vec::new();
      for (ilocal, &iglobal) in row_subs.iter().enumerate() {
        for (jlocal, &jglobal) in col_subs.iter().enumerate() {
          let val = elmat[(ilocal, jlocal)];
          if val != 0.0 {
            local_triplets.push((iglobal, jglobal, val));
          }
        }
      }
      local_triplets
    })
    .collect();

  let gathered = mesh.comm().all_gather("assemble_galmat", local_triplets)?;

  let mut galmat = GalMat::new(nsimps_row, nsimps_col);
  for (r, c, v) in gathered.into_iter().flatten() {
    galmat.push(r, c, v);
  }
  debug!(
    nrows = nsimps_row,
    ncols = nsimps_col,
    nnz = galmat.nnz(),
    "assembled galerkin matrix"
  );
  Ok(galmat)
}

/// Adds $integral_Gamma alpha u q dif s$ to the H1 Galerkin matrix `galmat`.
///
/// $Gamma$ are the facets tagged with one of `markers`, `weight` gives the
/// value of $alpha$ on a facet. Collective.
pub fn assemble_boundary_mass(
  mesh: &ParMesh,
  markers: &[Attribute],
  weight: impl Fn(&SimplexCoords) -> f64,
  galmat: &mut GalMat,
) -> Result<()> {
  let complex = mesh.mesh().complex();
  let nvertices = complex.nvertices();
  if galmat.nrows() != nvertices || galmat.ncols() != nvertices {
    return Err(Error::SpaceMismatch(format!(
      "boundary mass needs a {nvertices}x{nvertices} matrix, got {}x{}",
      galmat.nrows(),
      galmat.ncols()
    )));
  }
  let facet_dim = mesh.dim() - 1;

  let mut local_triplets = Vec::new();
  for facet in mesh.owned_boundary_facets_with(markers) {
    let simplex = complex.simplex(facet_dim, facet);
    let coords = mesh.mesh().simplex_coords(facet_dim, facet);
    let elmat = scalar_mass(&coords) * weight(&coords);
    for (ilocal, &iglobal) in simplex.iter().enumerate() {
      for (jlocal, &jglobal) in simplex.iter().enumerate() {
        local_triplets.push((iglobal, jglobal, elmat[(ilocal, jlocal)]));
      }
    }
  }

  let gathered = mesh.comm().all_gather("assemble_boundary_mass", local_triplets)?;
  let mut nfacet_entries = 0;
  for (r, c, v) in gathered.into_iter().flatten() {
    galmat.push(r, c, v);
    nfacet_entries += 1;
  }
  debug!(?markers, nfacet_entries, "assembled boundary mass");
  Ok(())
}

/// Assembly algorithm for the Galerkin Vector. Collective.
pub fn assemble_galvec(mesh: &ParMesh, elvec: impl ElVecProvider + Sync) -> Result<GalVec> {
  let grade = elvec.grade();
  let complex = mesh.mesh().complex();
  let nsimps = complex.nsimplicies(grade);

  let local_entries: Vec<(usize, f64)> = mesh
    .owned_cells()
    .into_par_iter()
    .flat_map_iter(|icell| {
      let coords = mesh.mesh().cell_coords(icell);
      let elvec = elvec.eval(icell, &coords);
      let subs = complex.cell_subsimps(icell, grade);

      let mut local_entries = Vec::new();
      for (ilocal, &iglobal) in subs.iter().enumerate() {
        if elvec[ilocal] != 0.0 {
          local_entries.push((iglobal, elvec[ilocal]));
        }
      }
      local_entries
    })
    .collect();

  let gathered = mesh.comm().all_gather("assemble_galvec", local_entries)?;

  let mut galvec = GalVec::zeros(nsimps);
  for (irow, val) in gathered.into_iter().flatten() {
    galvec[irow] += val;
  }
  Ok(galvec)
}

/// Fix DOFs of FE solution.
///
/// Modifies supplied galerkin matrix and galerkin vector,
/// such that the FE solution has the given coefficents on the dofs.
/// $mat(A_0, 0; 0, I) vec(mu_0, mu_diff) = vec(phi - A_(0 diff) gamma, gamma)$
pub fn fix_dofs_coeff(dof_coeffs: &[(DofIdx, f64)], galmat: &mut GalMat, galvec: &mut GalVec) {
  let ndofs = galmat.nrows();

  let dof_coeffs_opt = util::sparse_to_dense_data(dof_coeffs.to_vec(), ndofs);
  let dof_coeffs_zeroed =
    Vector::from_iterator(ndofs, dof_coeffs_opt.iter().map(|v| v.unwrap_or(0.0)));

  // Modify galvec.
  let galmat_csr = CsrMatrix::from(&*galmat);
  *galvec -= galmat_csr * dof_coeffs_zeroed;

  // Set galvec to prescribed coefficents.
  dof_coeffs.iter().for_each(|&(i, v)| galvec[i] = v);

  // Set entires zero that share a (row or column) index with a fixed dof.
  galmat.set_zero(|r, c| dof_coeffs_opt[r].is_some() || dof_coeffs_opt[c].is_some());

  // Set galmat diagonal for dofs to one.
  for &(i, _) in dof_coeffs {
    galmat.push(i, i, 1.0);
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    fe::operators::{LaplaceBeltramiElmat, ScalarMassElmat, WeakDivergenceElmat},
    parallel::ThreadComm,
  };

  use approx::assert_relative_eq;
  use manifold::gen::cartesian::CartesianMeshInfo;
  use std::sync::Arc;

  #[test]
  fn mass_sums_to_volume() {
    let mesh = ParMesh::serial(CartesianMeshInfo::new_unit(3, 2).compute_mesh());
    let mass = assemble_galmat(&mesh, ScalarMassElmat).unwrap().to_csr();
    let ones = Vector::from_element(mass.ncols(), 1.0);
    assert_relative_eq!((&mass * &ones).sum(), 1.0, epsilon = 1e-12);
  }

  #[test]
  fn laplacian_annihilates_constants() {
    let mesh = ParMesh::serial(CartesianMeshInfo::new_unit(2, 3).compute_mesh());
    let laplace = assemble_galmat(&mesh, LaplaceBeltramiElmat).unwrap().to_csr();
    let ones = Vector::from_element(laplace.ncols(), 1.0);
    assert!((&laplace * &ones).norm() < 1e-12);

    let weakdiv = assemble_galmat(&mesh, WeakDivergenceElmat).unwrap();
    assert_eq!(weakdiv.nrows(), mesh.mesh().complex().nvertices());
    assert_eq!(weakdiv.ncols(), mesh.mesh().complex().nedges());
  }

  #[test]
  fn distributed_assembly_matches_serial() {
    let mesh = CartesianMeshInfo::new_unit(3, 2).compute_mesh();
    let serial = assemble_galmat(&ParMesh::serial(mesh.clone()), LaplaceBeltramiElmat)
      .unwrap()
      .to_csr();
    let distributed = ThreadComm::run(3, |comm| {
      let pmesh = ParMesh::new(mesh.clone(), Arc::new(comm));
      assemble_galmat(&pmesh, LaplaceBeltramiElmat).unwrap().to_csr()
    });
    let x = Vector::from_fn(serial.ncols(), |i, _| (i as f64).sin());
    for matrix in distributed {
      assert!((&matrix * &x - &serial * &x).norm() < 1e-12);
    }
  }

  #[test]
  fn boundary_mass_sums_to_weighted_length() {
    let mesh = ParMesh::serial(CartesianMeshInfo::new_unit(2, 3).compute_mesh());
    let mut galmat = GalMat::new(16, 16);
    // right and top side
    assemble_boundary_mass(&mesh, &[2, 4], |_| 3.0, &mut galmat).unwrap();
    let csr = galmat.to_csr();
    let ones = Vector::from_element(16, 1.0);
    assert_relative_eq!((&csr * &ones).sum(), 6.0, epsilon = 1e-12);

    let mut wrong = GalMat::new(3, 3);
    assert!(assemble_boundary_mass(&mesh, &[1], |_| 1.0, &mut wrong).is_err());
  }

  #[test]
  fn fixed_dofs_take_prescribed_values() {
    let mesh = ParMesh::serial(CartesianMeshInfo::new_unit(2, 2).compute_mesh());
    let mut galmat = assemble_galmat(&mesh, LaplaceBeltramiElmat).unwrap();
    let mut galvec = GalVec::zeros(galmat.nrows());
    fix_dofs_coeff(&[(0, 2.0), (8, -1.0)], &mut galmat, &mut galvec);

    let csr = galmat.to_csr();
    assert_eq!(galvec[0], 2.0);
    assert_eq!(galvec[8], -1.0);
    assert_eq!(csr.get_entry(0, 0).unwrap().into_value(), 1.0);
    let row = csr.row(0);
    assert_eq!(row.nnz(), 1);
  }
}
