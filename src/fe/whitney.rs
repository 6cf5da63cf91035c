//! Whitney 1-forms and the discrete gradient.
//!
//! On a cell with sorted vertices the edge $e = [i, j]$, $i < j$, carries
//! $W_e = lambda_i dif lambda_j - lambda_j dif lambda_i$
//! and the dof of a field $u$ is the line integral $integral_e u dot t_e dif s$.

use super::space::{FeFamily, FeSpace};
use crate::{Error, Result};

use common::linalg::nalgebra::{CooMatrixExt, CsrMatrix, Matrix, Vector};
use manifold::{
  geometry::coord::{
    quadrature::QuadRule, simplex::SimplexCoords, BaryCoordRef, CoordRef,
  },
  topology::simplex::local_subsimplicies,
  Dim,
};

/// Local coboundary from vertices to edges, $D_(e i) = -1$ and $D_(e j) = 1$.
pub fn local_gradient_operator(dim: Dim) -> Matrix {
  let edges = local_subsimplicies(dim, 1);
  let mut mat = Matrix::zeros(edges.len(), dim + 1);
  for (iedge, edge) in edges.iter().enumerate() {
    mat[(iedge, edge[0])] = -1.0;
    mat[(iedge, edge[1])] = 1.0;
  }
  mat
}

/// Values of all local Whitney 1-forms at a point, one per column.
///
/// `difbarys` holds the barycentric differentials in its rows.
pub fn whitney_basis(difbarys: &Matrix, bary: BaryCoordRef) -> Matrix {
  let dim = difbarys.nrows() - 1;
  let edges = local_subsimplicies(dim, 1);
  let mut basis = Matrix::zeros(difbarys.ncols(), edges.len());
  for (iedge, edge) in edges.iter().enumerate() {
    let (i, j) = (edge[0], edge[1]);
    let value = bary[i] * difbarys.row(j) - bary[j] * difbarys.row(i);
    basis.set_column(iedge, &value.transpose());
  }
  basis
}

/// Tangential line integral of a vector field along an edge.
///
/// The edge is oriented from its first to its second vertex. Uses 3-point
/// Gauss-Legendre quadrature.
pub fn edge_moment<F>(f: F, edge: &SimplexCoords) -> f64
where
  F: Fn(CoordRef) -> Vector,
{
  let tangent = edge.coord(1) - edge.coord(0);
  QuadRule::order2(1)
    .iter()
    .map(|(bary, weight)| {
      let x = edge.bary2global(bary);
      weight * f(x.as_view()).dot(&tangent)
    })
    .sum()
}

/// Global discrete gradient from an H1 space into an H(curl) space.
///
/// This is the signed vertex-edge incidence matrix.
pub fn discrete_gradient(h1: &FeSpace, hcurl: &FeSpace) -> Result<CsrMatrix> {
  if h1.family() != FeFamily::H1 || hcurl.family() != FeFamily::HCurl {
    return Err(Error::SpaceMismatch(format!(
      "discrete gradient maps H1 into HCurl, got {:?} -> {:?}",
      h1.family(),
      hcurl.family()
    )));
  }
  if !std::rc::Rc::ptr_eq(h1.mesh(), hcurl.mesh()) {
    return Err(Error::SpaceMismatch(
      "discrete gradient needs both spaces on the same mesh".into(),
    ));
  }
  let complex = h1.mesh().mesh().complex();
  Ok(complex.exterior_derivative_operator(0).to_csr())
}
