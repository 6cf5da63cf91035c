use super::{mesh::MeshCoords, BaryCoordRef, Coord, CoordRef};
use crate::{geometry::refsimp_vol, topology::simplex::Simplex, Dim};

use common::linalg::nalgebra::{Matrix, Vector};

/// The vertex coordinates of a single simplex.
#[derive(Debug, Clone)]
pub struct SimplexCoords {
  pub vertices: MeshCoords,
}

impl SimplexCoords {
  pub fn new(vertices: Matrix) -> Self {
    let vertices = vertices.into();
    Self { vertices }
  }
  pub fn standard(ndim: Dim) -> Self {
    let nvertices = ndim + 1;
    let mut vertices = Matrix::zeros(ndim, nvertices);
    for i in 0..ndim {
      vertices[(i, i + 1)] = 1.0;
    }
    Self::new(vertices)
  }
  pub fn from_simplex_and_coords(simp: &Simplex, coords: &MeshCoords) -> SimplexCoords {
    let mut vert_coords = Matrix::zeros(coords.dim(), simp.nvertices());
    for (i, &v) in simp.iter().enumerate() {
      vert_coords.set_column(i, &coords.coord(v));
    }
    SimplexCoords::new(vert_coords)
  }

  pub fn nvertices(&self) -> usize {
    self.vertices.nvertices()
  }
  pub fn dim_intrinsic(&self) -> Dim {
    self.nvertices() - 1
  }
  pub fn dim_ambient(&self) -> Dim {
    self.vertices.dim()
  }
  pub fn is_same_dim(&self) -> bool {
    self.dim_intrinsic() == self.dim_ambient()
  }

  pub fn coord(&self, ivertex: usize) -> CoordRef {
    self.vertices.coord(ivertex)
  }
  pub fn base_vertex(&self) -> CoordRef {
    self.coord(0)
  }

  pub fn spanning_vectors(&self) -> Matrix {
    let mut mat = Matrix::zeros(self.dim_ambient(), self.dim_intrinsic());
    let v0 = self.base_vertex();
    for (i, vi) in self.vertices.coord_iter().skip(1).enumerate() {
      mat.set_column(i, &(vi - v0));
    }
    mat
  }

  /// Signed volume for full-dimensional simplicies, otherwise the unsigned one.
  pub fn det(&self) -> f64 {
    let spanning = self.spanning_vectors();
    let det = if self.is_same_dim() {
      spanning.determinant()
    } else {
      (spanning.transpose() * &spanning).determinant().sqrt()
    };
    refsimp_vol(self.dim_intrinsic()) * det
  }
  pub fn vol(&self) -> f64 {
    self.det().abs()
  }
  pub fn is_degenerate(&self) -> bool {
    self.vol() <= 1e-12
  }

  pub fn inv_linear_transform(&self) -> Matrix {
    let spanning = self.spanning_vectors();
    if self.dim_intrinsic() == 0 {
      return Matrix::zeros(0, self.dim_ambient());
    }
    // only fails for a negative epsilon
    spanning
      .pseudo_inverse(1e-12)
      .unwrap_or_else(|_| Matrix::zeros(self.dim_intrinsic(), self.dim_ambient()))
  }

  /// Total differential of barycentric coordinate functions in the rows(!) of
  /// a matrix.
  pub fn difbarys(&self) -> Matrix {
    let difs = self.inv_linear_transform();
    let mut difs = difs.insert_row(0, 0.0);
    let row_sum = difs.row_sum();
    difs.set_row(0, &-row_sum);
    difs
  }

  pub fn bary2global<'a>(&self, bary: impl Into<BaryCoordRef<'a>>) -> Coord {
    let bary = bary.into();
    let mut global = Vector::zeros(self.dim_ambient());
    for (vi, &baryi) in self.vertices.coord_iter().zip(bary.iter()) {
      global.axpy(baryi, &vi, 1.0);
    }
    global
  }

  pub fn barycenter(&self) -> Coord {
    let mut barycenter = Vector::zeros(self.dim_ambient());
    self.vertices.coord_iter().for_each(|v| barycenter += v);
    barycenter /= self.nvertices() as f64;
    barycenter
  }
}

pub fn ref_barycenter_bary(dim: Dim) -> Coord {
  let nvertices = dim + 1;
  Vector::from_element(nvertices, 1.0 / nvertices as f64)
}

#[cfg(test)]
mod test {
  use super::*;

  use approx::assert_relative_eq;

  #[test]
  fn standard_difbarys() {
    for dim in 1..=3 {
      let simp = SimplexCoords::standard(dim);
      let difs = simp.difbarys();
      for icomp in 0..dim {
        assert_relative_eq!(difs[(0, icomp)], -1.0, epsilon = 1e-12);
        assert_relative_eq!(difs[(icomp + 1, icomp)], 1.0, epsilon = 1e-12);
      }
      assert_relative_eq!(simp.vol(), refsimp_vol(dim), epsilon = 1e-12);
    }
  }

  #[test]
  fn embedded_triangle_volume() {
    #[rustfmt::skip]
    let coords = Matrix::from_column_slice(3, 3, &[
      0., 0., 1.,
      2., 0., 1.,
      0., 2., 1.,
    ]);
    let triangle = SimplexCoords::new(coords);
    assert_relative_eq!(triangle.vol(), 2.0, epsilon = 1e-12);
    assert_relative_eq!(
      triangle.bary2global(&ref_barycenter_bary(2)),
      triangle.barycenter(),
      epsilon = 1e-12
    );
  }

  #[test]
  fn difbarys_of_edge_in_space() {
    let coords = Matrix::from_column_slice(3, 2, &[0., 0., 0., 0., 0., 2.]);
    let edge = SimplexCoords::new(coords);
    let difs = edge.difbarys();
    assert_relative_eq!(
      difs.row(1).transpose(),
      Vector::from_vec(vec![0., 0., 0.5]),
      epsilon = 1e-12
    );
  }
}
