use super::{simplex::SimplexCoords, Coord, CoordRef};
use crate::{
  topology::{simplex::Simplex, VertexIdx},
  Dim,
};

use common::linalg::nalgebra::Matrix;

/// The coordinates of the vertices of the mesh, stored column-wise.
#[derive(Debug, Clone)]
pub struct MeshCoords {
  matrix: Matrix,
}

impl MeshCoords {
  pub fn new(matrix: Matrix) -> Self {
    Self { matrix }
  }

  pub fn matrix(&self) -> &Matrix {
    &self.matrix
  }

  pub fn dim(&self) -> Dim {
    self.matrix.nrows()
  }
  pub fn nvertices(&self) -> usize {
    self.matrix.ncols()
  }

  pub fn coord(&self, ivertex: VertexIdx) -> CoordRef {
    self.matrix.column(ivertex)
  }
  pub fn coord_iter(&self) -> impl Iterator<Item = CoordRef<'_>> + '_ {
    (0..self.nvertices()).map(move |ivertex| self.coord(ivertex))
  }

  pub fn simplex_coords(&self, simp: &Simplex) -> SimplexCoords {
    SimplexCoords::from_simplex_and_coords(simp, self)
  }
}

impl From<Matrix> for MeshCoords {
  fn from(matrix: Matrix) -> Self {
    Self::new(matrix)
  }
}

impl From<&[Coord]> for MeshCoords {
  fn from(vectors: &[Coord]) -> Self {
    let matrix = Matrix::from_columns(vectors);
    Self::new(matrix)
  }
}
