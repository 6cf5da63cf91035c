use super::VertexIdx;
use crate::Dim;

use common::combo::{binomial, Sign};
use itertools::Itertools;

use std::ops::Deref;

/// An ordered list of vertices spanning a simplex.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Simplex {
  vertices: Vec<VertexIdx>,
}
impl Simplex {
  pub fn new(vertices: Vec<VertexIdx>) -> Self {
    Self { vertices }
  }
  pub fn standard(dim: Dim) -> Self {
    Self::new((0..=dim).collect())
  }

  pub fn vertices(&self) -> &[VertexIdx] {
    &self.vertices
  }
  pub fn nvertices(&self) -> usize {
    self.vertices.len()
  }
  pub fn dim(&self) -> Dim {
    self.nvertices() - 1
  }

  pub fn is_sorted(&self) -> bool {
    self.vertices.windows(2).all(|w| w[0] < w[1])
  }
  pub fn into_sorted(mut self) -> Self {
    self.vertices.sort_unstable();
    self
  }

  /// The subsimplicies of dimension `sub_dim`.
  ///
  /// These are ordered lexicographically w.r.t. the local vertex positions.
  /// e.g. tet.subsimps(1) = [(0,1),(0,2),(0,3),(1,2),(1,3),(2,3)]
  pub fn subsimps(&self, sub_dim: Dim) -> impl Iterator<Item = Self> + '_ {
    self
      .vertices
      .iter()
      .copied()
      .combinations(sub_dim + 1)
      .map(Self::new)
  }

  /// $diff [v_0,...,v_k] = sum_i (-1)^i [v_0,...,hat(v_i),...,v_k]$
  pub fn boundary(&self) -> impl Iterator<Item = (Sign, Self)> + '_ {
    (0..self.nvertices()).map(move |i| {
      let mut face = self.vertices.clone();
      face.remove(i);
      (Sign::from_parity(i), Self::new(face))
    })
  }

  pub fn is_subsimp_of(&self, other: &Self) -> bool {
    self.vertices.iter().all(|v| other.vertices.contains(v))
  }
}
impl Deref for Simplex {
  type Target = [VertexIdx];
  fn deref(&self) -> &Self::Target {
    &self.vertices
  }
}
impl From<Vec<VertexIdx>> for Simplex {
  fn from(vertices: Vec<VertexIdx>) -> Self {
    Self::new(vertices)
  }
}
impl<const N: usize> From<[VertexIdx; N]> for Simplex {
  fn from(vertices: [VertexIdx; N]) -> Self {
    Self::new(vertices.to_vec())
  }
}

pub fn nsubsimplicies(dim_cell: Dim, dim_sub: Dim) -> usize {
  binomial(dim_cell + 1, dim_sub + 1)
}
pub fn nedges(dim_cell: Dim) -> usize {
  nsubsimplicies(dim_cell, 1)
}

/// Local vertex positions of the subsimplicies of the standard cell, in the
/// same order as [`Simplex::subsimps`].
pub fn local_subsimplicies(dim_cell: Dim, dim_sub: Dim) -> Vec<Vec<usize>> {
  (0..=dim_cell).combinations(dim_sub + 1).collect()
}
