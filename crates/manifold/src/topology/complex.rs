use super::{simplex::Simplex, CellIdx, FacetIdx, KSimplexIdx, VertexIdx};
use crate::Dim;

use common::linalg::nalgebra::{CooMatrix, CooMatrixExt};

use indexmap::IndexMap;
use itertools::Itertools;

/// A simplicial complex built from its sorted cells.
///
/// Every simplex is stored with increasing vertex indices, which fixes its
/// orientation. The vertex skeleton is numbered like the mesh vertices.
#[derive(Debug, Clone)]
pub struct Complex {
  skeletons: Vec<ComplexSkeleton>,
  /// Global indices of the subsimplicies of every cell, per dimension.
  cell_subsimps: Vec<Vec<Vec<KSimplexIdx>>>,
}
pub type ComplexSkeleton = IndexMap<Simplex, SimplexData>;

#[derive(Default, Debug, Clone)]
pub struct SimplexData {
  pub cocells: Vec<CellIdx>,
}

impl Complex {
  pub fn from_cells(cells: Vec<Simplex>, nvertices: usize) -> Self {
    let dim = cells.first().map_or(0, |c| c.dim());
    let cells = cells.into_iter().map(Simplex::into_sorted).collect_vec();

    let mut skeletons = vec![ComplexSkeleton::new(); dim + 1];
    for v in 0..nvertices {
      skeletons[0].insert(Simplex::new(vec![v]), SimplexData::default());
    }

    let mut cell_subsimps = Vec::with_capacity(cells.len());
    for (icell, cell) in cells.iter().enumerate() {
      let mut graded = Vec::with_capacity(dim + 1);
      for (dim_sub, subs) in skeletons.iter_mut().enumerate() {
        let kidxs = cell
          .subsimps(dim_sub)
          .map(|sub| {
            let entry = subs.entry(sub);
            let kidx = entry.index();
            entry.or_default().cocells.push(icell);
            kidx
          })
          .collect_vec();
        graded.push(kidxs);
      }
      cell_subsimps.push(graded);
    }

    Self {
      skeletons,
      cell_subsimps,
    }
  }

  pub fn standard(dim: Dim) -> Self {
    Self::from_cells(vec![Simplex::standard(dim)], dim + 1)
  }

  pub fn dim(&self) -> Dim {
    self.skeletons.len() - 1
  }
  pub fn skeleton(&self, dim: Dim) -> &ComplexSkeleton {
    &self.skeletons[dim]
  }
  pub fn nsimplicies(&self, dim: Dim) -> usize {
    self.skeletons[dim].len()
  }
  pub fn nvertices(&self) -> usize {
    self.nsimplicies(0)
  }
  pub fn nedges(&self) -> usize {
    self.nsimplicies(1)
  }
  pub fn ncells(&self) -> usize {
    self.nsimplicies(self.dim())
  }

  pub fn cells(&self) -> impl Iterator<Item = &Simplex> {
    self.skeletons[self.dim()].keys()
  }

  /// Panics on an out-of-range index, like slice indexing.
  pub fn simplex(&self, dim: Dim, kidx: KSimplexIdx) -> &Simplex {
    self.skeletons[dim]
      .get_index(kidx)
      .map(|(simp, _)| simp)
      .expect("simplex index out of range")
  }
  pub fn cell(&self, icell: CellIdx) -> &Simplex {
    self.simplex(self.dim(), icell)
  }
  pub fn kidx(&self, simp: &Simplex) -> Option<KSimplexIdx> {
    self.skeletons.get(simp.dim())?.get_index_of(simp)
  }
  pub fn cocells(&self, dim: Dim, kidx: KSimplexIdx) -> &[CellIdx] {
    self.skeletons[dim]
      .get_index(kidx)
      .map_or(&[][..], |(_, data)| data.cocells.as_slice())
  }

  /// Global indices of the `dim_sub`-subsimplicies of a cell in local
  /// lexicographic order.
  pub fn cell_subsimps(&self, icell: CellIdx, dim_sub: Dim) -> &[KSimplexIdx] {
    &self.cell_subsimps[icell][dim_sub]
  }

  /// The boundary facets are characterized by the fact that they
  /// only have 1 cell as super entity.
  pub fn boundary_facets(&self) -> Vec<FacetIdx> {
    if self.dim() == 0 {
      return Vec::new();
    }
    self
      .skeleton(self.dim() - 1)
      .values()
      .enumerate()
      .filter(|(_, data)| data.cocells.len() == 1)
      .map(|(kidx, _)| kidx)
      .collect()
  }
  pub fn has_boundary(&self) -> bool {
    !self.boundary_facets().is_empty()
  }

  /// The vertices that lie on the boundary of the mesh, sorted.
  pub fn boundary_vertices(&self) -> Vec<VertexIdx> {
    let facet_dim = self.dim().saturating_sub(1);
    self
      .boundary_facets()
      .into_iter()
      .flat_map(|facet| self.simplex(facet_dim, facet).vertices().to_vec())
      .sorted_unstable()
      .dedup()
      .collect()
  }

  /// $diff^k: Delta_k -> Delta_(k-1)$
  pub fn boundary_operator(&self, dim: Dim) -> CooMatrix {
    let sups = self.skeleton(dim);
    if dim == 0 {
      return CooMatrix::new(0, sups.len());
    }

    let subs = self.skeleton(dim - 1);
    let mut mat = CooMatrix::new(subs.len(), sups.len());
    for (isup, sup) in sups.keys().enumerate() {
      for (sign, sub) in sup.boundary() {
        if let Some(isub) = subs.get_index_of(&sub) {
          mat.push(isub, isup, sign.as_f64());
        }
      }
    }
    mat
  }

  /// $dif^k = (diff^(k+1))^T$, the coboundary operator on k-cochains.
  pub fn exterior_derivative_operator(&self, grade: Dim) -> CooMatrix {
    self.boundary_operator(grade + 1).transpose()
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::topology::simplex::nsubsimplicies;

  use common::linalg::nalgebra::Matrix;

  #[test]
  fn standard_tet_incidence() {
    let dim = 3;
    let complex = Complex::standard(dim);
    for dim_sub in 0..=dim {
      assert_eq!(complex.nsimplicies(dim_sub), nsubsimplicies(dim, dim_sub));
      let expected: Vec<_> = Simplex::standard(dim).subsimps(dim_sub).collect();
      let subs: Vec<_> = complex
        .cell_subsimps(0, dim_sub)
        .iter()
        .map(|&kidx| complex.simplex(dim_sub, kidx).clone())
        .collect();
      assert_eq!(subs, expected);
    }
    assert_eq!(complex.boundary_facets().len(), 4);
    assert_eq!(complex.boundary_vertices(), vec![0, 1, 2, 3]);
  }

  #[test]
  fn shared_facet_is_interior() {
    let cells = vec![Simplex::from([0, 1, 2]), Simplex::from([2, 1, 3])];
    let complex = Complex::from_cells(cells, 4);
    assert_eq!(complex.nedges(), 5);
    assert_eq!(complex.boundary_facets().len(), 4);
    let shared = complex.kidx(&Simplex::from([1, 2])).unwrap();
    assert_eq!(complex.cocells(1, shared), &[0, 1]);
  }

  #[test]
  fn coboundary_squares_to_zero() {
    let complex = Complex::standard(3);
    let dif0 = Matrix::from(&complex.exterior_derivative_operator(0));
    let dif1 = Matrix::from(&complex.exterior_derivative_operator(1));
    let composed = &dif1 * &dif0;
    assert!(composed.iter().all(|&v| v == 0.0));

    // gradient of a vertex function along edge [0,1] is f(1) - f(0)
    let edge = complex.kidx(&Simplex::from([0, 1])).unwrap();
    assert_eq!(dif0[(edge, 0)], -1.0);
    assert_eq!(dif0[(edge, 1)], 1.0);
  }
}
