//! Simplicial mesh datastructure for working with topology and geometry.
//!
//! - Container for mesh entities (Simplicies).
//! - Global numbering for unique identification of the entities.
//! - Topological Information (Incidence)
//! - Geometrical information (Coordinates, Volumes)
//! - Boundary attributes for marking parts of the boundary

extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod gen;
pub mod geometry;
pub mod topology;

pub use common::Dim;

use geometry::coord::{mesh::MeshCoords, simplex::SimplexCoords};
use topology::{complex::Complex, CellIdx, FacetIdx, KSimplexIdx};

use indexmap::IndexMap;
use itertools::Itertools;

/// Integer tag of a part of the boundary.
pub type Attribute = usize;

/// A coordinate realization of a simplicial complex with tagged boundary facets.
#[derive(Debug, Clone)]
pub struct Mesh {
  complex: Complex,
  coords: MeshCoords,
  boundary_attributes: IndexMap<FacetIdx, Attribute>,
}

impl Mesh {
  /// All boundary facets carry the attribute 1.
  pub fn new(complex: Complex, coords: MeshCoords) -> Self {
    let boundary_attributes = complex
      .boundary_facets()
      .into_iter()
      .map(|facet| (facet, 1))
      .collect();
    Self {
      complex,
      coords,
      boundary_attributes,
    }
  }

  /// Facets missing from `attributes` keep their current tag.
  pub fn with_boundary_attributes(mut self, attributes: IndexMap<FacetIdx, Attribute>) -> Self {
    for (facet, attr) in attributes {
      if let Some(slot) = self.boundary_attributes.get_mut(&facet) {
        *slot = attr;
      }
    }
    self
  }

  pub fn complex(&self) -> &Complex {
    &self.complex
  }
  pub fn coords(&self) -> &MeshCoords {
    &self.coords
  }
  pub fn dim(&self) -> Dim {
    self.complex.dim()
  }
  pub fn ncells(&self) -> usize {
    self.complex.ncells()
  }

  pub fn simplex_coords(&self, dim: Dim, kidx: KSimplexIdx) -> SimplexCoords {
    self.coords.simplex_coords(self.complex.simplex(dim, kidx))
  }
  pub fn cell_coords(&self, icell: CellIdx) -> SimplexCoords {
    self.simplex_coords(self.dim(), icell)
  }

  pub fn boundary_attribute(&self, facet: FacetIdx) -> Option<Attribute> {
    self.boundary_attributes.get(&facet).copied()
  }
  /// The distinct attributes present on the boundary, sorted.
  pub fn boundary_attributes(&self) -> Vec<Attribute> {
    self
      .boundary_attributes
      .values()
      .copied()
      .sorted_unstable()
      .dedup()
      .collect()
  }
  /// Boundary facets whose attribute is one of `markers`.
  pub fn boundary_facets_with<'a>(
    &'a self,
    markers: &'a [Attribute],
  ) -> impl Iterator<Item = FacetIdx> + 'a {
    self
      .boundary_attributes
      .iter()
      .filter(|&(_, &attr)| markers.contains(&attr))
      .map(|(&facet, _)| facet)
  }
}
