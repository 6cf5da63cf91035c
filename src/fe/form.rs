use super::{
  assemble::GalVec,
  operators::scalar_mass,
  space::{FeFamily, FeSpace},
};
use crate::{parallel::CommunicatorExt, Error, Result};

use common::linalg::{
  nalgebra::{CsrMatrix, Vector},
  LinalgError,
};
use indexmap::IndexMap;
use manifold::Attribute;

/// Boundary integrand $integral_Gamma h q dif s$ with $h$ given by its nodal values.
#[derive(Debug, Clone)]
pub struct BoundaryTerm {
  pub markers: Vec<Attribute>,
  pub nodal_values: Vector,
}

/// A linear functional on an H1 space.
///
/// Boundary terms are keyed, setting a term under an existing key replaces it.
/// [`LinearForm::assemble`] resets the vector to the sum of the boundary terms,
/// volume contributions are added afterwards.
#[derive(Debug, Clone)]
pub struct LinearForm {
  space: FeSpace,
  boundary_terms: IndexMap<String, BoundaryTerm>,
  vector: GalVec,
}

impl LinearForm {
  pub fn new(space: FeSpace) -> Self {
    let vector = GalVec::zeros(space.ndofs());
    Self {
      space,
      boundary_terms: IndexMap::new(),
      vector,
    }
  }

  pub fn space(&self) -> &FeSpace {
    &self.space
  }
  pub fn vector(&self) -> &GalVec {
    &self.vector
  }
  pub fn vector_mut(&mut self) -> &mut GalVec {
    &mut self.vector
  }
  pub fn into_vector(self) -> GalVec {
    self.vector
  }

  pub fn set_boundary_term(&mut self, key: impl Into<String>, term: BoundaryTerm) {
    self.boundary_terms.insert(key.into(), term);
  }
  pub fn boundary_terms(&self) -> impl Iterator<Item = (&str, &BoundaryTerm)> + '_ {
    self
      .boundary_terms
      .iter()
      .map(|(key, term)| (key.as_str(), term))
  }

  /// Integrates the boundary terms over the owned marked facets. Collective.
  pub fn assemble(&mut self) -> Result<()> {
    if self.space.family() != FeFamily::H1 && !self.boundary_terms.is_empty() {
      return Err(Error::SpaceMismatch(format!(
        "boundary terms need an H1 space, got {:?}",
        self.space.family()
      )));
    }
    let pmesh = self.space.mesh();
    let mesh = pmesh.mesh();
    let facet_dim = mesh.dim() - 1;

    let mut local_entries = Vec::new();
    for term in self.boundary_terms.values() {
      for facet in pmesh.owned_boundary_facets_with(&term.markers) {
        let simplex = mesh.complex().simplex(facet_dim, facet);
        let coords = mesh.simplex_coords(facet_dim, facet);
        let values = Vector::from_iterator(
          simplex.nvertices(),
          simplex.iter().map(|&v| term.nodal_values[v]),
        );
        let elvec = scalar_mass(&coords) * values;
        local_entries.extend(simplex.iter().copied().zip(elvec.iter().copied()));
      }
    }
    let gathered = pmesh.comm().all_gather("linear_form_assemble", local_entries)?;

    self.vector.fill(0.0);
    for (idof, value) in gathered.into_iter().flatten() {
      self.vector[idof] += value;
    }
    Ok(())
  }

  /// $b <- b + alpha A x$
  pub fn add_mult(&mut self, op: &CsrMatrix, x: &Vector, alpha: f64) -> Result<()> {
    if op.nrows() != self.vector.len() || op.ncols() != x.len() {
      return Err(
        LinalgError::DimensionMismatch {
          expected: self.vector.len(),
          found: op.nrows(),
        }
        .into(),
      );
    }
    self.vector.axpy(alpha, &(op * x), 1.0);
    Ok(())
  }

  pub fn add_vector(&mut self, other: &Vector) -> Result<()> {
    if other.len() != self.vector.len() {
      return Err(
        LinalgError::DimensionMismatch {
          expected: self.vector.len(),
          found: other.len(),
        }
        .into(),
      );
    }
    self.vector += other;
    Ok(())
  }
}
