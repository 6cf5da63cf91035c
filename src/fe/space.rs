use super::{DofIdx, ExteriorGrade};
use crate::{mesh::ParMesh, parallel::BlockPartition, Error, Result};

use itertools::Itertools;
use manifold::{topology::CellIdx, Attribute, Dim};

use std::{ops::Range, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeFamily {
  /// Continuous piecewise linears, Whitney 0-forms.
  H1,
  /// Tangentially continuous Whitney 1-forms (Nedelec edge elements).
  HCurl,
  /// Cellwise constants, Whitney n-forms.
  L2,
}

impl FeFamily {
  pub fn grade(self, dim: Dim) -> ExteriorGrade {
    match self {
      Self::H1 => 0,
      Self::HCurl => 1,
      Self::L2 => dim,
    }
  }
  /// The single polynomial order implemented for this family.
  pub fn supported_order(self) -> usize {
    match self {
      Self::H1 | Self::HCurl => 1,
      Self::L2 => 0,
    }
  }
}

#[derive(Debug)]
struct SpaceData {
  mesh: Rc<ParMesh>,
  family: FeFamily,
  order: usize,
  dofs: BlockPartition,
}

/// A finite element space on a distributed mesh.
///
/// Cloning is shallow; clones compare equal under [`FeSpace::same_as`].
#[derive(Debug, Clone)]
pub struct FeSpace {
  data: Rc<SpaceData>,
}

impl FeSpace {
  pub fn new(mesh: Rc<ParMesh>, family: FeFamily, order: usize) -> Result<Self> {
    if order != family.supported_order() {
      return Err(Error::UnsupportedOrder { family, order });
    }
    let grade = family.grade(mesh.dim());
    let ndofs = mesh.mesh().complex().nsimplicies(grade);
    let dofs = BlockPartition::new(ndofs, mesh.nranks());
    let data = SpaceData {
      mesh,
      family,
      order,
      dofs,
    };
    Ok(Self {
      data: Rc::new(data),
    })
  }
  pub fn h1(mesh: Rc<ParMesh>, order: usize) -> Result<Self> {
    Self::new(mesh, FeFamily::H1, order)
  }
  pub fn hcurl(mesh: Rc<ParMesh>, order: usize) -> Result<Self> {
    Self::new(mesh, FeFamily::HCurl, order)
  }
  pub fn l2(mesh: Rc<ParMesh>, order: usize) -> Result<Self> {
    Self::new(mesh, FeFamily::L2, order)
  }

  pub fn mesh(&self) -> &Rc<ParMesh> {
    &self.data.mesh
  }
  pub fn family(&self) -> FeFamily {
    self.data.family
  }
  pub fn order(&self) -> usize {
    self.data.order
  }
  pub fn grade(&self) -> ExteriorGrade {
    self.family().grade(self.dim())
  }
  pub fn dim(&self) -> Dim {
    self.data.mesh.dim()
  }
  /// Number of global dofs.
  pub fn ndofs(&self) -> usize {
    self.data.dofs.len()
  }
  /// Number of components of a function in this space.
  pub fn vdim(&self) -> usize {
    match self.family() {
      FeFamily::H1 | FeFamily::L2 => 1,
      FeFamily::HCurl => self.dim(),
    }
  }

  pub fn dof_partition(&self) -> &BlockPartition {
    &self.data.dofs
  }
  pub fn owned_dofs(&self) -> Range<DofIdx> {
    self.data.dofs.range(self.data.mesh.rank())
  }
  pub fn ntrue_dofs_local(&self) -> usize {
    self.owned_dofs().len()
  }
  pub fn owns_dof(&self, idof: DofIdx) -> bool {
    self.owned_dofs().contains(&idof)
  }

  /// Global dofs of a cell, ordered like the local shape functions.
  pub fn cell_dofs(&self, icell: CellIdx) -> &[DofIdx] {
    self
      .data
      .mesh
      .mesh()
      .complex()
      .cell_subsimps(icell, self.grade())
  }

  pub fn same_as(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.data, &other.data)
  }
  /// Same family on the same mesh instance.
  pub fn is_compatible(&self, other: &Self) -> bool {
    self.family() == other.family() && Rc::ptr_eq(self.mesh(), other.mesh())
  }

  /// Dofs lying on the boundary facets tagged with one of `markers`, sorted.
  ///
  /// Contains the dofs of every rank, not just the owned ones.
  pub fn boundary_dofs_with(&self, markers: &[Attribute]) -> Vec<DofIdx> {
    let grade = self.grade();
    let dim = self.dim();
    if grade >= dim {
      return Vec::new();
    }
    let mesh = self.data.mesh.mesh();
    let complex = mesh.complex();
    mesh
      .boundary_facets_with(markers)
      .flat_map(|facet| {
        complex
          .simplex(dim - 1, facet)
          .subsimps(grade)
          .filter_map(|sub| complex.kidx(&sub))
          .collect_vec()
      })
      .sorted_unstable()
      .dedup()
      .collect()
  }
}
