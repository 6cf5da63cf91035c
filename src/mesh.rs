use crate::parallel::{BlockPartition, Communicator, Rank, SerialComm};

use manifold::{
  topology::{CellIdx, FacetIdx},
  Attribute, Dim, Mesh,
};

use std::{fmt, ops::Range, sync::Arc};

/// A mesh replicated on every rank of a communicator.
///
/// Cells are distributed in contiguous blocks. A rank only integrates over the
/// cells and boundary facets it owns.
pub struct ParMesh {
  mesh: Mesh,
  comm: Arc<dyn Communicator>,
  cells: BlockPartition,
}

impl ParMesh {
  pub fn new(mesh: Mesh, comm: Arc<dyn Communicator>) -> Self {
    let cells = BlockPartition::new(mesh.ncells(), comm.size());
    Self { mesh, comm, cells }
  }
  pub fn serial(mesh: Mesh) -> Self {
    Self::new(mesh, Arc::new(SerialComm))
  }

  pub fn mesh(&self) -> &Mesh {
    &self.mesh
  }
  pub fn comm(&self) -> &dyn Communicator {
    &*self.comm
  }
  pub fn rank(&self) -> Rank {
    self.comm.rank()
  }
  pub fn nranks(&self) -> usize {
    self.comm.size()
  }
  pub fn dim(&self) -> Dim {
    self.mesh.dim()
  }

  pub fn cell_partition(&self) -> &BlockPartition {
    &self.cells
  }
  pub fn owned_cells(&self) -> Range<CellIdx> {
    self.cells.range(self.rank())
  }
  pub fn cell_owner(&self, icell: CellIdx) -> Rank {
    self.cells.owner(icell)
  }
  pub fn owns_cell(&self, icell: CellIdx) -> bool {
    self.owned_cells().contains(&icell)
  }

  /// Boundary facets tagged with one of `markers` whose cell is owned here.
  pub fn owned_boundary_facets_with(&self, markers: &[Attribute]) -> Vec<FacetIdx> {
    let facet_dim = self.dim() - 1;
    self
      .mesh
      .boundary_facets_with(markers)
      .filter(|&facet| {
        self
          .mesh
          .complex()
          .cocells(facet_dim, facet)
          .first()
          .is_some_and(|&icell| self.owns_cell(icell))
      })
      .collect()
  }
}

impl fmt::Debug for ParMesh {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ParMesh")
      .field("dim", &self.dim())
      .field("ncells", &self.mesh.ncells())
      .field("rank", &self.rank())
      .field("nranks", &self.nranks())
      .finish()
  }
}
