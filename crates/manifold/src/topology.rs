pub mod complex;
pub mod simplex;

pub type VertexIdx = usize;
/// Index of a simplex inside of the skeleton of its dimension.
pub type KSimplexIdx = usize;
pub type CellIdx = KSimplexIdx;
pub type FacetIdx = KSimplexIdx;
