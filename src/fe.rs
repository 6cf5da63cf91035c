//! Lowest order finite element exterior calculus on simplicial meshes.
//!
//! The three families are Whitney forms of grade 0 (H1), 1 (H(curl)) and
//! of top grade (L2). Their dofs are the simplicies of the matching dimension.

pub mod assemble;
pub mod field;
pub mod form;
pub mod operators;
pub mod space;
pub mod system;
pub mod whitney;

pub type DofIdx = usize;
pub type ExteriorGrade = usize;
