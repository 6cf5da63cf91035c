//! Numerical building blocks shared by the workspace crates.

extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod combo;
pub mod linalg;
pub mod util;

pub type Dim = usize;
