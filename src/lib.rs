//! Divergence cleaning and auxiliary computations for low order
//! electromagnetic finite element formulations.

pub mod auxsolvers;
pub mod bc;
pub mod coefficient;
pub mod error;
pub mod fe;
pub mod mesh;
pub mod parallel;
pub mod projector;
pub mod registry;
pub mod solver;
pub mod sources;

pub use error::{Error, Result};

use fe::{field::GridFunction, space::FeSpace};
use registry::NamedRegistry;

pub type Fields = NamedRegistry<GridFunction>;
pub type FeSpaces = NamedRegistry<FeSpace>;
