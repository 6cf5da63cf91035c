use crate::{fe::space::FeFamily, parallel::CommError, registry::RegistryError};

use common::linalg::LinalgError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Registry(#[from] RegistryError),
  #[error(transparent)]
  Comm(#[from] CommError),
  #[error(transparent)]
  Linalg(#[from] LinalgError),
  #[error("auxiliary solvers are already initialized")]
  SchedulerInitialized,
  #[error("auxiliary solvers must be initialized before solving")]
  SchedulerNotInitialized,
  #[error("{0} must be initialized before use")]
  NotInitialized(String),
  #[error("{family:?} spaces of order {order} are not supported")]
  UnsupportedOrder { family: FeFamily, order: usize },
  #[error("incompatible function spaces: {0}")]
  SpaceMismatch(String),
  #[error("linear solver did not converge within {iterations} iterations (residual {residual:e})")]
  NotConverged { iterations: usize, residual: f64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
