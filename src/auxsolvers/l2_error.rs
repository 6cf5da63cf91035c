use super::{AuxSolver, Priority};
use crate::{
  coefficient::{Coefficients, VectorCoefficient},
  fe::field::GridFunction,
  registry::Shared,
  Error, Fields, Result,
};

use tracing::info;

/// Records $norm(u - u_"exact")_(L^2)$ of an H(curl) field at every solve.
///
/// The history pairs the global number of dofs with the error, which is what
/// convergence studies over refined meshes need.
pub struct L2ErrorVectorPostprocessor {
  field_name: String,
  exact_name: String,
  priority: Priority,
  bound: Option<(Shared<GridFunction>, Shared<dyn VectorCoefficient>)>,
  ndofs: Vec<usize>,
  errors: Vec<f64>,
}

impl L2ErrorVectorPostprocessor {
  pub fn new(field_name: impl Into<String>, exact_name: impl Into<String>) -> Self {
    Self {
      field_name: field_name.into(),
      exact_name: exact_name.into(),
      // postprocessing runs after the fields it measures are updated
      priority: 100,
      bound: None,
      ndofs: Vec::new(),
      errors: Vec::new(),
    }
  }

  pub fn ndofs(&self) -> &[usize] {
    &self.ndofs
  }
  pub fn errors(&self) -> &[f64] {
    &self.errors
  }
  pub fn last_error(&self) -> Option<f64> {
    self.errors.last().copied()
  }
}

impl AuxSolver for L2ErrorVectorPostprocessor {
  fn init(&mut self, fields: &Fields, coefficients: &Coefficients) -> Result<()> {
    let field = fields.get_required(&self.field_name)?;
    let exact = coefficients.vectors.get_required(&self.exact_name)?;
    self.bound = Some((field, exact));
    Ok(())
  }

  fn solve(&mut self, t: f64) -> Result<()> {
    let Some((field, exact)) = &self.bound else {
      return Err(Error::NotInitialized(format!(
        "L2 error of '{}'",
        self.field_name
      )));
    };
    let field = field.borrow();
    let error = field.l2_error_vector(&*exact.borrow(), t)?;
    let ndofs = field.space().ndofs();
    info!(field = %self.field_name, ndofs, error, t, "L2 error");
    self.ndofs.push(ndofs);
    self.errors.push(error);
    Ok(())
  }

  fn priority(&self) -> Priority {
    self.priority
  }
  fn set_priority(&mut self, priority: Priority) {
    self.priority = priority;
  }
}
