use super::{AuxSolver, Priority};
use crate::{
  coefficient::{Coefficients, ScalarCoefficient, VectorCoefficient},
  fe::field::GridFunction,
  registry::Shared,
  Error, Fields, Result,
};

use tracing::trace;

struct Bound<C: ?Sized> {
  field: Shared<GridFunction>,
  coefficient: Shared<C>,
}

/// Interpolates a named vector coefficient into a named H(curl) field.
pub struct VectorCoefficientAux {
  field_name: String,
  coefficient_name: String,
  priority: Priority,
  bound: Option<Bound<dyn VectorCoefficient>>,
}
impl VectorCoefficientAux {
  pub fn new(field_name: impl Into<String>, coefficient_name: impl Into<String>) -> Self {
    Self {
      field_name: field_name.into(),
      coefficient_name: coefficient_name.into(),
      priority: 0,
      bound: None,
    }
  }
}
impl AuxSolver for VectorCoefficientAux {
  fn init(&mut self, fields: &Fields, coefficients: &Coefficients) -> Result<()> {
    self.bound = Some(Bound {
      field: fields.get_required(&self.field_name)?,
      coefficient: coefficients.vectors.get_required(&self.coefficient_name)?,
    });
    Ok(())
  }
  fn solve(&mut self, t: f64) -> Result<()> {
    let Some(bound) = &self.bound else {
      return Err(Error::NotInitialized(format!(
        "coefficient projection into '{}'",
        self.field_name
      )));
    };
    trace!(field = %self.field_name, coefficient = %self.coefficient_name, t, "projecting");
    let coefficient = bound.coefficient.borrow();
    bound
      .field
      .borrow_mut()
      .project_vector_coefficient(&*coefficient, t)
  }
  fn priority(&self) -> Priority {
    self.priority
  }
  fn set_priority(&mut self, priority: Priority) {
    self.priority = priority;
  }
}

/// Interpolates a named scalar coefficient into a named H1 or L2 field.
pub struct ScalarCoefficientAux {
  field_name: String,
  coefficient_name: String,
  priority: Priority,
  bound: Option<Bound<dyn ScalarCoefficient>>,
}
impl ScalarCoefficientAux {
  pub fn new(field_name: impl Into<String>, coefficient_name: impl Into<String>) -> Self {
    Self {
      field_name: field_name.into(),
      coefficient_name: coefficient_name.into(),
      priority: 0,
      bound: None,
    }
  }
}
impl AuxSolver for ScalarCoefficientAux {
  fn init(&mut self, fields: &Fields, coefficients: &Coefficients) -> Result<()> {
    self.bound = Some(Bound {
      field: fields.get_required(&self.field_name)?,
      coefficient: coefficients.scalars.get_required(&self.coefficient_name)?,
    });
    Ok(())
  }
  fn solve(&mut self, t: f64) -> Result<()> {
    let Some(bound) = &self.bound else {
      return Err(Error::NotInitialized(format!(
        "coefficient projection into '{}'",
        self.field_name
      )));
    };
    let coefficient = bound.coefficient.borrow();
    bound
      .field
      .borrow_mut()
      .project_scalar_coefficient(&*coefficient, t)
  }
  fn priority(&self) -> Priority {
    self.priority
  }
  fn set_priority(&mut self, priority: Priority) {
    self.priority = priority;
  }
}
