use super::{AuxSolver, Priority};
use crate::{
  coefficient::{sample_cellwise, Coefficients, ScalarCoefficient},
  fe::{
    assemble::assemble_galvec, field::GridFunction, operators::DotProductElvec, space::FeFamily,
  },
  registry::Shared,
  Error, Fields, Result,
};

use std::rc::Rc;
use tracing::trace;

struct Bound {
  u: Shared<GridFunction>,
  v: Shared<GridFunction>,
  output: Shared<GridFunction>,
  coefficient: Option<Shared<dyn ScalarCoefficient>>,
}

/// Cell averages of $sigma u dot v$ for two H(curl) fields, stored in a
/// piecewise constant L2 field.
///
/// Without a coefficient name $sigma = 1$.
pub struct VectorFieldDotProductAux {
  u_name: String,
  v_name: String,
  output_name: String,
  coefficient_name: Option<String>,
  priority: Priority,
  bound: Option<Bound>,
}

impl VectorFieldDotProductAux {
  pub fn new(
    u_name: impl Into<String>,
    v_name: impl Into<String>,
    output_name: impl Into<String>,
  ) -> Self {
    Self {
      u_name: u_name.into(),
      v_name: v_name.into(),
      output_name: output_name.into(),
      coefficient_name: None,
      priority: 0,
      bound: None,
    }
  }

  pub fn with_coefficient(mut self, coefficient_name: impl Into<String>) -> Self {
    self.coefficient_name = Some(coefficient_name.into());
    self
  }
}

impl AuxSolver for VectorFieldDotProductAux {
  fn init(&mut self, fields: &Fields, coefficients: &Coefficients) -> Result<()> {
    let u = fields.get_required(&self.u_name)?;
    let v = fields.get_required(&self.v_name)?;
    let output = fields.get_required(&self.output_name)?;
    let coefficient = self
      .coefficient_name
      .as_ref()
      .map(|name| coefficients.scalars.get_required(name))
      .transpose()?;

    for (name, field) in [(&self.u_name, &u), (&self.v_name, &v)] {
      if field.borrow().space().family() != FeFamily::HCurl {
        return Err(Error::SpaceMismatch(format!("'{name}' must be an HCurl field")));
      }
    }
    {
      let output_space = output.borrow().space().clone();
      if output_space.family() != FeFamily::L2
        || !Rc::ptr_eq(output_space.mesh(), u.borrow().space().mesh())
        || !Rc::ptr_eq(output_space.mesh(), v.borrow().space().mesh())
      {
        return Err(Error::SpaceMismatch(format!(
          "'{}' must be an L2 field on the mesh of '{}' and '{}'",
          self.output_name, self.u_name, self.v_name
        )));
      }
    }

    self.bound = Some(Bound {
      u,
      v,
      output,
      coefficient,
    });
    Ok(())
  }

  fn solve(&mut self, t: f64) -> Result<()> {
    let Some(bound) = &self.bound else {
      return Err(Error::NotInitialized(format!(
        "dot product field '{}'",
        self.output_name
      )));
    };
    trace!(output = %self.output_name, t, "computing cellwise dot product");

    // u and v may be the same field
    let u = bound.u.borrow().coeffs().clone();
    let v = bound.v.borrow().coeffs().clone();
    let pmesh = Rc::clone(bound.output.borrow().space().mesh());
    let weights = match &bound.coefficient {
      Some(coefficient) => sample_cellwise(&*coefficient.borrow(), pmesh.mesh(), t),
      None => vec![1.0; pmesh.mesh().ncells()],
    };

    let elvec = DotProductElvec::new(pmesh.mesh().complex(), &u, &v, &weights);
    let values = assemble_galvec(&pmesh, elvec)?;
    bound.output.borrow_mut().set_coeffs(values)
  }

  fn priority(&self) -> Priority {
    self.priority
  }
  fn set_priority(&mut self, priority: Priority) {
    self.priority = priority;
  }
}
