use super::{AuxSolver, Priority};
use crate::{
  coefficient::{sample_cellwise, Coefficients, ScalarCoefficient},
  fe::{
    assemble::{assemble_galmat, GalMat},
    field::GridFunction,
    operators::{WeightedWhitneyMassElmat, WhitneyMassElmat},
    space::FeFamily,
    system::form_linear_system,
  },
  registry::Shared,
  solver::{solve_linear_system, PreconditionerKind, SolverOptions},
  Error, Fields, Result,
};

use common::linalg::nalgebra::CooMatrixExt;
use std::rc::Rc;
use tracing::trace;

struct Bound {
  input: Shared<GridFunction>,
  output: Shared<GridFunction>,
  coefficient: Shared<dyn ScalarCoefficient>,
  mass: GalMat,
}

/// $L^2$ projection of $sigma u$ onto H(curl), e.g. the current density
/// $J = sigma E$ of an electric field.
///
/// Solves $M w = M_sigma u$ with the Whitney mass matrices.
pub struct ScaledVectorFieldAux {
  input_name: String,
  output_name: String,
  coefficient_name: String,
  priority: Priority,
  solver: SolverOptions,
  bound: Option<Bound>,
}

impl ScaledVectorFieldAux {
  pub fn new(
    input_name: impl Into<String>,
    output_name: impl Into<String>,
    coefficient_name: impl Into<String>,
  ) -> Self {
    Self {
      input_name: input_name.into(),
      output_name: output_name.into(),
      coefficient_name: coefficient_name.into(),
      priority: 0,
      // the mass matrix is well conditioned
      solver: SolverOptions::default()
        .with_preconditioner(PreconditionerKind::Jacobi)
        .with_rel_tol(1e-12)
        .with_max_iter(1000),
      bound: None,
    }
  }

  pub fn with_solver(mut self, solver: SolverOptions) -> Self {
    self.solver = solver;
    self
  }
}

impl AuxSolver for ScaledVectorFieldAux {
  fn init(&mut self, fields: &Fields, coefficients: &Coefficients) -> Result<()> {
    let input = fields.get_required(&self.input_name)?;
    let output = fields.get_required(&self.output_name)?;
    let coefficient = coefficients.scalars.get_required(&self.coefficient_name)?;

    let space = input.borrow().space().clone();
    if space.family() != FeFamily::HCurl || !space.is_compatible(output.borrow().space()) {
      return Err(Error::SpaceMismatch(format!(
        "'{}' and '{}' must share an HCurl space",
        self.input_name, self.output_name
      )));
    }
    let mass = assemble_galmat(space.mesh(), WhitneyMassElmat)?;

    self.bound = Some(Bound {
      input,
      output,
      coefficient,
      mass,
    });
    Ok(())
  }

  fn solve(&mut self, t: f64) -> Result<()> {
    let Some(bound) = &self.bound else {
      return Err(Error::NotInitialized(format!(
        "scaled field '{}'",
        self.output_name
      )));
    };
    trace!(input = %self.input_name, output = %self.output_name, t, "scaling vector field");

    let input = bound.input.borrow().coeffs().clone();
    let pmesh = Rc::clone(bound.input.borrow().space().mesh());
    let weights = sample_cellwise(&*bound.coefficient.borrow(), pmesh.mesh(), t);
    let weighted_mass = assemble_galmat(&pmesh, WeightedWhitneyMassElmat::new(weights))?.to_csr();
    let rhs = &weighted_mass * &input;

    let mut system = {
      let output = bound.output.borrow();
      form_linear_system(&bound.mass, &[], output.coeffs(), &rhs)?
    };
    solve_linear_system(&mut system, &self.solver)?;
    bound.output.borrow_mut().set_coeffs(system.solution)
  }

  fn priority(&self) -> Priority {
    self.priority
  }
  fn set_priority(&mut self, priority: Priority) {
    self.priority = priority;
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    coefficient::{ConstantCoefficient, FunctionCoefficient, VectorFunctionCoefficient},
    fe::space::FeSpace,
    mesh::ParMesh,
    registry::{shared, Ownership},
  };

  use approx::assert_relative_eq;
  use common::linalg::nalgebra::Vector;
  use manifold::gen::cartesian::CartesianMeshInfo;

  fn setup(coefficients: &mut Coefficients) -> Fields {
    let mesh = Rc::new(ParMesh::serial(
      CartesianMeshInfo::new_unit(2, 3).compute_mesh(),
    ));
    let hcurl = FeSpace::hcurl(mesh, 1).unwrap();
    let mut e = GridFunction::new(hcurl.clone());
    e.project_vector_coefficient(
      &VectorFunctionCoefficient::new(2, |x, _| Vector::from_vec(vec![x[1], -x[0]])),
      0.0,
    )
    .unwrap();

    let mut fields = Fields::new();
    fields.register("E", shared(e), Ownership::Owned).unwrap();
    fields
      .register("J", shared(GridFunction::new(hcurl)), Ownership::Owned)
      .unwrap();
    coefficients
      .register_scalar("sigma", ConstantCoefficient(3.0))
      .unwrap();
    coefficients
      .register_scalar("graded", FunctionCoefficient::new(|x, t| 1.0 + x[0] + t))
      .unwrap();
    fields
  }

  #[test]
  fn constant_scaling_is_exact() {
    let mut coefficients = Coefficients::new();
    let fields = setup(&mut coefficients);
    let mut aux = ScaledVectorFieldAux::new("E", "J", "sigma");
    aux.init(&fields, &coefficients).unwrap();
    aux.solve(0.0).unwrap();

    let e = fields.get("E").unwrap();
    let j = fields.get("J").unwrap();
    let expected = e.borrow().coeffs() * 3.0;
    let j = j.borrow();
    assert!((j.coeffs() - &expected).norm() <= 1e-9 * expected.norm());
  }

  #[test]
  fn variable_scaling_satisfies_the_projection() {
    let mut coefficients = Coefficients::new();
    let fields = setup(&mut coefficients);
    let mut aux = ScaledVectorFieldAux::new("E", "J", "graded");
    aux.init(&fields, &coefficients).unwrap();
    aux.solve(0.5).unwrap();

    let e = fields.get("E").unwrap().borrow().coeffs().clone();
    let j = fields.get("J").unwrap().borrow().coeffs().clone();
    let mesh = fields.get("E").unwrap().borrow().space().mesh().clone();
    let weights = sample_cellwise(
      &FunctionCoefficient::new(|x, t| 1.0 + x[0] + t),
      mesh.mesh(),
      0.5,
    );
    let mass = assemble_galmat(&mesh, WhitneyMassElmat).unwrap().to_csr();
    let weighted = assemble_galmat(&mesh, WeightedWhitneyMassElmat::new(weights))
      .unwrap()
      .to_csr();
    let lhs = &mass * &j;
    let rhs = &weighted * &e;
    assert_relative_eq!((lhs - &rhs).norm(), 0.0, epsilon = 1e-10 * rhs.norm());
  }

  #[test]
  fn spaces_must_agree() {
    let mut coefficients = Coefficients::new();
    let mut fields = setup(&mut coefficients);
    let mesh = fields.get("E").unwrap().borrow().space().mesh().clone();
    fields
      .register(
        "p",
        shared(GridFunction::new(FeSpace::l2(mesh, 0).unwrap())),
        Ownership::Owned,
      )
      .unwrap();
    let mut aux = ScaledVectorFieldAux::new("E", "p", "sigma");
    assert!(matches!(
      aux.init(&fields, &coefficients),
      Err(Error::SpaceMismatch(_))
    ));
  }
}
