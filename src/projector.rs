//! Divergence cleaning of H(curl) fields by a discrete Helmholtz decomposition.
//!
//! Given $g$ the projector solves for the potential $Q$ in H1 with
//! $(nabla Q, nabla q) = (g, nabla q) + integral_Gamma h q dif s$ for all $q$
//! and replaces the field by $g - nabla Q$.
//!
//! The flux $h$ is the sum of the integrated conditions registered for the
//! potential, zero without any. Then $partial_n Q = g dot n + h$, so the
//! cleaned field has normal component $-h$ on $Gamma$. A Neumann condition
//! with $h = -g dot n$ keeps the normal component of $g$.

use crate::{
  bc::BcMap,
  fe::{
    assemble::assemble_galmat,
    field::GridFunction,
    form::LinearForm,
    operators::{LaplaceBeltramiElmat, WeakDivergenceElmat},
    space::{FeFamily, FeSpace},
    system::form_linear_system,
    whitney::discrete_gradient,
    DofIdx,
  },
  parallel::CommunicatorExt,
  registry::{shared, Shared},
  solver::{solve_linear_system, SolveReport, SolverOptions},
  Error, FeSpaces, Fields, Result,
};

use common::linalg::nalgebra::CooMatrixExt;
use itertools::Itertools;
use std::rc::Rc;
use tracing::{debug, info};

pub const DEFAULT_HCURL_SPACE_NAME: &str = "HCurlFES_Name";
pub const DEFAULT_H1_SPACE_NAME: &str = "H1FES_Name";
pub const DEFAULT_SCALAR_FIELD_NAME: &str = "ScalarGF_Name";

#[derive(Debug, Clone)]
pub struct ProjectorParams {
  /// The H(curl) field that gets cleaned in place.
  pub vector_field_name: String,
  pub hcurl_space_name: String,
  pub h1_space_name: String,
  /// Field receiving the potential $Q$. Also the variable the boundary
  /// conditions on $Q$ are registered for.
  pub scalar_field_name: String,
  pub solver: SolverOptions,
}

impl ProjectorParams {
  pub fn new(vector_field_name: impl Into<String>) -> Self {
    Self {
      vector_field_name: vector_field_name.into(),
      hcurl_space_name: DEFAULT_HCURL_SPACE_NAME.into(),
      h1_space_name: DEFAULT_H1_SPACE_NAME.into(),
      scalar_field_name: DEFAULT_SCALAR_FIELD_NAME.into(),
      solver: SolverOptions::default(),
    }
  }
  pub fn with_hcurl_space_name(mut self, name: impl Into<String>) -> Self {
    self.hcurl_space_name = name.into();
    self
  }
  pub fn with_h1_space_name(mut self, name: impl Into<String>) -> Self {
    self.h1_space_name = name.into();
    self
  }
  pub fn with_scalar_field_name(mut self, name: impl Into<String>) -> Self {
    self.scalar_field_name = name.into();
    self
  }
  pub fn with_solver(mut self, solver: SolverOptions) -> Self {
    self.solver = solver;
    self
  }
}

#[derive(Debug, Clone)]
pub struct HelmholtzProjector {
  params: ProjectorParams,
}

impl HelmholtzProjector {
  pub fn new(params: ProjectorParams) -> Self {
    Self { params }
  }
  pub fn params(&self) -> &ProjectorParams {
    &self.params
  }

  /// Makes the named vector field discretely divergence free.
  ///
  /// Afterwards the vector field holds $g - nabla Q$ and the scalar field, if
  /// registered, the potential $Q$. Collective.
  pub fn project(
    &self,
    fields: &Fields,
    spaces: &FeSpaces,
    bc_map: &BcMap,
  ) -> Result<SolveReport> {
    let params = &self.params;

    // 1. resolve the working set
    let field = fields.get_required(&params.vector_field_name)?;
    let hcurl = self.resolve_hcurl_space(&field, spaces)?;
    let h1 = self.resolve_h1_space(&hcurl, spaces)?;
    let potential = self.resolve_potential(&field, &h1, fields)?;
    let pmesh = Rc::clone(hcurl.mesh());
    let comm = pmesh.comm();

    // 2. input copy and zero potential
    let g = field.borrow().coeffs().clone();
    potential.borrow_mut().fill(0.0);

    // 3. weak divergence and diffusion
    let weakdiv = assemble_galmat(&pmesh, WeakDivergenceElmat)?.to_csr();
    let mut diffusion = assemble_galmat(&pmesh, LaplaceBeltramiElmat)?;

    // 4. discrete gradient
    let grad = discrete_gradient(&h1, &hcurl)?;

    // 5. pin a single dof of the potential
    let mut ess_dofs: Vec<DofIdx> = Vec::new();
    let ntrue_dofs = comm.all_gather("projector_pin_dof", h1.ntrue_dofs_local())?;
    let pinning_rank = ntrue_dofs.iter().position(|&n| n > 0);
    if pinning_rank == Some(comm.rank()) {
      let pinned = h1.owned_dofs().start;
      debug!(pinned, rank = comm.rank(), "pinning potential dof");
      ess_dofs.push(pinned);
    }

    // 6. boundary conditions on the potential
    let mut form = LinearForm::new(h1.clone());
    {
      let mut potential = potential.borrow_mut();
      bc_map.apply_essential_bcs(
        &params.scalar_field_name,
        &mut ess_dofs,
        &mut potential,
        &pmesh,
      )?;
    }
    bc_map.apply_integrated_bcs(&params.scalar_field_name, &mut form, &pmesh)?;
    bc_map.apply_bilinear_bcs(&params.scalar_field_name, &mut diffusion, &pmesh)?;

    // 7. right-hand side $(g, nabla q)$ plus boundary terms
    form.assemble()?;
    form.add_mult(&weakdiv, &g, -1.0)?;

    // 8. linear system with the essential dofs of all ranks
    let ess_dofs = comm
      .all_gather("projector_ess_dofs", ess_dofs)?
      .into_iter()
      .flatten()
      .sorted_unstable()
      .dedup()
      .collect_vec();
    let mut system = {
      let potential = potential.borrow();
      form_linear_system(&diffusion, &ess_dofs, potential.coeffs(), form.vector())?
    };

    // 9. solve
    let report = solve_linear_system(&mut system, &params.solver)?;

    // 10. potential with exact essential values
    system.recover_fem_solution(potential.borrow_mut().coeffs_mut())?;

    // 11. field = -(grad Q - g)
    {
      let potential = potential.borrow();
      let mut field = field.borrow_mut();
      let mut corrected = &grad * potential.coeffs();
      corrected -= &g;
      corrected *= -1.0;
      field.set_coeffs(corrected)?;
    }

    info!(
      field = %params.vector_field_name,
      nessential = ess_dofs.len(),
      iterations = report.iterations,
      converged = report.converged,
      "projected field onto discretely divergence free fields"
    );
    Ok(report)
  }

  fn resolve_hcurl_space(
    &self,
    field: &Shared<GridFunction>,
    spaces: &FeSpaces,
  ) -> Result<FeSpace> {
    let field_space = field.borrow().space().clone();
    if field_space.family() != FeFamily::HCurl {
      return Err(Error::SpaceMismatch(format!(
        "'{}' is a {:?} field, expected HCurl",
        self.params.vector_field_name,
        field_space.family()
      )));
    }
    match spaces.get(&self.params.hcurl_space_name) {
      Some(space) => {
        let space = space.borrow().clone();
        if !space.is_compatible(&field_space) {
          return Err(Error::SpaceMismatch(format!(
            "space '{}' does not match the space of '{}'",
            self.params.hcurl_space_name, self.params.vector_field_name
          )));
        }
        Ok(space)
      }
      None => {
        info!(
          space = %self.params.hcurl_space_name,
          "HCurl space not registered, using the space of the vector field"
        );
        Ok(field_space)
      }
    }
  }

  fn resolve_h1_space(&self, hcurl: &FeSpace, spaces: &FeSpaces) -> Result<FeSpace> {
    match spaces.get(&self.params.h1_space_name) {
      Some(space) => {
        let space = space.borrow().clone();
        if space.family() != FeFamily::H1 || !Rc::ptr_eq(space.mesh(), hcurl.mesh()) {
          return Err(Error::SpaceMismatch(format!(
            "space '{}' must be an H1 space on the mesh of the vector field",
            self.params.h1_space_name
          )));
        }
        Ok(space)
      }
      None => {
        info!(
          space = %self.params.h1_space_name,
          order = hcurl.order(),
          "H1 space not registered, constructing one on the mesh of the vector field"
        );
        FeSpace::h1(Rc::clone(hcurl.mesh()), hcurl.order())
      }
    }
  }

  fn resolve_potential(
    &self,
    field: &Shared<GridFunction>,
    h1: &FeSpace,
    fields: &Fields,
  ) -> Result<Shared<GridFunction>> {
    match fields.get(&self.params.scalar_field_name) {
      Some(potential) => {
        if Rc::ptr_eq(&potential, field) {
          return Err(Error::SpaceMismatch(format!(
            "'{}' cannot be both the vector field and the potential",
            self.params.vector_field_name
          )));
        }
        if !potential.borrow().space().is_compatible(h1) {
          return Err(Error::SpaceMismatch(format!(
            "potential '{}' does not live on the H1 space",
            self.params.scalar_field_name
          )));
        }
        Ok(potential)
      }
      None => {
        info!(
          field = %self.params.scalar_field_name,
          "scalar potential not registered, using a temporary field"
        );
        Ok(shared(GridFunction::new(h1.clone())))
      }
    }
  }
}
