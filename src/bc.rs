//! Boundary conditions and the map collecting them per variable.

use crate::{
  coefficient::{ScalarCoefficient, VectorCoefficient},
  fe::{
    assemble::{assemble_boundary_mass, GalMat},
    field::GridFunction,
    form::{BoundaryTerm, LinearForm},
    space::FeFamily,
    whitney::edge_moment,
    DofIdx,
  },
  mesh::ParMesh,
  registry::{shared, Entity, NamedRegistry, Ownership},
  Error, Result,
};

use common::linalg::nalgebra::Vector;
use manifold::Attribute;

use itertools::Itertools;
use tracing::debug;

/// A constraint on the boundary of the field named by [`BoundaryCondition::variable`].
///
/// Essential conditions fix dofs of the field, integrated ones contribute a
/// boundary term to a linear form and possibly to the Galerkin matrix.
/// The defaults do nothing.
pub trait BoundaryCondition: Entity {
  fn variable(&self) -> &str;
  fn attributes(&self) -> &[Attribute];

  /// Sets the constrained dofs of `field` and records the owned ones in `ess_dofs`.
  fn apply_essential(
    &self,
    _field: &mut GridFunction,
    _ess_dofs: &mut Vec<DofIdx>,
    _t: f64,
  ) -> Result<()> {
    Ok(())
  }

  /// Sets the boundary term stored under `key` in `form`.
  fn apply_integrated(&self, _key: &str, _form: &mut LinearForm, _t: f64) -> Result<()> {
    Ok(())
  }

  /// Adds the boundary part of the operator to the H1 Galerkin matrix `galmat`. Collective.
  fn apply_bilinear(&self, _galmat: &mut GalMat, _mesh: &ParMesh, _t: f64) -> Result<()> {
    Ok(())
  }
}

fn expect_family(field_family: FeFamily, expected: FeFamily, variable: &str) -> Result<()> {
  if field_family != expected {
    return Err(Error::SpaceMismatch(format!(
      "boundary condition on '{variable}' needs a {expected:?} field, got {field_family:?}"
    )));
  }
  Ok(())
}

/// $u = g$ on the marked boundary of an H1 field.
pub struct ScalarDirichletBc {
  variable: String,
  attributes: Vec<Attribute>,
  value: Box<dyn ScalarCoefficient>,
}
impl ScalarDirichletBc {
  pub fn new(
    variable: impl Into<String>,
    attributes: Vec<Attribute>,
    value: impl ScalarCoefficient,
  ) -> Self {
    Self {
      variable: variable.into(),
      attributes,
      value: Box::new(value),
    }
  }
}
impl BoundaryCondition for ScalarDirichletBc {
  fn variable(&self) -> &str {
    &self.variable
  }
  fn attributes(&self) -> &[Attribute] {
    &self.attributes
  }
  fn apply_essential(
    &self,
    field: &mut GridFunction,
    ess_dofs: &mut Vec<DofIdx>,
    t: f64,
  ) -> Result<()> {
    expect_family(field.space().family(), FeFamily::H1, &self.variable)?;
    let space = field.space().clone();
    let mesh = space.mesh().mesh();
    for idof in space.boundary_dofs_with(&self.attributes) {
      field.coeffs_mut()[idof] = self.value.eval(mesh.coords().coord(idof), t);
      if space.owns_dof(idof) {
        ess_dofs.push(idof);
      }
    }
    Ok(())
  }
}

/// $u times n = g times n$ on the marked boundary of an H(curl) field.
///
/// The constrained edge dofs take the tangential line integrals of `g`.
pub struct TangentialDirichletBc {
  variable: String,
  attributes: Vec<Attribute>,
  value: Box<dyn VectorCoefficient>,
}
impl TangentialDirichletBc {
  pub fn new(
    variable: impl Into<String>,
    attributes: Vec<Attribute>,
    value: impl VectorCoefficient,
  ) -> Self {
    Self {
      variable: variable.into(),
      attributes,
      value: Box::new(value),
    }
  }
}
impl BoundaryCondition for TangentialDirichletBc {
  fn variable(&self) -> &str {
    &self.variable
  }
  fn attributes(&self) -> &[Attribute] {
    &self.attributes
  }
  fn apply_essential(
    &self,
    field: &mut GridFunction,
    ess_dofs: &mut Vec<DofIdx>,
    t: f64,
  ) -> Result<()> {
    expect_family(field.space().family(), FeFamily::HCurl, &self.variable)?;
    let space = field.space().clone();
    let mesh = space.mesh().mesh();
    for idof in space.boundary_dofs_with(&self.attributes) {
      let edge = mesh.simplex_coords(1, idof);
      field.coeffs_mut()[idof] = edge_moment(|x| self.value.eval(x, t), &edge);
      if space.owns_dof(idof) {
        ess_dofs.push(idof);
      }
    }
    Ok(())
  }
}

/// Natural condition adding $integral_Gamma h q dif s$ to the right-hand side.
pub struct NeumannBc {
  variable: String,
  attributes: Vec<Attribute>,
  flux: Box<dyn ScalarCoefficient>,
}
impl NeumannBc {
  pub fn new(
    variable: impl Into<String>,
    attributes: Vec<Attribute>,
    flux: impl ScalarCoefficient,
  ) -> Self {
    Self {
      variable: variable.into(),
      attributes,
      flux: Box::new(flux),
    }
  }
}
impl BoundaryCondition for NeumannBc {
  fn variable(&self) -> &str {
    &self.variable
  }
  fn attributes(&self) -> &[Attribute] {
    &self.attributes
  }
  fn apply_integrated(&self, key: &str, form: &mut LinearForm, t: f64) -> Result<()> {
    expect_family(form.space().family(), FeFamily::H1, &self.variable)?;
    set_nodal_boundary_term(key, form, &self.attributes, &*self.flux, t);
    Ok(())
  }
}

/// $partial_n u + alpha u = h$ on the marked boundary of an H1 field.
///
/// Adds $integral_Gamma alpha u q dif s$ to the matrix and
/// $integral_Gamma h q dif s$ to the right-hand side.
/// $alpha$ is taken constant per facet, sampled at the barycenter.
pub struct RobinBc {
  variable: String,
  attributes: Vec<Attribute>,
  alpha: Box<dyn ScalarCoefficient>,
  value: Box<dyn ScalarCoefficient>,
}
impl RobinBc {
  pub fn new(
    variable: impl Into<String>,
    attributes: Vec<Attribute>,
    alpha: impl ScalarCoefficient,
    value: impl ScalarCoefficient,
  ) -> Self {
    Self {
      variable: variable.into(),
      attributes,
      alpha: Box::new(alpha),
      value: Box::new(value),
    }
  }
}
impl BoundaryCondition for RobinBc {
  fn variable(&self) -> &str {
    &self.variable
  }
  fn attributes(&self) -> &[Attribute] {
    &self.attributes
  }
  fn apply_integrated(&self, key: &str, form: &mut LinearForm, t: f64) -> Result<()> {
    expect_family(form.space().family(), FeFamily::H1, &self.variable)?;
    set_nodal_boundary_term(key, form, &self.attributes, &*self.value, t);
    Ok(())
  }
  fn apply_bilinear(&self, galmat: &mut GalMat, mesh: &ParMesh, t: f64) -> Result<()> {
    assemble_boundary_mass(
      mesh,
      &self.attributes,
      |coords| self.alpha.eval(coords.barycenter().as_view(), t),
      galmat,
    )
  }
}

fn set_nodal_boundary_term(
  key: &str,
  form: &mut LinearForm,
  attributes: &[Attribute],
  coefficient: &dyn ScalarCoefficient,
  t: f64,
) {
  let coords = form.space().mesh().mesh().coords();
  let nodal_values = Vector::from_iterator(
    coords.nvertices(),
    coords.coord_iter().map(|x| coefficient.eval(x, t)),
  );
  form.set_boundary_term(
    key,
    BoundaryTerm {
      markers: attributes.to_vec(),
      nodal_values,
    },
  );
}

/// The boundary conditions of a problem, evaluated at a common time.
#[derive(Debug, Default)]
pub struct BcMap {
  bcs: NamedRegistry<dyn BoundaryCondition>,
  time: f64,
}

impl BcMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add(&mut self, name: impl Into<String>, bc: impl BoundaryCondition) -> Result<()> {
    let bc: crate::registry::Shared<dyn BoundaryCondition> = shared(bc);
    self.bcs.register(name, bc, Ownership::Owned)?;
    Ok(())
  }
  pub fn registry(&self) -> &NamedRegistry<dyn BoundaryCondition> {
    &self.bcs
  }

  pub fn time(&self) -> f64 {
    self.time
  }
  pub fn set_time(&mut self, time: f64) {
    self.time = time;
  }

  /// Applies every essential condition on `variable` to `field`.
  ///
  /// `ess_dofs` receives the owned constrained dofs, sorted and deduplicated,
  /// so applying twice yields the same list.
  pub fn apply_essential_bcs(
    &self,
    variable: &str,
    ess_dofs: &mut Vec<DofIdx>,
    field: &mut GridFunction,
    mesh: &ParMesh,
  ) -> Result<()> {
    check_mesh(field.space().mesh(), mesh, variable)?;
    for (name, bc) in self.bcs.iter() {
      let bc = bc.borrow();
      if bc.variable() == variable {
        debug!(bc = name, variable, "applying essential boundary condition");
        bc.apply_essential(field, ess_dofs, self.time)?;
      }
    }
    *ess_dofs = ess_dofs.iter().copied().sorted_unstable().dedup().collect();
    Ok(())
  }

  /// Sets the boundary terms of every integrated condition on `variable`,
  /// keyed by the name of the condition.
  pub fn apply_integrated_bcs(
    &self,
    variable: &str,
    form: &mut LinearForm,
    mesh: &ParMesh,
  ) -> Result<()> {
    check_mesh(form.space().mesh(), mesh, variable)?;
    for (name, bc) in self.bcs.iter() {
      let bc = bc.borrow();
      if bc.variable() == variable {
        debug!(bc = name, variable, "applying integrated boundary condition");
        bc.apply_integrated(name, form, self.time)?;
      }
    }
    Ok(())
  }

  /// Adds the boundary operators of the conditions on `variable` to the
  /// H1 Galerkin matrix `galmat`. Collective.
  pub fn apply_bilinear_bcs(
    &self,
    variable: &str,
    galmat: &mut GalMat,
    mesh: &ParMesh,
  ) -> Result<()> {
    for (name, bc) in self.bcs.iter() {
      let bc = bc.borrow();
      if bc.variable() == variable {
        debug!(bc = name, variable, "applying boundary operator");
        bc.apply_bilinear(galmat, mesh, self.time)?;
      }
    }
    Ok(())
  }
}

fn check_mesh(space_mesh: &ParMesh, mesh: &ParMesh, variable: &str) -> Result<()> {
  if !std::ptr::eq(space_mesh, mesh) {
    return Err(Error::SpaceMismatch(format!(
      "'{variable}' does not live on the given mesh"
    )));
  }
  Ok(())
}
