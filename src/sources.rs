//! Source terms contributing to the right-hand side of a formulation.

use crate::{
  bc::BcMap,
  coefficient::{Coefficients, VectorCoefficient},
  fe::{
    assemble::assemble_galmat, field::GridFunction, form::LinearForm,
    operators::WhitneyMassElmat, space::FeFamily,
  },
  projector::{
    HelmholtzProjector, ProjectorParams, DEFAULT_H1_SPACE_NAME, DEFAULT_HCURL_SPACE_NAME,
  },
  registry::{shared, Entity, NamedRegistry, Ownership, Shared},
  solver::SolverOptions,
  Error, FeSpaces, Fields, Result,
};

use common::linalg::nalgebra::{CooMatrixExt, CsrMatrix};
use tracing::debug;

pub trait Source: Entity {
  /// Resolves and registers the fields the source works with.
  fn init(
    &mut self,
    fields: &mut Fields,
    spaces: &FeSpaces,
    coefficients: &Coefficients,
  ) -> Result<()>;

  /// Adds the contribution at time `t` to `form`.
  fn apply(&mut self, form: &mut LinearForm, t: f64) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct Sources {
  sources: NamedRegistry<dyn Source>,
}

impl Sources {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_owned(
    &mut self,
    name: impl Into<String>,
    source: impl Source,
  ) -> Result<Shared<dyn Source>> {
    let source: Shared<dyn Source> = shared(source);
    self
      .sources
      .register(name, source.clone(), Ownership::Owned)?;
    Ok(source)
  }

  pub fn registry(&self) -> &NamedRegistry<dyn Source> {
    &self.sources
  }

  pub fn init(
    &mut self,
    fields: &mut Fields,
    spaces: &FeSpaces,
    coefficients: &Coefficients,
  ) -> Result<()> {
    for (name, source) in self.sources.iter() {
      debug!(source = name, "initializing source");
      source.borrow_mut().init(fields, spaces, coefficients)?;
    }
    Ok(())
  }

  /// Applies all sources in registration order.
  pub fn apply(&mut self, form: &mut LinearForm, t: f64) -> Result<()> {
    for (_, source) in self.sources.iter() {
      source.borrow_mut().apply(form, t)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone)]
pub struct DivFreeSourceParams {
  /// Name of the vector coefficient. The cleaned field is registered
  /// under the same name.
  pub source_name: String,
  pub hcurl_space_name: String,
  pub h1_space_name: String,
  pub solver: SolverOptions,
}

impl DivFreeSourceParams {
  pub fn new(source_name: impl Into<String>) -> Self {
    Self {
      source_name: source_name.into(),
      hcurl_space_name: DEFAULT_HCURL_SPACE_NAME.into(),
      h1_space_name: DEFAULT_H1_SPACE_NAME.into(),
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
  pub fn with_solver(mut self, solver: SolverOptions) -> Self {
    self.solver = solver;
    self
  }
}

struct Bound {
  coefficient: Shared<dyn VectorCoefficient>,
  field: Shared<GridFunction>,
  /// Projector working set, bound externally.
  fields: Fields,
  spaces: FeSpaces,
  mass: CsrMatrix,
}

/// A volumetric current density made discretely divergence free before it
/// enters the right-hand side as $(J, v)$.
pub struct DivFreeSource {
  params: DivFreeSourceParams,
  projector: HelmholtzProjector,
  bound: Option<Bound>,
}

impl DivFreeSource {
  pub fn new(params: DivFreeSourceParams) -> Self {
    let projector = HelmholtzProjector::new(
      ProjectorParams::new(params.source_name.clone())
        .with_hcurl_space_name(params.hcurl_space_name.clone())
        .with_h1_space_name(params.h1_space_name.clone())
        .with_scalar_field_name(format!("{}_potential", params.source_name))
        .with_solver(params.solver.clone()),
    );
    Self {
      params,
      projector,
      bound: None,
    }
  }

  pub fn params(&self) -> &DivFreeSourceParams {
    &self.params
  }

  /// The cleaned source field of the last [`Source::apply`].
  pub fn field(&self) -> Option<&Shared<GridFunction>> {
    self.bound.as_ref().map(|bound| &bound.field)
  }
}

impl Source for DivFreeSource {
  fn init(
    &mut self,
    fields: &mut Fields,
    spaces: &FeSpaces,
    coefficients: &Coefficients,
  ) -> Result<()> {
    let name = &self.params.source_name;
    let coefficient = coefficients.vectors.get_required(name)?;
    let hcurl = spaces.get_required(&self.params.hcurl_space_name)?;
    let hcurl_space = hcurl.borrow().clone();
    if hcurl_space.family() != FeFamily::HCurl {
      return Err(Error::SpaceMismatch(format!(
        "'{}' is not an HCurl space",
        self.params.hcurl_space_name
      )));
    }
    if coefficient.borrow().vdim() != hcurl_space.vdim() {
      return Err(Error::SpaceMismatch(format!(
        "source '{name}' has {} components, the space {}",
        coefficient.borrow().vdim(),
        hcurl_space.vdim()
      )));
    }

    let field = shared(GridFunction::new(hcurl_space.clone()));
    fields.register(name.clone(), field.clone(), Ownership::Owned)?;

    let mut local_fields = Fields::new();
    local_fields.register(name.clone(), field.clone(), Ownership::External)?;
    let mut local_spaces = FeSpaces::new();
    local_spaces.register(
      self.params.hcurl_space_name.clone(),
      hcurl,
      Ownership::External,
    )?;
    if let Some(h1) = spaces.get(&self.params.h1_space_name) {
      local_spaces.register(self.params.h1_space_name.clone(), h1, Ownership::External)?;
    }

    let mass = assemble_galmat(hcurl_space.mesh(), WhitneyMassElmat)?.to_csr();
    self.bound = Some(Bound {
      coefficient,
      field,
      fields: local_fields,
      spaces: local_spaces,
      mass,
    });
    Ok(())
  }

  fn apply(&mut self, form: &mut LinearForm, t: f64) -> Result<()> {
    let Some(bound) = &self.bound else {
      return Err(Error::NotInitialized(format!(
        "divergence free source '{}'",
        self.params.source_name
      )));
    };
    if !form.space().is_compatible(bound.field.borrow().space()) {
      return Err(Error::SpaceMismatch(format!(
        "source '{}' applied to a form on a different space",
        self.params.source_name
      )));
    }

    {
      let coefficient = bound.coefficient.borrow();
      bound
        .field
        .borrow_mut()
        .project_vector_coefficient(&*coefficient, t)?;
    }
    self
      .projector
      .project(&bound.fields, &bound.spaces, &BcMap::new())?;

    let field = bound.field.borrow();
    form.add_mult(&bound.mass, field.coeffs(), 1.0)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    coefficient::VectorFunctionCoefficient,
    fe::{operators::WeakDivergenceElmat, space::FeSpace},
    mesh::ParMesh,
  };

  use common::linalg::nalgebra::Vector;
  use manifold::gen::cartesian::CartesianMeshInfo;
  use std::rc::Rc;

  fn setup() -> (Fields, FeSpaces, Coefficients, FeSpace) {
    let mesh = Rc::new(ParMesh::serial(
      CartesianMeshInfo::new_unit(3, 2).compute_mesh(),
    ));
    let hcurl = FeSpace::hcurl(mesh, 1).unwrap();
    let mut spaces = FeSpaces::new();
    spaces
      .register("HCurl", shared(hcurl.clone()), Ownership::Owned)
      .unwrap();
    let mut coefficients = Coefficients::new();
    coefficients
      .register_vector(
        "J",
        VectorFunctionCoefficient::new(3, |x, t| {
          Vector::from_vec(vec![-x[1] + x[0], x[0], t])
        }),
      )
      .unwrap();
    (Fields::new(), spaces, coefficients, hcurl)
  }

  #[test]
  fn source_is_divergence_free_and_enters_the_form() {
    let (mut fields, spaces, coefficients, hcurl) = setup();
    let mut sources = Sources::new();
    sources
      .register_owned(
        "J",
        DivFreeSource::new(DivFreeSourceParams::new("J").with_hcurl_space_name("HCurl")),
      )
      .unwrap();
    sources.init(&mut fields, &spaces, &coefficients).unwrap();
    assert!(fields.has("J"));

    let mut form = LinearForm::new(hcurl.clone());
    sources.apply(&mut form, 1.0).unwrap();

    let j = fields.get("J").unwrap().borrow().coeffs().clone();
    let mass = assemble_galmat(hcurl.mesh(), WhitneyMassElmat).unwrap().to_csr();
    let expected = &mass * &j;
    assert!((form.vector() - &expected).norm() <= 1e-12 * expected.norm());

    let weakdiv = assemble_galmat(hcurl.mesh(), WeakDivergenceElmat)
      .unwrap()
      .to_csr();
    let mut raw = GridFunction::new(hcurl);
    raw
      .project_vector_coefficient(&*coefficients.vectors.get("J").unwrap().borrow(), 1.0)
      .unwrap();
    let div_raw = (&weakdiv * raw.coeffs()).norm();
    assert!((&weakdiv * &j).norm() < 1e-8 * div_raw);
  }

  #[test]
  fn apply_requires_init_and_a_matching_space() {
    let (mut fields, spaces, coefficients, hcurl) = setup();
    let params = DivFreeSourceParams::new("J").with_hcurl_space_name("HCurl");
    let mut source = DivFreeSource::new(params);
    let mut form = LinearForm::new(hcurl.clone());
    match source.apply(&mut form, 0.0) {
      Err(Error::NotInitialized(what)) => assert!(what.contains("'J'")),
      other => panic!("unexpected result {other:?}"),
    }

    source.init(&mut fields, &spaces, &coefficients).unwrap();
    let h1 = FeSpace::h1(Rc::clone(hcurl.mesh()), 1).unwrap();
    let mut wrong = LinearForm::new(h1);
    assert!(matches!(
      source.apply(&mut wrong, 0.0),
      Err(Error::SpaceMismatch(_))
    ));
  }
}
