//! Space and time dependent coefficients.

use crate::registry::{Entity, NamedRegistry, Ownership, Shared};

use common::linalg::nalgebra::Vector;
use manifold::{geometry::coord::CoordRef, Mesh};

pub trait ScalarCoefficient: Entity {
  fn eval(&self, x: CoordRef, t: f64) -> f64;
}

pub trait VectorCoefficient: Entity {
  fn vdim(&self) -> usize;
  fn eval(&self, x: CoordRef, t: f64) -> Vector;
}

#[derive(Debug, Clone, Copy)]
pub struct ConstantCoefficient(pub f64);
impl ScalarCoefficient for ConstantCoefficient {
  fn eval(&self, _x: CoordRef, _t: f64) -> f64 {
    self.0
  }
}

pub struct FunctionCoefficient<F> {
  f: F,
}
impl<F> FunctionCoefficient<F>
where
  F: Fn(CoordRef, f64) -> f64 + 'static,
{
  pub fn new(f: F) -> Self {
    Self { f }
  }
}
impl<F> ScalarCoefficient for FunctionCoefficient<F>
where
  F: Fn(CoordRef, f64) -> f64 + 'static,
{
  fn eval(&self, x: CoordRef, t: f64) -> f64 {
    (self.f)(x, t)
  }
}

#[derive(Debug, Clone)]
pub struct VectorConstantCoefficient(pub Vector);
impl VectorCoefficient for VectorConstantCoefficient {
  fn vdim(&self) -> usize {
    self.0.len()
  }
  fn eval(&self, _x: CoordRef, _t: f64) -> Vector {
    self.0.clone()
  }
}

pub struct VectorFunctionCoefficient<F> {
  vdim: usize,
  f: F,
}
impl<F> VectorFunctionCoefficient<F>
where
  F: Fn(CoordRef, f64) -> Vector + 'static,
{
  pub fn new(vdim: usize, f: F) -> Self {
    Self { vdim, f }
  }
}
impl<F> VectorCoefficient for VectorFunctionCoefficient<F>
where
  F: Fn(CoordRef, f64) -> Vector + 'static,
{
  fn vdim(&self) -> usize {
    self.vdim
  }
  fn eval(&self, x: CoordRef, t: f64) -> Vector {
    (self.f)(x, t)
  }
}

/// Values of a scalar coefficient at the cell barycenters.
pub fn sample_cellwise(coefficient: &dyn ScalarCoefficient, mesh: &Mesh, t: f64) -> Vec<f64> {
  (0..mesh.ncells())
    .map(|icell| coefficient.eval(mesh.cell_coords(icell).barycenter().as_view(), t))
    .collect()
}

/// The named scalar and vector coefficients of a problem.
#[derive(Debug, Default)]
pub struct Coefficients {
  pub scalars: NamedRegistry<dyn ScalarCoefficient>,
  pub vectors: NamedRegistry<dyn VectorCoefficient>,
}
impl Coefficients {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_scalar(
    &mut self,
    name: impl Into<String>,
    coefficient: impl ScalarCoefficient,
  ) -> crate::Result<Shared<dyn ScalarCoefficient>> {
    let shared: Shared<dyn ScalarCoefficient> = crate::registry::shared(coefficient);
    self
      .scalars
      .register(name, shared.clone(), Ownership::Owned)?;
    Ok(shared)
  }

  pub fn register_vector(
    &mut self,
    name: impl Into<String>,
    coefficient: impl VectorCoefficient,
  ) -> crate::Result<Shared<dyn VectorCoefficient>> {
    let shared: Shared<dyn VectorCoefficient> = crate::registry::shared(coefficient);
    self
      .vectors
      .register(name, shared.clone(), Ownership::Owned)?;
    Ok(shared)
  }
}
