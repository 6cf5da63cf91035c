use super::{
  space::{FeFamily, FeSpace},
  whitney::{edge_moment, whitney_basis},
};
use crate::{
  coefficient::{ScalarCoefficient, VectorCoefficient},
  parallel::CommunicatorExt,
  Error, Result,
};

use common::linalg::{nalgebra::Vector, LinalgError};
use manifold::{
  geometry::coord::{quadrature::QuadRule, BaryCoordRef},
  topology::CellIdx,
};

/// A discrete function: coefficients with respect to the basis of a space.
///
/// Coefficients are replicated, every rank holds the values of all dofs.
#[derive(Debug, Clone)]
pub struct GridFunction {
  space: FeSpace,
  coeffs: Vector,
}

impl GridFunction {
  pub fn new(space: FeSpace) -> Self {
    let coeffs = Vector::zeros(space.ndofs());
    Self { space, coeffs }
  }
  pub fn from_coeffs(space: FeSpace, coeffs: Vector) -> Result<Self> {
    if coeffs.len() != space.ndofs() {
      return Err(
        LinalgError::DimensionMismatch {
          expected: space.ndofs(),
          found: coeffs.len(),
        }
        .into(),
      );
    }
    Ok(Self { space, coeffs })
  }

  pub fn space(&self) -> &FeSpace {
    &self.space
  }
  pub fn coeffs(&self) -> &Vector {
    &self.coeffs
  }
  pub fn coeffs_mut(&mut self) -> &mut Vector {
    &mut self.coeffs
  }
  pub fn into_coeffs(self) -> Vector {
    self.coeffs
  }
  pub fn set_coeffs(&mut self, coeffs: Vector) -> Result<()> {
    if coeffs.len() != self.coeffs.len() {
      return Err(
        LinalgError::DimensionMismatch {
          expected: self.coeffs.len(),
          found: coeffs.len(),
        }
        .into(),
      );
    }
    self.coeffs = coeffs;
    Ok(())
  }
  pub fn fill(&mut self, value: f64) {
    self.coeffs.fill(value);
  }

  /// Copies the values of a field living on a compatible space.
  pub fn assign(&mut self, other: &GridFunction) -> Result<()> {
    if !self.space.is_compatible(&other.space) {
      return Err(Error::SpaceMismatch(format!(
        "cannot assign a {:?} field to a {:?} field",
        other.space.family(),
        self.space.family()
      )));
    }
    self.coeffs.copy_from(&other.coeffs);
    Ok(())
  }

  /// Interpolates a scalar coefficient.
  ///
  /// H1 dofs take the vertex values, L2 dofs the cell averages.
  pub fn project_scalar_coefficient(
    &mut self,
    coefficient: &dyn ScalarCoefficient,
    t: f64,
  ) -> Result<()> {
    let mesh = self.space.mesh().mesh();
    match self.space.family() {
      FeFamily::H1 => {
        for (ivertex, coord) in mesh.coords().coord_iter().enumerate() {
          self.coeffs[ivertex] = coefficient.eval(coord, t);
        }
      }
      FeFamily::L2 => {
        let rule = QuadRule::order2(mesh.dim());
        for icell in 0..mesh.ncells() {
          let coords = mesh.cell_coords(icell);
          let integral = rule.integrate(
            |bary| coefficient.eval(coords.bary2global(bary).as_view(), t),
            &coords,
          );
          self.coeffs[icell] = integral / coords.vol();
        }
      }
      FeFamily::HCurl => {
        return Err(Error::SpaceMismatch(
          "scalar coefficients cannot be projected into HCurl".into(),
        ))
      }
    }
    Ok(())
  }

  /// Interpolates a vector coefficient into H(curl) by its edge moments.
  pub fn project_vector_coefficient(
    &mut self,
    coefficient: &dyn VectorCoefficient,
    t: f64,
  ) -> Result<()> {
    if self.space.family() != FeFamily::HCurl {
      return Err(Error::SpaceMismatch(format!(
        "vector coefficients can only be projected into HCurl, not {:?}",
        self.space.family()
      )));
    }
    if coefficient.vdim() != self.space.vdim() {
      return Err(
        LinalgError::DimensionMismatch {
          expected: self.space.vdim(),
          found: coefficient.vdim(),
        }
        .into(),
      );
    }
    let mesh = self.space.mesh().mesh();
    for iedge in 0..mesh.complex().nedges() {
      let edge = mesh.simplex_coords(1, iedge);
      self.coeffs[iedge] = edge_moment(|x| coefficient.eval(x, t), &edge);
    }
    Ok(())
  }

  /// Value of an H(curl) field inside of a cell.
  pub fn eval_vector(&self, icell: CellIdx, bary: BaryCoordRef) -> Vector {
    let coords = self.space.mesh().mesh().cell_coords(icell);
    let basis = whitney_basis(&coords.difbarys(), bary);
    let local = Vector::from_iterator(
      basis.ncols(),
      self.space.cell_dofs(icell).iter().map(|&idof| self.coeffs[idof]),
    );
    basis * local
  }

  /// Value of an H1 or L2 field inside of a cell.
  pub fn eval_scalar(&self, icell: CellIdx, bary: BaryCoordRef) -> Result<f64> {
    let dofs = self.space.cell_dofs(icell);
    match self.space.family() {
      FeFamily::H1 => Ok(
        dofs
          .iter()
          .zip(bary.iter())
          .map(|(&idof, &lambda)| lambda * self.coeffs[idof])
          .sum(),
      ),
      FeFamily::L2 => Ok(self.coeffs[dofs[0]]),
      FeFamily::HCurl => Err(Error::SpaceMismatch(
        "HCurl fields are vector valued".into(),
      )),
    }
  }

  /// $norm(u - u_"exact")_(L^2)$ of an H(curl) field. Collective.
  pub fn l2_error_vector(&self, exact: &dyn VectorCoefficient, t: f64) -> Result<f64> {
    let pmesh = self.space.mesh();
    let mesh = pmesh.mesh();
    let rule = QuadRule::order2(mesh.dim());
    let local: f64 = pmesh
      .owned_cells()
      .map(|icell| {
        let coords = mesh.cell_coords(icell);
        rule.integrate(
          |bary| {
            let x = coords.bary2global(bary);
            let discrete = self.eval_vector(icell, bary);
            (discrete - exact.eval(x.as_view(), t)).norm_squared()
          },
          &coords,
        )
      })
      .sum();
    let global = pmesh.comm().all_reduce_sum("l2_error_vector", local)?;
    Ok(global.sqrt())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    coefficient::{FunctionCoefficient, VectorConstantCoefficient, VectorFunctionCoefficient},
    mesh::ParMesh,
  };

  use approx::assert_relative_eq;
  use manifold::{
    gen::cartesian::CartesianMeshInfo, geometry::coord::simplex::ref_barycenter_bary,
  };
  use std::rc::Rc;

  fn unit_cube(n: usize) -> Rc<ParMesh> {
    Rc::new(ParMesh::serial(
      CartesianMeshInfo::new_unit(3, n).compute_mesh(),
    ))
  }

  #[test]
  fn constant_fields_are_reproduced() {
    let mesh = unit_cube(2);
    let space = FeSpace::hcurl(Rc::clone(&mesh), 1).unwrap();
    let value = Vector::from_vec(vec![1.0, -2.0, 0.5]);
    let coefficient = VectorConstantCoefficient(value.clone());

    let mut field = GridFunction::new(space);
    field.project_vector_coefficient(&coefficient, 0.0).unwrap();
    for icell in [0, 7, 20] {
      let center = ref_barycenter_bary(3);
      let evaluated = field.eval_vector(icell, center.as_view());
      assert_relative_eq!(evaluated, value, epsilon = 1e-12);
    }
    assert!(field.l2_error_vector(&coefficient, 0.0).unwrap() < 1e-12);
  }

  #[test]
  fn interpolation_error_decreases() {
    let exact = VectorFunctionCoefficient::new(3, |x, _| {
      Vector::from_vec(vec![x[1].sin(), x[2] * x[0], x[0].cos()])
    });
    let errors: Vec<f64> = [1, 2, 4]
      .into_iter()
      .map(|n| {
        let space = FeSpace::hcurl(unit_cube(n), 1).unwrap();
        let mut field = GridFunction::new(space);
        field.project_vector_coefficient(&exact, 0.0).unwrap();
        field.l2_error_vector(&exact, 0.0).unwrap()
      })
      .collect();
    assert!(errors[1] < errors[0]);
    assert!(errors[2] < 0.6 * errors[1]);
  }

  #[test]
  fn scalar_projections() {
    let mesh = unit_cube(1);
    let linear = FunctionCoefficient::new(|x, t| x[0] + 2.0 * x[1] + t);

    let mut nodal = GridFunction::new(FeSpace::h1(Rc::clone(&mesh), 1).unwrap());
    nodal.project_scalar_coefficient(&linear, 1.0).unwrap();
    let center = ref_barycenter_bary(3);
    let at_center = nodal.eval_scalar(0, center.as_view()).unwrap();
    let cell_center = mesh.mesh().cell_coords(0).barycenter();
    assert_relative_eq!(at_center, cell_center[0] + 2.0 * cell_center[1] + 1.0, epsilon = 1e-12);

    let mut cellwise = GridFunction::new(FeSpace::l2(Rc::clone(&mesh), 0).unwrap());
    cellwise.project_scalar_coefficient(&linear, 1.0).unwrap();
    assert_relative_eq!(
      cellwise.eval_scalar(0, center.as_view()).unwrap(),
      at_center,
      epsilon = 1e-12
    );

    let mut vector = GridFunction::new(FeSpace::hcurl(mesh, 1).unwrap());
    assert!(vector.project_scalar_coefficient(&linear, 0.0).is_err());
  }

  #[test]
  fn assignment_requires_compatible_spaces() {
    let mesh = unit_cube(1);
    let h1 = FeSpace::h1(Rc::clone(&mesh), 1).unwrap();
    let mut a = GridFunction::new(h1.clone());
    let mut b = GridFunction::new(h1);
    b.fill(4.0);
    a.assign(&b).unwrap();
    assert_eq!(a.coeffs()[3], 4.0);

    let c = GridFunction::new(FeSpace::l2(mesh, 0).unwrap());
    assert!(a.assign(&c).is_err());
    assert!(a.set_coeffs(Vector::zeros(2)).is_err());
  }
}
