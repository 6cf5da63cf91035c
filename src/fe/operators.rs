//! Element matrix and element vector providers.

use super::{whitney::whitney_basis, ExteriorGrade};

use common::linalg::nalgebra::{Matrix, Vector};
use manifold::{
  geometry::coord::{quadrature::QuadRule, simplex::SimplexCoords},
  topology::{complex::Complex, simplex::local_subsimplicies, CellIdx},
};

pub type ElMat = Matrix;
pub trait ElMatProvider {
  fn row_grade(&self) -> ExteriorGrade;
  fn col_grade(&self) -> ExteriorGrade;
  fn eval(&self, icell: CellIdx, coords: &SimplexCoords) -> ElMat;
}

pub type ElVec = Vector;
pub trait ElVecProvider {
  fn grade(&self) -> ExteriorGrade;
  fn eval(&self, icell: CellIdx, coords: &SimplexCoords) -> ElVec;
}

/// Gram matrix of the barycentric differentials $G_(i j) = dif lambda_i dot dif lambda_j$.
fn difbary_gramian(coords: &SimplexCoords) -> Matrix {
  let difbarys = coords.difbarys();
  &difbarys * difbarys.transpose()
}

/// Exact P1 mass matrix of a simplex of any dimension.
///
/// $M_(i j) = abs(K) (1 + delta_(i j)) / ((n+1)(n+2))$
pub fn scalar_mass(coords: &SimplexCoords) -> Matrix {
  let n = coords.dim_intrinsic();
  let v = coords.vol() / ((n + 1) * (n + 2)) as f64;
  let mut elmat = Matrix::from_element(n + 1, n + 1, v);
  elmat.fill_diagonal(2.0 * v);
  elmat
}

/// Exact Element Matrix Provider for the Laplace-Beltrami operator.
///
/// $A = [(dif lambda_j, dif lambda_i)_(L^2 (K))]_(i,j)$
pub struct LaplaceBeltramiElmat;
impl ElMatProvider for LaplaceBeltramiElmat {
  fn row_grade(&self) -> ExteriorGrade {
    0
  }
  fn col_grade(&self) -> ExteriorGrade {
    0
  }
  fn eval(&self, _icell: CellIdx, coords: &SimplexCoords) -> ElMat {
    coords.vol() * difbary_gramian(coords)
  }
}

/// Exact Element Matrix Provider for scalar mass bilinear form.
pub struct ScalarMassElmat;
impl ElMatProvider for ScalarMassElmat {
  fn row_grade(&self) -> ExteriorGrade {
    0
  }
  fn col_grade(&self) -> ExteriorGrade {
    0
  }
  fn eval(&self, _icell: CellIdx, coords: &SimplexCoords) -> ElMat {
    scalar_mass(coords)
  }
}

/// Exact Element Matrix Provider for the mass bilinear form of Whitney 1-forms.
///
/// $M_(i j, k l) = G_(j l) m_(i k) - G_(j k) m_(i l) - G_(i l) m_(j k) + G_(i k) m_(j l)$
/// with $m$ the scalar mass matrix and $G$ the difbary gramian.
pub struct WhitneyMassElmat;
impl ElMatProvider for WhitneyMassElmat {
  fn row_grade(&self) -> ExteriorGrade {
    1
  }
  fn col_grade(&self) -> ExteriorGrade {
    1
  }
  fn eval(&self, _icell: CellIdx, coords: &SimplexCoords) -> ElMat {
    let gram = difbary_gramian(coords);
    let mass = scalar_mass(coords);
    let edges = local_subsimplicies(coords.dim_intrinsic(), 1);

    let mut elmat = Matrix::zeros(edges.len(), edges.len());
    for (r, e0) in edges.iter().enumerate() {
      let (i, j) = (e0[0], e0[1]);
      for (c, e1) in edges.iter().enumerate() {
        let (k, l) = (e1[0], e1[1]);
        elmat[(r, c)] = gram[(j, l)] * mass[(i, k)]
          - gram[(j, k)] * mass[(i, l)]
          - gram[(i, l)] * mass[(j, k)]
          + gram[(i, k)] * mass[(j, l)];
      }
    }
    elmat
  }
}

/// Whitney mass matrix scaled by a cellwise constant weight.
///
/// The weights are coefficient values sampled at the cell barycenters.
pub struct WeightedWhitneyMassElmat {
  weights: Vec<f64>,
}
impl WeightedWhitneyMassElmat {
  pub fn new(weights: Vec<f64>) -> Self {
    Self { weights }
  }
}
impl ElMatProvider for WeightedWhitneyMassElmat {
  fn row_grade(&self) -> ExteriorGrade {
    1
  }
  fn col_grade(&self) -> ExteriorGrade {
    1
  }
  fn eval(&self, icell: CellIdx, coords: &SimplexCoords) -> ElMat {
    self.weights[icell] * WhitneyMassElmat.eval(icell, coords)
  }
}

/// Mixed bilinear form $-(u, nabla q)$ with $u$ in H(curl) and $q$ in H1.
///
/// Rows are indexed by vertices, columns by edges. Equals $-D^T M$ with $D$
/// the local gradient and $M$ the Whitney mass matrix.
pub struct WeakDivergenceElmat;
impl ElMatProvider for WeakDivergenceElmat {
  fn row_grade(&self) -> ExteriorGrade {
    0
  }
  fn col_grade(&self) -> ExteriorGrade {
    1
  }
  fn eval(&self, _icell: CellIdx, coords: &SimplexCoords) -> ElMat {
    let n = coords.dim_intrinsic();
    let gram = difbary_gramian(coords);
    let edges = local_subsimplicies(n, 1);
    let factor = -coords.vol() / (n + 1) as f64;

    let mut elmat = Matrix::zeros(n + 1, edges.len());
    for p in 0..=n {
      for (c, edge) in edges.iter().enumerate() {
        let (i, j) = (edge[0], edge[1]);
        elmat[(p, c)] = factor * (gram[(j, p)] - gram[(i, p)]);
      }
    }
    elmat
  }
}

/// Cell values $sigma_K dot 1/abs(K) integral_K u dot v$ of two H(curl) fields.
///
/// Produces the dofs of a cellwise constant field.
pub struct DotProductElvec<'a> {
  complex: &'a Complex,
  u: &'a Vector,
  v: &'a Vector,
  weights: &'a [f64],
}
impl<'a> DotProductElvec<'a> {
  pub fn new(complex: &'a Complex, u: &'a Vector, v: &'a Vector, weights: &'a [f64]) -> Self {
    Self {
      complex,
      u,
      v,
      weights,
    }
  }
}
impl ElVecProvider for DotProductElvec<'_> {
  fn grade(&self) -> ExteriorGrade {
    self.complex.dim()
  }
  fn eval(&self, icell: CellIdx, coords: &SimplexCoords) -> ElVec {
    let dofs = self.complex.cell_subsimps(icell, 1);
    let local_u = Vector::from_iterator(dofs.len(), dofs.iter().map(|&d| self.u[d]));
    let local_v = Vector::from_iterator(dofs.len(), dofs.iter().map(|&d| self.v[d]));

    let difbarys = coords.difbarys();
    let avg: f64 = QuadRule::order2(coords.dim_intrinsic())
      .iter()
      .map(|(bary, weight)| {
        let basis = whitney_basis(&difbarys, bary);
        weight * (&basis * &local_u).dot(&(&basis * &local_v))
      })
      .sum();
    Vector::from_element(1, self.weights[icell] * avg)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::fe::whitney::local_gradient_operator;

  use common::linalg::assert_mat_eq;

  fn reference_cells() -> Vec<SimplexCoords> {
    let skewed = SimplexCoords::new(Matrix::from_column_slice(
      3,
      4,
      &[0.1, 0.0, 0.2, 1.3, 0.1, 0.0, 0.2, 0.9, 0.1, 0.4, 0.3, 1.1],
    ));
    vec![
      SimplexCoords::standard(2),
      SimplexCoords::standard(3),
      skewed,
    ]
  }

  #[test]
  fn laplace_is_gradient_pullback_of_whitney_mass() {
    for cell in reference_cells() {
      let dim = cell.dim_intrinsic();
      let grad = local_gradient_operator(dim);
      let mass = WhitneyMassElmat.eval(0, &cell);
      let laplace = LaplaceBeltramiElmat.eval(0, &cell);
      assert_mat_eq(&(grad.transpose() * &mass * &grad), &laplace);
    }
  }

  #[test]
  fn weak_divergence_is_minus_gradient_transpose_mass() {
    for cell in reference_cells() {
      let dim = cell.dim_intrinsic();
      let grad = local_gradient_operator(dim);
      let mass = WhitneyMassElmat.eval(0, &cell);
      let weakdiv = WeakDivergenceElmat.eval(0, &cell);
      assert_mat_eq(&weakdiv, &(-(grad.transpose() * mass)));
    }
  }

  #[test]
  fn whitney_mass_matches_quadrature() {
    for cell in reference_cells() {
      let difbarys = cell.difbarys();
      let exact = WhitneyMassElmat.eval(0, &cell);
      let rule = QuadRule::order2(cell.dim_intrinsic());
      let mut quad = Matrix::zeros(exact.nrows(), exact.ncols());
      for (bary, weight) in rule.iter() {
        let basis = whitney_basis(&difbarys, bary);
        quad += cell.vol() * weight * basis.transpose() * &basis;
      }
      assert_mat_eq(&exact, &quad);
    }
  }

  #[test]
  fn scalar_mass_integrates_constants() {
    for cell in reference_cells() {
      let mass = ScalarMassElmat.eval(0, &cell);
      approx::assert_relative_eq!(mass.sum(), cell.vol(), epsilon = 1e-14);
    }
  }

  #[test]
  fn weighted_mass_scales() {
    let cell = SimplexCoords::standard(3);
    let weighted = WeightedWhitneyMassElmat::new(vec![1.0, 3.0]).eval(1, &cell);
    assert_mat_eq(&weighted, &(3.0 * WhitneyMassElmat.eval(1, &cell)));
  }
}
