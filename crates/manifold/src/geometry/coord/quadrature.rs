use super::{simplex::SimplexCoords, BaryCoord, BaryCoordRef, CoordRef};
use crate::Dim;

use common::linalg::nalgebra::Vector;

/// Integrates affine linear functions exactly.
pub fn barycentric_quadrature<F>(f: &F, simplex: &SimplexCoords) -> f64
where
  F: Fn(CoordRef) -> f64,
{
  simplex.vol() * f(simplex.barycenter().as_view())
}

pub fn vertex_quadature<F>(f: &F, simplex: &SimplexCoords) -> f64
where
  F: Fn(CoordRef) -> f64,
{
  let sum: f64 = simplex.vertices.coord_iter().map(f).sum();
  simplex.vol() * sum / simplex.nvertices() as f64
}

/// Quadrature rule on the reference simplex in barycentric coordinates.
///
/// Weights are normalized to sum up to one.
#[derive(Debug, Clone)]
pub struct QuadRule {
  points: Vec<BaryCoord>,
  weights: Vec<f64>,
}

impl QuadRule {
  /// Exact for polynomials of degree 2 (degree 5 on edges).
  ///
  /// Simplicies above dimension 3 fall back to the barycentric rule.
  pub fn order2(dim: Dim) -> Self {
    let bary = |coords: &[f64]| Vector::from_column_slice(coords);
    match dim {
      0 => Self {
        points: vec![bary(&[1.0])],
        weights: vec![1.0],
      },
      1 => {
        let offset = 0.5 * (3.0f64 / 5.0).sqrt();
        let (a, b) = (0.5 - offset, 0.5 + offset);
        Self {
          points: vec![bary(&[b, a]), bary(&[0.5, 0.5]), bary(&[a, b])],
          weights: vec![5.0 / 18.0, 8.0 / 18.0, 5.0 / 18.0],
        }
      }
      2 => {
        let (a, b) = (1.0 / 6.0, 2.0 / 3.0);
        Self {
          points: vec![bary(&[b, a, a]), bary(&[a, b, a]), bary(&[a, a, b])],
          weights: vec![1.0 / 3.0; 3],
        }
      }
      3 => {
        let a = 0.585_410_196_624_968_5;
        let b = 0.138_196_601_125_010_5;
        Self {
          points: vec![
            bary(&[a, b, b, b]),
            bary(&[b, a, b, b]),
            bary(&[b, b, a, b]),
            bary(&[b, b, b, a]),
          ],
          weights: vec![0.25; 4],
        }
      }
      _ => Self {
        points: vec![Vector::from_element(dim + 1, 1.0 / (dim + 1) as f64)],
        weights: vec![1.0],
      },
    }
  }

  pub fn npoints(&self) -> usize {
    self.points.len()
  }
  pub fn iter(&self) -> impl Iterator<Item = (BaryCoordRef<'_>, f64)> + '_ {
    self
      .points
      .iter()
      .zip(self.weights.iter().copied())
      .map(|(p, w)| (p.as_view(), w))
  }

  /// $integral_K f dif x$ with the integrand given in barycentric coordinates.
  pub fn integrate<F>(&self, f: F, simplex: &SimplexCoords) -> f64
  where
    F: Fn(BaryCoordRef) -> f64,
  {
    let sum: f64 = self.iter().map(|(bary, w)| w * f(bary)).sum();
    simplex.vol() * sum
  }
}
