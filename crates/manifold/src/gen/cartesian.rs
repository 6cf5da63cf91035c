use common::{
  combo::factorial,
  linalg::nalgebra::{Matrix, Vector},
};
use itertools::Itertools;

use crate::{
  geometry::coord::mesh::MeshCoords,
  topology::{complex::Complex, simplex::Simplex},
  Attribute, Dim, Mesh,
};

/// converts linear index to cartesian index
///
/// converts linear index in 0..dim_len^d to cartesian index in (0)^d..(dim_len)^d
pub fn linear_index2cartesian_index(
  mut lin_idx: usize,
  dim_len: usize,
  dim: usize,
) -> Vector<usize> {
  let mut cart_idx = Vector::zeros(dim);
  for icomp in 0..dim {
    cart_idx[icomp] = lin_idx % dim_len;
    lin_idx /= dim_len;
  }
  cart_idx
}

/// converts cartesian index to linear index
///
/// converts cartesian index in (0)^d..(dim_len)^d to linear index in 0..dim_len^d
pub fn cartesian_index2linear_index(cart_idx: Vector<usize>, dim_len: usize) -> usize {
  let dim = cart_idx.len();
  let mut lin_idx = 0;
  for icomp in (0..dim).rev() {
    lin_idx *= dim_len;
    lin_idx += cart_idx[icomp];
  }
  lin_idx
}

/// Boundary attribute of the box side normal to `axis`.
///
/// Low sides get odd attributes, high sides even ones:
/// x=min -> 1, x=max -> 2, y=min -> 3, y=max -> 4, z=min -> 5, z=max -> 6.
pub fn box_side_attribute(axis: usize, high: bool) -> Attribute {
  2 * axis + 1 + usize::from(high)
}

pub struct CartesianMeshInfo {
  min: Vector,
  max: Vector,
  ncells_axis: usize,
}
impl CartesianMeshInfo {
  pub fn new_min_max(min: Vector, max: Vector, ncells_axis: usize) -> Self {
    assert!(min.len() == max.len());
    Self {
      min,
      max,
      ncells_axis,
    }
  }
  pub fn new_unit(dim: Dim, ncells_axis: usize) -> Self {
    Self::new_min_max(
      Vector::zeros(dim),
      Vector::from_element(dim, 1.0),
      ncells_axis,
    )
  }

  pub fn dim(&self) -> usize {
    self.min.len()
  }
  pub fn side_lengths(&self) -> Vector {
    &self.max - &self.min
  }
  pub fn ncells_axis(&self) -> usize {
    self.ncells_axis
  }
  pub fn nvertices_axis(&self) -> usize {
    self.ncells_axis + 1
  }
  pub fn nboxes(&self) -> usize {
    self.ncells_axis.pow(self.dim() as u32)
  }
  pub fn nvertices(&self) -> usize {
    self.nvertices_axis().pow(self.dim() as u32)
  }
  pub fn vertex_cart_idx(&self, ivertex: usize) -> Vector<usize> {
    linear_index2cartesian_index(ivertex, self.nvertices_axis(), self.dim())
  }
  pub fn vertex_pos(&self, ivertex: usize) -> Vector {
    (self.vertex_cart_idx(ivertex).cast::<f64>() / self.ncells_axis as f64)
      .component_mul(&self.side_lengths())
      + &self.min
  }

  pub fn compute_vertex_coords(&self) -> MeshCoords {
    let mut coords = Matrix::zeros(self.dim(), self.nvertices());
    for (ivertex, mut coord) in coords.column_iter_mut().enumerate() {
      coord.copy_from(&self.vertex_pos(ivertex));
    }
    MeshCoords::new(coords)
  }

  /// Splits every box into $d!$ simplicies, one per permutation of the axes.
  pub fn compute_cells(&self) -> Vec<Simplex> {
    let dim = self.dim();
    let mut simplicies = Vec::with_capacity(factorial(dim) * self.nboxes());

    for ibox in 0..self.nboxes() {
      let vertex_icart_origin = linear_index2cartesian_index(ibox, self.ncells_axis, dim);
      let ivertex_origin =
        cartesian_index2linear_index(vertex_icart_origin.clone(), self.nvertices_axis());

      let box_simplicies = (0..dim).permutations(dim).map(|basisdirs| {
        let mut simplex = vec![ivertex_origin];
        let mut vertex_icart = vertex_icart_origin.clone();
        for &basisdir in basisdirs.iter() {
          vertex_icart[basisdir] += 1;
          let ivertex = cartesian_index2linear_index(vertex_icart.clone(), self.nvertices_axis());
          simplex.push(ivertex);
        }
        Simplex::new(simplex)
      });
      simplicies.extend(box_simplicies);
    }
    simplicies
  }

  /// The box side a boundary facet lies on.
  fn facet_attribute(&self, facet: &Simplex) -> Option<Attribute> {
    let last = self.nvertices_axis() - 1;
    let carts = facet
      .iter()
      .map(|&v| self.vertex_cart_idx(v))
      .collect_vec();
    (0..self.dim()).find_map(|axis| {
      if carts.iter().all(|c| c[axis] == 0) {
        Some(box_side_attribute(axis, false))
      } else if carts.iter().all(|c| c[axis] == last) {
        Some(box_side_attribute(axis, true))
      } else {
        None
      }
    })
  }

  pub fn compute_mesh(&self) -> Mesh {
    let complex = Complex::from_cells(self.compute_cells(), self.nvertices());
    let coords = self.compute_vertex_coords();
    let facet_dim = complex.dim() - 1;
    let attributes = complex
      .boundary_facets()
      .into_iter()
      .filter_map(|facet| {
        self
          .facet_attribute(complex.simplex(facet_dim, facet))
          .map(|attr| (facet, attr))
      })
      .collect();
    Mesh::new(complex, coords).with_boundary_attributes(attributes)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn unit_cube_cells() {
    let info = CartesianMeshInfo::new_unit(3, 1);
    let coords = info.compute_vertex_coords();

    #[rustfmt::skip]
    let expected_coords = Matrix::from_column_slice(3, 8, &[
      0., 0., 0.,
      1., 0., 0.,
      0., 1., 0.,
      1., 1., 0.,
      0., 0., 1.,
      1., 0., 1.,
      0., 1., 1.,
      1., 1., 1.,
    ]);
    assert_eq!(*coords.matrix(), expected_coords);

    let expected_cells = vec![
      vec![0, 1, 3, 7],
      vec![0, 1, 5, 7],
      vec![0, 2, 3, 7],
      vec![0, 2, 6, 7],
      vec![0, 4, 5, 7],
      vec![0, 4, 6, 7],
    ];
    let cells: Vec<_> = info
      .compute_cells()
      .into_iter()
      .map(|s| s.vertices().to_vec())
      .collect();
    assert_eq!(cells, expected_cells);
  }

  #[test]
  fn unit_square_boundary_attributes() {
    let mesh = CartesianMeshInfo::new_unit(2, 2).compute_mesh();
    assert_eq!(mesh.complex().ncells(), 8);
    assert_eq!(mesh.boundary_attributes(), vec![1, 2, 3, 4]);
    for attr in 1..=4 {
      assert_eq!(mesh.boundary_facets_with(&[attr]).count(), 2);
    }
    // every boundary facet is tagged
    assert_eq!(
      mesh.boundary_facets_with(&[1, 2, 3, 4]).count(),
      mesh.complex().boundary_facets().len()
    );
  }

  #[test]
  fn unit_cube_volume() {
    let mesh = CartesianMeshInfo::new_unit(3, 2).compute_mesh();
    let vol: f64 = (0..mesh.complex().ncells())
      .map(|icell| mesh.cell_coords(icell).vol())
      .sum();
    assert!((vol - 1.0).abs() < 1e-12);
    assert_eq!(mesh.boundary_facets_with(&[6]).count(), 8);
  }
}
