use std::mem;

pub type Vector<T = f64> = na::DVector<T>;
pub type RowVector<T = f64> = na::RowDVector<T>;
pub type Matrix<T = f64> = na::DMatrix<T>;
pub type VectorView<'a, T = f64> = na::DVectorView<'a, T>;

pub type CooMatrix<T = f64> = nas::CooMatrix<T>;
pub type CsrMatrix<T = f64> = nas::CsrMatrix<T>;

pub fn bilinear_form(mat: &CsrMatrix, u: &Vector, v: &Vector) -> f64 {
  (mat * u).dot(v)
}
pub fn quadratic_form_sparse(mat: &CsrMatrix, u: &Vector) -> f64 {
  bilinear_form(mat, u, u)
}

pub trait CooMatrixExt {
  fn neg(self) -> Self;
  fn transpose(self) -> Self;
  fn set_zero<F>(&mut self, predicate: F)
  where
    F: Fn(usize, usize) -> bool;
  fn to_csr(&self) -> CsrMatrix;
}

impl CooMatrixExt for CooMatrix {
  fn transpose(self) -> Self {
    let mut transposed = Self::new(self.ncols(), self.nrows());
    for (r, c, &v) in self.triplet_iter() {
      transposed.push(c, r, v);
    }
    transposed
  }

  fn neg(self) -> Self {
    let mut negated = Self::new(self.nrows(), self.ncols());
    for (r, c, &v) in self.triplet_iter() {
      negated.push(r, c, -v);
    }
    negated
  }

  fn set_zero<F>(&mut self, predicate: F)
  where
    F: Fn(usize, usize) -> bool,
  {
    let old = mem::replace(self, Self::new(self.nrows(), self.ncols()));
    for (r, c, &v) in old.triplet_iter() {
      if !predicate(r, c) {
        self.push(r, c, v);
      }
    }
  }

  /// Duplicate triplets are summed.
  fn to_csr(&self) -> CsrMatrix {
    CsrMatrix::from(self)
  }
}

pub trait CsrMatrixExt {
  fn diagonal(&self) -> Vector;
  fn scale_rows(&self, scaling: &Vector) -> CsrMatrix;
}

impl CsrMatrixExt for CsrMatrix {
  /// Missing diagonal entries are reported as zero.
  fn diagonal(&self) -> Vector {
    let mut diag = Vector::zeros(self.nrows());
    for (irow, row) in self.row_iter().enumerate() {
      for (&icol, &v) in row.col_indices().iter().zip(row.values()) {
        if icol == irow {
          diag[irow] += v;
        }
      }
    }
    diag
  }

  fn scale_rows(&self, scaling: &Vector) -> CsrMatrix {
    let mut scaled = self.clone();
    for (irow, mut row) in scaled.row_iter_mut().enumerate() {
      for v in row.values_mut() {
        *v *= scaling[irow];
      }
    }
    scaled
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn coo_transpose_and_zeroing() {
    let mut coo = CooMatrix::new(2, 3);
    coo.push(0, 2, 1.0);
    coo.push(1, 0, 2.0);
    coo.push(1, 0, 3.0);

    let transposed = coo.clone().transpose().to_csr();
    assert_eq!(transposed.nrows(), 3);
    assert_eq!(transposed.get_entry(0, 1).unwrap().into_value(), 5.0);

    coo.set_zero(|r, _| r == 1);
    let csr = coo.to_csr();
    assert_eq!(csr.nnz(), 1);
    assert_eq!(csr.get_entry(0, 2).unwrap().into_value(), 1.0);
  }

  #[test]
  fn csr_diagonal_and_scaling() {
    let mut coo = CooMatrix::new(2, 2);
    coo.push(0, 0, 4.0);
    coo.push(0, 1, -1.0);
    coo.push(1, 0, -1.0);
    coo.push(1, 1, 2.0);
    let csr = coo.to_csr();
    assert_eq!(csr.diagonal(), Vector::from_vec(vec![4.0, 2.0]));

    let scaled = csr.scale_rows(&Vector::from_vec(vec![0.5, 2.0]));
    assert_eq!(scaled.diagonal(), Vector::from_vec(vec![2.0, 4.0]));
    let u = Vector::from_vec(vec![1.0, 1.0]);
    assert_eq!(quadratic_form_sparse(&csr, &u), 4.0);
  }
}
