/// Observed order of convergence between two successive refinements.
pub fn algebraic_convergence_rate(next: f64, prev: f64) -> f64 {
  let quot: f64 = next / prev;
  -quot.log2()
}

pub fn sparse_to_dense_data<T>(sparse: Vec<(usize, T)>, len: usize) -> Vec<Option<T>> {
  let mut dense = Vec::from_iter((0..len).map(|_| None));
  sparse.into_iter().for_each(|(i, t)| dense[i] = Some(t));
  dense
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn dense_data_keeps_positions() {
    let dense = sparse_to_dense_data(vec![(3, 'a'), (0, 'b')], 5);
    assert_eq!(dense, vec![Some('b'), None, None, Some('a'), None]);
  }

  #[test]
  fn halving_error_is_rate_one() {
    assert_eq!(algebraic_convergence_rate(0.25, 0.5), 1.0);
  }
}
