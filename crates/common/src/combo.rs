pub fn binomial(n: usize, k: usize) -> usize {
  num_integer::binomial(n, k)
}
pub fn factorial(num: usize) -> usize {
  (1..=num).product()
}
pub fn factorialf(num: usize) -> f64 {
  (1..=num).map(|i| i as f64).product()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
  #[default]
  Pos,
  Neg,
}
impl Sign {
  /// $(-1)^n$
  pub fn from_parity(n: usize) -> Self {
    if n % 2 == 0 {
      Self::Pos
    } else {
      Self::Neg
    }
  }
  pub fn as_f64(self) -> f64 {
    match self {
      Self::Pos => 1.0,
      Self::Neg => -1.0,
    }
  }
}
