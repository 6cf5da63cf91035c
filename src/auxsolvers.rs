//! Auxiliary solvers computing derived quantities after a primary solve.
//!
//! The scheduler initializes the registered solvers once, freezes their
//! execution order by priority and runs them at every requested time.

mod coefficient;
mod dot_product;
mod l2_error;
mod scaled;

pub use coefficient::{ScalarCoefficientAux, VectorCoefficientAux};
pub use dot_product::VectorFieldDotProductAux;
pub use l2_error::L2ErrorVectorPostprocessor;
pub use scaled::ScaledVectorFieldAux;

use crate::{
  coefficient::Coefficients,
  registry::{shared, Entity, NamedRegistry, Ownership, Shared},
  Error, Fields, Result,
};

use tracing::{debug, trace};

pub type Priority = i32;

pub trait AuxSolver: Entity {
  /// Resolves the named fields and coefficients the solver works on.
  fn init(&mut self, fields: &Fields, coefficients: &Coefficients) -> Result<()>;
  fn solve(&mut self, t: f64) -> Result<()>;

  /// Solvers with lower priority run first.
  fn priority(&self) -> Priority;
  fn set_priority(&mut self, priority: Priority);
}

/// Registry of auxiliary solvers with a frozen execution order.
#[derive(Default)]
pub struct AuxSolvers {
  solvers: NamedRegistry<dyn AuxSolver>,
  queue: Vec<(String, Shared<dyn AuxSolver>)>,
  initialized: bool,
}

impl AuxSolvers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(
    &mut self,
    name: impl Into<String>,
    solver: Shared<dyn AuxSolver>,
    ownership: Ownership,
  ) -> Result<()> {
    if self.initialized {
      return Err(Error::SchedulerInitialized);
    }
    self.solvers.register(name, solver, ownership)?;
    Ok(())
  }

  /// Registers a solver owned by the scheduler.
  pub fn register_owned(
    &mut self,
    name: impl Into<String>,
    solver: impl AuxSolver,
  ) -> Result<Shared<dyn AuxSolver>> {
    let solver: Shared<dyn AuxSolver> = shared(solver);
    self.register(name, solver.clone(), Ownership::Owned)?;
    Ok(solver)
  }

  pub fn set_priority(&mut self, name: &str, priority: Priority) -> Result<()> {
    if self.initialized {
      return Err(Error::SchedulerInitialized);
    }
    self.solvers.get_required(name)?.borrow_mut().set_priority(priority);
    Ok(())
  }

  pub fn registry(&self) -> &NamedRegistry<dyn AuxSolver> {
    &self.solvers
  }
  pub fn is_initialized(&self) -> bool {
    self.initialized
  }
  /// Names in execution order. Empty before [`AuxSolvers::init`].
  pub fn execution_order(&self) -> impl Iterator<Item = &str> + '_ {
    self.queue.iter().map(|(name, _)| name.as_str())
  }

  /// Initializes every solver in registration order and freezes the
  /// execution order, a stable sort by ascending priority.
  pub fn init(&mut self, fields: &Fields, coefficients: &Coefficients) -> Result<()> {
    if self.initialized {
      return Err(Error::SchedulerInitialized);
    }
    let mut queue = Vec::with_capacity(self.solvers.len());
    for (name, solver) in self.solvers.iter() {
      debug!(solver = name, "initializing auxiliary solver");
      let priority = {
        let mut solver = solver.borrow_mut();
        solver.init(fields, coefficients)?;
        solver.priority()
      };
      queue.push((priority, name.to_owned(), solver));
    }
    queue.sort_by_key(|&(priority, _, _)| priority);

    self.queue = queue
      .into_iter()
      .map(|(_, name, solver)| (name, solver))
      .collect();
    self.initialized = true;
    debug!(order = ?self.execution_order().collect::<Vec<_>>(), "auxiliary solvers initialized");
    Ok(())
  }

  /// Runs all solvers in execution order. The first failure aborts the pass.
  pub fn solve(&mut self, t: f64) -> Result<()> {
    if !self.initialized {
      return Err(Error::SchedulerNotInitialized);
    }
    for (name, solver) in &self.queue {
      trace!(solver = %name, t, "running auxiliary solver");
      solver.borrow_mut().solve(t)?;
    }
    Ok(())
  }
}

impl std::fmt::Debug for AuxSolvers {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("AuxSolvers")
      .field("solvers", &self.solvers)
      .field("initialized", &self.initialized)
      .finish()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use std::{cell::RefCell, rc::Rc};

  struct Recorder {
    label: &'static str,
    priority: Priority,
    log: Rc<RefCell<Vec<String>>>,
    fail_at: Option<f64>,
  }
  impl Recorder {
    fn new(label: &'static str, priority: Priority, log: &Rc<RefCell<Vec<String>>>) -> Self {
      Self {
        label,
        priority,
        log: Rc::clone(log),
        fail_at: None,
      }
    }
  }
  impl AuxSolver for Recorder {
    fn init(&mut self, _fields: &Fields, _coefficients: &Coefficients) -> Result<()> {
      self.log.borrow_mut().push(format!("init {}", self.label));
      Ok(())
    }
    fn solve(&mut self, t: f64) -> Result<()> {
      if self.fail_at == Some(t) {
        return Err(Error::SchedulerNotInitialized);
      }
      self.log.borrow_mut().push(format!("{} {t}", self.label));
      Ok(())
    }
    fn priority(&self) -> Priority {
      self.priority
    }
    fn set_priority(&mut self, priority: Priority) {
      self.priority = priority;
    }
  }

  #[test]
  fn runs_by_priority_with_stable_ties() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut aux = AuxSolvers::new();
    aux.register_owned("a", Recorder::new("a", 2, &log)).unwrap();
    aux.register_owned("b", Recorder::new("b", 1, &log)).unwrap();
    aux.register_owned("c", Recorder::new("c", 2, &log)).unwrap();
    aux.register_owned("d", Recorder::new("d", 0, &log)).unwrap();
    aux.set_priority("d", 5).unwrap();

    aux.init(&Fields::new(), &Coefficients::new()).unwrap();
    assert_eq!(aux.execution_order().collect::<Vec<_>>(), ["b", "a", "c", "d"]);
    aux.solve(0.5).unwrap();
    assert_eq!(
      *log.borrow(),
      ["init a", "init b", "init c", "init d", "b 0.5", "a 0.5", "c 0.5", "d 0.5"]
    );
  }

  #[test]
  fn lifecycle_is_enforced() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut aux = AuxSolvers::new();
    assert!(matches!(aux.solve(0.0), Err(Error::SchedulerNotInitialized)));
    aux.register_owned("a", Recorder::new("a", 0, &log)).unwrap();
    aux.init(&Fields::new(), &Coefficients::new()).unwrap();

    assert!(matches!(
      aux.register_owned("b", Recorder::new("b", 0, &log)),
      Err(Error::SchedulerInitialized)
    ));
    assert!(matches!(aux.set_priority("a", 1), Err(Error::SchedulerInitialized)));
    assert!(matches!(
      aux.init(&Fields::new(), &Coefficients::new()),
      Err(Error::SchedulerInitialized)
    ));
    // a rejected registration leaves the queue alone
    assert_eq!(aux.execution_order().count(), 1);
  }

  #[test]
  fn failures_abort_the_pass() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut aux = AuxSolvers::new();
    let mut failing = Recorder::new("first", 0, &log);
    failing.fail_at = Some(1.0);
    aux.register_owned("first", failing).unwrap();
    aux.register_owned("second", Recorder::new("second", 1, &log)).unwrap();
    aux.init(&Fields::new(), &Coefficients::new()).unwrap();

    assert!(aux.solve(1.0).is_err());
    assert!(!log.borrow().iter().any(|entry| entry.starts_with("second")));
    aux.solve(2.0).unwrap();
    assert_eq!(log.borrow().last().map(String::as_str), Some("second 2"));
  }
}
