//! String-keyed registries of shared simulation objects.
//!
//! Fields, coefficients, spaces, boundary conditions and solvers are looked up
//! by name. A binding either keeps its entity alive ([`Ownership::Owned`]) or
//! only refers to it ([`Ownership::External`]), in which case it reads as
//! unbound once the owner drops the entity.

use std::{
  any::Any,
  cell::RefCell,
  fmt,
  rc::{Rc, Weak},
};

use indexmap::IndexMap;
use thiserror::Error;

pub type Shared<T> = Rc<RefCell<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
  Rc::new(RefCell::new(value))
}

/// Type erased access used for typed narrowing of registry entries.
///
/// Implemented for every sized `'static` type. Trait objects stored in a
/// registry get it through a supertrait bound.
pub trait Entity: Any {
  fn as_any(&self) -> &dyn Any;
  fn as_any_mut(&mut self) -> &mut dyn Any;
}
impl<T: Any> Entity for T {
  fn as_any(&self) -> &dyn Any {
    self
  }
  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
  Owned,
  External,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("no entity named '{0}' is registered")]
  Missing(String),
  #[error("entity '{0}' is already registered under this name")]
  DoubleRegistration(String),
  #[error("entity '{name}' is not a `{expected}`")]
  TypeMismatch { name: String, expected: &'static str },
}

enum Binding<T: ?Sized> {
  Owned(Shared<T>),
  External(Weak<RefCell<T>>),
}
impl<T: ?Sized> Binding<T> {
  fn new(entity: Shared<T>, ownership: Ownership) -> Self {
    match ownership {
      Ownership::Owned => Self::Owned(entity),
      Ownership::External => Self::External(Rc::downgrade(&entity)),
    }
  }
  fn upgrade(&self) -> Option<Shared<T>> {
    match self {
      Self::Owned(entity) => Some(Rc::clone(entity)),
      Self::External(entity) => entity.upgrade(),
    }
  }
  fn ownership(&self) -> Ownership {
    match self {
      Self::Owned(_) => Ownership::Owned,
      Self::External(_) => Ownership::External,
    }
  }
  fn is_instance(&self, other: &Shared<T>) -> bool {
    self
      .upgrade()
      .is_some_and(|entity| std::ptr::addr_eq(Rc::as_ptr(&entity), Rc::as_ptr(other)))
  }
}

/// Registry mapping names to shared entities.
///
/// Iteration follows registration order, a rebinding moves the name to the end.
pub struct NamedRegistry<T: ?Sized> {
  bindings: IndexMap<String, Binding<T>>,
}

impl<T: ?Sized> Default for NamedRegistry<T> {
  fn default() -> Self {
    Self {
      bindings: IndexMap::new(),
    }
  }
}

impl<T: ?Sized> NamedRegistry<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Binds `name` to `entity`.
  ///
  /// A different entity already bound to `name` is unbound first (and released
  /// if owned). Registering the very same instance again is an error.
  pub fn register(
    &mut self,
    name: impl Into<String>,
    entity: Shared<T>,
    ownership: Ownership,
  ) -> Result<(), RegistryError> {
    let name = name.into();
    if let Some(binding) = self.bindings.get(&name) {
      if binding.is_instance(&entity) {
        return Err(RegistryError::DoubleRegistration(name));
      }
    }
    self.bindings.shift_remove(&name);
    self.bindings.insert(name, Binding::new(entity, ownership));
    Ok(())
  }

  pub fn deregister(&mut self, name: &str) -> Option<Shared<T>> {
    self
      .bindings
      .shift_remove(name)
      .and_then(|binding| binding.upgrade())
  }

  pub fn has(&self, name: &str) -> bool {
    self.get(name).is_some()
  }

  pub fn get(&self, name: &str) -> Option<Shared<T>> {
    self.bindings.get(name)?.upgrade()
  }

  pub fn get_required(&self, name: &str) -> Result<Shared<T>, RegistryError> {
    self
      .get(name)
      .ok_or_else(|| RegistryError::Missing(name.to_owned()))
  }

  /// Looks up every name; fails on the first missing one.
  pub fn get_many<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Shared<T>>, RegistryError> {
    names
      .iter()
      .map(|name| self.get_required(name.as_ref()))
      .collect()
  }

  pub fn ownership(&self, name: &str) -> Option<Ownership> {
    self
      .bindings
      .get(name)
      .filter(|binding| binding.upgrade().is_some())
      .map(Binding::ownership)
  }

  /// Live bindings in registration order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, Shared<T>)> + '_ {
    self
      .bindings
      .iter()
      .filter_map(|(name, binding)| Some((name.as_str(), binding.upgrade()?)))
  }
  pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
    self.iter().map(|(name, _)| name)
  }
  pub fn len(&self) -> usize {
    self.iter().count()
  }
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T: ?Sized + Entity> NamedRegistry<T> {
  pub fn is_a<D: Any>(&self, name: &str) -> bool {
    self.with_as(name, |_: &D| ()).is_some()
  }

  /// Runs `f` on the entity narrowed to `D`.
  ///
  /// `None` if the name is unbound or the entity is of another type.
  pub fn with_as<D: Any, R>(&self, name: &str, f: impl FnOnce(&D) -> R) -> Option<R> {
    let entity = self.get(name)?;
    let guard = entity.borrow();
    let narrowed = Entity::as_any(&*guard).downcast_ref::<D>()?;
    Some(f(narrowed))
  }

  pub fn with_as_mut<D: Any, R>(&self, name: &str, f: impl FnOnce(&mut D) -> R) -> Option<R> {
    let entity = self.get(name)?;
    let mut guard = entity.borrow_mut();
    let narrowed = Entity::as_any_mut(&mut *guard).downcast_mut::<D>()?;
    Some(f(narrowed))
  }

  pub fn with_as_required<D: Any, R>(
    &self,
    name: &str,
    f: impl FnOnce(&D) -> R,
  ) -> Result<R, RegistryError> {
    let entity = self.get_required(name)?;
    let guard = entity.borrow();
    let narrowed = Entity::as_any(&*guard).downcast_ref::<D>().ok_or_else(|| {
      RegistryError::TypeMismatch {
        name: name.to_owned(),
        expected: std::any::type_name::<D>(),
      }
    })?;
    Ok(f(narrowed))
  }
}

impl<T: ?Sized> fmt::Debug for NamedRegistry<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_list().entries(self.names()).finish()
  }
}
