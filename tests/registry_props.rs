use magnetiq::registry::{shared, NamedRegistry, Ownership, RegistryError, Shared};

use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
  Register { name: usize, value: i32, external: bool },
  Reregister { name: usize },
  Deregister { name: usize },
  DropExternals,
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    (0..4usize, any::<i32>(), any::<bool>())
      .prop_map(|(name, value, external)| Op::Register { name, value, external }),
    (0..4usize).prop_map(|name| Op::Reregister { name }),
    (0..4usize).prop_map(|name| Op::Deregister { name }),
    Just(Op::DropExternals),
  ]
}

fn key(name: usize) -> String {
  format!("entity{name}")
}

proptest! {
  /// The registry behaves like an insertion ordered map whose external
  /// bindings vanish once their owner lets go.
  #[test]
  fn registry_matches_model(ops in prop::collection::vec(op(), 0..40)) {
    let mut registry = NamedRegistry::<i32>::new();
    // name -> (value, entity kept alive by the test if external)
    let mut model: Vec<(String, i32, Option<Shared<i32>>)> = Vec::new();

    for op in ops {
      match op {
        Op::Register { name, value, external } => {
          let entity = shared(value);
          let ownership = if external { Ownership::External } else { Ownership::Owned };
          registry.register(key(name), entity.clone(), ownership).unwrap();
          model.retain(|(n, _, _)| *n != key(name));
          model.push((key(name), value, external.then_some(entity)));
        }
        Op::Reregister { name } => {
          if let Some(entity) = registry.get(&key(name)) {
            let result = registry.register(key(name), entity, Ownership::Owned);
            prop_assert_eq!(result, Err(RegistryError::DoubleRegistration(key(name))));
          }
        }
        Op::Deregister { name } => {
          registry.deregister(&key(name));
          model.retain(|(n, _, _)| *n != key(name));
        }
        Op::DropExternals => {
          for (_, _, keep) in &mut model {
            keep.take();
          }
          model.retain(|(n, _, _)| registry.ownership(n) == Some(Ownership::Owned));
        }
      }

      let live: Vec<(String, i32)> = registry
        .iter()
        .map(|(name, entity)| (name.to_owned(), *entity.borrow()))
        .collect();
      let expected: Vec<(String, i32)> = model
        .iter()
        .map(|(name, value, _)| (name.clone(), *value))
        .collect();
      prop_assert_eq!(live, expected);
      for (name, _, _) in &model {
        prop_assert!(registry.has(name));
      }
    }
  }
}

#[test]
fn missing_names_are_reported_by_name() {
  let registry = NamedRegistry::<f64>::new();
  assert_eq!(
    registry.get_required("mu").err(),
    Some(RegistryError::Missing("mu".into()))
  );
}
