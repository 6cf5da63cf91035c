use magnetiq::{
  coefficient::{Coefficients, VectorFunctionCoefficient},
  fe::{form::LinearForm, space::FeSpace},
  mesh::ParMesh,
  parallel::{Communicator, SerialComm, ThreadComm},
  registry::{shared, Ownership},
  sources::{DivFreeSource, DivFreeSourceParams, Source, Sources},
  FeSpaces, Fields,
};

use common::linalg::nalgebra::Vector;
use manifold::gen::cartesian::CartesianMeshInfo;
use std::{rc::Rc, sync::Arc};

/// Right-hand side of a formulation driven by a cleaned coil current.
fn source_rhs(comm: Arc<dyn Communicator>, t: f64) -> Vec<f64> {
  let mesh = CartesianMeshInfo::new_unit(3, 2).compute_mesh();
  let pmesh = Rc::new(ParMesh::new(mesh, comm));
  let hcurl = FeSpace::hcurl(Rc::clone(&pmesh), 1).unwrap();
  let h1 = FeSpace::h1(pmesh, 1).unwrap();

  let mut spaces = FeSpaces::new();
  spaces
    .register("HCurl", shared(hcurl.clone()), Ownership::Owned)
    .unwrap();
  spaces.register("H1", shared(h1), Ownership::Owned).unwrap();

  let mut coefficients = Coefficients::new();
  coefficients
    .register_vector(
      "coil",
      VectorFunctionCoefficient::new(3, |x, t| {
        let (cx, cy) = (x[0] - 0.5, x[1] - 0.5);
        Vector::from_vec(vec![-cy * t, cx * t, x[2] * x[2]])
      }),
    )
    .unwrap();

  let params = DivFreeSourceParams::new("coil")
    .with_hcurl_space_name("HCurl")
    .with_h1_space_name("H1");
  let mut sources = Sources::new();
  sources
    .register_owned("coil", DivFreeSource::new(params))
    .unwrap();

  let mut fields = Fields::new();
  sources.init(&mut fields, &spaces, &coefficients).unwrap();
  assert!(fields.has("coil"));

  let mut form = LinearForm::new(hcurl);
  sources.apply(&mut form, t).unwrap();
  form.vector().as_slice().to_vec()
}

#[test]
fn repeated_application_accumulates() {
  let once = Vector::from_vec(source_rhs(Arc::new(SerialComm), 2.0));
  assert!(once.norm() > 0.0);

  let mesh = CartesianMeshInfo::new_unit(3, 2).compute_mesh();
  let pmesh = Rc::new(ParMesh::serial(mesh));
  let hcurl = FeSpace::hcurl(pmesh, 1).unwrap();
  let mut spaces = FeSpaces::new();
  spaces
    .register("HCurl", shared(hcurl.clone()), Ownership::Owned)
    .unwrap();
  let mut coefficients = Coefficients::new();
  coefficients
    .register_vector(
      "J",
      VectorFunctionCoefficient::new(3, |x, _| Vector::from_vec(vec![x[1], 0.0, 0.0])),
    )
    .unwrap();
  let mut source =
    DivFreeSource::new(DivFreeSourceParams::new("J").with_hcurl_space_name("HCurl"));
  source
    .init(&mut Fields::new(), &spaces, &coefficients)
    .unwrap();

  let mut form = LinearForm::new(hcurl);
  source.apply(&mut form, 0.0).unwrap();
  let single = form.vector().clone();
  assert!(single.norm() > 0.0);
  source.apply(&mut form, 0.0).unwrap();
  assert!((form.vector() - &single * 2.0).norm() <= 1e-12 * single.norm());
}

#[test]
fn distributed_source_matches_serial() {
  let serial = Vector::from_vec(source_rhs(Arc::new(SerialComm), 1.0));
  let results = ThreadComm::run(2, |comm| source_rhs(Arc::new(comm), 1.0));
  for rhs in results {
    let rhs = Vector::from_vec(rhs);
    assert!((&rhs - &serial).norm() <= 1e-10 * serial.norm());
  }
}
