use approx::assert_relative_eq;
use nalgebra::{DMatrix, Vector3};

use crate::auxiliary::structure::{BasisSite, DofKind, DofSet, Structure};
use crate::auxiliary::template_structures::{cscl_alloy, cubic_lattice, simple_cubic_binary};
use crate::cluster::IntegralSiteCoordinate;
use crate::error::SymmetryError;

#[test]
fn test_dof_kind_names() {
    assert_eq!("disp".parse::<DofKind>().unwrap(), DofKind::Displacement);
    assert_eq!(DofKind::Strain.to_string(), "strain");
    assert!(matches!(
        "magspin".parse::<DofKind>(),
        Err(SymmetryError::Configuration(_))
    ));
    assert!(DofKind::Occupation.is_local());
    assert!(!DofKind::Strain.is_local());
}

#[test]
fn test_dofset_validation() {
    assert!(DofSet::standard(DofKind::Occupation).is_err());

    let disp = DofSet::standard(DofKind::Displacement).unwrap();
    assert_eq!(disp.dim(), 3);
    assert_eq!(disp.axis_names(), vec!["dx", "dy", "dz"]);
    assert_eq!(disp.basis_matrix(), DMatrix::identity(3, 3));

    let planar = DofSet::new(
        DofKind::Displacement,
        vec!["u".to_string(), "v".to_string()],
        vec![vec![1.0, 1.0, 0.0], vec![1.0, -1.0, 0.0]],
    )
    .unwrap();
    assert_eq!(planar.dim(), 2);
    assert_relative_eq!(planar.basis_matrix()[(1, 1)], -1.0);

    assert!(DofSet::new(DofKind::Displacement, vec![], vec![vec![1.0, 0.0]]).is_err());
    assert!(DofSet::new(
        DofKind::Displacement,
        vec![],
        vec![vec![1.0, 0.0, 0.0], vec![2.0, 0.0, 0.0]]
    )
    .is_err());
    assert!(DofSet::new(DofKind::Strain, vec!["e1".to_string()], vec![]).is_err());
}

#[test]
fn test_structure_validation() {
    let lattice = cubic_lattice(1.0);
    let empty_occupants = Structure::builder()
        .lattice(lattice.clone())
        .basis(vec![BasisSite::new(Vector3::zeros(), &[])])
        .build();
    assert!(empty_occupants.is_err());

    let coincident = Structure::builder()
        .lattice(lattice.clone())
        .basis(vec![
            BasisSite::new(Vector3::zeros(), &["A"]),
            BasisSite::new(Vector3::new(1.0, 0.0, 0.0), &["B"]),
        ])
        .build();
    assert!(coincident.is_err());

    let local_strain = Structure::builder()
        .lattice(lattice)
        .basis(vec![BasisSite::new(Vector3::zeros(), &["A"])
            .with_dof(DofSet::standard(DofKind::Strain).unwrap())])
        .build();
    assert!(local_strain.is_err());
}

#[test]
fn test_structure_sites() {
    let structure = cscl_alloy(2.0);
    assert_eq!(structure.n_sublattices(), 2);
    assert!(structure.is_alloy_site(0));
    assert!(!structure.is_alloy_site(1));
    assert!(!structure.is_dof_site(1));
    assert_eq!(structure.local_dof_dim(0, DofKind::Occupation), 2);
    assert_eq!(structure.local_dof_dim(0, DofKind::Displacement), 0);

    let site = IntegralSiteCoordinate::new(1, Vector3::new(-1, 0, 2));
    let position = structure.site_position(&site);
    assert_relative_eq!(position, Vector3::new(-1.0, 1.0, 5.0));
    assert_eq!(structure.find_site(&position), Some(site));
    assert_eq!(structure.find_site(&Vector3::new(0.5, 0.0, 0.0)), None);

    // Eight body-centre neighbours at √3 around the origin corner site.
    let neighbours = structure.sites_within(&Vector3::zeros(), 3.0_f64.sqrt(), |b| b == 1);
    assert_eq!(neighbours.len(), 8);
    assert!(neighbours.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_structure_yaml() {
    let structure = simple_cubic_binary(3.0);
    let yaml = serde_yaml::to_string(&structure).unwrap();
    let read: Structure = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(read.basis(), structure.basis());
    assert_eq!(read.global_dofs(), structure.global_dofs());

    let input = r#"
lattice:
  vectors: [[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]
basis:
  - position: [0.0, 0.0, 0.0]
    occupants: [Zr, Va]
    local_dofs:
      - kind: disp
"#;
    let read: Structure = serde_yaml::from_str(input).unwrap();
    assert_eq!(read.local_dof_dim(0, DofKind::Displacement), 3);
    assert!(read.global_dofs().is_empty());

    let invalid = r#"
lattice:
  vectors: [[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]
basis: []
"#;
    assert!(serde_yaml::from_str::<Structure>(invalid).is_err());
}
