use std::str::FromStr;
use std::sync::Arc;

use crate::auxiliary::template_structures::{cscl_alloy, cubic_point_group_ops, simple_cubic_binary};
use crate::cluster::cluster_specs::{ClusterSpecs, SiteFilterMethod};
use crate::cluster::orbit::OrbitGenerator;
use crate::cluster::Cluster;
use crate::error::SymmetryError;
use crate::symmetry::prim_symmetry::PrimSymmetry;
use crate::symmetry::symmetry_group::GroupIndices;

fn cscl_prim() -> Arc<PrimSymmetry> {
    Arc::new(PrimSymmetry::new(cscl_alloy(2.0), cubic_point_group_ops()).unwrap())
}

#[test]
fn test_site_filter_method_parsing() {
    assert_eq!(
        SiteFilterMethod::from_str("dof_sites").unwrap(),
        SiteFilterMethod::DofSites
    );
    assert_eq!(
        SiteFilterMethod::from_str("alloy_sites").unwrap(),
        SiteFilterMethod::AlloySites
    );
    assert_eq!(
        SiteFilterMethod::from_str("all_sites").unwrap(),
        SiteFilterMethod::AllSites
    );
    assert!(matches!(
        SiteFilterMethod::from_str("occupied_sites"),
        Err(SymmetryError::Configuration(_))
    ));
    assert_eq!(SiteFilterMethod::default(), SiteFilterMethod::DofSites);
    assert_eq!(SiteFilterMethod::AlloySites.to_string(), "alloy_sites");
    assert_eq!(
        serde_yaml::from_str::<SiteFilterMethod>("all_sites").unwrap(),
        SiteFilterMethod::AllSites
    );
    assert!(serde_yaml::from_str::<SiteFilterMethod>("some_sites").is_err());
}

#[test]
fn test_site_filter_method_eligibility() {
    let structure = cscl_alloy(2.0);
    assert!(SiteFilterMethod::DofSites.is_eligible(&structure, 0));
    assert!(!SiteFilterMethod::DofSites.is_eligible(&structure, 1));
    assert!(SiteFilterMethod::AlloySites.is_eligible(&structure, 0));
    assert!(!SiteFilterMethod::AlloySites.is_eligible(&structure, 1));
    assert!(SiteFilterMethod::AllSites.is_eligible(&structure, 1));

    let structure = simple_cubic_binary(2.0);
    assert!(SiteFilterMethod::DofSites.is_eligible(&structure, 0));
}

#[test]
fn test_cluster_specs_defaults() {
    let prim = cscl_prim();
    let specs = ClusterSpecs::builder().prim(prim.clone()).build().unwrap();
    assert!(Arc::ptr_eq(specs.generating_group(), prim.factor_group()));
    assert_eq!(specs.site_filter_method(), SiteFilterMethod::DofSites);
    assert!(specs.max_length().is_empty());
    assert!(specs.custom_generators().is_empty());
    assert!(specs.phenomenal().is_none());
    assert!(!specs.include_phenomenal_sites());
    assert_eq!(specs.n_branches(), 2);
    assert!(specs.is_eligible(0));
    assert!(!specs.is_eligible(1));

    let (group, rep) = specs.orbit_group().unwrap();
    assert_eq!(group.order(), 48);
    assert_eq!(rep.len(), 48);
}

#[test]
fn test_cluster_specs_validation() {
    assert!(matches!(
        ClusterSpecs::builder().build(),
        Err(SymmetryError::Configuration(_))
    ));
    assert!(matches!(
        ClusterSpecs::builder()
            .prim(cscl_prim())
            .max_length(vec![0.0, 0.0, -1.0])
            .build(),
        Err(SymmetryError::Configuration(_))
    ));
    assert!(matches!(
        ClusterSpecs::builder()
            .prim(cscl_prim())
            .cutoff_radius(vec![0.0, f64::NAN])
            .build(),
        Err(SymmetryError::Configuration(_))
    ));
    assert!(matches!(
        ClusterSpecs::builder()
            .prim(cscl_prim())
            .phenomenal(Cluster::from_list(&[[2, 0, 0, 0]]).unwrap())
            .build(),
        Err(SymmetryError::Configuration(_))
    ));
    assert!(matches!(
        ClusterSpecs::builder()
            .prim(cscl_prim())
            .custom_generators(vec![OrbitGenerator::new(
                Cluster::from_list(&[[0, 0, 0, 0], [3, 0, 0, 0]]).unwrap(),
                true,
            )])
            .build(),
        Err(SymmetryError::Configuration(_))
    ));
}

#[test]
fn test_cluster_specs_generating_subgroup() {
    let prim = cscl_prim();
    // The proper rotations.
    let proper = prim
        .factor_group()
        .elements()
        .iter()
        .enumerate()
        .filter_map(|(i, op)| op.is_proper().then_some(i))
        .collect::<GroupIndices>();
    let subgroup = Arc::new(prim.factor_subgroup(&proper).unwrap());
    let specs = ClusterSpecs::builder()
        .prim(prim.clone())
        .generating_group(subgroup)
        .build()
        .unwrap();
    assert_eq!(specs.generating_group().order(), 24);
    let rep = specs.generating_rep().unwrap();
    assert_eq!(rep.len(), 24);
    for (&i, r) in proper.iter().zip(rep.iter()) {
        assert_eq!(r, &prim.site_rep()[i]);
    }
}

#[test]
fn test_cluster_specs_local_orbit_group() {
    let specs = ClusterSpecs::builder()
        .prim(cscl_prim())
        .phenomenal(Cluster::from_list(&[[0, 0, 0, 0], [1, 0, 0, 0]]).unwrap())
        .cutoff_radius(vec![0.0, 3.0])
        .build()
        .unwrap();
    let (group, rep) = specs.orbit_group().unwrap();
    // The stabiliser of a body diagonal: C3v.
    assert_eq!(group.order(), 6);
    assert_eq!(rep.len(), 6);
    assert!(specs.to_string().contains("Phenomenal cluster"));
}
