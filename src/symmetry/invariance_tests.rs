use std::collections::BTreeSet;

use nalgebra::{Matrix3, Vector3};

use crate::auxiliary::template_structures::{cubic_point_group_ops, simple_cubic_binary};
use crate::cluster::{Cluster, PrimPeriodicCluster};
use crate::error::SymmetryError;
use crate::symmetry::invariance::{invariant_subgroup, make_cluster_group, SymmetryTransformable};
use crate::symmetry::prim_symmetry::PrimSymmetry;

fn cubic_prim() -> PrimSymmetry {
    PrimSymmetry::new(simple_cubic_binary(2.0), cubic_point_group_ops()).unwrap()
}

fn assert_closed(indices: &[usize], prim: &PrimSymmetry) {
    let set = indices.iter().copied().collect::<BTreeSet<_>>();
    assert!(set.contains(&prim.factor_group().identity_index()));
    for &i in indices {
        for &j in indices {
            assert!(set.contains(&prim.factor_group().multiply(i, j)));
        }
    }
}

#[test]
fn test_invariant_subgroup_local_pair() {
    let prim = cubic_prim();
    let pair = Cluster::from_list(&[[0, 0, 0, 0], [0, 1, 0, 0]]).unwrap();
    let subgroup = invariant_subgroup(&pair, prim.factor_group(), prim.site_rep()).unwrap();
    // The stabiliser of a bond direction: C4v.
    assert_eq!(subgroup.order(), 8);
    assert_closed(subgroup.head_indices().unwrap(), &prim);
}

#[test]
fn test_invariant_subgroup_periodic_pair() {
    let prim = cubic_prim();
    let pair = Cluster::from_list(&[[0, 0, 0, 0], [0, 1, 0, 0]]).unwrap();
    let periodic = PrimPeriodicCluster::from(&pair);
    let subgroup = invariant_subgroup(&periodic, prim.factor_group(), prim.site_rep()).unwrap();
    // The stabiliser of a bond axis modulo translations: D4h.
    assert_eq!(subgroup.order(), 16);
    assert_closed(subgroup.head_indices().unwrap(), &prim);

    let point = Cluster::from_list(&[[0, 3, -1, 2]]).unwrap();
    let subgroup = invariant_subgroup(
        &PrimPeriodicCluster::from(&point),
        prim.factor_group(),
        prim.site_rep(),
    )
    .unwrap();
    assert_eq!(subgroup.order(), 48);
}

#[test]
fn test_invariant_subgroup_mismatched_rep() {
    let prim = cubic_prim();
    let pair = Cluster::from_list(&[[0, 0, 0, 0], [0, 1, 0, 0]]).unwrap();
    assert!(matches!(
        invariant_subgroup(&pair, prim.factor_group(), &prim.site_rep()[..3]),
        Err(SymmetryError::Configuration(_))
    ));
}

#[test]
fn test_make_cluster_group() {
    let prim = cubic_prim();
    let lattice = prim.structure().lattice();
    let pair = Cluster::from_list(&[[0, 0, 0, 0], [0, 1, 0, 0]]).unwrap();
    let (group, rep) =
        make_cluster_group(&pair, prim.factor_group(), lattice, prim.site_rep()).unwrap();
    assert_eq!(group.order(), 16);
    assert_eq!(rep.len(), 16);
    assert_closed(group.head_indices().unwrap(), &prim);

    // Every element leaves the pair exactly invariant, in both representations.
    for (op, site_rep) in group.elements().iter().zip(rep.iter()) {
        assert_eq!(pair.sym_transform(site_rep).unwrap(), pair);
        for site in pair.sites() {
            let image = op.apply_point(&prim.structure().site_position(site));
            let site_image = prim.structure().find_site(&image).unwrap();
            assert!(pair.contains(&site_image));
        }
    }

    let inversion = group
        .elements()
        .iter()
        .find(|op| (op.matrix() + Matrix3::identity()).norm() < 1e-12)
        .unwrap();
    assert!((inversion.translation() - Vector3::new(2.0, 0.0, 0.0)).norm() < 1e-12);

    // The empty cluster is invariant under the whole factor group.
    let (group, _) =
        make_cluster_group(&Cluster::default(), prim.factor_group(), lattice, prim.site_rep())
            .unwrap();
    assert_eq!(group.order(), 48);
}
