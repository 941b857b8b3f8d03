use nalgebra::{Matrix3, Vector3};

use crate::auxiliary::geometry::Lattice;
use crate::auxiliary::template_structures::{cubic_point_group_ops, tetragonal_point_group_ops};
use crate::error::SymmetryError;
use crate::symmetry::symmetry_group::{GroupIndices, SymGroup};
use crate::symmetry::symmetry_operation::SymOp;

fn cubic_group() -> SymGroup {
    SymGroup::from_elements(cubic_point_group_ops(), None, 1e-8).unwrap()
}

#[test]
fn test_symgroup_cubic_table() {
    let group = cubic_group();
    assert_eq!(group.order(), 48);
    assert_eq!(group.identity_index(), 0);
    assert!(group.head_indices().is_none());
    for i in 0..group.order() {
        let i_inv = group.inverse(i);
        assert_eq!(group.multiply(i, i_inv), 0);
        assert_eq!(group.multiply(i_inv, i), 0);
        for j in 0..group.order() {
            let product = &group.elements()[i] * &group.elements()[j];
            assert!(product.approx_eq(&group.elements()[group.multiply(i, j)], None, 1e-10));
        }
    }
}

#[test]
fn test_symgroup_rejects_non_groups() {
    let mut ops = cubic_point_group_ops();
    ops.pop();
    assert!(matches!(
        SymGroup::from_elements(ops, None, 1e-8),
        Err(SymmetryError::InvalidGroup(_))
    ));

    let mut ops = cubic_point_group_ops();
    ops.push(SymOp::identity());
    assert!(matches!(
        SymGroup::from_elements(ops, None, 1e-8),
        Err(SymmetryError::InvalidGroup(_))
    ));

    assert!(SymGroup::from_elements(vec![], None, 1e-8).is_err());
}

#[test]
fn test_symgroup_periodicity() {
    let c2z = Matrix3::from_diagonal(&Vector3::new(-1.0, -1.0, 1.0));
    let screw = SymOp::new(c2z, Vector3::new(0.0, 0.0, 0.5));
    let ops = vec![SymOp::identity(), screw];
    assert!(SymGroup::from_elements(ops.clone(), None, 1e-8).is_err());

    let lattice = Lattice::new(Matrix3::identity(), 1e-6).unwrap();
    let group = SymGroup::from_elements(ops, Some(&lattice), 1e-8).unwrap();
    assert_eq!(group.order(), 2);
    assert_eq!(group.multiply(1, 1), 0);
    assert_eq!(group.inverse(1), 1);
}

#[test]
fn test_symgroup_subgroups() {
    let group = cubic_group();
    let d4h_indices = group
        .elements()
        .iter()
        .enumerate()
        .filter(|(_, op)| op.matrix()[(2, 2)].abs() > 0.5)
        .map(|(i, _)| i)
        .collect::<GroupIndices>();
    let d4h = group.subgroup(&d4h_indices).unwrap();
    assert_eq!(d4h.order(), 16);
    assert_eq!(
        d4h.head_indices().unwrap(),
        d4h_indices.iter().copied().collect::<Vec<_>>().as_slice()
    );
    assert_eq!(d4h.identity_index(), 0);

    let not_closed = GroupIndices::from([0, 1, 2]);
    let closure = group.closure(&not_closed);
    if closure != not_closed {
        assert!(matches!(
            group.subgroup(&not_closed),
            Err(SymmetryError::InvalidGroup(_))
        ));
    }
    assert!(group.subgroup(&closure).is_ok());
    assert_eq!(group.order() % closure.len(), 0);
}

#[test]
fn test_symgroup_cyclic_subgroups() {
    let group = cubic_group();
    let cyclic = group.make_cyclic_subgroups();
    assert_eq!(cyclic.len(), 10);
    assert_eq!(cyclic.iter().map(|orbit| orbit.len()).sum::<usize>(), 34);
    for orbit in cyclic.iter() {
        let order = orbit.iter().next().unwrap().len();
        assert!(orbit.iter().all(|subgroup| subgroup.len() == order));
        assert_eq!(48 % order, 0);
    }
}

#[test]
fn test_symgroup_all_subgroups() {
    let group = cubic_group();
    let all = group.make_all_subgroups();
    assert_eq!(all.len(), 33);
    assert_eq!(all.iter().map(|orbit| orbit.len()).sum::<usize>(), 98);
    assert!(all
        .iter()
        .any(|orbit| orbit.len() == 1 && orbit.iter().next().unwrap().len() == 48));

    let d4h = SymGroup::from_elements(tetragonal_point_group_ops(), None, 1e-8).unwrap();
    for orbit in d4h.make_all_subgroups().iter() {
        for subgroup in orbit.iter() {
            assert!(d4h.subgroup(subgroup).is_ok());
        }
    }
}
