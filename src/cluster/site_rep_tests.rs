use nalgebra::{Matrix3, Vector3};

use crate::auxiliary::geometry::proper_rotation_matrix;
use crate::auxiliary::template_structures::{cscl_alloy, cubic_point_group_ops};
use crate::cluster::site_rep::{make_site_coordinate_sym_rep, SiteCoordinateRep};
use crate::cluster::IntegralSiteCoordinate;
use crate::error::SymmetryError;
use crate::symmetry::symmetry_group::SymGroup;
use crate::symmetry::symmetry_operation::SymOp;

#[test]
fn test_site_rep_cscl() {
    let structure = cscl_alloy(2.0);
    let ops = cubic_point_group_ops();
    let rep = make_site_coordinate_sym_rep(&ops, &structure).unwrap();
    assert_eq!(rep.len(), 48);
    assert_eq!(rep[0], SiteCoordinateRep::identity(2));

    let inversion = ops
        .iter()
        .position(|op| (op.matrix() + Matrix3::identity()).norm() < 1e-12)
        .unwrap();
    let centre = IntegralSiteCoordinate::new(1, Vector3::new(0, 0, 0));
    assert_eq!(
        rep[inversion].apply(&centre),
        IntegralSiteCoordinate::new(1, Vector3::new(-1, -1, -1))
    );
    let corner = IntegralSiteCoordinate::new(0, Vector3::new(1, 2, 3));
    assert_eq!(
        rep[inversion].apply(&corner),
        IntegralSiteCoordinate::new(0, Vector3::new(-1, -2, -3))
    );

    // Every operation agrees with its Cartesian action.
    for (op, site_rep) in ops.iter().zip(rep.iter()) {
        for site in [corner, centre] {
            let expected = op.apply_point(&structure.site_position(&site));
            let actual = structure.site_position(&site_rep.apply(&site));
            assert!((expected - actual).norm() < 1e-10);
        }
    }
}

#[test]
fn test_site_rep_composition_law() {
    let structure = cscl_alloy(2.0);
    let group = SymGroup::from_elements(cubic_point_group_ops(), None, 1e-8).unwrap();
    let rep = make_site_coordinate_sym_rep(group.elements(), &structure).unwrap();
    let site = IntegralSiteCoordinate::new(1, Vector3::new(2, -1, 0));
    for i in 0..group.order() {
        for j in 0..group.order() {
            let k = group.multiply(i, j);
            assert_eq!(rep[k], rep[i].compose(&rep[j]));
            assert_eq!(rep[k].apply(&site), rep[i].apply(&rep[j].apply(&site)));
        }
    }
}

#[test]
fn test_site_rep_translated() {
    let structure = cscl_alloy(2.0);
    let rep = make_site_coordinate_sym_rep(&cubic_point_group_ops(), &structure).unwrap();
    let delta = Vector3::new(1, 0, -2);
    let site = IntegralSiteCoordinate::new(0, Vector3::new(0, 1, 0));
    assert_eq!(
        rep[5].translated(&delta).apply(&site),
        &rep[5].apply(&site) + &delta
    );
}

#[test]
fn test_site_rep_inconsistent_operations() {
    let structure = cscl_alloy(2.0);
    let c6z = SymOp::new(
        proper_rotation_matrix(std::f64::consts::FRAC_PI_3, &Vector3::z(), 1),
        Vector3::zeros(),
    );
    assert!(matches!(
        make_site_coordinate_sym_rep(&[SymOp::identity(), c6z], &structure),
        Err(SymmetryError::GeometricInconsistency(_))
    ));

    let shift = SymOp::translation_op(Vector3::new(0.5, 0.0, 0.0));
    assert!(matches!(
        make_site_coordinate_sym_rep(&[shift], &structure),
        Err(SymmetryError::GeometricInconsistency(_))
    ));

    // Swapping the corner and centre sites maps an alloy site onto an inert one, which is still
    // a valid geometric permutation.
    let body_shift = SymOp::translation_op(Vector3::new(1.0, 1.0, 1.0));
    let rep = make_site_coordinate_sym_rep(&[body_shift], &structure).unwrap();
    assert_eq!(rep[0].sublattice_permutation().image(), &[1, 0]);
}
