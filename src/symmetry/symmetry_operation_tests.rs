use approx::assert_relative_eq;
use nalgebra::{Matrix3, Vector3};

use crate::auxiliary::geometry::{proper_rotation_matrix, Lattice};
use crate::symmetry::symmetry_operation::SymOp;

#[test]
fn test_symop_composition() {
    // ==========================
    // Screw axis along z
    // ==========================
    let c4z = proper_rotation_matrix(std::f64::consts::FRAC_PI_2, &Vector3::z(), 1);
    let screw = SymOp::new(c4z, Vector3::new(0.0, 0.0, 0.25));
    let point = Vector3::new(1.0, 0.0, 0.0);
    assert_relative_eq!(
        screw.apply_point(&point),
        Vector3::new(0.0, 1.0, 0.25),
        epsilon = 1e-12
    );

    let screw2 = &screw * &screw;
    assert_relative_eq!(
        screw2.apply_point(&point),
        screw.apply_point(&screw.apply_point(&point)),
        epsilon = 1e-12
    );
    assert_relative_eq!(*screw2.translation(), Vector3::new(0.0, 0.0, 0.5), epsilon = 1e-12);

    let screw4 = &screw2 * &screw2;
    assert!(!screw4.approx_eq(&SymOp::identity(), None, 1e-10));
    let lattice = Lattice::new(Matrix3::identity(), 1e-8).unwrap();
    assert!(screw4.approx_eq(&SymOp::identity(), Some(&lattice), 1e-10));

    let product = &screw * &screw.inverse();
    assert!(product.approx_eq(&SymOp::identity(), None, 1e-12));
    assert!(screw.is_proper());
    assert!(!SymOp::new(-Matrix3::identity(), Vector3::zeros()).is_proper());
}

#[test]
fn test_symop_vectors_ignore_translation() {
    let op = SymOp::new(-Matrix3::identity(), Vector3::new(0.5, 0.5, 0.5));
    let v = Vector3::new(1.0, 2.0, 3.0);
    assert_eq!(op.apply_vector(&v), -v);
    assert_eq!(op.apply_point(&v), Vector3::new(-0.5, -1.5, -2.5));
    assert_eq!(op.point_op().apply_point(&v), -v);
}

#[test]
fn test_symop_yaml() {
    let yaml = "matrix: [[0, -1, 0], [1, 0, 0], [0, 0, 1]]\ntranslation: [0.0, 0.0, 0.5]";
    let op: SymOp = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(op.matrix()[(0, 1)], -1.0);
    assert_eq!(op.matrix()[(1, 0)], 1.0);
    assert_eq!(op.translation()[2], 0.5);

    let op_no_translation: SymOp = serde_yaml::from_str("matrix: [[1, 0, 0], [0, 1, 0], [0, 0, 1]]").unwrap();
    assert!(op_no_translation.approx_eq(&SymOp::identity(), None, 1e-14));

    let written = serde_yaml::to_string(&op).unwrap();
    let reread: SymOp = serde_yaml::from_str(&written).unwrap();
    assert_eq!(reread, op);
}
