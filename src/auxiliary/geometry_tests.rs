use approx::{assert_abs_diff_eq, assert_relative_eq};
use nalgebra::{Matrix3, Vector3};

use crate::auxiliary::geometry::{self, proper_rotation_matrix, Lattice};
use crate::error::SymmetryError;

fn fcc_lattice() -> Lattice {
    Lattice::new(
        Matrix3::new(0.0, 2.0, 2.0, 2.0, 0.0, 2.0, 2.0, 2.0, 0.0),
        1e-5,
    )
    .unwrap()
}

#[test]
fn test_lattice_rejects_degenerate_vectors() {
    let degenerate = Matrix3::new(1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0);
    assert!(matches!(
        Lattice::new(degenerate, 1e-5),
        Err(SymmetryError::Configuration(_))
    ));
}

#[test]
fn test_lattice_coordinates() {
    let lattice = fcc_lattice();
    assert_relative_eq!(lattice.volume(), 16.0, epsilon = 1e-12);

    let cart = Vector3::new(1.0, 3.0, -2.0);
    let frac = lattice.frac_coords(&cart);
    assert_relative_eq!(lattice.cart_coords(&frac), cart, epsilon = 1e-12);

    let n = Vector3::new(1, -2, 3);
    let v = lattice.lattice_vector(&n);
    assert_eq!(v, Vector3::new(2.0, 8.0, -2.0));
    assert_eq!(lattice.as_lattice_vector(&v), Some(n));
    assert_eq!(lattice.as_lattice_vector(&Vector3::new(1.0, 0.0, 0.0)), None);
    assert!(lattice.is_equivalent_position(&(cart + v), &cart));
}

#[test]
fn test_lattice_integral_frac_matrix() {
    let lattice = fcc_lattice();
    let c4z = proper_rotation_matrix(std::f64::consts::FRAC_PI_2, &Vector3::z(), 1);
    let frac = lattice.integral_frac_matrix(&c4z).unwrap();
    assert_relative_eq!(frac.map(|x| x as f64).determinant(), 1.0, epsilon = 1e-12);

    let c3z = proper_rotation_matrix(2.0 * std::f64::consts::FRAC_PI_3, &Vector3::z(), 1);
    assert!(lattice.integral_frac_matrix(&c3z).is_none());
}

#[test]
fn test_lattice_points_within() {
    let cubic = Lattice::new(Matrix3::identity(), 1e-5).unwrap();
    let origin = Vector3::zeros();
    assert_eq!(cubic.points_within(&origin, 0.5).len(), 1);
    assert_eq!(cubic.points_within(&origin, 1.0).len(), 7);
    assert_eq!(cubic.points_within(&origin, 2.0_f64.sqrt()).len(), 19);
    assert_eq!(cubic.points_within(&origin, 3.0_f64.sqrt()).len(), 27);

    let fcc = fcc_lattice();
    // Twelve nearest neighbours at a distance of 2√2.
    assert_eq!(fcc.points_within(&origin, 8.0_f64.sqrt()).len(), 13);
}

#[test]
fn test_lattice_serde() {
    let lattice = fcc_lattice();
    let yaml = serde_yaml::to_string(&lattice).unwrap();
    let read: Lattice = serde_yaml::from_str(&yaml).unwrap();
    assert_abs_diff_eq!(read, lattice);

    let bad = "vectors: [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]";
    assert!(serde_yaml::from_str::<Lattice>(bad).is_err());
}

#[test]
fn test_rotation_matrices() {
    let c2x = proper_rotation_matrix(std::f64::consts::PI, &Vector3::x(), 1);
    assert_relative_eq!(
        c2x,
        Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, -1.0),
        epsilon = 1e-12
    );
    let c4z_cubed = proper_rotation_matrix(std::f64::consts::FRAC_PI_2, &Vector3::z(), 3);
    assert_relative_eq!(
        c4z_cubed,
        Matrix3::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0),
        epsilon = 1e-12
    );
    assert_eq!(geometry::round_to_integer(2.000_001, 1e-5), Some(2));
    assert_eq!(geometry::round_to_integer(2.1, 1e-5), None);
}
