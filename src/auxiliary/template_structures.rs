//! Template structures and symmetry operations used throughout the tests.

use itertools::{iproduct, Itertools};
use nalgebra::{Matrix3, Vector3};

use crate::auxiliary::geometry::Lattice;
use crate::auxiliary::structure::{BasisSite, DofKind, DofSet, Structure};
use crate::symmetry::symmetry_operation::SymOp;

const TEMPLATE_TOLERANCE: f64 = 1e-5;

/// The 48 operations of the cubic point group $`O_h`$ as signed permutation matrices, identity
/// first.
pub fn cubic_point_group_ops() -> Vec<SymOp> {
    (0..3)
        .permutations(3)
        .flat_map(|perm| {
            iproduct!([1.0, -1.0], [1.0, -1.0], [1.0, -1.0]).map(move |(s0, s1, s2)| {
                let signs = [s0, s1, s2];
                let mut mat = Matrix3::zeros();
                for (row, &col) in perm.iter().enumerate() {
                    mat[(row, col)] = signs[row];
                }
                SymOp::new(mat, Vector3::zeros())
            })
        })
        .collect()
}

/// The 16 operations of $`D_{4h}`$ with the principal axis along $`z`$.
pub fn tetragonal_point_group_ops() -> Vec<SymOp> {
    cubic_point_group_ops()
        .into_iter()
        .filter(|op| op.matrix()[(2, 2)].abs() > 0.5)
        .collect()
}

/// The identity operation alone.
pub fn trivial_group_ops() -> Vec<SymOp> {
    vec![SymOp::identity()]
}

/// A simple cubic lattice of edge `a`.
pub fn cubic_lattice(a: f64) -> Lattice {
    Lattice::new(Matrix3::identity() * a, TEMPLATE_TOLERANCE)
        .expect("A cubic lattice is never degenerate.")
}

/// A simple cubic binary alloy with one site per cell carrying occupation, displacement and
/// strain degrees of freedom.
pub fn simple_cubic_binary(a: f64) -> Structure {
    let site = BasisSite::new(Vector3::zeros(), &["A", "B"])
        .with_dof(DofSet::standard(DofKind::Displacement).expect("Displacement is continuous."));
    Structure::builder()
        .lattice(cubic_lattice(a))
        .basis(vec![site])
        .global_dofs(vec![
            DofSet::standard(DofKind::Strain).expect("Strain is continuous.")
        ])
        .build()
        .expect("Unable to construct a simple cubic binary structure.")
}

/// A CsCl-type structure: an `A`/`B` alloy site at the cube corner and an inert `C` site at the
/// body centre.
pub fn cscl_alloy(a: f64) -> Structure {
    let corner = BasisSite::new(Vector3::zeros(), &["A", "B"]);
    let centre = BasisSite::new(Vector3::new(0.5, 0.5, 0.5) * a, &["C"]);
    Structure::builder()
        .lattice(cubic_lattice(a))
        .basis(vec![corner, centre])
        .build()
        .expect("Unable to construct a CsCl-type structure.")
}

/// A simple tetragonal structure with a displacive site, elongated along $`z`$.
pub fn simple_tetragonal(a: f64, c: f64) -> Structure {
    let lattice = Lattice::new(
        Matrix3::from_diagonal(&Vector3::new(a, a, c)),
        TEMPLATE_TOLERANCE,
    )
    .expect("A tetragonal lattice is never degenerate.");
    let site = BasisSite::new(Vector3::zeros(), &["A"])
        .with_dof(DofSet::standard(DofKind::Displacement).expect("Displacement is continuous."));
    Structure::builder()
        .lattice(lattice)
        .basis(vec![site])
        .global_dofs(vec![
            DofSet::standard(DofKind::Strain).expect("Strain is continuous.")
        ])
        .build()
        .expect("Unable to construct a simple tetragonal structure.")
}
