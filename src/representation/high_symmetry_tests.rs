use std::sync::Arc;

use approx::assert_abs_diff_eq;
use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;

use crate::auxiliary::misc::column_rank;
use crate::auxiliary::template_structures::cubic_point_group_ops;
use crate::error::SymmetryError;
use crate::representation::high_symmetry::{
    make_high_symmetry_directions, make_irreducible_wedge, vector_space_sym_report,
};
use crate::representation::irreps::IrrepDecomposition;
use crate::symmetry::symmetry_group::SymGroup;
use crate::symmetry::symmetry_operation::SymOp;

fn vector_decomposition(ops: Vec<SymOp>) -> IrrepDecomposition {
    let group = Arc::new(SymGroup::from_elements(ops, None, 1e-8).unwrap());
    let matrices = group
        .elements()
        .iter()
        .map(|op| Array2::from_shape_fn((3, 3), |(i, j)| op.matrix()[(i, j)]))
        .collect();
    IrrepDecomposition::builder()
        .group(group)
        .matrices(matrices)
        .subspace(Array2::eye(3))
        .build()
        .unwrap()
}

#[test]
fn test_high_symmetry_directions_of_oh() {
    let decomposition = vector_decomposition(cubic_point_group_ops());
    let orbits = make_high_symmetry_directions(&decomposition, 0);
    let summary = orbits
        .iter()
        .map(|orbit| (orbit.directions.len(), orbit.stabiliser_order))
        .collect::<Vec<_>>();
    // <100>, <111> and <110>.
    assert_eq!(summary, vec![(6, 8), (8, 6), (12, 4)]);
    for v in orbits[0].directions.iter() {
        assert_abs_diff_eq!(v.iter().map(|x| x.abs()).sum::<f64>(), 1.0, epsilon = 1e-8);
    }
    for v in orbits[1].directions.iter() {
        for x in v.iter() {
            assert_abs_diff_eq!(x.abs(), 1.0 / 3.0_f64.sqrt(), epsilon = 1e-8);
        }
    }
}

#[test]
fn test_irreducible_wedge_of_oh() {
    let decomposition = vector_decomposition(cubic_point_group_ops());
    let wedge = make_irreducible_wedge(&decomposition, 0);
    assert_eq!(wedge.block_index, 0);
    assert_eq!(wedge.irrep_index, 0);
    assert_eq!(wedge.axes.dim(), (3, 3));
    assert_eq!(column_rank(&wedge.axes, 1e-8), 3);
    assert_eq!(wedge.orbit_size, 48);
    // One edge along each kind of high-symmetry direction.
    let nonzero = wedge
        .axes
        .columns()
        .into_iter()
        .map(|col| col.iter().filter(|x| x.abs() > 1e-8).count())
        .collect::<Vec<_>>();
    assert_eq!(nonzero, vec![1, 3, 2]);
}

#[test]
fn test_high_symmetry_without_fixed_lines() {
    // A threefold rotation fixes no line of the xy plane.
    let angle = 2.0 * std::f64::consts::PI / 3.0;
    let rot = Matrix3::new(
        angle.cos(),
        -angle.sin(),
        0.0,
        angle.sin(),
        angle.cos(),
        0.0,
        0.0,
        0.0,
        1.0,
    );
    let ops = vec![
        SymOp::identity(),
        SymOp::new(rot, Vector3::zeros()),
        SymOp::new(rot * rot, Vector3::zeros()),
    ];
    let decomposition = vector_decomposition(ops);
    assert_eq!(decomposition.blocks()[0].columns, 0..2);
    assert!(make_high_symmetry_directions(&decomposition, 0).is_empty());
    let wedge = make_irreducible_wedge(&decomposition, 0);
    assert_eq!(wedge.axes.dim(), (3, 2));
    assert_eq!(wedge.orbit_size, 3);

    // The z axis is fixed by every element.
    let orbits = make_high_symmetry_directions(&decomposition, 1);
    assert_eq!(orbits.len(), 2);
    assert!(orbits.iter().all(|orbit| orbit.stabiliser_order == 3));
}

#[test]
fn test_vector_space_sym_report() {
    let decomposition = vector_decomposition(cubic_point_group_ops());
    let glossary = vec!["dx".to_string(), "dy".to_string(), "dz".to_string()];

    let report = vector_space_sym_report(&decomposition, false, glossary.clone()).unwrap();
    assert!(report.high_symmetry_directions.is_none());
    assert!(report.irreducible_wedges.is_none());
    assert_eq!(report.irreps.len(), 1);
    assert_eq!(report.axis_glossary, glossary);
    assert_eq!(
        &report.symmetry_adapted_subspace,
        decomposition.symmetry_adapted_subspace()
    );

    let report = vector_space_sym_report(&decomposition, true, glossary).unwrap();
    assert_eq!(report.high_symmetry_directions.as_ref().unwrap()[0].len(), 3);
    assert_eq!(report.irreducible_wedges.as_ref().unwrap()[0].orbit_size, 48);
    assert!(report.to_string().contains("wedge orbit size 48"));

    assert!(matches!(
        vector_space_sym_report(&decomposition, true, vec!["dx".to_string()]),
        Err(SymmetryError::Configuration(_))
    ));
}
