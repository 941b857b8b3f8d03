use std::sync::Arc;

use approx::assert_abs_diff_eq;
use nalgebra::{Matrix3, Vector3};
use ndarray::{s, Array2};

use crate::auxiliary::template_structures::cubic_point_group_ops;
use crate::error::SymmetryError;
use crate::representation::irreps::{IrrepDecomposition, IrrepKind};
use crate::symmetry::prim_symmetry::kelvin_strain_matrix;
use crate::symmetry::symmetry_group::{GroupIndices, SymGroup};
use crate::symmetry::symmetry_operation::SymOp;

fn cubic_group() -> Arc<SymGroup> {
    Arc::new(SymGroup::from_elements(cubic_point_group_ops(), None, 1e-8).unwrap())
}

fn cartesian_matrices(group: &SymGroup) -> Vec<Array2<f64>> {
    group
        .elements()
        .iter()
        .map(|op| Array2::from_shape_fn((3, 3), |(i, j)| op.matrix()[(i, j)]))
        .collect()
}

fn c3_group() -> Arc<SymGroup> {
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
    Arc::new(SymGroup::from_elements(ops, None, 1e-8).unwrap())
}

fn assert_orthonormal(arr: &Array2<f64>) {
    assert_abs_diff_eq!(
        arr.t().dot(arr),
        Array2::eye(arr.ncols()),
        epsilon = 1e-8
    );
}

#[test]
fn test_irreps_vector_representation_of_oh() {
    let group = cubic_group();
    let decomposition = IrrepDecomposition::builder()
        .matrices(cartesian_matrices(&group))
        .group(group)
        .subspace(Array2::eye(3))
        .build()
        .unwrap();
    assert_eq!(decomposition.irreps().len(), 1);
    let irrep = &decomposition.irreps()[0];
    assert_eq!(irrep.dim, 3);
    assert_eq!(irrep.multiplicity, 1);
    assert_eq!(irrep.kind, IrrepKind::Real);
    assert!(irrep.complex_characters.is_none());
    assert_abs_diff_eq!(irrep.characters[0], 3.0, epsilon = 1e-10);
    assert_eq!(decomposition.blocks().len(), 1);
    assert_eq!(decomposition.blocks()[0].columns, 0..3);
    assert_eq!(decomposition.symmetry_adapted_subspace().dim(), (3, 3));
    assert_orthonormal(decomposition.symmetry_adapted_subspace());
}

#[test]
fn test_irreps_strain_of_oh() {
    let group = cubic_group();
    let matrices = group
        .elements()
        .iter()
        .map(|op| {
            let mat = kelvin_strain_matrix(op.matrix());
            Array2::from_shape_fn((6, 6), |(i, j)| mat[(i, j)])
        })
        .collect();
    let decomposition = IrrepDecomposition::builder()
        .group(group)
        .matrices(matrices)
        .subspace(Array2::eye(6))
        .build()
        .unwrap();
    let dims = decomposition
        .irreps()
        .iter()
        .map(|irrep| irrep.dim)
        .collect::<Vec<_>>();
    // The dilation leads; the shears appear last, from the off-diagonal Kelvin components.
    assert_eq!(dims, vec![1, 2, 3]);
    assert!(decomposition
        .irreps()
        .iter()
        .all(|irrep| irrep.kind == IrrepKind::Real && irrep.multiplicity == 1));
    assert!(decomposition.irreps()[0]
        .characters
        .iter()
        .all(|chi| (chi - 1.0).abs() < 1e-8));
    let dilation = decomposition.block_basis(0);
    let expected = 1.0 / 3.0_f64.sqrt();
    for i in 0..3 {
        assert_abs_diff_eq!(dilation[(i, 0)].abs(), expected, epsilon = 1e-8);
    }
    assert_orthonormal(decomposition.symmetry_adapted_subspace());
}

#[test]
fn test_irreps_aligned_copies() {
    let group = cubic_group();
    let matrices = cartesian_matrices(&group)
        .into_iter()
        .map(|mat| {
            let mut doubled = Array2::<f64>::zeros((6, 6));
            doubled.slice_mut(s![0..3, 0..3]).assign(&mat);
            doubled.slice_mut(s![3..6, 3..6]).assign(&mat);
            doubled
        })
        .collect();
    let decomposition = IrrepDecomposition::builder()
        .group(group)
        .matrices(matrices)
        .subspace(Array2::eye(6))
        .build()
        .unwrap();
    assert_eq!(decomposition.irreps().len(), 1);
    assert_eq!(decomposition.irreps()[0].multiplicity, 2);
    assert_eq!(decomposition.blocks().len(), 2);
    let first = decomposition.block_matrices(0);
    let second = decomposition.block_matrices(1);
    for (a, b) in first.iter().zip(second.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn test_irreps_complex_type() {
    let group = c3_group();
    let matrices = cartesian_matrices(&group);

    let decomposition = IrrepDecomposition::builder()
        .group(group.clone())
        .matrices(matrices.clone())
        .subspace(Array2::eye(3))
        .build()
        .unwrap();
    assert_eq!(decomposition.irreps().len(), 2);
    assert_eq!(decomposition.irreps()[0].kind, IrrepKind::Complex);
    assert_eq!(decomposition.irreps()[0].dim, 2);
    assert!(decomposition.irreps()[0].complex_characters.is_none());
    assert_eq!(decomposition.irreps()[1].kind, IrrepKind::Real);
    assert!(decomposition.blocks()[0].complex_basis.is_none());

    let decomposition = IrrepDecomposition::builder()
        .group(group)
        .matrices(matrices)
        .subspace(Array2::eye(3))
        .allow_complex(true)
        .build()
        .unwrap();
    let irrep = &decomposition.irreps()[0];
    let characters = irrep.complex_characters.as_ref().unwrap();
    assert_eq!(characters.len(), 3);
    assert_abs_diff_eq!(characters[0].re, 1.0, epsilon = 1e-8);
    assert_abs_diff_eq!(characters[0].im, 0.0, epsilon = 1e-8);
    for chi in characters.iter() {
        assert_abs_diff_eq!(chi.norm(), 1.0, epsilon = 1e-8);
    }
    assert_abs_diff_eq!(characters[1].im.abs(), 3.0_f64.sqrt() / 2.0, epsilon = 1e-8);

    // The paired columns (u, Ju) span the xy plane.
    let plane = decomposition.block_basis(0);
    assert_abs_diff_eq!(plane.row(2).to_owned(), ndarray::arr1(&[0.0, 0.0]), epsilon = 1e-8);
    assert_abs_diff_eq!(plane.column(0).dot(&plane.column(1)), 0.0, epsilon = 1e-8);
    let complex_basis = decomposition.blocks()[0].complex_basis.as_ref().unwrap();
    assert_eq!(complex_basis.dim(), (3, 1));
    let norm = complex_basis.iter().map(|z| z.norm_sqr()).sum::<f64>();
    assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-8);
}

#[test]
fn test_irreps_group_indices() {
    let group = cubic_group();
    let identity = group.identity_index();
    let decomposition = IrrepDecomposition::builder()
        .matrices(cartesian_matrices(&group))
        .group(group.clone())
        .group_indices(GroupIndices::from([identity]))
        .subspace(Array2::eye(3))
        .build()
        .unwrap();
    assert_eq!(decomposition.group_indices(), vec![identity]);
    assert_eq!(decomposition.irreps().len(), 1);
    assert_eq!(decomposition.irreps()[0].multiplicity, 3);
    assert_eq!(decomposition.irreps()[0].characters.len(), 1);
    assert_abs_diff_eq!(decomposition.irreps()[0].characters[0], 1.0, epsilon = 1e-10);

    let not_closed = (0..group.order())
        .find(|&g| group.multiply(g, g) != identity)
        .unwrap();
    assert!(matches!(
        IrrepDecomposition::builder()
            .matrices(cartesian_matrices(&group))
            .group(group.clone())
            .group_indices(GroupIndices::from([identity, not_closed]))
            .subspace(Array2::eye(3))
            .build(),
        Err(SymmetryError::InvalidGroup(_))
    ));
}

#[test]
fn test_irreps_invalid_subspaces() {
    let group = cubic_group();
    let mut line = Array2::<f64>::zeros((3, 1));
    line[(0, 0)] = 1.0;
    assert!(matches!(
        IrrepDecomposition::builder()
            .matrices(cartesian_matrices(&group))
            .group(group.clone())
            .subspace(line)
            .build(),
        Err(SymmetryError::DecompositionInconsistency(_))
    ));

    let mut degenerate = Array2::<f64>::eye(3);
    degenerate.column_mut(2).assign(&ndarray::arr1(&[1.0, 1.0, 0.0]));
    assert!(matches!(
        IrrepDecomposition::builder()
            .matrices(cartesian_matrices(&group))
            .group(group.clone())
            .subspace(degenerate)
            .build(),
        Err(SymmetryError::DecompositionInconsistency(_))
    ));

    assert!(matches!(
        IrrepDecomposition::builder()
            .matrices(cartesian_matrices(&group))
            .group(group)
            .subspace(Array2::eye(4))
            .build(),
        Err(SymmetryError::Configuration(_))
    ));
}

#[test]
fn test_irreps_subgroup_callbacks() {
    let group = cubic_group();
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = calls.clone();
    let source = group.clone();
    let decomposition = IrrepDecomposition::builder()
        .matrices(cartesian_matrices(&group))
        .group(group.clone())
        .subspace(Array2::eye(3))
        .make_cyclic_subgroups(Arc::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            source.make_cyclic_subgroups()
        }))
        .build()
        .unwrap();
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    let first = decomposition.cyclic_subgroups().len();
    let second = decomposition.cyclic_subgroups().len();
    assert_eq!(first, second);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(first, group.make_cyclic_subgroups().len());
}
