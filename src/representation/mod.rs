//! Matrix representations of symmetry groups acting on degree-of-freedom spaces.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use ndarray::{s, Array2};
use rayon::prelude::*;

use crate::auxiliary::misc::to_array2;
use crate::auxiliary::structure::DofKind;
use crate::configuration::supercell::{Supercell, SupercellSymOp};
use crate::error::SymmetryError;
use crate::symmetry::prim_symmetry::PrimSymmetry;
use crate::symmetry::symmetry_group::SymGroup;

pub mod high_symmetry;
pub mod irreps;


/// Two representation matrices whose entries all differ by less than this threshold are taken
/// to be the same matrix.
pub const MATRIX_REP_EQUIVALENCE_THRESHOLD: f64 = 1e-5;

/// A matrix representation with duplicate matrices collapsed.
///
/// Elements of the input group that act identically on the DoF space share one matrix, and the
/// distinct matrices form the reduced group.
#[derive(Clone)]
pub struct MatrixRepresentation {
    /// One matrix per element of [`Self::reduced_group`].
    matrices: Vec<Array2<f64>>,

    /// The group of distinct matrices. Its head indices are the representative input elements.
    reduced_group: Arc<SymGroup>,

    /// For each input element, the index of its matrix.
    element_to_matrix: Vec<usize>,
}

impl MatrixRepresentation {
    /// Collapses one matrix per element of `group` into a matrix representation.
    ///
    /// The multiplication table of the reduced group is inherited from that of `group`.
    ///
    /// # Errors
    ///
    /// Errors if the number of matrices does not match the group order, or if the collapsed
    /// matrices do not form a group.
    pub fn from_group_matrices(
        group: &SymGroup,
        matrices: Vec<Array2<f64>>,
    ) -> Result<Self, SymmetryError> {
        if matrices.len() != group.order() {
            return Err(SymmetryError::Configuration(format!(
                "{} matrices were given for a group of order {}.",
                matrices.len(),
                group.order()
            )));
        }
        // The first element carrying each distinct matrix.
        let mut first_elements: Vec<usize> = vec![];
        let element_to_matrix = matrices
            .iter()
            .enumerate()
            .map(|(i, mat)| {
                match first_elements
                    .iter()
                    .position(|&r| matrices_equal(&matrices[r], mat))
                {
                    Some(k) => k,
                    None => {
                        first_elements.push(i);
                        first_elements.len() - 1
                    }
                }
            })
            .collect::<Vec<_>>();

        let n = first_elements.len();
        let mut table = Array2::<usize>::zeros((n, n));
        for (a, &i) in first_elements.iter().enumerate() {
            for (b, &j) in first_elements.iter().enumerate() {
                table[[a, b]] = element_to_matrix[group.multiply(i, j)];
            }
        }
        let elements = first_elements
            .iter()
            .map(|&i| group.elements()[i].clone())
            .collect();
        let head = match group.head_indices() {
            Some(head) => first_elements.iter().map(|&i| head[i]).collect(),
            None => first_elements.clone(),
        };
        let reduced_group = SymGroup::from_table(elements, table, Some(head))?;
        let matrices = first_elements
            .iter()
            .map(|&i| matrices[i].clone())
            .collect::<Vec<_>>();
        log::debug!(
            "Matrix representation: {} elements collapsed onto {} distinct matrices.",
            group.order(),
            n
        );
        Ok(Self {
            matrices,
            reduced_group: Arc::new(reduced_group),
            element_to_matrix,
        })
    }

    pub fn matrices(&self) -> &[Array2<f64>] {
        &self.matrices
    }

    pub fn reduced_group(&self) -> &Arc<SymGroup> {
        &self.reduced_group
    }

    pub fn element_to_matrix(&self) -> &[usize] {
        &self.element_to_matrix
    }

    /// The matrix of input element `i`.
    pub fn matrix_of(&self, i: usize) -> &Array2<f64> {
        &self.matrices[self.element_to_matrix[i]]
    }

    /// The dimension of the space the matrices act on.
    pub fn dim(&self) -> usize {
        self.matrices.first().map_or(0, Array2::nrows)
    }
}

impl fmt::Display for MatrixRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix representation of dimension {}", self.dim())?;
        writeln!(f, "Input elements: {}", self.element_to_matrix.len())?;
        writeln!(f, "Distinct matrices: {}", self.matrices.len())?;
        Ok(())
    }
}

fn matrices_equal(a: &Array2<f64>, b: &Array2<f64>) -> bool {
    a.dim() == b.dim()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() < MATRIX_REP_EQUIVALENCE_THRESHOLD)
}

// =======================
// Representation builders
// =======================

/// Builds the matrices of supercell operations acting on a local DoF.
///
/// The coordinate space stacks the DoF coordinates of `sites` (all supercell sites if `None`)
/// in ascending site order. The block of site `l` is sent to the block of site `op(l)` through
/// the local DoF matrix of the factor-group operation.
///
/// # Errors
///
/// Errors if `kind` is not local, or if an operation maps a selected site outside the selection.
pub fn make_local_dof_matrix_rep(
    ops: &[SupercellSymOp],
    kind: DofKind,
    sites: Option<&BTreeSet<usize>>,
    supercell: &Supercell,
) -> Result<Vec<Array2<f64>>, SymmetryError> {
    if !kind.is_local() {
        return Err(SymmetryError::Configuration(format!(
            "`{kind}` is not a local degree of freedom."
        )));
    }
    let prim = supercell.prim();
    let structure = prim.structure();
    let sites = match sites {
        Some(sites) => sites.iter().copied().collect::<Vec<_>>(),
        None => (0..supercell.n_sites()).collect(),
    };
    // Offset of each selected site's block in the coordinate space.
    let mut offsets = vec![None; supercell.n_sites()];
    let mut dim = 0;
    for &l in sites.iter() {
        let slot = offsets.get_mut(l).ok_or_else(|| {
            SymmetryError::Configuration(format!(
                "Site {l} is outside a supercell of {} sites.",
                supercell.n_sites()
            ))
        })?;
        *slot = Some(dim);
        dim += structure.local_dof_dim(supercell.sublattice_of(l), kind);
    }

    log::debug!(
        "Building {dim}-dimensional `{kind}` matrices of {} operations in parallel...",
        ops.len()
    );
    let matrices = ops
        .par_iter()
        .map(|op| {
            let mut mat = Array2::<f64>::zeros((dim, dim));
            for &l in sites.iter() {
                let b = supercell.sublattice_of(l);
                let image = op.permutation().apply(l);
                let (Some(col), Some(row)) = (offsets[l], offsets[image]) else {
                    return Err(SymmetryError::Configuration(format!(
                        "An operation maps the selected site {l} onto the unselected site {image}."
                    )));
                };
                let Some(block) = prim.local_dof_matrix(kind, op.factor_group_index(), b) else {
                    continue;
                };
                let (nrows, ncols) = block.shape();
                mat.slice_mut(s![row..row + nrows, col..col + ncols])
                    .assign(&to_array2(&block));
            }
            Ok(mat)
        })
        .collect::<Result<Vec<_>, _>>()?;
    log::debug!("Building `{kind}` matrices... Done.");
    Ok(matrices)
}

/// Builds the matrices of supercell operations acting on a global DoF: the global DoF matrices
/// of their factor-group operations.
///
/// # Errors
///
/// Errors if the structure does not carry `kind` as a global DoF.
pub fn make_global_dof_matrix_rep(
    ops: &[SupercellSymOp],
    kind: DofKind,
    prim: &PrimSymmetry,
) -> Result<Vec<Array2<f64>>, SymmetryError> {
    ops.iter()
        .map(|op| {
            prim.global_dof_matrix(kind, op.factor_group_index())
                .map(to_array2)
                .ok_or_else(|| {
                    SymmetryError::Configuration(format!(
                        "The structure does not carry global `{kind}`."
                    ))
                })
        })
        .collect()
}

/// Builds the matrix representation of a group of supercell operations acting on a DoF space.
///
/// # Arguments
///
/// * `group` - The group formed by `ops`, providing the multiplication table.
/// * `ops` - The supercell operation of each element of `group`.
/// * `kind` - The DoF.
/// * `sites` - The selected supercell sites of a local DoF.
/// * `supercell` - The supercell.
///
/// # Returns
///
/// The collapsed matrix representation. For a global DoF, operations that differ only by a
/// lattice translation share a matrix, so the reduced group is a point group.
///
/// # Errors
///
/// Errors if `ops` does not match `group`, or if the matrices cannot be built.
pub fn make_matrix_rep(
    group: &SymGroup,
    ops: &[SupercellSymOp],
    kind: DofKind,
    sites: Option<&BTreeSet<usize>>,
    supercell: &Supercell,
) -> Result<MatrixRepresentation, SymmetryError> {
    if ops.len() != group.order() {
        return Err(SymmetryError::Configuration(format!(
            "{} supercell operations were given for a group of order {}.",
            ops.len(),
            group.order()
        )));
    }
    let matrices = if kind.is_local() {
        make_local_dof_matrix_rep(ops, kind, sites, supercell)?
    } else {
        make_global_dof_matrix_rep(ops, kind, supercell.prim())?
    };
    MatrixRepresentation::from_group_matrices(group, matrices)
}
