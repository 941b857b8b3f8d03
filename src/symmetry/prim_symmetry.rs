//! Symmetry information derived once from a primitive structure and its factor group.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use nalgebra::{DMatrix, Matrix3, Matrix6};
use rayon::prelude::*;

use crate::auxiliary::misc::pseudo_inverse;
use crate::auxiliary::structure::{DofKind, DofSet, Structure};
use crate::cluster::site_rep::{make_site_coordinate_sym_rep, SiteCoordinateRep, SiteCoordinateSymRep};
use crate::error::SymmetryError;
use crate::permutation::Permutation;
use crate::symmetry::symmetry_group::{GroupIndices, SymGroup};
use crate::symmetry::symmetry_operation::SymOp;

#[cfg(test)]
#[path = "prim_symmetry_tests.rs"]
mod prim_symmetry_tests;

/// Threshold for checking that a DoF basis is mapped onto itself by an operation.
const DOF_BASIS_THRESHOLD: f64 = 1e-6;

/// Index pairs of the Kelvin (normalised Voigt) ordering of a symmetric tensor.
const KELVIN_PAIRS: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (1, 2), (0, 2), (0, 1)];

/// Symmetry information of a primitive structure, shared by every analysis of that structure.
pub struct PrimSymmetry {
    structure: Structure,

    /// The factor group, validated modulo lattice translations.
    factor_group: Arc<SymGroup>,

    /// The point group: the distinct linear parts of the factor group.
    point_group: Arc<SymGroup>,

    /// For each factor-group element, the index of its linear part in the point group.
    factor_to_point: Vec<usize>,

    /// The action of each factor-group element on integral site coordinates.
    site_rep: Arc<SiteCoordinateSymRep>,

    /// For each continuous local DoF kind, each factor-group element and each sublattice `b`,
    /// the matrix mapping DoF coordinates on `b` onto DoF coordinates on its image sublattice.
    local_dof_reps: IndexMap<DofKind, Vec<Vec<DMatrix<f64>>>>,

    /// For each factor-group element and each sublattice `b`, the map from the occupants of `b`
    /// onto the occupants of its image sublattice.
    occupant_permutations: Vec<Vec<Permutation>>,

    /// For each global DoF kind and each factor-group element, the matrix acting on the
    /// global DoF coordinates.
    global_dof_reps: IndexMap<DofKind, Vec<DMatrix<f64>>>,
}

impl PrimSymmetry {
    /// Derives the symmetry information of `structure` from its factor-group operations.
    ///
    /// # Errors
    ///
    /// Errors if the operations do not form a group modulo lattice translations, or if any of
    /// them fails to map the structure, its occupants or its DoF bases onto themselves.
    pub fn new(structure: Structure, factor_group_ops: Vec<SymOp>) -> Result<Self, SymmetryError> {
        let lattice = structure.lattice();
        let factor_group = SymGroup::from_elements(
            factor_group_ops,
            Some(lattice),
            lattice.tolerance(),
        )?;
        let site_rep = make_site_coordinate_sym_rep(factor_group.elements(), &structure)?;

        let mut point_ops: Vec<SymOp> = vec![];
        let factor_to_point = factor_group
            .elements()
            .iter()
            .map(|op| {
                let point_op = op.point_op();
                match point_ops
                    .iter()
                    .position(|p| p.approx_eq(&point_op, None, lattice.tolerance()))
                {
                    Some(i) => i,
                    None => {
                        point_ops.push(point_op);
                        point_ops.len() - 1
                    }
                }
            })
            .collect::<Vec<_>>();
        let point_group = SymGroup::from_elements(point_ops, None, lattice.tolerance())?;

        let occupant_permutations = site_rep
            .iter()
            .zip(factor_group.elements().iter())
            .map(|(rep, op)| make_occupant_permutations(rep, op, &structure))
            .collect::<Result<Vec<_>, _>>()?;

        let mut local_dof_reps = IndexMap::new();
        let local_kinds = structure
            .basis()
            .iter()
            .flat_map(|site| site.local_dofs.iter().map(DofSet::kind))
            .collect::<indexmap::IndexSet<_>>();
        for kind in local_kinds {
            let reps = factor_group
                .elements()
                .par_iter()
                .zip(site_rep.par_iter())
                .map(|(op, rep)| make_local_dof_matrices(kind, op, rep, &structure))
                .collect::<Result<Vec<_>, _>>()?;
            local_dof_reps.insert(kind, reps);
        }

        let mut global_dof_reps = IndexMap::new();
        for dofset in structure.global_dofs() {
            let reps = factor_group
                .elements()
                .iter()
                .map(|op| make_global_dof_matrix(dofset, op))
                .collect::<Result<Vec<_>, _>>()?;
            global_dof_reps.insert(dofset.kind(), reps);
        }

        log::debug!(
            "Factor group of order {} with a point group of order {}.",
            factor_group.order(),
            point_group.order()
        );
        Ok(Self {
            structure,
            factor_group: Arc::new(factor_group),
            point_group: Arc::new(point_group),
            factor_to_point,
            site_rep: Arc::new(site_rep),
            local_dof_reps,
            occupant_permutations,
            global_dof_reps,
        })
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn factor_group(&self) -> &Arc<SymGroup> {
        &self.factor_group
    }

    pub fn point_group(&self) -> &Arc<SymGroup> {
        &self.point_group
    }

    /// The index in the point group of the linear part of factor-group element `i`.
    pub fn point_index(&self, i: usize) -> usize {
        self.factor_to_point[i]
    }

    pub fn site_rep(&self) -> &Arc<SiteCoordinateSymRep> {
        &self.site_rep
    }

    /// The local DoF matrix of factor-group element `op_index` acting on sublattice `b`.
    ///
    /// For occupation this is the occupant permutation matrix.
    pub fn local_dof_matrix(&self, kind: DofKind, op_index: usize, b: usize) -> Option<DMatrix<f64>> {
        match kind {
            DofKind::Occupation => {
                let perm = &self.occupant_permutations[op_index][b];
                let mut mat = DMatrix::zeros(perm.rank(), perm.rank());
                for (i, &j) in perm.image().iter().enumerate() {
                    mat[(j, i)] = 1.0;
                }
                Some(mat)
            }
            _ => self
                .local_dof_reps
                .get(&kind)
                .map(|reps| reps[op_index][b].clone()),
        }
    }

    /// The occupant permutation of factor-group element `op_index` acting on sublattice `b`.
    pub fn occupant_permutation(&self, op_index: usize, b: usize) -> &Permutation {
        &self.occupant_permutations[op_index][b]
    }

    /// The global DoF matrix of factor-group element `op_index`.
    pub fn global_dof_matrix(&self, kind: DofKind, op_index: usize) -> Option<&DMatrix<f64>> {
        self.global_dof_reps.get(&kind).map(|reps| &reps[op_index])
    }

    /// The site-coordinate representation of a group whose elements are factor-group elements.
    ///
    /// If `group` carries head indices, they are taken to refer to the factor group; otherwise
    /// the representation is rebuilt from the elements of `group`.
    ///
    /// # Errors
    ///
    /// Errors if an element of `group` is not a symmetry of the structure.
    pub fn site_rep_of(&self, group: &SymGroup) -> Result<SiteCoordinateSymRep, SymmetryError> {
        match group.head_indices() {
            Some(indices) if indices.iter().all(|&i| i < self.site_rep.len()) => {
                Ok(indices.iter().map(|&i| self.site_rep[i].clone()).collect())
            }
            _ => make_site_coordinate_sym_rep(group.elements(), &self.structure),
        }
    }

    /// The subgroup of the factor group formed by the elements at `indices`.
    ///
    /// # Errors
    ///
    /// Errors if `indices` do not form a subgroup.
    pub fn factor_subgroup(&self, indices: &GroupIndices) -> Result<SymGroup, SymmetryError> {
        self.factor_group.subgroup(indices)
    }
}

impl fmt::Display for PrimSymmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.structure)?;
        writeln!(f, "Factor group order: {}", self.factor_group.order())?;
        writeln!(f, "Point group order: {}", self.point_group.order())?;
        Ok(())
    }
}

fn make_occupant_permutations(
    rep: &SiteCoordinateRep,
    op: &SymOp,
    structure: &Structure,
) -> Result<Vec<Permutation>, SymmetryError> {
    structure
        .basis()
        .iter()
        .enumerate()
        .map(|(b, site)| {
            let b_image = rep.sublattice_permutation().apply(b);
            let image_occupants = &structure.basis()[b_image].occupants;
            let image = site
                .occupants
                .iter()
                .map(|occupant| image_occupants.iter().position(|o| o == occupant))
                .collect::<Option<Vec<_>>>()
                .filter(|image| image.len() == image_occupants.len())
                .ok_or_else(|| {
                    SymmetryError::GeometricInconsistency(format!(
                        "The operation {op} maps site {b} with occupants {:?} onto site {b_image} \
                         with occupants {image_occupants:?}.",
                        site.occupants
                    ))
                })?;
            Permutation::from_image(image)
        })
        .collect()
}

fn make_local_dof_matrices(
    kind: DofKind,
    op: &SymOp,
    rep: &SiteCoordinateRep,
    structure: &Structure,
) -> Result<Vec<DMatrix<f64>>, SymmetryError> {
    let cart = DMatrix::from_iterator(3, 3, op.matrix().iter().copied());
    (0..structure.n_sublattices())
        .map(|b| {
            let b_image = rep.sublattice_permutation().apply(b);
            match (structure.local_dof(b, kind), structure.local_dof(b_image, kind)) {
                (None, None) => Ok(DMatrix::zeros(0, 0)),
                (Some(from), Some(to)) => {
                    transform_in_basis(&cart, &from.basis_matrix(), &to.basis_matrix()).ok_or_else(
                        || {
                            SymmetryError::GeometricInconsistency(format!(
                                "The operation {op} does not map the `{kind}` basis of site {b} \
                                 onto that of site {b_image}."
                            ))
                        },
                    )
                }
                _ => Err(SymmetryError::GeometricInconsistency(format!(
                    "The operation {op} maps site {b} onto site {b_image}, but only one of them \
                     carries `{kind}`."
                ))),
            }
        })
        .collect()
}

fn make_global_dof_matrix(dofset: &DofSet, op: &SymOp) -> Result<DMatrix<f64>, SymmetryError> {
    let standard = match dofset.kind() {
        DofKind::Strain => {
            let kelvin = kelvin_strain_matrix(op.matrix());
            DMatrix::from_iterator(6, 6, kelvin.iter().copied())
        }
        kind => {
            return Err(SymmetryError::Configuration(format!(
                "`{kind}` is not a global degree of freedom."
            )))
        }
    };
    let basis = dofset.basis_matrix();
    transform_in_basis(&standard, &basis, &basis).ok_or_else(|| {
        SymmetryError::GeometricInconsistency(format!(
            "The operation {op} does not map the global `{}` basis onto itself.",
            dofset.kind()
        ))
    })
}

/// Expresses the standard-space linear map `standard` as a matrix from the coordinates of
/// `from` to the coordinates of `to`, $`\mathbf{B}_{\mathrm{to}}^{+}\mathbf{S}\mathbf{B}_{\mathrm{from}}`$,
/// provided the image of `from` lies in the span of `to`.
fn transform_in_basis(
    standard: &DMatrix<f64>,
    from: &DMatrix<f64>,
    to: &DMatrix<f64>,
) -> Option<DMatrix<f64>> {
    let to_pinv = pseudo_inverse(to, 1e-10)?;
    let image = standard * from;
    let mat = &to_pinv * &image;
    if (to * &mat - image).amax() > DOF_BASIS_THRESHOLD {
        None
    } else {
        Some(mat)
    }
}

/// The $`6 \times 6`$ matrix of $`\mathbf{E} \mapsto \mathbf{R}\mathbf{E}\mathbf{R}^{\mathsf{T}}`$
/// acting on Kelvin vectors of symmetric tensors.
pub(crate) fn kelvin_strain_matrix(rot: &Matrix3<f64>) -> Matrix6<f64> {
    let sqrt2 = 2.0_f64.sqrt();
    let mut mat = Matrix6::zeros();
    for (j, &(p, q)) in KELVIN_PAIRS.iter().enumerate() {
        let mut tensor = Matrix3::zeros();
        if p == q {
            tensor[(p, q)] = 1.0;
        } else {
            tensor[(p, q)] = 1.0 / sqrt2;
            tensor[(q, p)] = 1.0 / sqrt2;
        }
        let transformed = rot * tensor * rot.transpose();
        for (i, &(r, s)) in KELVIN_PAIRS.iter().enumerate() {
            mat[(i, j)] = if r == s {
                transformed[(r, s)]
            } else {
                sqrt2 * transformed[(r, s)]
            };
        }
    }
    mat
}
