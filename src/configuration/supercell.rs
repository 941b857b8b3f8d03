//! Supercells of a primitive structure and their symmetry operations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itertools::iproduct;
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array2, Zip};
use rayon::prelude::*;

use crate::auxiliary::geometry::Lattice;
use crate::cluster::IntegralSiteCoordinate;
use crate::error::SymmetryError;
use crate::permutation::Permutation;
use crate::symmetry::prim_symmetry::PrimSymmetry;
use crate::symmetry::symmetry_group::SymGroup;
use crate::symmetry::symmetry_operation::SymOp;

#[cfg(test)]
#[path = "supercell_tests.rs"]
mod supercell_tests;

// ==================
// Struct definitions
// ==================

/// A symmetry operation of a supercell: a factor-group operation of the primitive structure
/// followed by a lattice translation within the supercell, acting on supercell sites as a
/// permutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupercellSymOp {
    /// The index of the factor-group operation in the primitive factor group.
    factor_group_index: usize,

    /// The index of the translation among the unit cells of the supercell.
    translation_index: usize,

    /// The integral lattice translation.
    translation: Vector3<i64>,

    /// The site permutation: site `l` is sent to site `permutation.apply(l)`.
    permutation: Permutation,
}

impl SupercellSymOp {
    pub fn factor_group_index(&self) -> usize {
        self.factor_group_index
    }

    pub fn translation_index(&self) -> usize {
        self.translation_index
    }

    pub fn translation(&self) -> &Vector3<i64> {
        &self.translation
    }

    pub fn permutation(&self) -> &Permutation {
        &self.permutation
    }
}

/// The site indexing of a supercell: unit cells are brought into the supercell by
/// superlattice translations, and site `l` is `(l / volume, unitcells[l % volume])`.
#[derive(Clone, Debug)]
struct SiteIndex {
    /// The integral transformation matrix $`\mathbf{T}`$.
    transformation_matrix: Matrix3<i64>,

    /// $`|\det\mathbf{T}|\,\mathbf{T}^{-1}`$.
    scaled_inverse: Matrix3<i64>,

    /// $`|\det\mathbf{T}|`$.
    volume: i64,

    n_sublattices: usize,

    /// The unit cells inside the supercell, in the primitive lattice coordinates.
    unitcells: Vec<Vector3<i64>>,

    unitcell_indices: HashMap<Vector3<i64>, usize>,
}

impl SiteIndex {
    fn new(transformation_matrix: Matrix3<i64>, n_sublattices: usize) -> Result<Self, SymmetryError> {
        let det = integral_determinant(&transformation_matrix);
        if det == 0 {
            return Err(SymmetryError::GeometricInconsistency(format!(
                "The supercell transformation matrix {transformation_matrix} is singular."
            )));
        }
        let scaled_inverse = adjugate(&transformation_matrix) * det.signum();
        let unitcells = enumerate_unitcells(&transformation_matrix, &scaled_inverse, det.abs());
        if i64::try_from(unitcells.len()).ok() != Some(det.abs()) {
            return Err(SymmetryError::GeometricInconsistency(format!(
                "Found {} unit cells in a supercell of volume {}.",
                unitcells.len(),
                det.abs()
            )));
        }
        let unitcell_indices = unitcells
            .iter()
            .enumerate()
            .map(|(u, n)| (*n, u))
            .collect::<HashMap<_, _>>();
        Ok(Self {
            transformation_matrix,
            scaled_inverse,
            volume: det.abs(),
            n_sublattices,
            unitcells,
            unitcell_indices,
        })
    }

    fn n_unitcells(&self) -> usize {
        self.unitcells.len()
    }

    fn n_sites(&self) -> usize {
        self.n_unitcells() * self.n_sublattices
    }

    fn site(&self, l: usize) -> IntegralSiteCoordinate {
        let n = self.n_unitcells();
        IntegralSiteCoordinate::new(l / n, self.unitcells[l % n])
    }

    fn within(&self, unitcell: &Vector3<i64>) -> Vector3<i64> {
        let q = (self.scaled_inverse * unitcell).map(|x| x.div_euclid(self.volume));
        unitcell - self.transformation_matrix * q
    }

    fn unitcell_index(&self, unitcell: &Vector3<i64>) -> Option<usize> {
        self.unitcell_indices.get(&self.within(unitcell)).copied()
    }

    fn site_index(&self, site: &IntegralSiteCoordinate) -> Option<usize> {
        if site.sublattice >= self.n_sublattices {
            return None;
        }
        self.unitcell_index(&site.unitcell)
            .map(|u| site.sublattice * self.n_unitcells() + u)
    }

    /// Returns `true` if the fractional point matrix `m` maps the superlattice onto itself,
    /// *i.e.* $`\mathbf{T}^{-1}\mathbf{M}\mathbf{T}`$ is integral.
    fn is_superlattice_op(&self, m: &Matrix3<i64>) -> bool {
        (self.scaled_inverse * m * self.transformation_matrix)
            .iter()
            .all(|x| x % self.volume == 0)
    }
}

/// A supercell $`\mathbf{S} = \mathbf{L}\mathbf{T}`$ of a primitive structure, with its sites
/// indexed as `l = b * volume + u` for sublattice `b` and unit cell `u`.
pub struct Supercell {
    prim: Arc<PrimSymmetry>,

    superlattice: Lattice,

    index: SiteIndex,

    sym_ops: Vec<SupercellSymOp>,

    /// The group formed by the supercell operations, whose head indices are factor-group
    /// indices.
    group: Arc<SymGroup>,
}

impl Supercell {
    /// Constructs the supercell of `prim` with transformation matrix `transformation_matrix` and
    /// its symmetry operations.
    ///
    /// # Errors
    ///
    /// Errors if the transformation matrix is singular, or if the symmetry operations of the
    /// supercell do not form a group.
    pub fn new(
        prim: Arc<PrimSymmetry>,
        transformation_matrix: Matrix3<i64>,
    ) -> Result<Self, SymmetryError> {
        let lattice = prim.structure().lattice();
        let index = SiteIndex::new(transformation_matrix, prim.structure().n_sublattices())?;
        let superlattice = Lattice::new(
            lattice.column_matrix() * transformation_matrix.map(|x| x as f64),
            lattice.tolerance(),
        )?;
        let sym_ops = make_sym_ops(&prim, &index)?;
        let group = make_group(&prim, &index, &sym_ops)?;
        log::debug!(
            "Supercell of volume {} with {} symmetry operations.",
            index.n_unitcells(),
            sym_ops.len()
        );
        Ok(Self {
            prim,
            superlattice,
            index,
            sym_ops,
            group: Arc::new(group),
        })
    }

    pub fn prim(&self) -> &Arc<PrimSymmetry> {
        &self.prim
    }

    pub fn transformation_matrix(&self) -> &Matrix3<i64> {
        &self.index.transformation_matrix
    }

    pub fn superlattice(&self) -> &Lattice {
        &self.superlattice
    }

    /// The number of primitive unit cells in the supercell.
    pub fn volume(&self) -> usize {
        self.index.n_unitcells()
    }

    /// The number of sites in the supercell.
    pub fn n_sites(&self) -> usize {
        self.index.n_sites()
    }

    /// The unit cells of the supercell, in primitive lattice coordinates.
    pub fn unitcells(&self) -> &[Vector3<i64>] {
        &self.index.unitcells
    }

    pub fn sym_ops(&self) -> &[SupercellSymOp] {
        &self.sym_ops
    }

    pub fn group(&self) -> &Arc<SymGroup> {
        &self.group
    }

    /// The sublattice of site `l`.
    pub fn sublattice_of(&self, l: usize) -> usize {
        l / self.volume()
    }

    /// The integral site coordinate of site `l`.
    pub fn site(&self, l: usize) -> IntegralSiteCoordinate {
        self.index.site(l)
    }

    /// Brings a unit cell into the supercell by a superlattice translation.
    pub fn within(&self, unitcell: &Vector3<i64>) -> Vector3<i64> {
        self.index.within(unitcell)
    }

    /// The index of the supercell site equivalent to `site` under superlattice translations.
    pub fn site_index(&self, site: &IntegralSiteCoordinate) -> Option<usize> {
        self.index.site_index(site)
    }

    /// The Cartesian form of a supercell operation: the factor-group operation followed by the
    /// lattice translation.
    pub fn sym_op_to_cart(&self, op: &SupercellSymOp) -> SymOp {
        cart_sym_op(&self.prim, op)
    }
}

fn cart_sym_op(prim: &PrimSymmetry, op: &SupercellSymOp) -> SymOp {
    prim.factor_group().elements()[op.factor_group_index]
        .translated(&prim.structure().lattice().lattice_vector(&op.translation))
}

/// The factor-group operations leaving the superlattice invariant, each followed by every
/// translation of the supercell.
fn make_sym_ops(prim: &PrimSymmetry, index: &SiteIndex) -> Result<Vec<SupercellSymOp>, SymmetryError> {
    let site_rep = prim.site_rep();
    let kept = site_rep
        .iter()
        .enumerate()
        .filter(|(_, rep)| index.is_superlattice_op(rep.point_matrix()))
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    log::debug!(
        "Constructing site permutations of {} supercell operations in parallel...",
        kept.len() * index.n_unitcells()
    );
    let ops = iproduct!(kept.iter().copied(), 0..index.n_unitcells())
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(i, u)| {
            let translation = index.unitcells[u];
            let image = (0..index.n_sites())
                .map(|l| {
                    let site = &site_rep[i].apply(&index.site(l)) + &translation;
                    index.site_index(&site).ok_or_else(|| {
                        SymmetryError::GeometricInconsistency(format!(
                            "Site {site} has no counterpart in the supercell."
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SupercellSymOp {
                factor_group_index: i,
                translation_index: u,
                translation,
                permutation: Permutation::from_image(image)?,
            })
        })
        .collect::<Result<Vec<_>, SymmetryError>>()?;
    log::debug!("Constructing site permutations of supercell operations... Done.");
    Ok(ops)
}

/// The group of the supercell operations. Its table is derived from the factor-group table
/// and exact translation arithmetic.
fn make_group(
    prim: &PrimSymmetry,
    index: &SiteIndex,
    sym_ops: &[SupercellSymOp],
) -> Result<SymGroup, SymmetryError> {
    let site_rep = prim.site_rep();
    let factor_group = prim.factor_group();
    let positions = sym_ops
        .iter()
        .enumerate()
        .map(|(k, op)| ((op.factor_group_index, op.translation_index), k))
        .collect::<HashMap<_, _>>();
    let order = sym_ops.len();
    log::debug!("Constructing supercell group table for {order} operations in parallel...");
    let mut products = Array2::<Option<usize>>::from_elem((order, order), None);
    Zip::indexed(&mut products).par_for_each(|(a, b), k| {
        let (op_a, op_b) = (&sym_ops[a], &sym_ops[b]);
        let (i1, i2) = (op_a.factor_group_index, op_b.factor_group_index);
        let i3 = factor_group.multiply(i1, i2);
        // rep(i1) ∘ rep(i2) and rep(i3) differ by a pure lattice translation.
        let composed = site_rep[i1].compose(&site_rep[i2]);
        let delta = composed.unitcell_offsets()[0] - site_rep[i3].unitcell_offsets()[0];
        *k = index
            .unitcell_index(&(site_rep[i1].point_matrix() * op_b.translation + op_a.translation + delta))
            .and_then(|u| positions.get(&(i3, u)))
            .copied();
    });
    if products.iter().any(Option::is_none) {
        return Err(SymmetryError::InvalidGroup(
            "The supercell operations are not closed under composition.".to_string(),
        ));
    }
    let table = products.mapv(|k| k.unwrap_or_default());
    log::debug!("Constructing supercell group table... Done.");
    let elements = sym_ops.iter().map(|op| cart_sym_op(prim, op)).collect();
    let head = sym_ops.iter().map(|op| op.factor_group_index).collect();
    SymGroup::from_table(elements, table, Some(head))
}

impl fmt::Display for Supercell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Transformation matrix:")?;
        for row in self.index.transformation_matrix.row_iter() {
            writeln!(f, "  [{:>4}, {:>4}, {:>4}]", row[0], row[1], row[2])?;
        }
        writeln!(f, "Volume: {}", self.volume())?;
        writeln!(f, "Sites: {}", self.n_sites())?;
        writeln!(f, "Symmetry operations: {}", self.sym_ops.len())?;
        Ok(())
    }
}

// =================
// Integer helpers
// =================

pub(crate) fn integral_determinant(m: &Matrix3<i64>) -> i64 {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

/// The adjugate matrix, $`\operatorname{adj}(\mathbf{M}) = \det(\mathbf{M})\,\mathbf{M}^{-1}`$.
fn adjugate(m: &Matrix3<i64>) -> Matrix3<i64> {
    Matrix3::from_fn(|i, j| {
        // Cofactor of element (j, i).
        let rows = (0..3).filter(|&r| r != j).collect::<Vec<_>>();
        let cols = (0..3).filter(|&c| c != i).collect::<Vec<_>>();
        let minor = m[(rows[0], cols[0])] * m[(rows[1], cols[1])]
            - m[(rows[0], cols[1])] * m[(rows[1], cols[0])];
        if (i + j) % 2 == 0 {
            minor
        } else {
            -minor
        }
    })
}

/// Enumerates the unit cells $`\mathbf{n}`$ with $`\mathbf{T}^{-1}\mathbf{n} \in [0, 1)^3`$.
fn enumerate_unitcells(t: &Matrix3<i64>, scaled_inverse: &Matrix3<i64>, d: i64) -> Vec<Vector3<i64>> {
    let corners = iproduct!(0..2i64, 0..2i64, 0..2i64)
        .map(|(a, b, c)| t * Vector3::new(a, b, c))
        .collect::<Vec<_>>();
    let bounds = (0..3)
        .map(|i| {
            let lo = corners.iter().map(|v| v[i]).min().unwrap_or(0);
            let hi = corners.iter().map(|v| v[i]).max().unwrap_or(0);
            (lo, hi)
        })
        .collect::<Vec<_>>();
    let mut unitcells = iproduct!(
        bounds[0].0..=bounds[0].1,
        bounds[1].0..=bounds[1].1,
        bounds[2].0..=bounds[2].1
    )
    .map(|(i, j, k)| Vector3::new(i, j, k))
    .filter(|n| (scaled_inverse * n).iter().all(|&x| (0..d).contains(&x)))
    .collect::<Vec<_>>();
    unitcells.sort_by_key(|n| (n[0], n[1], n[2]));
    unitcells
}
