//! Decomposition of a real matrix representation into irreducible subspaces.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

use derive_builder::Builder;
use nalgebra::SymmetricEigen;
use ndarray::{s, Array1, Array2, Axis};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::auxiliary::misc::{orthonormal_column_basis, to_dmatrix};
use crate::error::SymmetryError;
use crate::symmetry::symmetry_group::{GroupIndices, GroupIndicesOrbitSet, SymGroup};

#[cfg(test)]
#[path = "irreps_tests.rs"]
mod irreps_tests;

/// Seed of the random matrices used to split reducible subspaces. A fixed seed makes the
/// decomposition reproducible.
pub const IRREP_DECOMPOSITION_SEED: u64 = 0x5EED_1DEA;

/// Threshold for invariance, orthogonality and projector checks.
const IRREP_THRESHOLD: f64 = 1e-6;

/// Threshold for the character norm and the Frobenius--Schur indicator.
const INDICATOR_THRESHOLD: f64 = 1e-3;

/// Threshold for comparing characters of two irreducible blocks.
const CHARACTER_THRESHOLD: f64 = 1e-4;

/// Number of random matrices tried before a subspace that cannot be split is reported.
const MAX_SPLIT_ATTEMPTS: usize = 12;

/// A lazily called function enumerating subgroups of the represented group.
pub type SubgroupsFn = Arc<dyn Fn() -> GroupIndicesOrbitSet + Send + Sync>;

// ==================
// Struct definitions
// ==================

/// The type of a real irreducible representation, by the complex irreducible representations
/// it contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrrepKind {
    /// Irreducible over the complex numbers.
    Real,

    /// The sum of two complex-conjugate complex irreducible representations.
    Complex,

    /// Twice a complex irreducible representation of quaternionic type.
    Quaternionic,
}

impl IrrepKind {
    /// Identifies the type from the character norm $`\frac{1}{|G|}\sum_g \chi(g)^2`$ and the
    /// Frobenius--Schur indicator $`\frac{1}{|G|}\sum_g \chi(g^2)`$ of a real representation.
    /// Returns `None` if the representation is reducible.
    fn from_indicators(norm: f64, frobenius_schur: f64) -> Option<Self> {
        let close = |a: f64, b: f64| (a - b).abs() < INDICATOR_THRESHOLD;
        if close(norm, 1.0) && close(frobenius_schur, 1.0) {
            Some(Self::Real)
        } else if close(norm, 2.0) && close(frobenius_schur, 0.0) {
            Some(Self::Complex)
        } else if close(norm, 4.0) && close(frobenius_schur, -2.0) {
            Some(Self::Quaternionic)
        } else {
            None
        }
    }

    /// The character norm of a real irreducible representation of this type.
    pub fn character_norm(&self) -> usize {
        match self {
            Self::Real => 1,
            Self::Complex => 2,
            Self::Quaternionic => 4,
        }
    }
}

impl fmt::Display for IrrepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Complex => write!(f, "complex"),
            Self::Quaternionic => write!(f, "quaternionic"),
        }
    }
}

/// A real irreducible representation found in the subspace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrrepInfo {
    /// The real dimension of one copy.
    pub dim: usize,

    /// The number of copies in the subspace.
    pub multiplicity: usize,

    pub kind: IrrepKind,

    /// The real character of each element of the group indices, in ascending index order.
    pub characters: Vec<f64>,

    /// The characters of the complex irreducible representation spanned by the complex basis of
    /// each copy. Only present for non-real irreducible representations when complex bases are
    /// allowed.
    pub complex_characters: Option<Vec<Complex64>>,
}

/// One irreducible copy within the symmetry-adapted subspace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrrepBlock {
    /// The index of the irreducible representation in [`IrrepDecomposition::irreps`].
    pub irrep_index: usize,

    /// The columns of the symmetry-adapted subspace spanning this copy.
    pub columns: Range<usize>,

    /// For a non-real irreducible representation with complex bases allowed, the basis
    /// $`(u_k - i J u_k)/\sqrt{2}`$ of the complex irreducible subspace, where the columns of
    /// the copy come in pairs $`(u_k, J u_k)`$.
    pub complex_basis: Option<Array2<Complex64>>,
}

/// A decomposition of a subspace into irreducible subspaces of a real matrix representation.
///
/// Constructing the decomposition through [`IrrepDecompositionBuilder::build`] performs it.
#[derive(Builder, Clone)]
#[builder(
    pattern = "owned",
    build_fn(private, name = "build_inputs", validate = "Self::validate", error = "SymmetryError")
)]
pub struct IrrepDecomposition {
    /// The represented group.
    group: Arc<SymGroup>,

    /// The matrix of each element of [`Self::group`].
    matrices: Vec<Array2<f64>>,

    /// The subgroup over which the decomposition is carried out. The whole group is used if
    /// this is `None`.
    #[builder(setter(strip_option), default = "None")]
    group_indices: Option<GroupIndices>,

    /// The subspace to decompose, as columns. It must be invariant under the group.
    subspace: Array2<f64>,

    /// Enumerates the cyclic subgroups of [`Self::group`]. The group's own enumeration is used if
    /// this is `None`.
    #[builder(setter(strip_option), default = "None")]
    make_cyclic_subgroups: Option<SubgroupsFn>,

    /// Enumerates all subgroups of [`Self::group`].
    #[builder(setter(strip_option), default = "None")]
    make_all_subgroups: Option<SubgroupsFn>,

    /// Whether non-real irreducible subspaces are given complex structures and complex bases.
    #[builder(default = "false")]
    allow_complex: bool,

    #[builder(setter(skip), default = "OnceLock::new()")]
    cyclic_subgroups: OnceLock<GroupIndicesOrbitSet>,

    #[builder(setter(skip), default = "OnceLock::new()")]
    all_subgroups: OnceLock<GroupIndicesOrbitSet>,

    #[builder(setter(skip), default = "Array2::zeros((0, 0))")]
    symmetry_adapted_subspace: Array2<f64>,

    #[builder(setter(skip), default = "vec![]")]
    irreps: Vec<IrrepInfo>,

    #[builder(setter(skip), default = "vec![]")]
    blocks: Vec<IrrepBlock>,
}

impl IrrepDecompositionBuilder {
    fn validate(&self) -> Result<(), SymmetryError> {
        let group = self
            .group
            .as_ref()
            .ok_or_else(|| SymmetryError::Configuration("No group found.".to_string()))?;
        let matrices = self
            .matrices
            .as_ref()
            .ok_or_else(|| SymmetryError::Configuration("No matrices found.".to_string()))?;
        if matrices.len() != group.order() {
            return Err(SymmetryError::Configuration(format!(
                "{} matrices were given for a group of order {}.",
                matrices.len(),
                group.order()
            )));
        }
        let dim = matrices.first().map_or(0, Array2::nrows);
        if matrices.iter().any(|mat| mat.dim() != (dim, dim)) {
            return Err(SymmetryError::Configuration(
                "The representation matrices must be square and of equal dimension.".to_string(),
            ));
        }
        if let Some(subspace) = self.subspace.as_ref() {
            if subspace.nrows() != dim {
                return Err(SymmetryError::Configuration(format!(
                    "A subspace with {} rows cannot be decomposed under {dim}-dimensional \
                     matrices.",
                    subspace.nrows()
                )));
            }
        }
        if let Some(Some(indices)) = self.group_indices.as_ref() {
            if indices.iter().any(|&i| i >= group.order()) {
                return Err(SymmetryError::InvalidGroup(format!(
                    "The group indices {indices:?} exceed the group order {}.",
                    group.order()
                )));
            }
            if !indices.contains(&group.identity_index())
                || indices.iter().any(|&i| {
                    indices
                        .iter()
                        .any(|&j| !indices.contains(&group.multiply(i, j)))
                })
            {
                return Err(SymmetryError::InvalidGroup(format!(
                    "The group indices {indices:?} do not form a subgroup."
                )));
            }
        }
        Ok(())
    }

    /// Builds and performs the decomposition.
    ///
    /// # Errors
    ///
    /// Errors if the inputs are invalid, if the subspace is not invariant, or if the numerical
    /// decomposition is inconsistent.
    pub fn build(self) -> Result<IrrepDecomposition, SymmetryError> {
        let mut decomposition = self.build_inputs()?;
        decomposition.decompose()?;
        Ok(decomposition)
    }
}

/// An irreducible copy during the decomposition, in coordinates of the orthonormalised subspace.
struct Block {
    basis: Array2<f64>,
    kind: IrrepKind,
    characters: Vec<f64>,
}

impl IrrepDecomposition {
    /// Returns a builder to construct a new decomposition.
    pub fn builder() -> IrrepDecompositionBuilder {
        IrrepDecompositionBuilder::default()
    }

    pub fn group(&self) -> &Arc<SymGroup> {
        &self.group
    }

    pub fn matrices(&self) -> &[Array2<f64>] {
        &self.matrices
    }

    /// The elements over which the decomposition is carried out, in ascending order.
    pub fn group_indices(&self) -> Vec<usize> {
        match self.group_indices.as_ref() {
            Some(indices) => indices.iter().copied().collect(),
            None => (0..self.group.order()).collect(),
        }
    }

    pub fn allow_complex(&self) -> bool {
        self.allow_complex
    }

    /// The dimension of the space the matrices act on.
    pub fn dim(&self) -> usize {
        self.subspace.nrows()
    }

    /// The orthonormal symmetry-adapted basis of the subspace, grouped by irreducible copy.
    pub fn symmetry_adapted_subspace(&self) -> &Array2<f64> {
        &self.symmetry_adapted_subspace
    }

    pub fn irreps(&self) -> &[IrrepInfo] {
        &self.irreps
    }

    pub fn blocks(&self) -> &[IrrepBlock] {
        &self.blocks
    }

    /// The columns of the symmetry-adapted subspace spanning block `i`.
    pub fn block_basis(&self, i: usize) -> Array2<f64> {
        let columns = self.blocks[i].columns.clone();
        self.symmetry_adapted_subspace
            .slice(s![.., columns])
            .to_owned()
    }

    /// The matrices of the group indices acting on block `i`, in the coordinates of its basis.
    pub fn block_matrices(&self, i: usize) -> Vec<Array2<f64>> {
        let basis = self.block_basis(i);
        self.group_indices()
            .iter()
            .map(|&g| basis.t().dot(&self.matrices[g]).dot(&basis))
            .collect()
    }

    /// The cyclic subgroups of [`Self::group`], enumerated on first use.
    pub fn cyclic_subgroups(&self) -> &GroupIndicesOrbitSet {
        self.cyclic_subgroups
            .get_or_init(|| match self.make_cyclic_subgroups.as_ref() {
                Some(make) => make(),
                None => self.group.make_cyclic_subgroups(),
            })
    }

    /// All subgroups of [`Self::group`], enumerated on first use.
    pub fn all_subgroups(&self) -> &GroupIndicesOrbitSet {
        self.all_subgroups
            .get_or_init(|| match self.make_all_subgroups.as_ref() {
                Some(make) => make(),
                None => self.group.make_all_subgroups(),
            })
    }

    fn decompose(&mut self) -> Result<(), SymmetryError> {
        let indices = self.group_indices();
        let n = self.subspace.ncols();
        log::debug!(
            "Decomposing a {n}-dimensional subspace under {} group elements...",
            indices.len()
        );
        let (q, rank) = orthonormal_column_basis(&self.subspace, IRREP_THRESHOLD);
        if rank != n {
            return Err(SymmetryError::DecompositionInconsistency(format!(
                "The subspace has {n} columns but rank {rank}."
            )));
        }
        if n == 0 {
            self.symmetry_adapted_subspace = Array2::zeros((self.dim(), 0));
            log::debug!("Nothing to decompose in an empty subspace.");
            return Ok(());
        }

        let restricted = indices
            .iter()
            .map(|&g| {
                let r = q.t().dot(&self.matrices[g]).dot(&q);
                let residual = &self.matrices[g].dot(&q) - &q.dot(&r);
                if max_abs(&residual) > IRREP_THRESHOLD {
                    return Err(SymmetryError::DecompositionInconsistency(format!(
                        "The subspace is not invariant under group element {g}."
                    )));
                }
                if max_abs(&(r.t().dot(&r) - Array2::<f64>::eye(rank))) > IRREP_THRESHOLD {
                    return Err(SymmetryError::DecompositionInconsistency(format!(
                        "Group element {g} is not orthogonal on the subspace."
                    )));
                }
                Ok(r)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let positions = indices
            .iter()
            .enumerate()
            .map(|(pos, &g)| (g, pos))
            .collect::<HashMap<_, _>>();
        let squares = indices
            .iter()
            .map(|&g| positions[&self.group.multiply(g, g)])
            .collect::<Vec<_>>();

        let mut rng = StdRng::seed_from_u64(IRREP_DECOMPOSITION_SEED);
        let blocks = split_irreducible(Array2::eye(rank), &restricted, &squares, &mut rng, 0)?;

        // Copies of the same irreducible representation share characters.
        let mut grouped: Vec<(IrrepKind, Vec<f64>, Vec<Array2<f64>>)> = vec![];
        for block in blocks {
            match grouped
                .iter_mut()
                .find(|(_, characters, _)| characters_equal(characters, &block.characters))
            {
                Some((_, _, bases)) => bases.push(block.basis),
                None => grouped.push((block.kind, block.characters, vec![block.basis])),
            }
        }

        // Isotypic projectors, used to check the grouping and to order the irreducible
        // representations by the input columns they first appear in.
        let order = indices.len() as f64;
        let input_coords = q.t().dot(&self.subspace);
        let mut keyed = grouped
            .into_iter()
            .map(|(kind, characters, bases)| {
                let dim = bases[0].ncols();
                let mut projector = Array2::<f64>::zeros((rank, rank));
                for (r, &chi) in restricted.iter().zip(characters.iter()) {
                    projector.scaled_add(chi, r);
                }
                projector *= dim as f64 / (order * kind.character_norm() as f64);
                let first_column = input_coords
                    .axis_iter(Axis(1))
                    .position(|col| {
                        let norm = col.dot(&col).sqrt();
                        let projected = projector.dot(&col);
                        projected.dot(&projected).sqrt() > IRREP_THRESHOLD * norm.max(1.0)
                    })
                    .unwrap_or(n);
                (first_column, projector, kind, characters, bases)
            })
            .collect::<Vec<_>>();

        let mut total = Array2::<f64>::zeros((rank, rank));
        for (_, projector, _, _, bases) in keyed.iter() {
            if max_abs(&(projector.dot(projector) - projector)) > IRREP_THRESHOLD
                || bases
                    .iter()
                    .any(|basis| max_abs(&(projector.dot(basis) - basis)) > IRREP_THRESHOLD)
            {
                return Err(SymmetryError::DecompositionInconsistency(
                    "An isotypic projector does not reproduce its irreducible subspaces."
                        .to_string(),
                ));
            }
            total += projector;
        }
        if max_abs(&(total - Array2::<f64>::eye(rank))) > IRREP_THRESHOLD {
            return Err(SymmetryError::DecompositionInconsistency(
                "The isotypic projectors do not resolve the identity.".to_string(),
            ));
        }

        keyed.sort_by(|a, b| {
            a.0.cmp(&b.0).then_with(|| {
                // Larger normalised characters first, so that the identity representation leads.
                let (dim_a, dim_b) = (a.4[0].ncols() as f64, b.4[0].ncols() as f64);
                b.3.iter()
                    .zip(a.3.iter())
                    .map(|(x, y)| (x / dim_b).total_cmp(&(y / dim_a)))
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            })
        });

        let mut columns = Vec::<Array2<f64>>::with_capacity(rank);
        let mut irreps = vec![];
        let mut blocks = vec![];
        let mut offset = 0;
        for (irrep_index, (_, _, kind, characters, bases)) in keyed.into_iter().enumerate() {
            let dim = bases[0].ncols();
            let multiplicity = bases.len();
            let bases = if kind == IrrepKind::Real {
                align_copies(bases, &restricted, &mut rng)?
            } else {
                bases
            };
            let mut complex_characters: Option<Vec<Complex64>> = None;
            for basis in bases {
                let (basis, complex_basis) = if self.allow_complex && kind != IrrepKind::Real {
                    let (paired, block_characters) = complex_pairs(
                        &basis,
                        &restricted,
                        complex_characters.as_deref(),
                        &mut rng,
                    )?;
                    if complex_characters.is_none() {
                        complex_characters = Some(block_characters);
                    }
                    let complex_basis = complex_columns(&q.dot(&paired));
                    (paired, Some(complex_basis))
                } else {
                    (basis, None)
                };
                blocks.push(IrrepBlock {
                    irrep_index,
                    columns: offset..offset + dim,
                    complex_basis,
                });
                offset += dim;
                columns.push(basis);
            }
            irreps.push(IrrepInfo {
                dim,
                multiplicity,
                kind,
                characters,
                complex_characters,
            });
        }

        let views = columns.iter().map(Array2::view).collect::<Vec<_>>();
        let adapted = if views.is_empty() {
            Array2::zeros((self.dim(), 0))
        } else {
            let stacked = ndarray::concatenate(Axis(1), &views).map_err(|err| {
                SymmetryError::DecompositionInconsistency(format!(
                    "The irreducible subspaces cannot be assembled: {err}."
                ))
            })?;
            q.dot(&stacked)
        };
        if adapted.ncols() != n {
            return Err(SymmetryError::DecompositionInconsistency(format!(
                "The irreducible subspaces span {} dimensions instead of {n}.",
                adapted.ncols()
            )));
        }
        self.symmetry_adapted_subspace = adapted;
        self.irreps = irreps;
        self.blocks = blocks;
        log::debug!(
            "Decomposing a {n}-dimensional subspace... Done: {} irreducible representations in \
             {} copies.",
            self.irreps.len(),
            self.blocks.len()
        );
        Ok(())
    }
}

impl fmt::Display for IrrepDecomposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Irreducible decomposition of a {}-dimensional subspace",
            self.symmetry_adapted_subspace.ncols()
        )?;
        writeln!(f, "{}", "┈".repeat(44))?;
        writeln!(f, " {:>5}  {:>4}  {:>12}  {:<13}", "Irrep", "Dim", "Multiplicity", "Type")?;
        writeln!(f, "{}", "┈".repeat(44))?;
        for (i, irrep) in self.irreps.iter().enumerate() {
            writeln!(
                f,
                " {:>5}  {:>4}  {:>12}  {:<13}",
                i, irrep.dim, irrep.multiplicity, irrep.kind
            )?;
        }
        writeln!(f, "{}", "┈".repeat(44))?;
        Ok(())
    }
}

// =================
// Numerical helpers
// =================

fn max_abs(arr: &Array2<f64>) -> f64 {
    arr.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}

fn characters_equal(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() < CHARACTER_THRESHOLD)
}

fn random_matrix(dim: usize, rng: &mut StdRng) -> Array2<f64> {
    Array2::from_shape_simple_fn((dim, dim), || rng.gen_range(-1.0..1.0))
}

/// The group average $`\frac{1}{|G|}\sum_g D(g) X D(g)^{\mathsf{T}}`$, which commutes with
/// every $`D(g)`$.
fn group_average(reps: &[Array2<f64>], x: &Array2<f64>) -> Array2<f64> {
    let mut average = Array2::<f64>::zeros(x.dim());
    for d in reps.iter() {
        average += &d.dot(x).dot(&d.t());
    }
    average / reps.len() as f64
}

/// Splits the invariant subspace spanned by the orthonormal columns of `basis` into
/// irreducible copies.
///
/// A reducible subspace is split along the eigenspaces of a random symmetric matrix averaged
/// over the group, which commutes with the representation.
fn split_irreducible(
    basis: Array2<f64>,
    restricted: &[Array2<f64>],
    squares: &[usize],
    rng: &mut StdRng,
    attempts: usize,
) -> Result<Vec<Block>, SymmetryError> {
    let m = basis.ncols();
    if m == 0 {
        return Ok(vec![]);
    }
    let reps = restricted
        .iter()
        .map(|r| basis.t().dot(r).dot(&basis))
        .collect::<Vec<_>>();
    let characters = reps.iter().map(|d| d.diag().sum()).collect::<Vec<_>>();
    let order = reps.len() as f64;
    let norm = characters.iter().map(|chi| chi * chi).sum::<f64>() / order;
    let frobenius_schur = squares.iter().map(|&g2| characters[g2]).sum::<f64>() / order;
    if let Some(kind) = IrrepKind::from_indicators(norm, frobenius_schur) {
        return Ok(vec![Block {
            basis,
            kind,
            characters,
        }]);
    }
    if attempts >= MAX_SPLIT_ATTEMPTS {
        return Err(SymmetryError::DecompositionInconsistency(format!(
            "A {m}-dimensional subspace with character norm {norm:.4} and Frobenius--Schur \
             indicator {frobenius_schur:.4} could not be split."
        )));
    }

    let x = random_matrix(m, rng);
    let commutant = group_average(&reps, &(&x + &x.t()));
    let eigen = SymmetricEigen::new(to_dmatrix(&commutant));
    let mut order_by_value = (0..m).collect::<Vec<_>>();
    order_by_value.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));
    let spread = eigen.eigenvalues.amax().max(1.0);
    let mut clusters: Vec<Vec<usize>> = vec![];
    for &k in order_by_value.iter() {
        match clusters.last_mut() {
            Some(cluster)
                if (eigen.eigenvalues[k] - eigen.eigenvalues[cluster[0]]).abs()
                    < IRREP_THRESHOLD * spread =>
            {
                cluster.push(k)
            }
            _ => clusters.push(vec![k]),
        }
    }
    if clusters.len() == 1 {
        return split_irreducible(basis, restricted, squares, rng, attempts + 1);
    }

    let mut blocks = vec![];
    for cluster in clusters {
        let vectors = Array2::from_shape_fn((m, cluster.len()), |(i, j)| {
            eigen.eigenvectors[(i, cluster[j])]
        });
        blocks.extend(split_irreducible(
            basis.dot(&vectors),
            restricted,
            squares,
            rng,
            attempts,
        )?);
    }
    Ok(blocks)
}

/// Rotates every copy of a real-type irreducible representation so that its matrices equal
/// those of the first copy.
///
/// The intertwiner $`S = \frac{1}{|G|}\sum_g D_j(g) K D_1(g)^{\mathsf{T}}`$ of a random $`K`$
/// is a multiple of an orthogonal matrix carrying copy 1 onto copy $`j`$.
fn align_copies(
    bases: Vec<Array2<f64>>,
    restricted: &[Array2<f64>],
    rng: &mut StdRng,
) -> Result<Vec<Array2<f64>>, SymmetryError> {
    let Some(reference) = bases.first().cloned() else {
        return Ok(bases);
    };
    let dim = reference.ncols();
    let reference_reps = restricted
        .iter()
        .map(|r| reference.t().dot(r).dot(&reference))
        .collect::<Vec<_>>();
    let mut aligned = vec![reference];
    for basis in bases.into_iter().skip(1) {
        let reps = restricted
            .iter()
            .map(|r| basis.t().dot(r).dot(&basis))
            .collect::<Vec<_>>();
        let mut rotated = None;
        for _ in 0..MAX_SPLIT_ATTEMPTS {
            let k = random_matrix(dim, rng);
            let mut intertwiner = Array2::<f64>::zeros((dim, dim));
            for (d_j, d_1) in reps.iter().zip(reference_reps.iter()) {
                intertwiner += &d_j.dot(&k).dot(&d_1.t());
            }
            let scale = (intertwiner.t().dot(&intertwiner).diag().sum() / dim as f64).sqrt();
            if scale > IRREP_THRESHOLD {
                rotated = Some(basis.dot(&(intertwiner / scale)));
                break;
            }
        }
        let rotated = rotated.ok_or_else(|| {
            SymmetryError::DecompositionInconsistency(
                "Two copies of an irreducible representation could not be aligned.".to_string(),
            )
        })?;
        let consistent = restricted.iter().zip(reference_reps.iter()).all(|(r, d_1)| {
            max_abs(&(rotated.t().dot(r).dot(&rotated) - d_1)) < IRREP_THRESHOLD.sqrt()
        });
        if !consistent {
            return Err(SymmetryError::DecompositionInconsistency(
                "Aligned copies of an irreducible representation have different matrices."
                    .to_string(),
            ));
        }
        aligned.push(rotated);
    }
    Ok(aligned)
}

/// Finds a complex structure $`J`$ on a non-real irreducible copy, commuting with the
/// representation and squaring to $`-I`$, and reorders the basis of the copy into pairs
/// $`(u_k, J u_k)`$.
///
/// If `reference` characters are given, $`J`$ is oriented so that the complex basis carries
/// them.
///
/// # Returns
///
/// The paired basis and the characters of its complex basis.
fn complex_pairs(
    basis: &Array2<f64>,
    restricted: &[Array2<f64>],
    reference: Option<&[Complex64]>,
    rng: &mut StdRng,
) -> Result<(Array2<f64>, Vec<Complex64>), SymmetryError> {
    let dim = basis.ncols();
    let reps = restricted
        .iter()
        .map(|r| basis.t().dot(r).dot(basis))
        .collect::<Vec<_>>();
    let mut structure = None;
    for _ in 0..MAX_SPLIT_ATTEMPTS {
        let x = random_matrix(dim, rng);
        let j = group_average(&reps, &(&x - &x.t()));
        let square_norm = -j.dot(&j).diag().sum() / dim as f64;
        if square_norm > IRREP_THRESHOLD {
            let j = j / square_norm.sqrt();
            if max_abs(&(j.dot(&j) + Array2::<f64>::eye(dim))) < IRREP_THRESHOLD.sqrt() {
                structure = Some(j);
                break;
            }
        }
    }
    let mut j = structure.ok_or_else(|| {
        SymmetryError::DecompositionInconsistency(
            "No complex structure was found on a non-real irreducible subspace.".to_string(),
        )
    })?;

    let mut paired = pair_columns(&j);
    let mut characters = complex_characters(&reps, &paired);
    if let Some(reference) = reference {
        let matches = |characters: &[Complex64]| {
            characters
                .iter()
                .zip(reference.iter())
                .all(|(a, b)| (a - b).norm() < CHARACTER_THRESHOLD)
        };
        if !matches(&characters) {
            j = -j;
            paired = pair_columns(&j);
            characters = complex_characters(&reps, &paired);
        }
    }
    Ok((basis.dot(&paired), characters))
}

/// An orthonormal basis $`(u_1, J u_1, u_2, J u_2, \dots)`$ built by Gram--Schmidt from the
/// standard basis.
fn pair_columns(j: &Array2<f64>) -> Array2<f64> {
    let dim = j.nrows();
    let mut columns: Vec<Array1<f64>> = vec![];
    for e in 0..dim {
        if columns.len() >= dim {
            break;
        }
        let mut u = Array1::<f64>::zeros(dim);
        u[e] = 1.0;
        for c in columns.iter() {
            let overlap = c.dot(&u);
            u.scaled_add(-overlap, c);
        }
        let norm = u.dot(&u).sqrt();
        if norm > IRREP_THRESHOLD {
            u /= norm;
            let ju = j.dot(&u);
            columns.push(u);
            columns.push(ju);
        }
    }
    Array2::from_shape_fn((dim, columns.len()), |(i, k)| columns[k][i])
}

/// The characters of the complex basis $`(u_k - i J u_k)/\sqrt{2}`$ of a paired basis.
fn complex_characters(reps: &[Array2<f64>], paired: &Array2<f64>) -> Vec<Complex64> {
    reps.iter()
        .map(|d| {
            let d = paired.t().dot(d).dot(paired);
            (0..paired.ncols() / 2)
                .map(|k| {
                    let (a, b) = (2 * k, 2 * k + 1);
                    Complex64::new(d[(a, a)] + d[(b, b)], d[(b, a)] - d[(a, b)]) * 0.5
                })
                .sum()
        })
        .collect()
}

/// The complex columns $`(u_k - i J u_k)/\sqrt{2}`$ of a paired basis.
fn complex_columns(paired: &Array2<f64>) -> Array2<Complex64> {
    let half = paired.ncols() / 2;
    Array2::from_shape_fn((paired.nrows(), half), |(i, k)| {
        Complex64::new(paired[(i, 2 * k)], -paired[(i, 2 * k + 1)]) / std::f64::consts::SQRT_2
    })
}
