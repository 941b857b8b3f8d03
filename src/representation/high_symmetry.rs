//! High-symmetry directions and irreducible wedges of irreducible subspaces.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;

use ndarray::{Array1, Array2, Axis};
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auxiliary::misc::{column_rank, orthonormal_column_basis};
use crate::error::SymmetryError;
use crate::representation::irreps::{IrrepBlock, IrrepDecomposition, IrrepInfo};
use crate::symmetry::symmetry_group::GroupIndicesOrbitSet;

#[cfg(test)]
#[path = "high_symmetry_tests.rs"]
mod high_symmetry_tests;

/// Threshold for fixed-space ranks and for comparing directions.
const DIRECTION_THRESHOLD: f64 = 1e-6;

/// An orbit of high-symmetry directions under the group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DirectionOrbit {
    /// Unit vectors of the orbit.
    pub directions: Vec<Array1<f64>>,

    /// The order of the stabiliser of each direction.
    pub stabiliser_order: usize,
}

/// An irreducible wedge of an irreducible subspace: a cone whose images under the group
/// cover the subspace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IrreducibleWedge {
    pub block_index: usize,

    pub irrep_index: usize,

    /// The edges of the cone, as columns in the full coordinate space.
    pub axes: Array2<f64>,

    /// The number of distinct images of the wedge under the group.
    pub orbit_size: usize,
}

/// The symmetry report of a vector space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorSpaceSymReport {
    /// The symmetry-adapted basis, as columns in the full coordinate space.
    pub symmetry_adapted_subspace: Array2<f64>,

    pub irreps: Vec<IrrepInfo>,

    pub blocks: Vec<IrrepBlock>,

    /// The names of the axes of the full coordinate space.
    pub axis_glossary: Vec<String>,

    /// For each block, its direction orbits in the full coordinate space.
    pub high_symmetry_directions: Option<Vec<Vec<DirectionOrbit>>>,

    /// For each block, an irreducible wedge.
    pub irreducible_wedges: Option<Vec<IrreducibleWedge>>,
}

impl fmt::Display for VectorSpaceSymReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dim, n) = self.symmetry_adapted_subspace.dim();
        writeln!(f, "Symmetry-adapted subspace: {n} vectors in {dim} dimensions")?;
        for (i, block) in self.blocks.iter().enumerate() {
            let irrep = &self.irreps[block.irrep_index];
            write!(
                f,
                "Block {i}: irrep {} ({}-dimensional, {}), columns {}..{}",
                block.irrep_index, irrep.dim, irrep.kind, block.columns.start, block.columns.end
            )?;
            if let Some(orbits) = self.high_symmetry_directions.as_ref().map(|d| &d[i]) {
                write!(
                    f,
                    ", {} direction orbits (stabilisers {:?})",
                    orbits.len(),
                    orbits
                        .iter()
                        .map(|orbit| orbit.stabiliser_order)
                        .collect::<Vec<_>>()
                )?;
            }
            if let Some(wedge) = self.irreducible_wedges.as_ref().map(|w| &w[i]) {
                write!(f, ", wedge orbit size {}", wedge.orbit_size)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ================
// Direction search
// ================

/// The matrices of the decomposition's group indices acting on one block, with the position of
/// each group index.
struct BlockAction {
    matrices: Vec<Array2<f64>>,
    positions: HashMap<usize, usize>,
}

impl BlockAction {
    fn new(decomposition: &IrrepDecomposition, block_index: usize) -> Self {
        let positions = decomposition
            .group_indices()
            .into_iter()
            .enumerate()
            .map(|(pos, g)| (g, pos))
            .collect();
        Self {
            matrices: decomposition.block_matrices(block_index),
            positions,
        }
    }

    fn dim(&self) -> usize {
        self.matrices.first().map_or(0, Array2::nrows)
    }

    /// The directions fixed by the first subgroup of each orbit whose fixed space is a line.
    /// Subgroups not contained in the group indices are skipped.
    fn fixed_directions(&self, subgroups: &GroupIndicesOrbitSet) -> Vec<Array1<f64>> {
        let dim = self.dim();
        subgroups
            .par_iter()
            .filter_map(|orbit| orbit.iter().next())
            .filter_map(|subgroup| {
                let mut projector = Array2::<f64>::zeros((dim, dim));
                for h in subgroup.iter() {
                    projector += &self.matrices[*self.positions.get(h)?];
                }
                projector /= subgroup.len() as f64;
                let (fixed, rank) = orthonormal_column_basis(&projector, DIRECTION_THRESHOLD);
                (rank == 1).then(|| {
                    let v = fixed.column(0).to_owned();
                    let opposite = -&v;
                    vec![v, opposite]
                })
            })
            .flatten()
            .collect()
    }

    /// Groups directions into orbits, sorted by stabiliser order (descending).
    fn direction_orbits(&self, directions: Vec<Array1<f64>>) -> Vec<DirectionOrbit> {
        let mut orbits: Vec<DirectionOrbit> = vec![];
        for v in directions {
            if orbits
                .iter()
                .any(|orbit| contains_direction(&orbit.directions, &v))
            {
                continue;
            }
            let mut members: Vec<Array1<f64>> = vec![];
            for mat in self.matrices.iter() {
                let image = mat.dot(&v);
                if !contains_direction(&members, &image) {
                    members.push(image);
                }
            }
            orbits.push(DirectionOrbit {
                stabiliser_order: self.matrices.len() / members.len(),
                directions: members,
            });
        }
        orbits.sort_by_key(|orbit| Reverse(orbit.stabiliser_order));
        orbits
    }

    /// The order of the group divided by the number of elements permuting the columns of
    /// `axes` among themselves.
    fn wedge_orbit_size(&self, axes: &[Array1<f64>]) -> usize {
        let stabiliser = self
            .matrices
            .iter()
            .filter(|mat| {
                axes.iter()
                    .all(|axis| contains_direction(axes, &mat.dot(axis)))
            })
            .count()
            .max(1);
        self.matrices.len() / stabiliser
    }
}

fn contains_direction(directions: &[Array1<f64>], v: &Array1<f64>) -> bool {
    directions.iter().any(|u| {
        u.iter()
            .zip(v.iter())
            .all(|(a, b)| (a - b).abs() < DIRECTION_THRESHOLD)
    })
}

fn stack_columns(dim: usize, columns: &[Array1<f64>]) -> Array2<f64> {
    Array2::from_shape_fn((dim, columns.len()), |(i, k)| columns[k][i])
}

/// Searches the high-symmetry directions of a block, in block coordinates.
///
/// Fixed spaces of cyclic subgroups are searched first. All subgroups are only enumerated if
/// the directions found do not span the block.
fn block_direction_orbits(
    decomposition: &IrrepDecomposition,
    action: &BlockAction,
) -> Vec<DirectionOrbit> {
    let dim = action.dim();
    let mut directions = action.fixed_directions(decomposition.cyclic_subgroups());
    if column_rank(&stack_columns(dim, &directions), DIRECTION_THRESHOLD) < dim {
        log::debug!("Cyclic subgroups do not fix enough directions; searching all subgroups.");
        directions.extend(action.fixed_directions(decomposition.all_subgroups()));
    }
    let mut unique: Vec<Array1<f64>> = vec![];
    for v in directions {
        if !contains_direction(&unique, &v) {
            unique.push(v);
        }
    }
    action.direction_orbits(unique)
}

/// Builds an irreducible wedge greedily, taking from each direction orbit in turn the member
/// closest to the axes chosen so far. The wedge is completed with an orthonormal complement if
/// the directions do not span the block.
fn block_wedge(action: &BlockAction, orbits: &[DirectionOrbit]) -> (Vec<Array1<f64>>, usize) {
    let dim = action.dim();
    let mut axes: Vec<Array1<f64>> = vec![];
    for orbit in orbits.iter() {
        if axes.len() >= dim {
            break;
        }
        let sum = axes
            .iter()
            .fold(Array1::<f64>::zeros(dim), |acc, axis| acc + axis);
        let chosen = orbit
            .directions
            .iter()
            .filter(|v| {
                let mut candidate = axes.clone();
                candidate.push((*v).clone());
                column_rank(&stack_columns(dim, &candidate), DIRECTION_THRESHOLD)
                    == candidate.len()
            })
            .min_by_key(|v| Reverse(OrderedFloat(v.dot(&sum))));
        if let Some(v) = chosen {
            axes.push(v.clone());
        }
    }
    if axes.len() < dim {
        let (span, _) = orthonormal_column_basis(&stack_columns(dim, &axes), DIRECTION_THRESHOLD);
        let complement = Array2::<f64>::eye(dim) - span.dot(&span.t());
        let (extra, _) = orthonormal_column_basis(&complement, DIRECTION_THRESHOLD);
        axes.extend(
            extra
                .axis_iter(Axis(1))
                .take(dim - axes.len())
                .map(|col| col.to_owned()),
        );
    }
    let orbit_size = action.wedge_orbit_size(&axes);
    (axes, orbit_size)
}

// ==============
// Public entries
// ==============

/// Finds the high-symmetry directions of one block of a decomposition, as orbits in the full
/// coordinate space.
pub fn make_high_symmetry_directions(
    decomposition: &IrrepDecomposition,
    block_index: usize,
) -> Vec<DirectionOrbit> {
    let action = BlockAction::new(decomposition, block_index);
    let basis = decomposition.block_basis(block_index);
    block_direction_orbits(decomposition, &action)
        .into_iter()
        .map(|orbit| to_full_orbit(&basis, orbit))
        .collect()
}

/// Builds an irreducible wedge of one block of a decomposition.
pub fn make_irreducible_wedge(
    decomposition: &IrrepDecomposition,
    block_index: usize,
) -> IrreducibleWedge {
    let action = BlockAction::new(decomposition, block_index);
    let orbits = block_direction_orbits(decomposition, &action);
    let (axes, orbit_size) = block_wedge(&action, &orbits);
    to_full_wedge(decomposition, block_index, &axes, orbit_size)
}

fn to_full_orbit(basis: &Array2<f64>, orbit: DirectionOrbit) -> DirectionOrbit {
    DirectionOrbit {
        directions: orbit.directions.iter().map(|v| basis.dot(v)).collect(),
        stabiliser_order: orbit.stabiliser_order,
    }
}

fn to_full_wedge(
    decomposition: &IrrepDecomposition,
    block_index: usize,
    axes: &[Array1<f64>],
    orbit_size: usize,
) -> IrreducibleWedge {
    let basis = decomposition.block_basis(block_index);
    IrreducibleWedge {
        block_index,
        irrep_index: decomposition.blocks()[block_index].irrep_index,
        axes: basis.dot(&stack_columns(basis.ncols(), axes)),
        orbit_size,
    }
}

/// Assembles the symmetry report of a decomposed vector space.
///
/// # Arguments
///
/// * `decomposition` - The decomposition.
/// * `calc_wedges` - Whether high-symmetry directions and irreducible wedges are searched. This
/// enumerates subgroups and is the most expensive part of the analysis.
/// * `axis_glossary` - The names of the axes of the full coordinate space.
///
/// # Errors
///
/// Errors if the glossary does not name every axis.
pub fn vector_space_sym_report(
    decomposition: &IrrepDecomposition,
    calc_wedges: bool,
    axis_glossary: Vec<String>,
) -> Result<VectorSpaceSymReport, SymmetryError> {
    if axis_glossary.len() != decomposition.dim() {
        return Err(SymmetryError::Configuration(format!(
            "{} axis names were given for a {}-dimensional space.",
            axis_glossary.len(),
            decomposition.dim()
        )));
    }
    let (high_symmetry_directions, irreducible_wedges) = if calc_wedges {
        let n_blocks = decomposition.blocks().len();
        log::debug!("Searching high-symmetry directions of {n_blocks} blocks in parallel...");
        let (directions, wedges): (Vec<_>, Vec<_>) = (0..n_blocks)
            .into_par_iter()
            .map(|i| {
                let action = BlockAction::new(decomposition, i);
                let orbits = block_direction_orbits(decomposition, &action);
                let (axes, orbit_size) = block_wedge(&action, &orbits);
                let basis = decomposition.block_basis(i);
                let wedge = to_full_wedge(decomposition, i, &axes, orbit_size);
                let orbits = orbits
                    .into_iter()
                    .map(|orbit| to_full_orbit(&basis, orbit))
                    .collect::<Vec<_>>();
                (orbits, wedge)
            })
            .unzip();
        log::debug!("Searching high-symmetry directions... Done.");
        (Some(directions), Some(wedges))
    } else {
        (None, None)
    };
    Ok(VectorSpaceSymReport {
        symmetry_adapted_subspace: decomposition.symmetry_adapted_subspace().clone(),
        irreps: decomposition.irreps().to_vec(),
        blocks: decomposition.blocks().to_vec(),
        axis_glossary,
        high_symmetry_directions,
        irreducible_wedges,
    })
}
