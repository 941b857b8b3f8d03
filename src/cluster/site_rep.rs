//! Action of symmetry operations on integral site coordinates.

use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auxiliary::structure::Structure;
use crate::cluster::IntegralSiteCoordinate;
use crate::error::SymmetryError;
use crate::permutation::Permutation;
use crate::symmetry::symmetry_operation::SymOp;

#[cfg(test)]
#[path = "site_rep_tests.rs"]
mod site_rep_tests;

/// The action of one symmetry operation on integral site coordinates:
/// $`(b, \mathbf{n}) \mapsto (\pi(b), \mathbf{M}\mathbf{n} + \mathbf{o}_b)`$.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiteCoordinateRep {
    /// The linear part in fractional coordinates, $`\mathbf{M} = \mathbf{L}^{-1}\mathbf{R}\mathbf{L}`$.
    point_matrix: Matrix3<i64>,

    /// The sublattice permutation $`\pi`$.
    sublattice_permutation: Permutation,

    /// The unit-cell offset $`\mathbf{o}_b`$ picked up by each sublattice.
    unitcell_offsets: Vec<Vector3<i64>>,
}

/// The representation of a group on integral site coordinates, one entry per group element.
pub type SiteCoordinateSymRep = Vec<SiteCoordinateRep>;

impl SiteCoordinateRep {
    /// The identity action on `n_sublattices` sublattices.
    pub fn identity(n_sublattices: usize) -> Self {
        Self {
            point_matrix: Matrix3::identity(),
            sublattice_permutation: Permutation::identity(n_sublattices),
            unitcell_offsets: vec![Vector3::zeros(); n_sublattices],
        }
    }

    pub fn point_matrix(&self) -> &Matrix3<i64> {
        &self.point_matrix
    }

    pub fn sublattice_permutation(&self) -> &Permutation {
        &self.sublattice_permutation
    }

    pub fn unitcell_offsets(&self) -> &[Vector3<i64>] {
        &self.unitcell_offsets
    }

    /// The number of sublattices this action is defined on.
    pub fn n_sublattices(&self) -> usize {
        self.unitcell_offsets.len()
    }

    /// Transforms a site coordinate.
    ///
    /// # Panics
    ///
    /// Panics if the sublattice of `site` is not below [`Self::n_sublattices`].
    pub fn apply(&self, site: &IntegralSiteCoordinate) -> IntegralSiteCoordinate {
        IntegralSiteCoordinate::new(
            self.sublattice_permutation.apply(site.sublattice),
            self.point_matrix * site.unitcell + self.unitcell_offsets[site.sublattice],
        )
    }

    /// The action of this operation followed by a lattice translation `delta`.
    #[must_use]
    pub fn translated(&self, delta: &Vector3<i64>) -> Self {
        Self {
            point_matrix: self.point_matrix,
            sublattice_permutation: self.sublattice_permutation.clone(),
            unitcell_offsets: self
                .unitcell_offsets
                .iter()
                .map(|offset| offset + delta)
                .collect(),
        }
    }

    /// The action of `self` after `other`.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        let unitcell_offsets = other
            .unitcell_offsets
            .iter()
            .enumerate()
            .map(|(b, offset)| {
                self.point_matrix * offset
                    + self.unitcell_offsets[other.sublattice_permutation.apply(b)]
            })
            .collect();
        Self {
            point_matrix: self.point_matrix * other.point_matrix,
            sublattice_permutation: &self.sublattice_permutation * &other.sublattice_permutation,
            unitcell_offsets,
        }
    }
}

/// Builds the site-coordinate representation of each operation in `elements`.
///
/// # Errors
///
/// Errors if an operation does not map the structure onto itself: a transformed basis site
/// coincides with no site, the operation is not integral in fractional coordinates, or the
/// induced sublattice map is not a permutation.
pub fn make_site_coordinate_sym_rep(
    elements: &[SymOp],
    structure: &Structure,
) -> Result<SiteCoordinateSymRep, SymmetryError> {
    log::debug!(
        "Building site-coordinate representation for {} operations...",
        elements.len()
    );
    elements
        .par_iter()
        .map(|op| make_site_coordinate_rep(op, structure))
        .collect()
}

fn make_site_coordinate_rep(
    op: &SymOp,
    structure: &Structure,
) -> Result<SiteCoordinateRep, SymmetryError> {
    let point_matrix = structure
        .lattice()
        .integral_frac_matrix(op.matrix())
        .ok_or_else(|| {
            SymmetryError::GeometricInconsistency(format!(
                "The operation {op} is not integral in the fractional coordinates of the lattice."
            ))
        })?;
    let (image, unitcell_offsets): (Vec<_>, Vec<_>) = structure
        .basis()
        .iter()
        .enumerate()
        .map(|(b, site)| {
            let transformed = op.apply_point(&site.position);
            structure
                .find_site(&transformed)
                .map(|image| (image.sublattice, image.unitcell))
                .ok_or_else(|| {
                    SymmetryError::GeometricInconsistency(format!(
                        "The operation {op} maps basis site {b} onto ({:+.6}, {:+.6}, {:+.6}), \
                         which is not a site of the structure.",
                        transformed[0], transformed[1], transformed[2]
                    ))
                })
        })
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .unzip();
    let sublattice_permutation = Permutation::from_image(image).map_err(|err| {
        SymmetryError::GeometricInconsistency(format!(
            "The operation {op} does not permute the sublattices: {err}"
        ))
    })?;
    Ok(SiteCoordinateRep {
        point_matrix,
        sublattice_permutation,
        unitcell_offsets,
    })
}
