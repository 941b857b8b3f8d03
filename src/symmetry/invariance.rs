//! Subgroups leaving objects invariant.

use std::sync::Arc;

use rayon::prelude::*;

use crate::auxiliary::geometry::Lattice;
use crate::cluster::site_rep::{SiteCoordinateRep, SiteCoordinateSymRep};
use crate::cluster::Cluster;
use crate::error::SymmetryError;
use crate::symmetry::symmetry_group::{GroupIndices, SymGroup};

#[cfg(test)]
#[path = "invariance_tests.rs"]
mod invariance_tests;

/// A trait for objects that can be transformed by a representation `R` of a group element.
pub trait SymmetryTransformable<R>: Sized {
    /// Applies the transformation `rep` to `self`.
    ///
    /// # Errors
    ///
    /// Errors if `rep` is incompatible with `self`.
    fn sym_transform(&self, rep: &R) -> Result<Self, SymmetryError>;
}

/// Finds the subgroup of `group` whose elements leave `object` unchanged.
///
/// # Arguments
///
/// * `object` - The object whose invariance is examined. Its equality relation decides what
/// "unchanged" means.
/// * `group` - The supergroup.
/// * `rep` - The action of each element of `group` on `object`.
///
/// # Returns
///
/// The invariant subgroup, whose head indices refer to `group`.
///
/// # Errors
///
/// Errors if `rep` does not match `group`, if a transformation fails, or if the retained
/// elements do not form a group.
pub fn invariant_subgroup<T, R>(
    object: &T,
    group: &Arc<SymGroup>,
    rep: &[R],
) -> Result<SymGroup, SymmetryError>
where
    T: SymmetryTransformable<R> + PartialEq + Sync,
    R: Sync,
{
    if rep.len() != group.order() {
        return Err(SymmetryError::Configuration(format!(
            "A representation of {} elements cannot act for a group of order {}.",
            rep.len(),
            group.order()
        )));
    }
    let kept = rep
        .par_iter()
        .enumerate()
        .map(|(i, r)| object.sym_transform(r).map(|image| (i, image == *object)))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter_map(|(i, invariant)| invariant.then_some(i))
        .collect::<GroupIndices>();
    log::debug!(
        "Invariant subgroup of order {} in a group of order {}.",
        kept.len(),
        group.order()
    );
    group.subgroup(&kept)
}

/// Finds the operations of a factor group that map `cluster` onto a lattice translate of
/// itself.
///
/// Each retained operation is returned composed with the lattice translation that brings the
/// image back onto `cluster`, so the returned group leaves `cluster` exactly invariant and acts
/// on sites through the returned representation.
///
/// # Returns
///
/// The cluster group, whose head indices refer to `factor_group`, and its site-coordinate
/// representation.
///
/// # Errors
///
/// Errors if `rep` does not match `factor_group` or if the retained operations do not form a
/// group.
pub fn make_cluster_group(
    cluster: &Cluster,
    factor_group: &Arc<SymGroup>,
    lattice: &Lattice,
    rep: &[SiteCoordinateRep],
) -> Result<(SymGroup, SiteCoordinateSymRep), SymmetryError> {
    if rep.len() != factor_group.order() {
        return Err(SymmetryError::Configuration(format!(
            "A representation of {} elements cannot act for a factor group of order {}.",
            rep.len(),
            factor_group.order()
        )));
    }
    let retained = rep
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let image = cluster.sym_transform(r).ok()?;
            let delta = match (image.sorted_sites().first(), cluster.sorted_sites().first()) {
                (Some(a), Some(b)) => a.unitcell - b.unitcell,
                _ => nalgebra::Vector3::zeros(),
            };
            (&image - &delta == *cluster).then_some((i, delta))
        })
        .collect::<Vec<_>>();
    let indices = retained.iter().map(|(i, _)| *i).collect::<GroupIndices>();
    let elements = retained
        .iter()
        .map(|(i, delta)| {
            factor_group.elements()[*i].translated(&-lattice.lattice_vector(delta))
        })
        .collect::<Vec<_>>();
    let cluster_rep = retained
        .iter()
        .map(|(i, delta)| rep[*i].translated(&-delta))
        .collect::<Vec<_>>();
    let group = factor_group.subgroup_with_elements(&indices, elements)?;
    log::debug!(
        "Cluster group of order {} for cluster {cluster}.",
        group.order()
    );
    Ok((group, cluster_rep))
}
