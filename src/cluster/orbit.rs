//! Orbits of clusters under a group of site-coordinate actions.

use std::collections::{BTreeSet, HashSet};

use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cluster::cluster_specs::ClusterSpecs;
use crate::cluster::site_rep::SiteCoordinateRep;
use crate::cluster::{Cluster, IntegralSiteCoordinate};
use crate::error::SymmetryError;
use crate::symmetry::invariance::make_cluster_group;
use crate::symmetry::prim_symmetry::PrimSymmetry;

#[cfg(test)]
#[path = "orbit_tests.rs"]
mod orbit_tests;

/// An orbit of clusters, in ascending cluster order. The first element is the prototype.
pub type Orbit = BTreeSet<Cluster>;

fn default_true() -> bool {
    true
}

/// A cluster whose orbit is to be included in an enumeration regardless of distance cutoffs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrbitGenerator {
    /// A cluster of the forced orbit.
    pub prototype: Cluster,

    /// If `true`, the orbits of all subclusters of [`Self::prototype`] are included as well.
    #[serde(default = "default_true")]
    pub include_subclusters: bool,
}

impl OrbitGenerator {
    pub fn new(prototype: Cluster, include_subclusters: bool) -> Self {
        Self {
            prototype,
            include_subclusters,
        }
    }

    /// The clusters forced into the enumeration by this generator.
    fn seeds(&self) -> Vec<Cluster> {
        if self.include_subclusters {
            self.prototype.subclusters()
        } else {
            vec![self.prototype.clone()]
        }
    }
}

/// The phenomenal clusters equivalent to a prototype under the factor group, as used to place a
/// local basis set in every equivalent environment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalentsInfo {
    /// The equivalent phenomenal clusters, in prim-periodic canonical form. The first is the
    /// prototype.
    pub phenomenal_clusters: Vec<Cluster>,

    /// For each equivalent, the index of the first factor-group operation generating it from the
    /// prototype.
    pub equivalent_generating_op_indices: Vec<usize>,
}

// =================
// Single orbits
// =================

/// Checks that every site of `cluster` lies on a sublattice that `rep` acts on.
fn check_sublattices(cluster: &Cluster, rep: &[SiteCoordinateRep]) -> Result<(), SymmetryError> {
    let Some(n_sublattices) = rep.first().map(SiteCoordinateRep::n_sublattices) else {
        return Ok(());
    };
    match cluster
        .sites()
        .iter()
        .find(|site| site.sublattice >= n_sublattices)
    {
        Some(site) => Err(SymmetryError::Configuration(format!(
            "Site {site} of cluster {cluster} refers to a missing sublattice."
        ))),
        None => Ok(()),
    }
}

/// Constructs the orbit of `seed` with exact site equality.
///
/// `rep` is expected to leave any phenomenal cluster of interest invariant, such as the
/// representation returned by [`crate::symmetry::invariance::make_cluster_group`].
///
/// # Panics
///
/// Panics if a site of `seed` lies on a sublattice that `rep` does not act on.
pub fn make_orbit(seed: &Cluster, rep: &[SiteCoordinateRep]) -> Orbit {
    rep.iter().map(|r| seed.transformed(r).canonical()).collect()
}

/// Constructs the orbit of `seed` modulo lattice translations. Every element is stored in its
/// prim-periodic canonical form.
///
/// # Panics
///
/// Panics if a site of `seed` lies on a sublattice that `rep` does not act on.
pub fn make_prim_periodic_orbit(seed: &Cluster, rep: &[SiteCoordinateRep]) -> Orbit {
    rep.iter()
        .map(|r| seed.transformed(r).prim_periodic_canonical())
        .collect()
}

/// For each element of `orbit`, in orbit order, finds the index of the first operation in `rep`
/// that maps the prototype onto it.
///
/// # Errors
///
/// Errors if the prototype lies on a sublattice that `rep` does not act on, or if an element of
/// `orbit` is not the image of the prototype under `rep`.
pub fn make_equivalence_map(
    orbit: &Orbit,
    rep: &[SiteCoordinateRep],
    periodic: bool,
) -> Result<Vec<usize>, SymmetryError> {
    let Some(prototype) = orbit.first() else {
        return Ok(vec![]);
    };
    check_sublattices(prototype, rep)?;
    let images = rep
        .iter()
        .map(|r| {
            let image = prototype.transformed(r);
            if periodic {
                image.prim_periodic_canonical()
            } else {
                image.canonical()
            }
        })
        .collect::<Vec<_>>();
    orbit
        .iter()
        .map(|element| {
            images.iter().position(|image| image == element).ok_or_else(|| {
                SymmetryError::Configuration(format!(
                    "Cluster {element} is not an image of the orbit prototype {prototype}."
                ))
            })
        })
        .collect()
}

/// Constructs the equivalents of a phenomenal cluster under the factor group of `prim`.
///
/// # Errors
///
/// Errors if `phenomenal` refers to a sublattice missing from `prim`, or if the equivalence map
/// of the phenomenal orbit cannot be built.
pub fn make_equivalents_info(
    phenomenal: &Cluster,
    prim: &PrimSymmetry,
) -> Result<EquivalentsInfo, SymmetryError> {
    check_sublattices(phenomenal, prim.site_rep())?;
    let orbit = make_prim_periodic_orbit(phenomenal, prim.site_rep());
    let equivalent_generating_op_indices = make_equivalence_map(&orbit, prim.site_rep(), true)?;
    Ok(EquivalentsInfo {
        phenomenal_clusters: orbit.into_iter().collect(),
        equivalent_generating_op_indices,
    })
}

// =================
// Orbit enumeration
// =================

/// Enumerates all orbits described by `specs`: periodic orbits if `specs` has no phenomenal
/// cluster, local orbits otherwise.
///
/// Orbits are sorted by cluster size, then by the maximum site-to-site distance of their
/// prototypes, then by prototype.
///
/// # Errors
///
/// Errors if the cutoff tables do not cover every enumerated cluster size, if a custom generator
/// conflicts with the phenomenal-site policy, or if the orbit group cannot be built.
pub fn make_all_orbits(specs: &ClusterSpecs) -> Result<Vec<Orbit>, SymmetryError> {
    match specs.phenomenal() {
        None => make_prim_periodic_orbits(specs),
        Some(phenomenal) => make_local_orbits(specs, phenomenal),
    }
}

/// Enumerates periodic orbits: clusters are compared modulo lattice translations.
///
/// # Errors
///
/// Errors if the site-coordinate representation of the generating group cannot be built.
pub fn make_prim_periodic_orbits(specs: &ClusterSpecs) -> Result<Vec<Orbit>, SymmetryError> {
    let (_, rep) = specs.orbit_group()?;
    let structure = specs.prim().structure();
    let tolerance = structure.lattice().tolerance();
    log::debug!(
        "Enumerating periodic orbits over {} branches...",
        specs.n_branches()
    );

    let points = (0..structure.n_sublattices())
        .filter(|&b| specs.is_eligible(b))
        .map(|b| IntegralSiteCoordinate::new(b, Vector3::zeros()))
        .collect::<Vec<_>>();
    let mut enumerator = OrbitEnumerator::new(specs, &rep, true);
    enumerator.add_branches(&points, |prototype, n| {
        let max_length = specs.max_length()[n];
        let Some(first) = prototype.sorted_sites().first() else {
            return vec![];
        };
        structure.sites_within(
            &structure.site_position(first),
            max_length + tolerance,
            |b| specs.is_eligible(b),
        )
    });
    enumerator.add_custom_generators(|_| Ok(()))?;
    let orbits = enumerator.finish();
    log::debug!("Enumerating periodic orbits... Done.");
    Ok(orbits)
}

/// Enumerates local orbits about the phenomenal cluster: clusters are compared exactly, and
/// generated by the subgroup of the generating group that leaves `phenomenal` invariant.
///
/// # Errors
///
/// Errors if the cutoff radii do not cover every enumerated cluster size, if a custom generator
/// contains phenomenal sites that are not allowed, or if the cluster group cannot be built.
pub fn make_local_orbits(
    specs: &ClusterSpecs,
    phenomenal: &Cluster,
) -> Result<Vec<Orbit>, SymmetryError> {
    let n_branches = specs.n_branches();
    if specs.cutoff_radius().len() < n_branches {
        return Err(SymmetryError::Configuration(format!(
            "Local orbits over {n_branches} branches require {n_branches} cutoff radii, but {} \
             were given.",
            specs.cutoff_radius().len()
        )));
    }
    let structure = specs.prim().structure();
    let tolerance = structure.lattice().tolerance();
    let (group, rep) = make_cluster_group(
        phenomenal,
        specs.generating_group(),
        structure.lattice(),
        &specs.generating_rep()?,
    )?;
    log::debug!(
        "Enumerating local orbits over {n_branches} branches with a cluster group of order {}...",
        group.order()
    );

    let allowed = |site: &IntegralSiteCoordinate| {
        specs.include_phenomenal_sites() || !phenomenal.contains(site)
    };
    let candidates = (0..n_branches)
        .map(|n| {
            let radius = specs.cutoff_radius()[n] + tolerance;
            phenomenal
                .sites()
                .iter()
                .flat_map(|site| {
                    structure.sites_within(&structure.site_position(site), radius, |b| {
                        specs.is_eligible(b)
                    })
                })
                .filter(allowed)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let mut enumerator = OrbitEnumerator::new(specs, &rep, false);
    enumerator.add_branches(&candidates[1], |_, n| candidates[n].clone());
    enumerator.add_custom_generators(|cluster| {
        match cluster.sites().iter().find(|site| !allowed(*site)) {
            Some(site) => Err(SymmetryError::Configuration(format!(
                "Custom generator {cluster} contains the phenomenal site {site}, but phenomenal \
                 sites are excluded."
            ))),
            None => Ok(()),
        }
    })?;
    let orbits = enumerator.finish();
    log::debug!("Enumerating local orbits... Done.");
    Ok(orbits)
}

/// Accumulates distinct orbits, branch by branch.
struct OrbitEnumerator<'a> {
    specs: &'a ClusterSpecs,
    rep: &'a [SiteCoordinateRep],

    /// If `true`, clusters are compared modulo lattice translations.
    periodic: bool,

    /// Every cluster already placed in an orbit, in the canonical form used for comparison.
    visited: HashSet<Cluster>,

    orbits: Vec<Orbit>,
}

impl<'a> OrbitEnumerator<'a> {
    fn new(specs: &'a ClusterSpecs, rep: &'a [SiteCoordinateRep], periodic: bool) -> Self {
        Self {
            specs,
            rep,
            periodic,
            visited: HashSet::new(),
            orbits: vec![],
        }
    }

    fn key(&self, cluster: &Cluster) -> Cluster {
        if self.periodic {
            cluster.prim_periodic_canonical()
        } else {
            cluster.canonical()
        }
    }

    /// Adds the orbit of `seed` unless it has been found already. Returns the index of the new
    /// orbit.
    fn insert(&mut self, seed: &Cluster) -> Option<usize> {
        if self.visited.contains(&self.key(seed)) {
            return None;
        }
        let orbit = if self.periodic {
            make_prim_periodic_orbit(seed, self.rep)
        } else {
            make_orbit(seed, self.rep)
        };
        self.visited.extend(orbit.iter().cloned());
        self.orbits.push(orbit);
        Some(self.orbits.len() - 1)
    }

    /// Adds the null branch, the point branch seeded by `points`, and every further branch by
    /// extending the prototypes of the previous branch with the sites given by `neighbours`.
    fn add_branches<F>(&mut self, points: &[IntegralSiteCoordinate], neighbours: F)
    where
        F: Fn(&Cluster, usize) -> Vec<IntegralSiteCoordinate> + Sync,
    {
        let specs = self.specs;
        let structure = specs.prim().structure();
        let tolerance = structure.lattice().tolerance();

        self.insert(&Cluster::default());
        let mut branch = points
            .iter()
            .filter_map(|site| self.insert(&Cluster::from_distinct_sites(vec![*site])))
            .collect::<Vec<_>>();

        for n in 2..specs.n_branches() {
            let max_length = specs.max_length()[n];
            // Every pair in a cluster of this branch, not only the new ones, must be within
            // `max_length[n]`.
            let prototypes = branch
                .iter()
                .filter_map(|&i| self.orbits[i].first().cloned())
                .filter(|prototype| prototype.max_distance(structure) <= max_length + tolerance)
                .collect::<Vec<_>>();
            let extensions = prototypes
                .par_iter()
                .flat_map_iter(|prototype| {
                    neighbours(prototype, n)
                        .into_iter()
                        .filter(|site| !prototype.contains(site))
                        .filter_map(|site| {
                            let position = structure.site_position(&site);
                            prototype
                                .sites()
                                .iter()
                                .all(|other| {
                                    (structure.site_position(other) - position).norm()
                                        <= max_length + tolerance
                                })
                                .then(|| {
                                    let mut sites = prototype.sites().to_vec();
                                    sites.push(site);
                                    Cluster::from_distinct_sites(sites)
                                })
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>();
            branch = extensions
                .iter()
                .filter_map(|cluster| self.insert(cluster))
                .collect();
            log::debug!("Branch {n}: {} orbits.", branch.len());
        }
    }

    /// Adds the orbits forced by the custom generators, after checking every generating
    /// prototype with `check`.
    fn add_custom_generators<F>(&mut self, check: F) -> Result<(), SymmetryError>
    where
        F: Fn(&Cluster) -> Result<(), SymmetryError>,
    {
        let specs = self.specs;
        for generator in specs.custom_generators() {
            check(&generator.prototype)?;
            for seed in generator.seeds() {
                self.insert(&seed);
            }
        }
        Ok(())
    }

    /// The accumulated orbits, sorted by size, rounded prototype length and prototype.
    fn finish(self) -> Vec<Orbit> {
        let structure = self.specs.prim().structure();
        let tolerance = structure.lattice().tolerance();
        let mut orbits = self
            .orbits
            .into_iter()
            .filter_map(|orbit| {
                let prototype = orbit.first()?.clone();
                #[allow(clippy::cast_possible_truncation)]
                let length = (prototype.max_distance(structure) / tolerance).round() as i64;
                Some(((prototype.size(), length, prototype), orbit))
            })
            .collect::<Vec<_>>();
        orbits.sort_by(|(a, _), (b, _)| a.cmp(b));
        orbits.into_iter().map(|(_, orbit)| orbit).collect()
    }
}
