//! Clusters of integral site coordinates.
//!
//! A site of a crystal is addressed exactly by its sublattice (basis-site index) and the integral
//! lattice translation of the unit cell it sits in. A [`Cluster`] is a set of such sites kept in
//! insertion order; its identity and ordering are those of its sorted (canonical) form.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Sub, SubAssign};

use itertools::Itertools;
use nalgebra::Vector3;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::auxiliary::structure::Structure;
use crate::cluster::site_rep::SiteCoordinateRep;
use crate::error::SymmetryError;
use crate::symmetry::invariance::SymmetryTransformable;

pub mod cluster_specs;
pub mod orbit;
pub mod site_rep;


// ==================
// Struct definitions
// ==================

/// An exact site address: a sublattice index and a unit-cell translation.
///
/// Serialised as a `[b, i, j, k]` list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i64; 4]", into = "[i64; 4]")]
pub struct IntegralSiteCoordinate {
    /// The index of the basis site.
    pub sublattice: usize,

    /// The integral fractional coordinates of the unit cell.
    pub unitcell: Vector3<i64>,
}

impl IntegralSiteCoordinate {
    pub fn new(sublattice: usize, unitcell: Vector3<i64>) -> Self {
        Self {
            sublattice,
            unitcell,
        }
    }

    /// Constructs a site coordinate from a `[b, i, j, k]` list.
    ///
    /// # Errors
    ///
    /// Errors if the sublattice index is negative.
    pub fn from_list(list: [i64; 4]) -> Result<Self, SymmetryError> {
        let sublattice = usize::try_from(list[0]).map_err(|_| {
            SymmetryError::Configuration(format!(
                "Negative sublattice index in site coordinate {list:?}."
            ))
        })?;
        Ok(Self::new(
            sublattice,
            Vector3::new(list[1], list[2], list[3]),
        ))
    }

    /// The `[b, i, j, k]` list of this site coordinate.
    pub fn to_list(&self) -> [i64; 4] {
        #[allow(clippy::cast_possible_wrap)]
        [
            self.sublattice as i64,
            self.unitcell[0],
            self.unitcell[1],
            self.unitcell[2],
        ]
    }

    fn key(&self) -> (usize, i64, i64, i64) {
        (
            self.sublattice,
            self.unitcell[0],
            self.unitcell[1],
            self.unitcell[2],
        )
    }
}

impl TryFrom<[i64; 4]> for IntegralSiteCoordinate {
    type Error = SymmetryError;

    fn try_from(list: [i64; 4]) -> Result<Self, Self::Error> {
        Self::from_list(list)
    }
}

impl From<IntegralSiteCoordinate> for [i64; 4] {
    fn from(site: IntegralSiteCoordinate) -> Self {
        site.to_list()
    }
}

impl PartialOrd for IntegralSiteCoordinate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IntegralSiteCoordinate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for IntegralSiteCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.sublattice, self.unitcell[0], self.unitcell[1], self.unitcell[2]
        )
    }
}

impl Add<&Vector3<i64>> for &IntegralSiteCoordinate {
    type Output = IntegralSiteCoordinate;

    fn add(self, rhs: &Vector3<i64>) -> Self::Output {
        IntegralSiteCoordinate::new(self.sublattice, self.unitcell + rhs)
    }
}

impl Sub<&Vector3<i64>> for &IntegralSiteCoordinate {
    type Output = IntegralSiteCoordinate;

    fn sub(self, rhs: &Vector3<i64>) -> Self::Output {
        IntegralSiteCoordinate::new(self.sublattice, self.unitcell - rhs)
    }
}

/// An ordered collection of distinct sites.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<IntegralSiteCoordinate>", into = "Vec<IntegralSiteCoordinate>")]
pub struct Cluster {
    /// The sites in insertion order.
    sites: Vec<IntegralSiteCoordinate>,

    /// The sites in ascending order.
    sorted_sites: Vec<IntegralSiteCoordinate>,
}

impl Cluster {
    /// Constructs a cluster from its sites.
    ///
    /// # Errors
    ///
    /// Errors if a site is repeated.
    pub fn new(sites: Vec<IntegralSiteCoordinate>) -> Result<Self, SymmetryError> {
        let mut seen = HashSet::with_capacity(sites.len());
        if let Some(dup) = sites.iter().find(|site| !seen.insert(**site)) {
            return Err(SymmetryError::Configuration(format!(
                "Site {dup} appears more than once in a cluster."
            )));
        }
        Ok(Self::from_distinct_sites(sites))
    }

    /// Constructs a cluster from sites that are known to be distinct.
    pub(crate) fn from_distinct_sites(sites: Vec<IntegralSiteCoordinate>) -> Self {
        let mut sorted_sites = sites.clone();
        sorted_sites.sort_unstable();
        Self {
            sites,
            sorted_sites,
        }
    }

    /// Constructs a cluster from a list of `[b, i, j, k]` site coordinates.
    ///
    /// # Errors
    ///
    /// Errors if a site coordinate is invalid or repeated.
    pub fn from_list(list: &[[i64; 4]]) -> Result<Self, SymmetryError> {
        let sites = list
            .iter()
            .map(|site| IntegralSiteCoordinate::from_list(*site))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(sites)
    }

    /// The `[b, i, j, k]` site coordinates of this cluster in insertion order.
    pub fn to_list(&self) -> Vec<[i64; 4]> {
        self.sites.iter().map(IntegralSiteCoordinate::to_list).collect()
    }

    /// The sites in insertion order.
    pub fn sites(&self) -> &[IntegralSiteCoordinate] {
        &self.sites
    }

    /// The sites in ascending order.
    pub fn sorted_sites(&self) -> &[IntegralSiteCoordinate] {
        &self.sorted_sites
    }

    /// The number of sites.
    pub fn size(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn contains(&self, site: &IntegralSiteCoordinate) -> bool {
        self.sorted_sites.binary_search(site).is_ok()
    }

    /// Returns a new cluster with `site` appended.
    ///
    /// # Errors
    ///
    /// Errors if `site` is already part of this cluster.
    pub fn with_site(&self, site: IntegralSiteCoordinate) -> Result<Self, SymmetryError> {
        let mut sites = self.sites.clone();
        sites.push(site);
        Self::new(sites)
    }

    /// The canonical form of this cluster: its sites sorted.
    #[must_use]
    pub fn canonical(&self) -> Self {
        Self::from_distinct_sites(self.sorted_sites.clone())
    }

    /// The prim-periodic canonical form of this cluster: its sites sorted, then translated so
    /// that the first site lies in the origin unit cell.
    #[must_use]
    pub fn prim_periodic_canonical(&self) -> Self {
        match self.sorted_sites.first() {
            Some(first) => &self.canonical() - &first.unitcell,
            None => Self::default(),
        }
    }

    /// The maximum Cartesian distance between two sites of this cluster, or zero for clusters
    /// with fewer than two sites.
    pub fn max_distance(&self, structure: &Structure) -> f64 {
        self.sites
            .iter()
            .map(|site| structure.site_position(site))
            .tuple_combinations()
            .map(|(a, b)| OrderedFloat((a - b).norm()))
            .max()
            .map_or(0.0, |d| d.0)
    }

    /// The minimum Cartesian distance between two sites of this cluster, or zero for clusters
    /// with fewer than two sites.
    pub fn min_distance(&self, structure: &Structure) -> f64 {
        self.sites
            .iter()
            .map(|site| structure.site_position(site))
            .tuple_combinations()
            .map(|(a, b)| OrderedFloat((a - b).norm()))
            .min()
            .map_or(0.0, |d| d.0)
    }

    /// The image of this cluster under a site-coordinate action, with the site order preserved.
    #[must_use]
    pub fn transformed(&self, rep: &SiteCoordinateRep) -> Self {
        Self::from_distinct_sites(self.sites.iter().map(|site| rep.apply(site)).collect())
    }

    /// All subclusters of this cluster, including the empty cluster and the cluster itself, in
    /// order of increasing size.
    pub fn subclusters(&self) -> Vec<Self> {
        (0..=self.size())
            .flat_map(|k| {
                self.sites
                    .iter()
                    .copied()
                    .combinations(k)
                    .map(Self::from_distinct_sites)
            })
            .collect()
    }
}

impl SymmetryTransformable<SiteCoordinateRep> for Cluster {
    fn sym_transform(&self, rep: &SiteCoordinateRep) -> Result<Self, SymmetryError> {
        Ok(self.transformed(rep))
    }
}

impl TryFrom<Vec<IntegralSiteCoordinate>> for Cluster {
    type Error = SymmetryError;

    fn try_from(sites: Vec<IntegralSiteCoordinate>) -> Result<Self, Self::Error> {
        Self::new(sites)
    }
}

impl From<Cluster> for Vec<IntegralSiteCoordinate> {
    fn from(cluster: Cluster) -> Self {
        cluster.sites
    }
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        self.sorted_sites == other.sorted_sites
    }
}

impl Eq for Cluster {}

impl Hash for Cluster {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted_sites.hash(state);
    }
}

impl PartialOrd for Cluster {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cluster {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted_sites.cmp(&other.sorted_sites)
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cluster{:?}", self.to_list())
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.sites.iter().map(|site| site.to_string()).join(", "))
    }
}

// ---
// Add
// ---
impl Add<&Vector3<i64>> for &Cluster {
    type Output = Cluster;

    fn add(self, rhs: &Vector3<i64>) -> Self::Output {
        Cluster {
            sites: self.sites.iter().map(|site| site + rhs).collect(),
            sorted_sites: self.sorted_sites.iter().map(|site| site + rhs).collect(),
        }
    }
}

impl Add<Vector3<i64>> for Cluster {
    type Output = Cluster;

    fn add(self, rhs: Vector3<i64>) -> Self::Output {
        &self + &rhs
    }
}

impl AddAssign<&Vector3<i64>> for Cluster {
    fn add_assign(&mut self, rhs: &Vector3<i64>) {
        self.sites.iter_mut().for_each(|site| site.unitcell += rhs);
        self.sorted_sites
            .iter_mut()
            .for_each(|site| site.unitcell += rhs);
    }
}

// ---
// Sub
// ---
impl Sub<&Vector3<i64>> for &Cluster {
    type Output = Cluster;

    fn sub(self, rhs: &Vector3<i64>) -> Self::Output {
        self + &(-rhs)
    }
}

impl Sub<Vector3<i64>> for Cluster {
    type Output = Cluster;

    fn sub(self, rhs: Vector3<i64>) -> Self::Output {
        &self - &rhs
    }
}

impl SubAssign<&Vector3<i64>> for Cluster {
    fn sub_assign(&mut self, rhs: &Vector3<i64>) {
        *self += &(-rhs);
    }
}

/// A cluster compared modulo lattice translations.
///
/// The wrapped cluster is always in prim-periodic canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimPeriodicCluster(Cluster);

impl PrimPeriodicCluster {
    pub fn cluster(&self) -> &Cluster {
        &self.0
    }
}

impl From<&Cluster> for PrimPeriodicCluster {
    fn from(cluster: &Cluster) -> Self {
        Self(cluster.prim_periodic_canonical())
    }
}

impl SymmetryTransformable<SiteCoordinateRep> for PrimPeriodicCluster {
    fn sym_transform(&self, rep: &SiteCoordinateRep) -> Result<Self, SymmetryError> {
        Ok(Self::from(&self.0.sym_transform(rep)?))
    }
}
