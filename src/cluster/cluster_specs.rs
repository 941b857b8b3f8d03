//! Specifications of which cluster orbits to enumerate.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::auxiliary::structure::Structure;
use crate::cluster::orbit::OrbitGenerator;
use crate::cluster::site_rep::SiteCoordinateSymRep;
use crate::cluster::Cluster;
use crate::error::SymmetryError;
use crate::io::format::nice_bool;
use crate::symmetry::invariance::make_cluster_group;
use crate::symmetry::prim_symmetry::PrimSymmetry;
use crate::symmetry::symmetry_group::SymGroup;

#[cfg(test)]
#[path = "cluster_specs_tests.rs"]
mod cluster_specs_tests;

// =================
// Enum definitions
// =================

/// The methods for selecting the sublattices whose sites may be members of a cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteFilterMethod {
    /// Sites with a continuous local degree of freedom or more than one allowed occupant.
    #[default]
    DofSites,

    /// Sites with more than one allowed occupant.
    AlloySites,

    /// All sites.
    AllSites,
}

impl SiteFilterMethod {
    /// Returns `true` if sites of sublattice `b` of `structure` pass this filter.
    pub fn is_eligible(&self, structure: &Structure, b: usize) -> bool {
        match self {
            Self::DofSites => structure.is_dof_site(b),
            Self::AlloySites => structure.is_alloy_site(b),
            Self::AllSites => true,
        }
    }
}

impl fmt::Display for SiteFilterMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DofSites => write!(f, "dof_sites"),
            Self::AlloySites => write!(f, "alloy_sites"),
            Self::AllSites => write!(f, "all_sites"),
        }
    }
}

impl FromStr for SiteFilterMethod {
    type Err = SymmetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dof_sites" => Ok(Self::DofSites),
            "alloy_sites" => Ok(Self::AlloySites),
            "all_sites" => Ok(Self::AllSites),
            _ => Err(SymmetryError::Configuration(format!(
                "The site filter method `{s}` is not recognised."
            ))),
        }
    }
}

// ==================
// Struct definitions
// ==================

/// A policy describing which cluster orbits to enumerate.
///
/// Without a phenomenal cluster, orbits are periodic: they are generated by the generating group
/// and compared modulo lattice translations. With a phenomenal cluster, orbits are local: they
/// are generated by the subgroup of the generating group that leaves the phenomenal cluster
/// invariant, and only contain sites near the phenomenal cluster.
#[derive(Builder, Clone)]
#[builder(build_fn(validate = "Self::validate", error = "SymmetryError"))]
pub struct ClusterSpecs {
    /// The symmetry information of the primitive structure.
    prim: Arc<PrimSymmetry>,

    /// The group generating equivalent clusters. Its head indices, if any, refer to the factor
    /// group of [`Self::prim`]. The factor group is used if this is `None`.
    #[builder(setter(strip_option), default = "None")]
    generating_group: Option<Arc<SymGroup>>,

    /// The maximum site-to-site distance of clusters, indexed by cluster size. The entries for
    /// the null and point clusters are ignored.
    #[builder(default = "vec![]")]
    max_length: Vec<f64>,

    /// Clusters whose orbits are included regardless of the distance cutoffs.
    #[builder(default = "vec![]")]
    custom_generators: Vec<OrbitGenerator>,

    /// The method selecting the sites eligible for cluster membership.
    #[builder(default = "SiteFilterMethod::DofSites")]
    site_filter_method: SiteFilterMethod,

    /// The phenomenal cluster about which local clusters are generated.
    #[builder(setter(strip_option), default = "None")]
    phenomenal: Option<Cluster>,

    /// If `true`, the sites of the phenomenal cluster may be members of local clusters.
    #[builder(default = "false")]
    include_phenomenal_sites: bool,

    /// The maximum distance of local-cluster sites from any phenomenal site, indexed by cluster
    /// size. The entry for the null cluster is ignored.
    #[builder(default = "vec![]")]
    cutoff_radius: Vec<f64>,
}

impl ClusterSpecsBuilder {
    fn validate(&self) -> Result<(), SymmetryError> {
        let prim = self
            .prim
            .as_ref()
            .ok_or_else(|| SymmetryError::Configuration("No prim symmetry found.".to_string()))?;
        let check_table = |name: &str, table: Option<&Vec<f64>>| {
            match table
                .into_iter()
                .flatten()
                .enumerate()
                .find(|(_, x)| x.is_nan() || **x < 0.0)
            {
                Some((i, x)) => Err(SymmetryError::Configuration(format!(
                    "Entry {i} of `{name}` is invalid: {x}."
                ))),
                None => Ok(()),
            }
        };
        check_table("max_length", self.max_length.as_ref())?;
        check_table("cutoff_radius", self.cutoff_radius.as_ref())?;

        let n_sublattices = prim.structure().n_sublattices();
        let clusters = self
            .custom_generators
            .iter()
            .flatten()
            .map(|generator| &generator.prototype)
            .chain(self.phenomenal.iter().flatten());
        for cluster in clusters {
            if let Some(site) = cluster
                .sites()
                .iter()
                .find(|site| site.sublattice >= n_sublattices)
            {
                return Err(SymmetryError::Configuration(format!(
                    "Site {site} of cluster {cluster} refers to a missing sublattice."
                )));
            }
        }

        if let Some(Some(group)) = self.generating_group.as_ref() {
            if let Some(indices) = group.head_indices() {
                if indices.iter().any(|&i| i >= prim.factor_group().order()) {
                    return Err(SymmetryError::Configuration(
                        "The generating group is not a subgroup of the factor group.".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl ClusterSpecs {
    /// Returns a builder to construct new cluster specifications.
    pub fn builder() -> ClusterSpecsBuilder {
        ClusterSpecsBuilder::default()
    }

    pub fn prim(&self) -> &Arc<PrimSymmetry> {
        &self.prim
    }

    /// The group generating equivalent clusters.
    pub fn generating_group(&self) -> &Arc<SymGroup> {
        self.generating_group
            .as_ref()
            .unwrap_or_else(|| self.prim.factor_group())
    }

    pub fn max_length(&self) -> &[f64] {
        &self.max_length
    }

    pub fn custom_generators(&self) -> &[OrbitGenerator] {
        &self.custom_generators
    }

    pub fn site_filter_method(&self) -> SiteFilterMethod {
        self.site_filter_method
    }

    pub fn phenomenal(&self) -> Option<&Cluster> {
        self.phenomenal.as_ref()
    }

    pub fn include_phenomenal_sites(&self) -> bool {
        self.include_phenomenal_sites
    }

    pub fn cutoff_radius(&self) -> &[f64] {
        &self.cutoff_radius
    }

    /// The number of cluster-size branches to enumerate: null, point, and one per further
    /// entry of [`Self::max_length`].
    pub fn n_branches(&self) -> usize {
        self.max_length.len().max(2)
    }

    /// Returns `true` if sites of sublattice `b` are eligible cluster members.
    pub fn is_eligible(&self, b: usize) -> bool {
        self.site_filter_method
            .is_eligible(self.prim.structure(), b)
    }

    /// The site-coordinate representation of the generating group.
    ///
    /// # Errors
    ///
    /// Errors if an element of the generating group is not a symmetry of the structure.
    pub fn generating_rep(&self) -> Result<SiteCoordinateSymRep, SymmetryError> {
        match self.generating_group.as_ref() {
            None => Ok(self.prim.site_rep().as_ref().clone()),
            Some(group) if Arc::ptr_eq(group, self.prim.factor_group()) => {
                Ok(self.prim.site_rep().as_ref().clone())
            }
            Some(group) => self.prim.site_rep_of(group),
        }
    }

    /// The group acting on the orbits described by these specifications, with its
    /// site-coordinate representation.
    ///
    /// This is the generating group for periodic orbits, and the subgroup of the generating group
    /// leaving the phenomenal cluster invariant for local orbits. The head indices of the latter
    /// refer to the generating group.
    ///
    /// # Errors
    ///
    /// Errors if the representation of the generating group cannot be built, or if the cluster
    /// group cannot be formed.
    pub fn orbit_group(&self) -> Result<(Arc<SymGroup>, SiteCoordinateSymRep), SymmetryError> {
        let generating_rep = self.generating_rep()?;
        match self.phenomenal.as_ref() {
            None => Ok((Arc::clone(self.generating_group()), generating_rep)),
            Some(phenomenal) => {
                let (group, rep) = make_cluster_group(
                    phenomenal,
                    self.generating_group(),
                    self.prim.structure().lattice(),
                    &generating_rep,
                )?;
                Ok((Arc::new(group), rep))
            }
        }
    }
}

impl fmt::Display for ClusterSpecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Generating group order: {}", self.generating_group().order())?;
        writeln!(f, "Maximum lengths: {:?}", self.max_length)?;
        writeln!(f, "Site filter method: {}", self.site_filter_method)?;
        writeln!(f, "Custom generators: {}", self.custom_generators.len())?;
        if let Some(phenomenal) = self.phenomenal.as_ref() {
            writeln!(f, "Phenomenal cluster: {phenomenal}")?;
            writeln!(
                f,
                "Include phenomenal sites: {}",
                nice_bool(self.include_phenomenal_sites)
            )?;
            writeln!(f, "Cutoff radii: {:?}", self.cutoff_radius)?;
        }
        Ok(())
    }
}
