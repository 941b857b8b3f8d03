//! Enumeration of cluster orbits.

use std::fmt;
use std::sync::Arc;

use anyhow::format_err;
use derive_builder::Builder;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::cluster::cluster_specs::{ClusterSpecs, SiteFilterMethod};
use crate::cluster::orbit::{
    make_all_orbits, make_equivalence_map, make_equivalents_info, EquivalentsInfo,
    OrbitGenerator,
};
use crate::cluster::Cluster;
use crate::drivers::XtalSymDriver;
use crate::io::format::{
    nice_bool, write_subtitle, write_title, xtalsym_output, XtalSymOutput,
};
use crate::io::{write_xtalsym_binary, XtalSymFileType};
use crate::symmetry::prim_symmetry::PrimSymmetry;


// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for cluster-orbit enumeration.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct ClusterOrbitParams {
    /// The maximum site-to-site distance of clusters, indexed by cluster size. The entries for
    /// the null and point clusters are ignored.
    #[builder(default = "vec![]")]
    #[serde(default)]
    pub max_length: Vec<f64>,

    /// The method selecting the sites eligible for cluster membership.
    #[builder(default = "SiteFilterMethod::DofSites")]
    #[serde(default)]
    pub site_filter_method: SiteFilterMethod,

    /// Clusters whose orbits are included regardless of the distance cutoffs.
    #[builder(default = "vec![]")]
    #[serde(default)]
    pub custom_generators: Vec<OrbitGenerator>,

    /// The phenomenal cluster about which local orbits are generated. Periodic orbits are
    /// generated if this is `None`.
    #[builder(default = "None")]
    #[serde(default)]
    pub phenomenal: Option<Cluster>,

    /// Boolean indicating if the sites of the phenomenal cluster may be members of local clusters.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_phenomenal_sites: bool,

    /// The maximum distance of local-cluster sites from any phenomenal site, indexed by cluster
    /// size.
    #[builder(default = "vec![]")]
    #[serde(default)]
    pub cutoff_radius: Vec<f64>,

    /// Boolean indicating if every cluster of every orbit is to be written to the output.
    #[builder(default = "false")]
    #[serde(default)]
    pub write_clusters: bool,

    /// Optional name for saving the result as a binary file of type [`XtalSymFileType::Orb`]. If
    /// `None`, the result will not be saved.
    #[builder(default = "None")]
    #[serde(default)]
    pub result_save_name: Option<String>,
}

impl ClusterOrbitParams {
    /// Returns a builder to construct a [`ClusterOrbitParams`] structure.
    pub fn builder() -> ClusterOrbitParamsBuilder {
        ClusterOrbitParamsBuilder::default()
    }

    /// The cluster specifications described by these parameters for a primitive structure.
    ///
    /// # Errors
    ///
    /// Errors if the specifications are invalid for `prim`.
    pub fn to_cluster_specs(&self, prim: &Arc<PrimSymmetry>) -> Result<ClusterSpecs, anyhow::Error> {
        let mut builder = ClusterSpecs::builder();
        builder
            .prim(Arc::clone(prim))
            .max_length(self.max_length.clone())
            .site_filter_method(self.site_filter_method)
            .custom_generators(self.custom_generators.clone())
            .include_phenomenal_sites(self.include_phenomenal_sites)
            .cutoff_radius(self.cutoff_radius.clone());
        if let Some(phenomenal) = self.phenomenal.as_ref() {
            builder.phenomenal(phenomenal.clone());
        }
        Ok(builder.build()?)
    }
}

impl fmt::Display for ClusterOrbitParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Maximum lengths: {}",
            if self.max_length.is_empty() {
                "none".to_string()
            } else {
                self.max_length.iter().map(|x| format!("{x:.4}")).join(", ")
            }
        )?;
        writeln!(f, "Site filter method: {}", self.site_filter_method)?;
        if !self.custom_generators.is_empty() {
            writeln!(f, "Custom generators:")?;
            for generator in self.custom_generators.iter() {
                writeln!(
                    f,
                    "  {} (with subclusters: {})",
                    generator.prototype,
                    nice_bool(generator.include_subclusters)
                )?;
            }
        }
        if let Some(phenomenal) = self.phenomenal.as_ref() {
            writeln!(f, "Phenomenal cluster: {phenomenal}")?;
            writeln!(
                f,
                "Include phenomenal sites: {}",
                nice_bool(self.include_phenomenal_sites)
            )?;
            writeln!(
                f,
                "Cutoff radii: {}",
                self.cutoff_radius.iter().map(|x| format!("{x:.4}")).join(", ")
            )?;
        }
        writeln!(f, "Write all clusters: {}", nice_bool(self.write_clusters))?;
        writeln!(
            f,
            "Save cluster orbits to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                format!("{name}.{}", XtalSymFileType::Orb.ext())
            } else {
                nice_bool(false)
            }
        )?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Result
// ------

/// One enumerated orbit with its equivalence map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrbitRecord {
    /// The clusters of the orbit in ascending order. The first is the prototype.
    pub clusters: Vec<Cluster>,

    /// The maximum site-to-site distance of the prototype.
    pub max_length: f64,

    /// For each cluster, the index in the orbit group of the first element mapping the prototype
    /// onto it.
    pub equivalence_map: Vec<usize>,
}

impl OrbitRecord {
    pub fn prototype(&self) -> Option<&Cluster> {
        self.clusters.first()
    }
}

/// A structure to contain cluster-orbit enumeration results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct ClusterOrbitResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: ClusterOrbitParams,

    /// The order of the group acting on the orbits: the factor group for periodic orbits, or the
    /// subgroup leaving the phenomenal cluster invariant for local orbits.
    pub orbit_group_order: usize,

    /// The enumerated orbits.
    pub orbits: Vec<OrbitRecord>,

    /// The equivalents of the phenomenal cluster under the factor group, for local orbits.
    #[builder(default = "None")]
    pub equivalents_info: Option<EquivalentsInfo>,
}

impl ClusterOrbitResult {
    /// Returns a builder to construct a [`ClusterOrbitResult`] structure.
    fn builder() -> ClusterOrbitResultBuilder {
        ClusterOrbitResultBuilder::default()
    }

    /// The number of orbits of each cluster size, indexed by size.
    pub fn branch_counts(&self) -> Vec<usize> {
        let sizes = self
            .orbits
            .iter()
            .map(|orbit| orbit.prototype().map_or(0, Cluster::size))
            .collect::<Vec<_>>();
        let n_branches = sizes.iter().max().map_or(0, |max| max + 1);
        (0..n_branches)
            .map(|n| sizes.iter().filter(|&&size| size == n).count())
            .collect()
    }
}

impl fmt::Display for ClusterOrbitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(f, "Cluster orbits")?;
        writeln!(f)?;
        writeln!(f, "Orbit group order: {}", self.orbit_group_order)?;
        writeln!(
            f,
            "Orbits per cluster size: {}",
            self.branch_counts()
                .iter()
                .enumerate()
                .map(|(n, count)| format!("{n}: {count}"))
                .join(", ")
        )?;
        if let Some(info) = self.equivalents_info.as_ref() {
            writeln!(
                f,
                "Equivalent phenomenal clusters: {}",
                info.phenomenal_clusters.len()
            )?;
        }
        writeln!(f)?;

        let width = self.orbits.len().max(1).ilog10() as usize + 1;
        writeln!(f, "{}", "┈".repeat(width + 60))?;
        writeln!(
            f,
            "{:>width$} {:>5} {:>12} {:>12}  {}",
            "#", "Size", "Multiplicity", "Max length", "Prototype"
        )?;
        writeln!(f, "{}", "┈".repeat(width + 60))?;
        for (i, orbit) in self.orbits.iter().enumerate() {
            let Some(prototype) = orbit.prototype() else {
                continue;
            };
            writeln!(
                f,
                "{:>width$} {:>5} {:>12} {:>12.6}  {}",
                i,
                prototype.size(),
                orbit.clusters.len(),
                orbit.max_length,
                prototype
            )?;
            if self.parameters.write_clusters {
                for (cluster, op) in orbit.clusters.iter().zip(orbit.equivalence_map.iter()) {
                    writeln!(f, "{:>width$}   ↳ op {op:>4}: {cluster}", "")?;
                }
            }
        }
        writeln!(f, "{}", "┈".repeat(width + 60))?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for cluster-orbit enumeration.
#[derive(Clone, Builder)]
pub struct ClusterOrbitDriver<'a> {
    /// The control parameters for cluster-orbit enumeration.
    parameters: &'a ClusterOrbitParams,

    /// The symmetry information of the primitive structure.
    prim: &'a Arc<PrimSymmetry>,

    /// The result of the cluster-orbit enumeration.
    #[builder(setter(skip), default = "None")]
    result: Option<ClusterOrbitResult>,
}

impl<'a> fmt::Display for ClusterOrbitDriver<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_title(f, "Cluster-Orbit Enumeration")?;
        writeln!(f)?;
        writeln!(f, "{}", self.parameters)?;
        Ok(())
    }
}

impl<'a> fmt::Debug for ClusterOrbitDriver<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")
    }
}

impl<'a> ClusterOrbitDriver<'a> {
    /// Returns a builder to construct a [`ClusterOrbitDriver`] structure.
    pub fn builder() -> ClusterOrbitDriverBuilder<'a> {
        ClusterOrbitDriverBuilder::default()
    }

    /// Executes cluster-orbit enumeration.
    fn enumerate_orbits(&mut self) -> Result<(), anyhow::Error> {
        self.log_output_display();
        let params = self.parameters;

        let specs = params.to_cluster_specs(self.prim)?;
        let (orbit_group, orbit_rep) = specs.orbit_group()?;
        let periodic = specs.phenomenal().is_none();
        let structure = self.prim.structure();
        let orbits = make_all_orbits(&specs)?
            .into_iter()
            .map(|orbit| {
                let equivalence_map = make_equivalence_map(&orbit, &orbit_rep, periodic)?;
                let max_length = orbit
                    .first()
                    .map_or(0.0, |prototype| prototype.max_distance(structure));
                Ok(OrbitRecord {
                    clusters: orbit.into_iter().collect(),
                    max_length,
                    equivalence_map,
                })
            })
            .collect::<Result<Vec<_>, anyhow::Error>>()?;
        let equivalents_info = specs
            .phenomenal()
            .map(|phenomenal| make_equivalents_info(phenomenal, self.prim))
            .transpose()?;

        let result = ClusterOrbitResult::builder()
            .parameters(params.clone())
            .orbit_group_order(orbit_group.order())
            .orbits(orbits)
            .equivalents_info(equivalents_info)
            .build()
            .map_err(|err| format_err!(err))?;
        result.log_output_display();

        // Save cluster orbits, if requested
        if let Some(name) = params.result_save_name.as_ref() {
            write_xtalsym_binary(name, XtalSymFileType::Orb, &result)?;
            xtalsym_output!(
                "Cluster orbits saved as {name}.{}.",
                XtalSymFileType::Orb.ext()
            );
            xtalsym_output!("");
        }
        self.result = Some(result);

        Ok(())
    }
}

impl XtalSymDriver for ClusterOrbitDriver<'_> {
    type Params = ClusterOrbitParams;

    type Outcome = ClusterOrbitResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No cluster-orbit results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.enumerate_orbits()
    }
}
