//! Input specification for xtalsym calculations.

use std::sync::Arc;

use anyhow::{self, Context};
use serde::{Deserialize, Serialize};

use crate::auxiliary::structure::Structure;
use crate::drivers::cluster_orbits::{ClusterOrbitDriver, ClusterOrbitParams};
use crate::drivers::dof_space_analysis::{DofSpaceAnalysisDriver, DofSpaceAnalysisParams};
use crate::drivers::XtalSymDriver;
use crate::interfaces::InputHandle;
use crate::io::format::{xtalsym_error, xtalsym_output, xtalsym_warn};
use crate::symmetry::prim_symmetry::PrimSymmetry;
use crate::symmetry::symmetry_operation::SymOp;


/// A structure describing the primitive crystal on which every calculation in an input file is
/// carried out.
#[derive(Clone, Serialize, Deserialize)]
pub struct PrimInput {
    /// The primitive structure.
    pub structure: Structure,

    /// The factor-group operations of the structure, given in Cartesian coordinates. The
    /// operations are only needed modulo lattice translations.
    pub factor_group: Vec<SymOp>,
}

impl PrimInput {
    /// Derives the symmetry information of the primitive structure.
    pub fn prim_symmetry(&self) -> Result<Arc<PrimSymmetry>, anyhow::Error> {
        let prim = PrimSymmetry::new(self.structure.clone(), self.factor_group.clone())
            .with_context(|| "Unable to derive the symmetry of the primitive structure")?;
        Ok(Arc::new(prim))
    }
}

/// A structure containing xtalsym input parameters which can be serialised into and deserialised
/// from a YAML input file.
#[derive(Clone, Serialize, Deserialize)]
pub struct Input {
    /// The primitive crystal and its factor group.
    pub prim: PrimInput,

    /// Specification for cluster-orbit enumeration. If `None`, no cluster orbits will be
    /// enumerated. Results are saved in [`crate::io::XtalSymFileType::Orb`] binary files if requested.
    ///
    /// # Default
    ///
    /// If not specified, this will be taken to be `None`.
    #[serde(default)]
    pub cluster_orbits: Option<ClusterOrbitParams>,

    /// Specifications for degree-of-freedom space analyses, run in the order given. Results are
    /// saved in [`crate::io::XtalSymFileType::Dof`] binary files if requested.
    ///
    /// # Default
    ///
    /// If not specified, no analyses will be performed.
    #[serde(default)]
    pub dof_space_analyses: Vec<DofSpaceAnalysisParams>,
}

impl InputHandle for Input {
    fn handle(&self) -> Result<(), anyhow::Error> {
        let prim = self.prim.prim_symmetry()?;
        xtalsym_output!(
            "Primitive structure with {} basis site{} and a factor group of order {}.",
            prim.structure().basis().len(),
            if prim.structure().basis().len() == 1 { "" } else { "s" },
            prim.factor_group().order()
        );
        xtalsym_output!("");

        if self.cluster_orbits.is_none() && self.dof_space_analyses.is_empty() {
            xtalsym_warn!("No cluster orbits or degree-of-freedom analyses have been requested.");
            return Ok(());
        }

        if let Some(co_params) = self.cluster_orbits.as_ref() {
            let mut co_driver = ClusterOrbitDriver::builder()
                .parameters(co_params)
                .prim(&prim)
                .build()
                .with_context(|| "Unable to construct a cluster-orbit driver")?;
            co_driver.run().map_err(|err| {
                xtalsym_error!("{err}");
                err
            })?;
        }

        for (i, dsa_params) in self.dof_space_analyses.iter().enumerate() {
            let mut dsa_driver = DofSpaceAnalysisDriver::builder()
                .parameters(dsa_params)
                .prim(&prim)
                .build()
                .with_context(|| {
                    format!("Unable to construct a driver for degree-of-freedom analysis {i}")
                })?;
            dsa_driver
                .run()
                .map_err(|err| {
                    xtalsym_error!("{err}");
                    err
                })
                .with_context(|| format!("Degree-of-freedom analysis {i} failed"))?;
        }
        Ok(())
    }
}
