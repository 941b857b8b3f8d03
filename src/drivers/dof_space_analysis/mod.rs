//! Symmetry analysis of degree-of-freedom spaces.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use anyhow::format_err;
use derive_builder::Builder;
use itertools::Itertools;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::auxiliary::structure::DofKind;
use crate::configuration::dof_space::DofSpace;
use crate::configuration::supercell::Supercell;
use crate::configuration::{
    make_invariant_subgroup, select_sym_ops, Configuration, ConfigurationValues,
};
use crate::drivers::XtalSymDriver;
use crate::error::SymmetryError;
use crate::io::format::{
    nice_bool, write_subtitle, write_title, xtalsym_output, XtalSymOutput,
};
use crate::io::{write_xtalsym_binary, XtalSymFileType};
use crate::representation::high_symmetry::{vector_space_sym_report, VectorSpaceSymReport};
use crate::representation::irreps::IrrepDecomposition;
use crate::representation::make_matrix_rep;
use crate::symmetry::prim_symmetry::PrimSymmetry;
use crate::symmetry::symmetry_group::GroupIndices;


// =========
// Functions
// =========

/// Whether homogeneous modes are excluded from a DoF space of `kind` when no explicit choice is
/// made. Only displacements are affected.
pub fn excludes_homogeneous_modes_by_default(kind: DofKind) -> bool {
    kind == DofKind::Displacement
}

/// Whether the default-occupant components are removed from a DoF space of `kind`. Only
/// occupation spaces have such components.
pub fn excludes_default_occ_modes(kind: DofKind, include_default_occ_modes: bool) -> bool {
    kind == DofKind::Occupation && !include_default_occ_modes
}

/// Decomposes a DoF space into irreducible subspaces of the supercell symmetry.
///
/// The acting group is the group of the supercell of `dof_space`, restricted to the operations
/// leaving `configuration` invariant if one is given, and then to those leaving the selected
/// sites of `dof_space` invariant if a selection is made.
///
/// # Arguments
///
/// * `dof_space` - The DoF space to analyse.
/// * `configuration` - A configuration whose invariance group restricts the analysis. It must
/// belong to a supercell of the same prim with the transformation matrix of `dof_space`.
/// * `exclude_homogeneous_modes` - Whether the homogeneous modes are projected out before the
/// analysis. If `None`, they are excluded for displacements only.
/// * `include_default_occ_modes` - Whether the default-occupant components of an occupation
/// space are kept.
/// * `calc_wedges` - Whether high-symmetry directions and irreducible wedges are searched.
///
/// # Returns
///
/// The DoF space with the symmetry-adapted basis, and the symmetry report.
///
/// # Errors
///
/// Errors if an exclusion policy does not apply to the DoF, if the configuration does not
/// belong to the supercell of `dof_space`, or if any stage of the analysis fails.
pub fn dof_space_analysis(
    dof_space: &DofSpace,
    configuration: Option<&Configuration>,
    exclude_homogeneous_modes: Option<bool>,
    include_default_occ_modes: bool,
    calc_wedges: bool,
) -> Result<(DofSpace, VectorSpaceSymReport), SymmetryError> {
    let kind = dof_space.kind();
    let prim = dof_space.prim();
    let transformation_matrix = dof_space.transformation_matrix_or_identity();
    let supercell = match configuration {
        Some(configuration) => {
            let supercell = configuration.supercell();
            if !Arc::ptr_eq(supercell.prim(), prim)
                || supercell.transformation_matrix() != &transformation_matrix
            {
                return Err(SymmetryError::Configuration(
                    "The configuration does not belong to the supercell of the DoF space."
                        .to_string(),
                ));
            }
            Arc::clone(supercell)
        }
        None => Arc::new(Supercell::new(Arc::clone(prim), transformation_matrix)?),
    };

    let mut space = dof_space.clone();
    if exclude_homogeneous_modes.unwrap_or_else(|| excludes_homogeneous_modes_by_default(kind)) {
        space = space.exclude_homogeneous_modes()?;
    }
    if excludes_default_occ_modes(kind, include_default_occ_modes) {
        space = space.exclude_default_occ_modes()?;
    }

    let mut indices = (0..supercell.group().order()).collect::<GroupIndices>();
    if let Some(configuration) = configuration {
        indices = make_invariant_subgroup(configuration, &supercell, Some(&indices))?;
        log::debug!(
            "The configuration is invariant under {} supercell operations.",
            indices.len()
        );
    }
    if let Some(sites) = space.sites() {
        indices = make_invariant_subgroup(sites, &supercell, Some(&indices))?;
        log::debug!(
            "The selected sites are invariant under {} supercell operations.",
            indices.len()
        );
    }
    let group = supercell.group().subgroup(&indices)?;
    let ops = select_sym_ops(&supercell, &indices);
    let rep = make_matrix_rep(&group, &ops, kind, space.sites(), &supercell)?;

    let decomposition = IrrepDecomposition::builder()
        .group(Arc::clone(rep.reduced_group()))
        .matrices(rep.matrices().to_vec())
        .subspace(space.basis().clone())
        .allow_complex(true)
        .build()?;
    let adapted = decomposition.symmetry_adapted_subspace();
    if adapted.ncols() != space.subspace_dim() {
        return Err(SymmetryError::DecompositionInconsistency(format!(
            "The symmetry-adapted `{kind}` space has {} columns instead of {}.",
            adapted.ncols(),
            space.subspace_dim()
        )));
    }
    let report = vector_space_sym_report(&decomposition, calc_wedges, space.axis_glossary())?;
    let adapted_space = space.with_basis(adapted.clone())?;
    Ok((adapted_space, report))
}

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for DoF-space analysis.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct DofSpaceAnalysisParams {
    /// The DoF to analyse.
    pub dof: DofKind,

    /// The rows of the supercell transformation matrix. The primitive cell is used if this is
    /// `None`.
    #[builder(default = "None")]
    #[serde(default)]
    pub transformation_matrix: Option<[[i64; 3]; 3]>,

    /// The supercell sites to which a local DoF space is restricted. All sites are used if this
    /// is `None`.
    #[builder(default = "None")]
    #[serde(default)]
    pub sites: Option<BTreeSet<usize>>,

    /// A configuration of the supercell whose invariance group restricts the analysis.
    #[builder(default = "None")]
    #[serde(default)]
    pub configuration: Option<ConfigurationValues>,

    /// Whether the homogeneous modes are excluded. If `None`, they are excluded for
    /// displacements only.
    #[builder(default = "None")]
    #[serde(default)]
    pub exclude_homogeneous_modes: Option<bool>,

    /// Boolean indicating if the default-occupant components of an occupation space are kept.
    #[builder(default = "false")]
    #[serde(default)]
    pub include_default_occ_modes: bool,

    /// Boolean indicating if high-symmetry directions and irreducible wedges are searched.
    #[builder(default = "false")]
    #[serde(default)]
    pub calc_wedges: bool,

    /// Optional name for saving the result as a binary file of type [`XtalSymFileType::Dof`]. If
    /// `None`, the result will not be saved.
    #[builder(default = "None")]
    #[serde(default)]
    pub result_save_name: Option<String>,
}

impl DofSpaceAnalysisParams {
    /// Returns a builder to construct a [`DofSpaceAnalysisParams`] structure.
    pub fn builder() -> DofSpaceAnalysisParamsBuilder {
        DofSpaceAnalysisParamsBuilder::default()
    }

    /// The supercell transformation matrix.
    pub fn transformation_matrix(&self) -> Option<Matrix3<i64>> {
        self.transformation_matrix
            .map(|rows| Matrix3::from_fn(|i, j| rows[i][j]))
    }
}

impl fmt::Display for DofSpaceAnalysisParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DoF: {}", self.dof)?;
        match self.transformation_matrix.as_ref() {
            Some(rows) => writeln!(
                f,
                "Supercell transformation matrix: {}",
                rows.iter()
                    .map(|row| format!("[{}]", row.iter().join(", ")))
                    .join(", ")
            )?,
            None => writeln!(f, "Supercell transformation matrix: identity")?,
        }
        if let Some(sites) = self.sites.as_ref() {
            writeln!(f, "Selected sites: {}", sites.iter().join(", "))?;
        }
        writeln!(
            f,
            "Restrict to configuration symmetry: {}",
            nice_bool(self.configuration.is_some())
        )?;
        writeln!(
            f,
            "Exclude homogeneous modes: {}",
            match self.exclude_homogeneous_modes {
                Some(exclude) => nice_bool(exclude),
                None => format!(
                    "{} (default)",
                    nice_bool(excludes_homogeneous_modes_by_default(self.dof))
                ),
            }
        )?;
        if self.dof == DofKind::Occupation {
            writeln!(
                f,
                "Include default occupation modes: {}",
                nice_bool(self.include_default_occ_modes)
            )?;
        }
        writeln!(
            f,
            "Search high-symmetry directions and wedges: {}",
            nice_bool(self.calc_wedges)
        )?;
        writeln!(
            f,
            "Save DoF-space analysis results to file: {}",
            if let Some(name) = self.result_save_name.as_ref() {
                format!("{name}.{}", XtalSymFileType::Dof.ext())
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

/// A structure to contain DoF-space analysis results.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct DofSpaceAnalysisResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: DofSpaceAnalysisParams,

    /// The number of basis vectors of the analysed space after mode exclusions.
    pub subspace_dim: usize,

    /// The symmetry report of the analysed space.
    pub report: VectorSpaceSymReport,
}

impl DofSpaceAnalysisResult {
    /// Returns a builder to construct a [`DofSpaceAnalysisResult`] structure.
    fn builder() -> DofSpaceAnalysisResultBuilder {
        DofSpaceAnalysisResultBuilder::default()
    }
}

impl fmt::Display for DofSpaceAnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_subtitle(
            f,
            &format!("Irreducible decomposition of the `{}` space", self.parameters.dof),
        )?;
        writeln!(f)?;
        writeln!(f, "{}", "┈".repeat(48))?;
        writeln!(
            f,
            "{:>5} {:>5} {:>12} {:>14} {:>8}",
            "Irrep", "Dim", "Multiplicity", "Kind", "χ(E)"
        )?;
        writeln!(f, "{}", "┈".repeat(48))?;
        for (i, irrep) in self.report.irreps.iter().enumerate() {
            writeln!(
                f,
                "{:>5} {:>5} {:>12} {:>14} {:>+8.3}",
                i,
                irrep.dim,
                irrep.multiplicity,
                irrep.kind.to_string(),
                irrep.characters.first().copied().unwrap_or_default()
            )?;
        }
        writeln!(f, "{}", "┈".repeat(48))?;
        writeln!(f)?;
        write!(f, "{}", self.report)?;
        writeln!(f)?;
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for DoF-space analysis.
#[derive(Clone, Builder)]
pub struct DofSpaceAnalysisDriver<'a> {
    /// The control parameters for DoF-space analysis.
    parameters: &'a DofSpaceAnalysisParams,

    /// The symmetry information of the primitive structure.
    prim: &'a Arc<PrimSymmetry>,

    /// The result of the DoF-space analysis.
    #[builder(setter(skip), default = "None")]
    result: Option<DofSpaceAnalysisResult>,
}

impl<'a> fmt::Display for DofSpaceAnalysisDriver<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_title(f, "DoF-Space Analysis")?;
        writeln!(f)?;
        writeln!(f, "{}", self.parameters)?;
        Ok(())
    }
}

impl<'a> fmt::Debug for DofSpaceAnalysisDriver<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{self}")
    }
}

impl<'a> DofSpaceAnalysisDriver<'a> {
    /// Returns a builder to construct a [`DofSpaceAnalysisDriver`] structure.
    pub fn builder() -> DofSpaceAnalysisDriverBuilder<'a> {
        DofSpaceAnalysisDriverBuilder::default()
    }

    /// Executes DoF-space analysis.
    fn analyse_dof_space(&mut self) -> Result<(), anyhow::Error> {
        self.log_output_display();
        let params = self.parameters;

        let transformation_matrix = params.transformation_matrix();
        let dof_space = DofSpace::new(
            params.dof,
            Arc::clone(self.prim),
            transformation_matrix,
            params.sites.clone(),
            None,
        )?;
        let configuration = params
            .configuration
            .as_ref()
            .map(|values| {
                let supercell = Supercell::new(
                    Arc::clone(self.prim),
                    transformation_matrix.unwrap_or_else(Matrix3::identity),
                )?;
                Configuration::from_values(Arc::new(supercell), values)
            })
            .transpose()?;
        let (adapted_space, report) = dof_space_analysis(
            &dof_space,
            configuration.as_ref(),
            params.exclude_homogeneous_modes,
            params.include_default_occ_modes,
            params.calc_wedges,
        )?;

        let result = DofSpaceAnalysisResult::builder()
            .parameters(params.clone())
            .subspace_dim(adapted_space.subspace_dim())
            .report(report)
            .build()
            .map_err(|err| format_err!(err))?;
        result.log_output_display();

        // Save DoF-space analysis result, if requested
        if let Some(name) = params.result_save_name.as_ref() {
            write_xtalsym_binary(name, XtalSymFileType::Dof, &result)?;
            xtalsym_output!(
                "DoF-space analysis results saved as {name}.{}.",
                XtalSymFileType::Dof.ext()
            );
            xtalsym_output!("");
        }
        self.result = Some(result);

        Ok(())
    }
}

impl XtalSymDriver for DofSpaceAnalysisDriver<'_> {
    type Params = DofSpaceAnalysisParams;

    type Outcome = DofSpaceAnalysisResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No DoF-space analysis results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.analyse_dof_space()
    }
}
