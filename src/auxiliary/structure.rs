//! Primitive crystal structures with their degrees of freedom.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use derive_builder::Builder;
use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

use crate::auxiliary::geometry::Lattice;
use crate::cluster::IntegralSiteCoordinate;
use crate::error::SymmetryError;

#[cfg(test)]
#[path = "structure_tests.rs"]
mod structure_tests;

// ================
// Enum definitions
// ================

/// An enumerated type for the kinds of degrees of freedom (DoFs) a crystal can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DofKind {
    /// Discrete site occupation, one axis per allowed occupant.
    #[serde(rename = "occ")]
    Occupation,

    /// Continuous site displacement.
    #[serde(rename = "disp")]
    Displacement,

    /// Continuous homogeneous lattice strain.
    #[serde(rename = "strain")]
    Strain,
}

impl DofKind {
    /// The dimension of the standard (Cartesian) space in which basis vectors of a continuous
    /// DoF of this kind are expressed, or `None` for occupation.
    pub fn standard_dim(&self) -> Option<usize> {
        match self {
            Self::Occupation => None,
            Self::Displacement => Some(3),
            Self::Strain => Some(6),
        }
    }

    /// Returns `true` if DoFs of this kind are attached to sites rather than to the lattice.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Strain)
    }

    fn standard_axis_names(&self) -> Vec<String> {
        match self {
            Self::Occupation => vec![],
            Self::Displacement => ["dx", "dy", "dz"].map(String::from).to_vec(),
            Self::Strain => ["Exx", "Eyy", "Ezz", "sqrt2Eyz", "sqrt2Exz", "sqrt2Exy"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl fmt::Display for DofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Occupation => write!(f, "occ"),
            Self::Displacement => write!(f, "disp"),
            Self::Strain => write!(f, "strain"),
        }
    }
}

impl FromStr for DofKind {
    type Err = SymmetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "occ" => Ok(Self::Occupation),
            "disp" => Ok(Self::Displacement),
            "strain" => Ok(Self::Strain),
            _ => Err(SymmetryError::Configuration(format!(
                "Unknown degree-of-freedom kind `{s}`."
            ))),
        }
    }
}

// ==================
// Struct definitions
// ==================

/// A continuous degree-of-freedom basis.
///
/// Each basis vector is expressed in the standard space of its kind: Cartesian $`(x, y, z)`$ for
/// displacements, and the Kelvin vector
/// $`(E_{xx}, E_{yy}, E_{zz}, \sqrt{2}E_{yz}, \sqrt{2}E_{xz}, \sqrt{2}E_{xy})`$ for strain. An
/// empty basis stands for the standard basis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DofSet {
    kind: DofKind,

    #[serde(default)]
    axis_names: Vec<String>,

    #[serde(default)]
    basis: Vec<Vec<f64>>,
}

impl DofSet {
    /// Constructs the standard basis of a continuous DoF kind.
    ///
    /// # Errors
    ///
    /// Errors if `kind` is [`DofKind::Occupation`], which has no continuous basis.
    pub fn standard(kind: DofKind) -> Result<Self, SymmetryError> {
        Self::new(kind, vec![], vec![])
    }

    /// Constructs a continuous DoF basis from its basis vectors.
    ///
    /// # Errors
    ///
    /// Errors if the basis vectors do not live in the standard space of `kind`, are linearly
    /// dependent, or do not match the axis names given.
    pub fn new(
        kind: DofKind,
        axis_names: Vec<String>,
        basis: Vec<Vec<f64>>,
    ) -> Result<Self, SymmetryError> {
        let dofset = Self {
            kind,
            axis_names,
            basis,
        };
        dofset.check().map_err(SymmetryError::Configuration)?;
        Ok(dofset)
    }

    pub fn kind(&self) -> DofKind {
        self.kind
    }

    /// The number of basis vectors.
    pub fn dim(&self) -> usize {
        if self.basis.is_empty() {
            self.kind.standard_dim().unwrap_or(0)
        } else {
            self.basis.len()
        }
    }

    /// The names of the axes of this basis.
    pub fn axis_names(&self) -> Vec<String> {
        if !self.axis_names.is_empty() {
            self.axis_names.clone()
        } else if self.basis.is_empty() {
            self.kind.standard_axis_names()
        } else {
            (1..=self.basis.len())
                .map(|i| format!("{}{i}", self.kind))
                .collect()
        }
    }

    /// The basis as a matrix whose columns are the basis vectors in the standard space.
    pub fn basis_matrix(&self) -> DMatrix<f64> {
        let standard_dim = self.kind.standard_dim().unwrap_or(0);
        if self.basis.is_empty() {
            DMatrix::identity(standard_dim, standard_dim)
        } else {
            DMatrix::from_fn(standard_dim, self.basis.len(), |i, j| self.basis[j][i])
        }
    }

    fn check(&self) -> Result<(), String> {
        let standard_dim = self.kind.standard_dim().ok_or_else(|| {
            format!(
                "`{}` is not a continuous degree of freedom and has no basis.",
                self.kind
            )
        })?;
        if let Some(vector) = self.basis.iter().find(|v| v.len() != standard_dim) {
            return Err(format!(
                "Basis vector {vector:?} for `{}` does not have {standard_dim} components.",
                self.kind
            ));
        }
        if !self.axis_names.is_empty() && self.axis_names.len() != self.dim() {
            return Err(format!(
                "{} axis names were given for {} `{}` basis vectors.",
                self.axis_names.len(),
                self.dim(),
                self.kind
            ));
        }
        if !self.basis.is_empty() {
            let basis = self.basis_matrix();
            if basis.rank(1e-8) != self.basis.len() {
                return Err(format!(
                    "The `{}` basis vectors are linearly dependent.",
                    self.kind
                ));
            }
        }
        Ok(())
    }
}

/// A site of the primitive basis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasisSite {
    /// Cartesian position of the site in the origin unit cell.
    pub position: Vector3<f64>,

    /// The species allowed on the site. The first one is the default occupant.
    pub occupants: Vec<String>,

    /// Continuous local degrees of freedom of the site.
    #[serde(default)]
    pub local_dofs: Vec<DofSet>,
}

impl BasisSite {
    pub fn new(position: Vector3<f64>, occupants: &[&str]) -> Self {
        Self {
            position,
            occupants: occupants.iter().map(|s| (*s).to_string()).collect(),
            local_dofs: vec![],
        }
    }

    /// Adds a continuous local degree of freedom to the site.
    #[must_use]
    pub fn with_dof(mut self, dofset: DofSet) -> Self {
        self.local_dofs.push(dofset);
        self
    }
}

/// A primitive crystal structure: a lattice, a basis of sites, and lattice-wide degrees of
/// freedom.
#[derive(Builder, Clone, Debug, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"), derive(Debug, Deserialize))]
#[serde(try_from = "StructureBuilder")]
pub struct Structure {
    lattice: Lattice,

    basis: Vec<BasisSite>,

    /// Global (homogeneous) continuous degrees of freedom.
    #[builder(default)]
    global_dofs: Vec<DofSet>,
}

impl StructureBuilder {
    fn validate(&self) -> Result<(), String> {
        let lattice = self.lattice.as_ref().ok_or("No lattice found.")?;
        let basis = self.basis.as_ref().ok_or("No basis sites found.")?;
        if basis.is_empty() {
            return Err("A structure must contain at least one basis site.".to_string());
        }
        for (b, site) in basis.iter().enumerate() {
            if site.occupants.is_empty() {
                return Err(format!("Basis site {b} has no allowed occupants."));
            }
            let distinct = site.occupants.iter().collect::<HashSet<_>>();
            if distinct.len() != site.occupants.len() {
                return Err(format!("Basis site {b} lists an occupant more than once."));
            }
            let mut kinds = HashSet::new();
            for dofset in site.local_dofs.iter() {
                if dofset.kind != DofKind::Displacement {
                    return Err(format!(
                        "`{}` cannot be a continuous local degree of freedom of site {b}.",
                        dofset.kind
                    ));
                }
                if !kinds.insert(dofset.kind) {
                    return Err(format!("Basis site {b} repeats `{}`.", dofset.kind));
                }
                dofset.check()?;
            }
            if let Some(b_other) = basis[..b]
                .iter()
                .position(|other| lattice.is_equivalent_position(&other.position, &site.position))
            {
                return Err(format!(
                    "Basis sites {b_other} and {b} coincide modulo the lattice."
                ));
            }
        }
        let mut kinds = HashSet::new();
        for dofset in self.global_dofs.iter().flatten() {
            if dofset.kind != DofKind::Strain {
                return Err(format!(
                    "`{}` cannot be a global degree of freedom.",
                    dofset.kind
                ));
            }
            if !kinds.insert(dofset.kind) {
                return Err(format!("Global `{}` is repeated.", dofset.kind));
            }
            dofset.check()?;
        }
        Ok(())
    }
}

impl TryFrom<StructureBuilder> for Structure {
    type Error = StructureBuilderError;

    fn try_from(builder: StructureBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl Structure {
    /// Returns a builder to construct a new structure.
    pub fn builder() -> StructureBuilder {
        StructureBuilder::default()
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    pub fn basis(&self) -> &[BasisSite] {
        &self.basis
    }

    pub fn global_dofs(&self) -> &[DofSet] {
        &self.global_dofs
    }

    /// The number of sublattices, *i.e.* basis sites.
    pub fn n_sublattices(&self) -> usize {
        self.basis.len()
    }

    /// The Cartesian position of an integral site coordinate.
    pub fn site_position(&self, site: &IntegralSiteCoordinate) -> Vector3<f64> {
        self.basis[site.sublattice].position + self.lattice.lattice_vector(&site.unitcell)
    }

    /// Finds the integral site coordinate located at a Cartesian position.
    pub fn find_site(&self, cart: &Vector3<f64>) -> Option<IntegralSiteCoordinate> {
        self.basis.iter().enumerate().find_map(|(b, site)| {
            self.lattice
                .as_lattice_vector(&(cart - site.position))
                .map(|unitcell| IntegralSiteCoordinate::new(b, unitcell))
        })
    }

    /// The continuous local DoF basis of kind `kind` on sublattice `b`, if present.
    pub fn local_dof(&self, b: usize, kind: DofKind) -> Option<&DofSet> {
        self.basis[b].local_dofs.iter().find(|dofset| dofset.kind == kind)
    }

    /// The global DoF basis of kind `kind`, if present.
    pub fn global_dof(&self, kind: DofKind) -> Option<&DofSet> {
        self.global_dofs.iter().find(|dofset| dofset.kind == kind)
    }

    /// The number of DoF components of kind `kind` carried by each site of sublattice `b`.
    pub fn local_dof_dim(&self, b: usize, kind: DofKind) -> usize {
        match kind {
            DofKind::Occupation => self.basis[b].occupants.len(),
            _ => self.local_dof(b, kind).map_or(0, DofSet::dim),
        }
    }

    /// Returns `true` if sublattice `b` has more than one allowed occupant.
    pub fn is_alloy_site(&self, b: usize) -> bool {
        self.basis[b].occupants.len() > 1
    }

    /// Returns `true` if sublattice `b` carries any degree of freedom: a continuous local DoF or
    /// a choice of occupants.
    pub fn is_dof_site(&self, b: usize) -> bool {
        self.is_alloy_site(b) || !self.basis[b].local_dofs.is_empty()
    }

    /// Enumerates the sites of the selected sublattices within `radius` of `centre`, in
    /// ascending site order.
    pub fn sites_within<F>(
        &self,
        centre: &Vector3<f64>,
        radius: f64,
        sublattice_filter: F,
    ) -> Vec<IntegralSiteCoordinate>
    where
        F: Fn(usize) -> bool,
    {
        let mut sites = self
            .basis
            .iter()
            .enumerate()
            .filter(|(b, _)| sublattice_filter(*b))
            .flat_map(|(b, site)| {
                self.lattice
                    .points_within(&(centre - site.position), radius)
                    .into_iter()
                    .map(move |unitcell| IntegralSiteCoordinate::new(b, unitcell))
            })
            .collect::<Vec<_>>();
        sites.sort();
        sites
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lattice vectors:")?;
        write!(f, "{}", self.lattice)?;
        writeln!(f, "Basis sites:")?;
        for (b, site) in self.basis.iter().enumerate() {
            let dofs = site
                .local_dofs
                .iter()
                .map(|dofset| dofset.kind.to_string())
                .collect::<Vec<_>>();
            writeln!(
                f,
                "  {b:>3}: ({:+.6}, {:+.6}, {:+.6})  occupants: {}{}",
                site.position[0],
                site.position[1],
                site.position[2],
                site.occupants.join(", "),
                if dofs.is_empty() {
                    String::new()
                } else {
                    format!("  dofs: {}", dofs.join(", "))
                }
            )?;
        }
        if !self.global_dofs.is_empty() {
            writeln!(
                f,
                "Global dofs: {}",
                self.global_dofs
                    .iter()
                    .map(|dofset| dofset.kind.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
        }
        Ok(())
    }
}
