//! Vector spaces of degree-of-freedom values.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, Matrix3};
use ndarray::{Array1, Array2, Axis};

use crate::auxiliary::misc::{orthonormal_column_basis, pseudo_inverse};
use crate::auxiliary::structure::DofKind;
use crate::configuration::supercell::integral_determinant;
use crate::error::SymmetryError;
use crate::symmetry::prim_symmetry::PrimSymmetry;

#[cfg(test)]
#[path = "dof_space_tests.rs"]
mod dof_space_tests;

/// Singular values below this threshold are treated as zero when bases are projected.
const DOF_SPACE_RANK_THRESHOLD: f64 = 1e-8;

/// The meaning of one axis of the full DoF coordinate space.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DofAxis {
    /// A human-readable name, *e.g.* `dx[3]` or `Exx`.
    pub name: String,

    /// The supercell site carrying this axis, or `None` for a global DoF.
    pub site: Option<usize>,

    /// The component of the site or global DoF basis along this axis.
    pub component: usize,
}

/// A subspace of the values of one kind of DoF.
///
/// For a local DoF, the full coordinate space stacks the DoF coordinates of the selected
/// supercell sites in ascending site order; for a global DoF, it is the coordinate space of the
/// global DoF basis. The columns of [`Self::basis`] span the subspace.
#[derive(Clone)]
pub struct DofSpace {
    kind: DofKind,

    prim: Arc<PrimSymmetry>,

    transformation_matrix: Option<Matrix3<i64>>,

    sites: Option<BTreeSet<usize>>,

    basis: Array2<f64>,

    axes: Vec<DofAxis>,
}

impl DofSpace {
    /// Constructs a DoF space.
    ///
    /// # Arguments
    ///
    /// * `kind` - The kind of DoF.
    /// * `prim` - The primitive structure and its symmetry.
    /// * `transformation_matrix` - The supercell of a local DoF space. The primitive cell is used
    /// if this is `None`.
    /// * `sites` - The supercell sites of a local DoF space. All sites are used if this is `None`.
    /// * `basis` - The subspace basis as columns. The full coordinate space is used if this is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Errors if the structure does not carry the DoF, if sites are given for a global DoF or lie
    /// outside the supercell, or if the basis does not match the full coordinate space.
    pub fn new(
        kind: DofKind,
        prim: Arc<PrimSymmetry>,
        transformation_matrix: Option<Matrix3<i64>>,
        sites: Option<BTreeSet<usize>>,
        basis: Option<Array2<f64>>,
    ) -> Result<Self, SymmetryError> {
        let axes = make_axes(kind, &prim, transformation_matrix.as_ref(), sites.as_ref())?;
        let dim = axes.len();
        let basis = basis.unwrap_or_else(|| Array2::eye(dim));
        if basis.nrows() != dim {
            return Err(SymmetryError::Configuration(format!(
                "A `{kind}` space with {dim} axes cannot take a basis with {} rows.",
                basis.nrows()
            )));
        }
        Ok(Self {
            kind,
            prim,
            transformation_matrix,
            sites,
            basis,
            axes,
        })
    }

    pub fn kind(&self) -> DofKind {
        self.kind
    }

    pub fn prim(&self) -> &Arc<PrimSymmetry> {
        &self.prim
    }

    pub fn transformation_matrix(&self) -> Option<&Matrix3<i64>> {
        self.transformation_matrix.as_ref()
    }

    /// The supercell transformation matrix, or the identity if none was given.
    pub fn transformation_matrix_or_identity(&self) -> Matrix3<i64> {
        self.transformation_matrix.unwrap_or_else(Matrix3::identity)
    }

    pub fn sites(&self) -> Option<&BTreeSet<usize>> {
        self.sites.as_ref()
    }

    pub fn basis(&self) -> &Array2<f64> {
        &self.basis
    }

    /// The dimension of the full coordinate space.
    pub fn dim(&self) -> usize {
        self.axes.len()
    }

    /// The number of basis vectors of the subspace.
    pub fn subspace_dim(&self) -> usize {
        self.basis.ncols()
    }

    pub fn axes(&self) -> &[DofAxis] {
        &self.axes
    }

    /// The names of the axes of the full coordinate space.
    pub fn axis_glossary(&self) -> Vec<String> {
        self.axes.iter().map(|axis| axis.name.clone()).collect()
    }

    /// The same space with a different basis.
    ///
    /// # Errors
    ///
    /// Errors if the basis does not match the full coordinate space.
    pub fn with_basis(&self, basis: Array2<f64>) -> Result<Self, SymmetryError> {
        if basis.nrows() != self.dim() {
            return Err(SymmetryError::Configuration(format!(
                "A `{}` space with {} axes cannot take a basis with {} rows.",
                self.kind,
                self.dim(),
                basis.nrows()
            )));
        }
        Ok(Self {
            basis,
            ..self.clone()
        })
    }

    /// The homogeneous modes of a local continuous DoF: the same Cartesian value on every site,
    /// as columns in the full coordinate space.
    ///
    /// # Errors
    ///
    /// Errors if the DoF is not a continuous local DoF.
    pub fn homogeneous_modes(&self) -> Result<Array2<f64>, SymmetryError> {
        let standard_dim = match (self.kind.is_local(), self.kind.standard_dim()) {
            (true, Some(standard_dim)) => standard_dim,
            _ => {
                return Err(SymmetryError::Configuration(format!(
                    "Homogeneous modes are only defined for continuous local DoFs, not `{}`.",
                    self.kind
                )))
            }
        };
        let structure = self.prim.structure();
        let site_pinvs = (0..structure.n_sublattices())
            .map(|b| {
                structure
                    .local_dof(b, self.kind)
                    .and_then(|dofset| pseudo_inverse(&dofset.basis_matrix(), 1e-10))
            })
            .collect::<Vec<Option<DMatrix<f64>>>>();
        let volume = self.volume();
        let mut modes = Array2::zeros((self.dim(), standard_dim));
        for (row, axis) in self.axes.iter().enumerate() {
            let Some(l) = axis.site else { continue };
            if let Some(pinv) = site_pinvs[l / volume].as_ref() {
                for k in 0..standard_dim {
                    modes[(row, k)] = pinv[(axis.component, k)];
                }
            }
        }
        Ok(modes)
    }

    /// The subspace with the homogeneous modes projected out.
    ///
    /// # Errors
    ///
    /// Errors if the DoF is not a continuous local DoF.
    pub fn exclude_homogeneous_modes(&self) -> Result<Self, SymmetryError> {
        let (modes, _) =
            orthonormal_column_basis(&self.homogeneous_modes()?, DOF_SPACE_RANK_THRESHOLD);
        let projected = &self.basis - &modes.dot(&modes.t().dot(&self.basis));
        let (basis, rank) = orthonormal_column_basis(&projected, DOF_SPACE_RANK_THRESHOLD);
        log::debug!(
            "Excluded homogeneous modes: {} -> {rank} basis vectors.",
            self.subspace_dim()
        );
        self.with_basis(basis)
    }

    /// The subspace with the components along the default occupant of every site removed.
    ///
    /// # Errors
    ///
    /// Errors if the DoF is not occupation.
    pub fn exclude_default_occ_modes(&self) -> Result<Self, SymmetryError> {
        if self.kind != DofKind::Occupation {
            return Err(SymmetryError::Configuration(format!(
                "Default occupation modes are only defined for `occ`, not `{}`.",
                self.kind
            )));
        }
        let mask = self
            .axes
            .iter()
            .map(|axis| if axis.component == 0 { 0.0 } else { 1.0 })
            .collect::<Array1<f64>>();
        let masked = &self.basis * &mask.insert_axis(Axis(1));
        let (basis, rank) = orthonormal_column_basis(&masked, DOF_SPACE_RANK_THRESHOLD);
        log::debug!(
            "Excluded default occupation modes: {} -> {rank} basis vectors.",
            self.subspace_dim()
        );
        self.with_basis(basis)
    }

    fn volume(&self) -> usize {
        let det = integral_determinant(&self.transformation_matrix_or_identity());
        usize::try_from(det.unsigned_abs()).unwrap_or(1).max(1)
    }
}

impl fmt::Display for DofSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DoF: {}", self.kind)?;
        if let Some(t) = self.transformation_matrix.as_ref() {
            write!(f, "Transformation matrix:{t}")?;
        }
        if let Some(sites) = self.sites.as_ref() {
            writeln!(f, "Sites: {sites:?}")?;
        }
        writeln!(f, "Dimension: {}", self.dim())?;
        writeln!(f, "Subspace dimension: {}", self.subspace_dim())?;
        Ok(())
    }
}

/// Lays out the axes of the full coordinate space.
fn make_axes(
    kind: DofKind,
    prim: &PrimSymmetry,
    transformation_matrix: Option<&Matrix3<i64>>,
    sites: Option<&BTreeSet<usize>>,
) -> Result<Vec<DofAxis>, SymmetryError> {
    let structure = prim.structure();
    if !kind.is_local() {
        if sites.is_some() {
            return Err(SymmetryError::Configuration(format!(
                "Sites cannot be selected for the global DoF `{kind}`."
            )));
        }
        let dofset = structure.global_dof(kind).ok_or_else(|| {
            SymmetryError::Configuration(format!("The structure does not carry global `{kind}`."))
        })?;
        return Ok(dofset
            .axis_names()
            .into_iter()
            .enumerate()
            .map(|(component, name)| DofAxis {
                name,
                site: None,
                component,
            })
            .collect());
    }

    let det = transformation_matrix.map_or(1, integral_determinant);
    if det == 0 {
        return Err(SymmetryError::Configuration(
            "The supercell transformation matrix is singular.".to_string(),
        ));
    }
    let volume = usize::try_from(det.unsigned_abs()).map_err(|_| {
        SymmetryError::Configuration("The supercell volume is too large.".to_string())
    })?;
    let n_sites = volume * structure.n_sublattices();
    let sites = match sites {
        Some(sites) => {
            if let Some(l) = sites.iter().find(|&&l| l >= n_sites) {
                return Err(SymmetryError::Configuration(format!(
                    "Site {l} is outside a supercell of {n_sites} sites."
                )));
            }
            sites.iter().copied().collect::<Vec<_>>()
        }
        None => (0..n_sites).collect(),
    };
    let axes = sites
        .into_iter()
        .flat_map(|l| {
            let b = l / volume;
            let names = match kind {
                DofKind::Occupation => structure.basis()[b].occupants.clone(),
                _ => structure
                    .local_dof(b, kind)
                    .map(|dofset| dofset.axis_names())
                    .unwrap_or_default(),
            };
            names
                .into_iter()
                .enumerate()
                .map(move |(component, name)| DofAxis {
                    name: format!("{name}[{l}]"),
                    site: Some(l),
                    component,
                })
        })
        .collect::<Vec<_>>();
    if axes.is_empty() {
        return Err(SymmetryError::Configuration(format!(
            "None of the selected sites carries `{kind}`."
        )));
    }
    Ok(axes)
}
