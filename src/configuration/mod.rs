//! Supercells, configurations of degree-of-freedom values, and DoF spaces.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use nalgebra::DVector;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auxiliary::structure::DofKind;
use crate::configuration::supercell::{Supercell, SupercellSymOp};
use crate::error::SymmetryError;
use crate::symmetry::invariance::{invariant_subgroup, SymmetryTransformable};
use crate::symmetry::symmetry_group::GroupIndices;

pub mod dof_space;
pub mod supercell;


/// Threshold for comparing continuous DoF values of two configurations.
pub const CONFIGURATION_EQUIVALENCE_THRESHOLD: f64 = 1e-6;

// ==================
// Struct definitions
// ==================

/// The plain values of a configuration, as read from an input file.
///
/// Local DoF values are listed per supercell site, in the coordinates of the site's DoF basis.
/// Omitted entries are zero, and omitted occupations are the default occupants.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationValues {
    #[serde(default)]
    pub occupation: Vec<usize>,

    #[serde(default)]
    pub local_dofs: IndexMap<DofKind, Vec<Vec<f64>>>,

    #[serde(default)]
    pub global_dofs: IndexMap<DofKind, Vec<f64>>,
}

/// A configuration: an assignment of occupants and continuous DoF values to the sites and
/// lattice of a supercell.
#[derive(Clone)]
pub struct Configuration {
    supercell: Arc<Supercell>,

    /// The occupant index of every supercell site.
    occupation: Vec<usize>,

    /// For each continuous local DoF kind, the values on every supercell site. Sites without
    /// the DoF hold empty vectors.
    local_dofs: IndexMap<DofKind, Vec<DVector<f64>>>,

    global_dofs: IndexMap<DofKind, DVector<f64>>,
}

impl Configuration {
    /// The configuration of `supercell` with default occupants and zero continuous DoF values.
    pub fn new(supercell: Arc<Supercell>) -> Self {
        let structure = supercell.prim().structure();
        let n_sites = supercell.n_sites();
        let local_kinds = structure
            .basis()
            .iter()
            .flat_map(|site| site.local_dofs.iter().map(|dofset| dofset.kind()))
            .collect::<BTreeSet<_>>();
        let local_dofs = local_kinds
            .into_iter()
            .map(|kind| {
                let values = (0..n_sites)
                    .map(|l| {
                        DVector::zeros(structure.local_dof_dim(supercell.sublattice_of(l), kind))
                    })
                    .collect();
                (kind, values)
            })
            .collect();
        let global_dofs = structure
            .global_dofs()
            .iter()
            .map(|dofset| (dofset.kind(), DVector::zeros(dofset.dim())))
            .collect();
        Self {
            occupation: vec![0; n_sites],
            supercell,
            local_dofs,
            global_dofs,
        }
    }

    /// Constructs a configuration of `supercell` from plain values.
    ///
    /// # Errors
    ///
    /// Errors if any value does not fit the supercell or the DoFs of the structure.
    pub fn from_values(
        supercell: Arc<Supercell>,
        values: &ConfigurationValues,
    ) -> Result<Self, SymmetryError> {
        let mut configuration = Self::new(supercell);
        if !values.occupation.is_empty() {
            if values.occupation.len() != configuration.occupation.len() {
                return Err(SymmetryError::Configuration(format!(
                    "{} occupants were given for a supercell of {} sites.",
                    values.occupation.len(),
                    configuration.occupation.len()
                )));
            }
            for (l, &occupant) in values.occupation.iter().enumerate() {
                configuration.set_occupant(l, occupant)?;
            }
        }
        for (&kind, site_values) in values.local_dofs.iter() {
            for (l, value) in site_values.iter().enumerate() {
                configuration.set_local_dof(kind, l, DVector::from_column_slice(value))?;
            }
        }
        for (&kind, value) in values.global_dofs.iter() {
            configuration.set_global_dof(kind, DVector::from_column_slice(value))?;
        }
        Ok(configuration)
    }

    pub fn supercell(&self) -> &Arc<Supercell> {
        &self.supercell
    }

    pub fn occupation(&self) -> &[usize] {
        &self.occupation
    }

    /// The values of a continuous local DoF on every site.
    pub fn local_dof(&self, kind: DofKind) -> Option<&[DVector<f64>]> {
        self.local_dofs.get(&kind).map(Vec::as_slice)
    }

    pub fn global_dof(&self, kind: DofKind) -> Option<&DVector<f64>> {
        self.global_dofs.get(&kind)
    }

    /// Sets the occupant of site `l`.
    ///
    /// # Errors
    ///
    /// Errors if the site or the occupant does not exist.
    pub fn set_occupant(&mut self, l: usize, occupant: usize) -> Result<(), SymmetryError> {
        let n_occupants = self
            .occupation
            .get(l)
            .map(|_| {
                self.supercell.prim().structure().basis()[self.supercell.sublattice_of(l)]
                    .occupants
                    .len()
            })
            .ok_or_else(|| SymmetryError::Configuration(format!("Site {l} does not exist.")))?;
        if occupant >= n_occupants {
            return Err(SymmetryError::Configuration(format!(
                "Site {l} allows {n_occupants} occupants, but occupant {occupant} was requested."
            )));
        }
        self.occupation[l] = occupant;
        Ok(())
    }

    /// Sets the value of a continuous local DoF on site `l`.
    ///
    /// # Errors
    ///
    /// Errors if the site does not carry the DoF, or if `value` has the wrong dimension.
    pub fn set_local_dof(
        &mut self,
        kind: DofKind,
        l: usize,
        value: DVector<f64>,
    ) -> Result<(), SymmetryError> {
        let slot = self
            .local_dofs
            .get_mut(&kind)
            .and_then(|values| values.get_mut(l))
            .ok_or_else(|| {
                SymmetryError::Configuration(format!("Site {l} does not carry `{kind}`."))
            })?;
        if slot.len() != value.len() {
            return Err(SymmetryError::Configuration(format!(
                "Site {l} has a {}-dimensional `{kind}` space, but a {}-dimensional value was \
                 given.",
                slot.len(),
                value.len()
            )));
        }
        *slot = value;
        Ok(())
    }

    /// Sets the value of a global DoF.
    ///
    /// # Errors
    ///
    /// Errors if the structure does not carry the DoF, or if `value` has the wrong dimension.
    pub fn set_global_dof(&mut self, kind: DofKind, value: DVector<f64>) -> Result<(), SymmetryError> {
        let slot = self.global_dofs.get_mut(&kind).ok_or_else(|| {
            SymmetryError::Configuration(format!("The structure does not carry global `{kind}`."))
        })?;
        if slot.len() != value.len() {
            return Err(SymmetryError::Configuration(format!(
                "Global `{kind}` is {}-dimensional, but a {}-dimensional value was given.",
                slot.len(),
                value.len()
            )));
        }
        *slot = value;
        Ok(())
    }
}

/// Compares two value vectors lexicographically. Entries within
/// [`CONFIGURATION_EQUIVALENCE_THRESHOLD`] compare equal.
fn compare_values(a: &DVector<f64>, b: &DVector<f64>) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            if (x - y).abs() <= CONFIGURATION_EQUIVALENCE_THRESHOLD {
                Ordering::Equal
            } else {
                x.total_cmp(y)
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

impl Configuration {
    /// Orders two configurations of the same supercell: global DoF values first, then
    /// occupants, then local DoF values site by site. The greatest configuration of an orbit is
    /// its canonical form.
    pub fn compare(&self, other: &Self) -> Ordering {
        let globals = self
            .global_dofs
            .values()
            .zip(other.global_dofs.values())
            .map(|(a, b)| compare_values(a, b));
        let locals = self
            .local_dofs
            .values()
            .zip(other.local_dofs.values())
            .flat_map(|(a, b)| a.iter().zip(b.iter()).map(|(x, y)| compare_values(x, y)));
        globals
            .chain(std::iter::once(self.occupation.cmp(&other.occupation)))
            .chain(locals)
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        let close = |a: &DVector<f64>, b: &DVector<f64>| {
            a.len() == b.len() && (a - b).amax() <= CONFIGURATION_EQUIVALENCE_THRESHOLD
        };
        Arc::ptr_eq(&self.supercell, &other.supercell)
            && self.occupation == other.occupation
            && self.local_dofs.len() == other.local_dofs.len()
            && self.local_dofs.iter().all(|(kind, values)| {
                other.local_dofs.get(kind).map_or(false, |others| {
                    values.iter().zip(others.iter()).all(|(a, b)| close(a, b))
                })
            })
            && self.global_dofs.len() == other.global_dofs.len()
            && self.global_dofs.iter().all(|(kind, value)| {
                other
                    .global_dofs
                    .get(kind)
                    .map_or(false, |other_value| close(value, other_value))
            })
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("volume", &self.supercell.volume())
            .field("occupation", &self.occupation)
            .field("local_dofs", &self.local_dofs)
            .field("global_dofs", &self.global_dofs)
            .finish()
    }
}

// ---------------------
// SymmetryTransformable
// ---------------------

impl SymmetryTransformable<SupercellSymOp> for Configuration {
    /// Moves the value on site `l` to site `op(l)`, transformed by the local DoF matrices of the
    /// factor-group operation.
    fn sym_transform(&self, op: &SupercellSymOp) -> Result<Self, SymmetryError> {
        let prim = self.supercell.prim();
        let i = op.factor_group_index();
        let perm = op.permutation();
        if perm.rank() != self.occupation.len() {
            return Err(SymmetryError::Configuration(
                "The operation does not act on the sites of this supercell.".to_string(),
            ));
        }
        let mut transformed = self.clone();
        for (l, &occupant) in self.occupation.iter().enumerate() {
            let b = self.supercell.sublattice_of(l);
            transformed.occupation[perm.apply(l)] = prim.occupant_permutation(i, b).apply(occupant);
        }
        for (kind, values) in self.local_dofs.iter() {
            let images = transformed.local_dofs.get_mut(kind).ok_or_else(|| {
                SymmetryError::Configuration(format!("Missing local `{kind}` values."))
            })?;
            for (l, value) in values.iter().enumerate() {
                let b = self.supercell.sublattice_of(l);
                images[perm.apply(l)] = match prim.local_dof_matrix(*kind, i, b) {
                    Some(mat) if !value.is_empty() => mat * value,
                    _ => value.clone(),
                };
            }
        }
        for (kind, value) in self.global_dofs.iter() {
            let mat = prim.global_dof_matrix(*kind, i).ok_or_else(|| {
                SymmetryError::Configuration(format!("Missing global `{kind}` matrices."))
            })?;
            transformed.global_dofs.insert(*kind, mat * value);
        }
        Ok(transformed)
    }
}

/// A set of supercell site indices moves by the site permutation.
impl SymmetryTransformable<SupercellSymOp> for BTreeSet<usize> {
    fn sym_transform(&self, op: &SupercellSymOp) -> Result<Self, SymmetryError> {
        let perm = op.permutation();
        self.iter()
            .map(|&l| {
                if l < perm.rank() {
                    Ok(perm.apply(l))
                } else {
                    Err(SymmetryError::Configuration(format!(
                        "Site {l} is outside a supercell of {} sites.",
                        perm.rank()
                    )))
                }
            })
            .collect()
    }
}

// ====================
// Configuration orbits
// ====================

/// The supercell operations at `indices` of the supercell group.
pub fn select_sym_ops(supercell: &Supercell, indices: &GroupIndices) -> Vec<SupercellSymOp> {
    indices
        .iter()
        .map(|&i| supercell.sym_ops()[i].clone())
        .collect()
}

/// Finds the elements of the supercell group that leave `object` invariant.
///
/// # Arguments
///
/// * `object` - A configuration, a set of supercell sites, or anything else the supercell
/// operations act on.
/// * `supercell` - The supercell whose group is searched.
/// * `indices` - The elements of the supercell group to search. If `None`, the whole group is
/// searched.
///
/// # Returns
///
/// The indices, in the supercell group, of the elements leaving `object` invariant.
///
/// # Errors
///
/// Errors if an index lies outside the supercell group, if a transformation fails, or if the
/// searched elements do not form a group.
pub fn make_invariant_subgroup<T>(
    object: &T,
    supercell: &Supercell,
    indices: Option<&GroupIndices>,
) -> Result<GroupIndices, SymmetryError>
where
    T: SymmetryTransformable<SupercellSymOp> + PartialEq + Sync,
{
    let all = (0..supercell.group().order()).collect::<GroupIndices>();
    let indices = indices.unwrap_or(&all);
    if let Some(i) = indices.iter().find(|&&i| i >= all.len()) {
        return Err(SymmetryError::Configuration(format!(
            "Element {i} is outside a supercell group of order {}.",
            all.len()
        )));
    }
    let group = Arc::new(supercell.group().subgroup(indices)?);
    let subgroup = invariant_subgroup(object, &group, &select_sym_ops(supercell, indices))?;
    let listed = indices.iter().copied().collect::<Vec<_>>();
    let head = subgroup.head_indices().ok_or_else(|| {
        SymmetryError::InvalidGroup("The invariant subgroup lost its head indices.".to_string())
    })?;
    Ok(head.iter().map(|&k| listed[k]).collect())
}

/// Applies every operation of the supercell group to `configuration`.
fn all_images(configuration: &Configuration) -> Result<Vec<Configuration>, SymmetryError> {
    configuration
        .supercell()
        .sym_ops()
        .par_iter()
        .map(|op| configuration.sym_transform(op))
        .collect()
}

/// The distinct configurations equivalent to `configuration` under the supercell group, in the
/// order of the first supercell operation generating each.
///
/// # Errors
///
/// Errors if a supercell operation cannot be applied.
pub fn make_equivalent_configurations(
    configuration: &Configuration,
) -> Result<Vec<Configuration>, SymmetryError> {
    let mut equivalents: Vec<Configuration> = vec![];
    for image in all_images(configuration)? {
        if !equivalents.contains(&image) {
            equivalents.push(image);
        }
    }
    Ok(equivalents)
}

/// The canonical form of `configuration` in its supercell: the greatest equivalent
/// configuration under [`Configuration::compare`].
///
/// # Errors
///
/// Errors if a supercell operation cannot be applied.
pub fn make_canonical_configuration(
    configuration: &Configuration,
) -> Result<Configuration, SymmetryError> {
    Ok(all_images(configuration)?
        .into_iter()
        .fold(configuration.clone(), |best, image| {
            if image.compare(&best).is_gt() {
                image
            } else {
                best
            }
        }))
}

/// Returns `true` if no configuration equivalent to `configuration` compares greater.
///
/// # Errors
///
/// Errors if a supercell operation cannot be applied.
pub fn is_canonical_configuration(configuration: &Configuration) -> Result<bool, SymmetryError> {
    Ok(all_images(configuration)?
        .iter()
        .all(|image| image.compare(configuration).is_le()))
}
