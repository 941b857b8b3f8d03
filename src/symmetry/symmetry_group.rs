//! Finite symmetry groups with explicit multiplication tables.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use itertools::Itertools;
use ndarray::{Array2, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::auxiliary::geometry::Lattice;
use crate::error::SymmetryError;
use crate::symmetry::symmetry_operation::SymOp;

#[cfg(test)]
#[path = "symmetry_group_tests.rs"]
mod symmetry_group_tests;

/// Indices of the elements of a subgroup.
pub type GroupIndices = BTreeSet<usize>;

/// A conjugacy orbit of subgroups.
pub type GroupIndicesOrbit = BTreeSet<GroupIndices>;

/// A set of conjugacy orbits of subgroups.
pub type GroupIndicesOrbitSet = BTreeSet<GroupIndicesOrbit>;

/// A finite group of symmetry operations.
#[derive(Clone, Serialize, Deserialize)]
pub struct SymGroup {
    /// The elements of the group.
    elements: Vec<SymOp>,

    /// The multiplication table: `table[[i, j]]` is the index of `elements[i] * elements[j]`,
    /// where `elements[j]` acts first.
    table: Array2<usize>,

    /// The index of the inverse of each element.
    inverses: Vec<usize>,

    /// The index of the identity element.
    identity_index: usize,

    /// If this group was derived from another group (as a subgroup, or as a set of
    /// representatives), the index in that group of each element of this group.
    head_indices: Option<Vec<usize>>,
}

impl SymGroup {
    /// Constructs a group from its elements, computing the multiplication table by composing
    /// the operations.
    ///
    /// # Arguments
    ///
    /// * `elements` - All elements of the group.
    /// * `periodicity` - If given, translations are only compared modulo this lattice, so that
    /// the elements form a factor group of a space group.
    /// * `thresh` - Threshold for comparing linear parts (and translations, if no periodicity is
    /// given).
    ///
    /// # Errors
    ///
    /// Errors if the elements do not close under composition, contain duplicates, or lack the
    /// identity.
    pub fn from_elements(
        elements: Vec<SymOp>,
        periodicity: Option<&Lattice>,
        thresh: f64,
    ) -> Result<Self, SymmetryError> {
        let order = elements.len();
        if order == 0 {
            return Err(SymmetryError::InvalidGroup(
                "A group must contain at least one element.".to_string(),
            ));
        }
        log::debug!("Constructing multiplication table for {order} elements in parallel...");
        let mut products = Array2::<Option<usize>>::from_elem((order, order), None);
        Zip::indexed(&mut products).par_for_each(|(i, j), k| {
            let op_k = &elements[i] * &elements[j];
            *k = elements
                .iter()
                .position(|op| op.approx_eq(&op_k, periodicity, thresh));
        });
        if let Some(((i, j), _)) = products.indexed_iter().find(|(_, k)| k.is_none()) {
            return Err(SymmetryError::InvalidGroup(format!(
                "Group closure not fulfilled: the composition {} * {} is not one of the elements.",
                elements[i], elements[j]
            )));
        }
        let table = products.mapv(|k| k.unwrap_or_default());
        log::debug!("Constructing multiplication table for {order} elements in parallel... Done.");
        Self::from_table(elements, table, None)
    }

    /// Constructs a group from its elements and a known multiplication table.
    ///
    /// # Errors
    ///
    /// Errors if the table is not the multiplication table of a group.
    pub fn from_table(
        elements: Vec<SymOp>,
        table: Array2<usize>,
        head_indices: Option<Vec<usize>>,
    ) -> Result<Self, SymmetryError> {
        let order = elements.len();
        if table.dim() != (order, order) {
            return Err(SymmetryError::InvalidGroup(format!(
                "The multiplication table has shape {:?} but there are {order} elements.",
                table.dim()
            )));
        }
        if let Some(head) = head_indices.as_ref() {
            if head.len() != order {
                return Err(SymmetryError::InvalidGroup(
                    "Mismatched number of head-group indices.".to_string(),
                ));
            }
        }
        // Every row and column of a group table is a rearrangement of the element indices.
        let is_latin = table
            .rows()
            .into_iter()
            .chain(table.columns())
            .all(|line| line.iter().copied().collect::<BTreeSet<_>>().len() == order)
            && table.iter().all(|&k| k < order);
        if !is_latin {
            return Err(SymmetryError::InvalidGroup(
                "The multiplication table is not a Latin square: the elements contain duplicates."
                    .to_string(),
            ));
        }
        let identity_index = (0..order)
            .find(|&e| (0..order).all(|i| table[[e, i]] == i && table[[i, e]] == i))
            .ok_or_else(|| {
                SymmetryError::InvalidGroup("No identity element found.".to_string())
            })?;
        let inverses = (0..order)
            .map(|i| {
                (0..order)
                    .find(|&j| table[[i, j]] == identity_index)
                    .ok_or_else(|| {
                        SymmetryError::InvalidGroup(format!("Element {i} has no inverse."))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            elements,
            table,
            inverses,
            identity_index,
            head_indices,
        })
    }

    /// The order of the group.
    pub fn order(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[SymOp] {
        &self.elements
    }

    pub fn table(&self) -> &Array2<usize> {
        &self.table
    }

    /// The index of `elements[i] * elements[j]`.
    pub fn multiply(&self, i: usize, j: usize) -> usize {
        self.table[[i, j]]
    }

    /// The index of the inverse of `elements[i]`.
    pub fn inverse(&self, i: usize) -> usize {
        self.inverses[i]
    }

    pub fn identity_index(&self) -> usize {
        self.identity_index
    }

    /// The index in the head group of each element, if this group was derived from one.
    pub fn head_indices(&self) -> Option<&[usize]> {
        self.head_indices.as_deref()
    }

    /// Constructs the subgroup formed by the elements at `indices`.
    ///
    /// The subgroup lists its elements in ascending index order, and its head indices refer to
    /// this group.
    ///
    /// # Errors
    ///
    /// Errors if the selected elements are not closed under multiplication.
    pub fn subgroup(&self, indices: &GroupIndices) -> Result<Self, SymmetryError> {
        let elements = indices.iter().map(|&i| self.elements[i].clone()).collect();
        self.subgroup_with_elements(indices, elements)
    }

    /// Constructs a subgroup from the elements at `indices`, replacing the elements by
    /// `elements` while keeping the multiplication table of this group.
    pub(crate) fn subgroup_with_elements(
        &self,
        indices: &GroupIndices,
        elements: Vec<SymOp>,
    ) -> Result<Self, SymmetryError> {
        let positions = indices
            .iter()
            .enumerate()
            .map(|(pos, &i)| (i, pos))
            .collect::<HashMap<_, _>>();
        let n = indices.len();
        let mut table = Array2::<usize>::zeros((n, n));
        for ((a, &i), (b, &j)) in indices
            .iter()
            .enumerate()
            .cartesian_product(indices.iter().enumerate())
        {
            let k = self.table[[i, j]];
            table[[a, b]] = *positions.get(&k).ok_or_else(|| {
                SymmetryError::InvalidGroup(format!(
                    "The elements {indices:?} are not closed: {i} * {j} = {k} is missing."
                ))
            })?;
        }
        Self::from_table(elements, table, Some(indices.iter().copied().collect()))
    }

    /// The subgroup generated by a set of elements.
    pub fn closure(&self, generators: &GroupIndices) -> GroupIndices {
        let mut subgroup = GroupIndices::from([self.identity_index]);
        let mut frontier = vec![self.identity_index];
        while let Some(h) = frontier.pop() {
            for &g in generators.iter() {
                let k = self.table[[g, h]];
                if subgroup.insert(k) {
                    frontier.push(k);
                }
            }
        }
        subgroup
    }

    /// The conjugate $`g H g^{-1}`$ of a subgroup.
    fn conjugate(&self, g: usize, subgroup: &GroupIndices) -> GroupIndices {
        let g_inv = self.inverses[g];
        subgroup
            .iter()
            .map(|&h| self.table[[self.table[[g, h]], g_inv]])
            .collect()
    }

    /// Partitions a collection of subgroups into conjugacy orbits.
    ///
    /// Conjugates missing from `subgroups` are added to their orbits.
    pub fn make_subgroup_orbits<I>(&self, subgroups: I) -> GroupIndicesOrbitSet
    where
        I: IntoIterator<Item = GroupIndices>,
    {
        let mut seen = BTreeSet::<GroupIndices>::new();
        let mut orbits = GroupIndicesOrbitSet::new();
        for subgroup in subgroups {
            if seen.contains(&subgroup) {
                continue;
            }
            let orbit = (0..self.order())
                .map(|g| self.conjugate(g, &subgroup))
                .collect::<GroupIndicesOrbit>();
            seen.extend(orbit.iter().cloned());
            orbits.insert(orbit);
        }
        orbits
    }

    /// Enumerates the cyclic subgroups, grouped into conjugacy orbits.
    pub fn make_cyclic_subgroups(&self) -> GroupIndicesOrbitSet {
        log::debug!("Enumerating cyclic subgroups of a group of order {}...", self.order());
        let cyclic = (0..self.order())
            .map(|g| self.closure(&GroupIndices::from([g])))
            .collect::<BTreeSet<_>>();
        self.make_subgroup_orbits(cyclic)
    }

    /// Enumerates all subgroups, grouped into conjugacy orbits.
    ///
    /// Every subgroup is generated by cyclic subgroups, so all subgroups are reached by
    /// repeatedly joining known subgroups with cyclic ones.
    pub fn make_all_subgroups(&self) -> GroupIndicesOrbitSet {
        log::debug!("Enumerating all subgroups of a group of order {}...", self.order());
        let cyclic = (0..self.order())
            .map(|g| self.closure(&GroupIndices::from([g])))
            .collect::<BTreeSet<_>>();
        let mut all = cyclic.clone();
        let mut frontier = cyclic.iter().cloned().collect::<Vec<_>>();
        while !frontier.is_empty() {
            let joined = frontier
                .par_iter()
                .flat_map_iter(|subgroup| {
                    cyclic.iter().filter(|c| !c.is_subset(subgroup)).map(|c| {
                        let generators = subgroup.union(c).copied().collect::<GroupIndices>();
                        self.closure(&generators)
                    })
                })
                .collect::<BTreeSet<_>>();
            frontier = joined
                .into_iter()
                .filter(|subgroup| all.insert(subgroup.clone()))
                .collect();
        }
        log::debug!("Found {} subgroups.", all.len());
        self.make_subgroup_orbits(all)
    }
}

impl fmt::Debug for SymGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymGroup(order {})", self.order())
    }
}

impl fmt::Display for SymGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Group of order {}:", self.order())?;
        for (i, op) in self.elements.iter().enumerate() {
            writeln!(f, "  {i:>4}: {op}")?;
        }
        Ok(())
    }
}
