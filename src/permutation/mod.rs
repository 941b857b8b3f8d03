//! Permutations of finite index sets.
//!
//! Symmetry operations act on crystals by relabelling things: sublattices of the primitive
//! structure, occupants allowed on a site, or sites of a supercell. All of these actions are
//! permutations of `0..n` and are handled by [`Permutation`].

use std::collections::HashSet;
use std::fmt;
use std::ops::Mul;

use derive_builder::Builder;
use indexmap::IndexSet;
use num_traits::Inv;
use serde::{Deserialize, Serialize};

use crate::error::SymmetryError;

#[cfg(test)]
#[path = "permutation_tests.rs"]
mod permutation_tests;

/// A structure to manage permutation actions of a finite set of indices.
#[derive(Builder, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Permutation {
    /// The rank of the permutation, *i.e.* the number of elements in the finite set on which the
    /// permutation acts.
    rank: usize,

    /// If the permutation is to act on an ordered sequence of $`n`$ integers, $`0, 1, \ldots,
    /// n - 1`$ where $`n`$ is [`Self::rank`], then this gives the result of the action: index
    /// `i` is sent to `image[i]`.
    #[builder(setter(custom))]
    image: Vec<usize>,
}

impl PermutationBuilder {
    fn image(&mut self, perm: Vec<usize>) -> &mut Self {
        self.image = Some(perm);
        self
    }

    fn validate(&self) -> Result<(), String> {
        let rank = self.rank.ok_or("The rank of the permutation has not been set.")?;
        let image = self
            .image
            .as_ref()
            .ok_or("The image of the permutation has not been set.")?;
        if image.len() != rank {
            return Err(format!(
                "The permutation image `{image:?}` does not contain {rank} elements."
            ));
        }
        let distinct = image.iter().copied().collect::<HashSet<usize>>();
        if distinct.len() != rank || image.iter().any(|&i| i >= rank) {
            return Err(format!(
                "The permutation image `{image:?}` is not a rearrangement of 0..{rank}."
            ));
        }
        Ok(())
    }
}

impl Permutation {
    /// Returns a builder to construct a new permutation.
    fn builder() -> PermutationBuilder {
        PermutationBuilder::default()
    }

    /// Constructs a permutation from its image.
    ///
    /// # Errors
    ///
    /// Errors if `image` is not a rearrangement of `0..image.len()`.
    pub fn from_image(image: Vec<usize>) -> Result<Self, SymmetryError> {
        let rank = image.len();
        let perm = Self::builder()
            .rank(rank)
            .image(image)
            .build()
            .map_err(|err| SymmetryError::GeometricInconsistency(err.to_string()))?;
        Ok(perm)
    }

    /// Constructs the identity permutation of a given rank.
    pub fn identity(rank: usize) -> Self {
        Self {
            rank,
            image: (0..rank).collect(),
        }
    }

    /// The number of indices this permutation acts on.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// The image of the permutation.
    pub fn image(&self) -> &[usize] {
        &self.image
    }

    /// Returns the image of a single index.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not smaller than the rank.
    pub fn apply(&self, i: usize) -> usize {
        self.image[i]
    }

    /// Obtains the cycle representation of the permutation.
    ///
    /// Cycles are sorted by decreasing length, then lexicographically.
    pub fn cycles(&self) -> Vec<Vec<usize>> {
        let mut remaining_indices = (0..self.rank).rev().collect::<IndexSet<usize>>();
        let mut cycles: Vec<Vec<usize>> = Vec::with_capacity(self.rank);
        while let Some(start) = remaining_indices.pop() {
            let mut cycle = vec![start];
            let mut idx = start;
            while self.image[idx] != start {
                idx = self.image[idx];
                remaining_indices.shift_remove(&idx);
                cycle.push(idx);
            }
            cycles.push(cycle);
        }
        cycles.sort_by_key(|cycle| (!cycle.len(), cycle.clone()));
        cycles
    }

    /// Returns `true` if this permutation is the identity permutation for this rank.
    pub fn is_identity(&self) -> bool {
        self.image.iter().enumerate().all(|(i, &j)| i == j)
    }
}

impl fmt::Debug for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "π{:?}", self.image)
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cycles = self
            .cycles()
            .into_iter()
            .filter(|cycle| cycle.len() > 1)
            .map(|cycle| {
                format!(
                    "({})",
                    cycle
                        .iter()
                        .map(|i| i.to_string())
                        .collect::<Vec<_>>()
                        .join(" ")
                )
            })
            .collect::<String>();
        if cycles.is_empty() {
            write!(f, "()")
        } else {
            write!(f, "{cycles}")
        }
    }
}

// ---
// Mul
// ---
// `(p * q)(i) = p(q(i))`: the right operand acts first.
impl Mul<&'_ Permutation> for &Permutation {
    type Output = Permutation;

    fn mul(self, rhs: &Permutation) -> Self::Output {
        assert_eq!(
            self.rank, rhs.rank,
            "The ranks of two multiplying permutations do not match."
        );
        Permutation {
            rank: self.rank,
            image: rhs.image.iter().map(|&ri| self.image[ri]).collect(),
        }
    }
}

// ---
// Inv
// ---
impl Inv for &Permutation {
    type Output = Permutation;

    fn inv(self) -> Self::Output {
        let mut image_inv = vec![0; self.rank];
        self.image
            .iter()
            .enumerate()
            .for_each(|(i, &j)| image_inv[j] = i);
        Permutation {
            rank: self.rank,
            image: image_inv,
        }
    }
}
