//! # xtalsym: Symmetry of Cluster Orbits and Degree-of-Freedom Spaces in Crystals
//!
//! xtalsym is a library and a program for symmetry analysis of crystalline structures with
//! the following capabilities:
//! - enumeration of orbits of clusters of sites under a space group, either periodically or
//! around a phenomenal cluster,
//! - invariance subgroups of clusters and configurations,
//! - matrix representations of factor groups on occupation, displacement and strain spaces of
//! supercells, and
//! - decomposition of such spaces into irreducible subspaces, with high-symmetry directions
//! and irreducible wedges.
//!
//! The entry points for library users are [`cluster::orbit::make_prim_periodic_orbits`],
//! [`cluster::orbit::make_local_orbits`] and
//! [`drivers::dof_space_analysis::dof_space_analysis`]. The `xtalsym` binary reads a YAML input
//! file describing a primitive structure, its factor group and the calculations to run:
//!
//! ```text
//! xtalsym --config input.yml --output output.log
//! ```
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions.
//!
//! ## License
//!
//! GNU Lesser General Public License v3.0.

pub mod auxiliary;
pub mod cluster;
pub mod configuration;
pub mod drivers;
pub mod error;
pub mod interfaces;
pub mod io;
pub mod permutation;
pub mod representation;
pub mod symmetry;
