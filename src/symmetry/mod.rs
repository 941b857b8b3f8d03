//! Symmetry operations, groups and the symmetry of a primitive structure.

pub mod invariance;
pub mod prim_symmetry;
pub mod symmetry_group;
pub mod symmetry_operation;
