//! Error kinds raised by the symmetry engine.

use std::error::Error;
use std::fmt;

/// An enumerated type for errors raised synchronously by the orbit and representation
/// machinery.
///
/// Every variant is fatal for the operation that raised it: no partial result accompanies an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymmetryError {
    /// Invalid user-supplied settings, detected before any enumeration starts (unknown
    /// site-filter method, malformed cutoff tables, duplicate cluster sites, DoF-space shapes
    /// that do not match the structure).
    Configuration(String),

    /// A symmetry operation does not map the structure onto itself, or is otherwise
    /// incompatible with the lattice it is applied to.
    GeometricInconsistency(String),

    /// The irreducible decomposition of a vector space lost or gained dimensions, or the
    /// input subspace/representation is defective.
    DecompositionInconsistency(String),

    /// A set of operations that was expected to form a group does not.
    InvalidGroup(String),
}

impl fmt::Display for SymmetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            Self::GeometricInconsistency(msg) => {
                write!(f, "Geometric inconsistency error: {msg}")
            }
            Self::DecompositionInconsistency(msg) => {
                write!(f, "Decomposition inconsistency error: {msg}")
            }
            Self::InvalidGroup(msg) => write!(f, "Invalid group error: {msg}"),
        }
    }
}

impl Error for SymmetryError {}

impl From<derive_builder::UninitializedFieldError> for SymmetryError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::Configuration(format!("Missing field `{}`.", err.field_name()))
    }
}
