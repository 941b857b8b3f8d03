//! Cartesian space-group operations.

use std::fmt;
use std::ops::Mul;

use approx;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::auxiliary::geometry::Lattice;

#[cfg(test)]
#[path = "symmetry_operation_tests.rs"]
mod symmetry_operation_tests;

/// Serialisable form of a [`SymOp`]: the linear part is listed row by row.
#[derive(Clone, Serialize, Deserialize)]
struct SymOpRows {
    matrix: [[f64; 3]; 3],

    #[serde(default)]
    translation: [f64; 3],
}

/// A symmetry operation $`\{\mathbf{R} | \boldsymbol{\tau}\}`$ acting on Cartesian positions as
/// $`\mathbf{x} \mapsto \mathbf{R}\mathbf{x} + \boldsymbol{\tau}`$.
///
/// The linear part is an orthogonal matrix. Operations compose as functions: in `a * b`, `b`
/// acts first.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SymOpRows", into = "SymOpRows")]
pub struct SymOp {
    matrix: Matrix3<f64>,

    translation: Vector3<f64>,
}

impl From<SymOpRows> for SymOp {
    fn from(rows: SymOpRows) -> Self {
        Self {
            matrix: Matrix3::from_row_slice(&rows.matrix.concat()),
            translation: Vector3::from(rows.translation),
        }
    }
}

impl From<SymOp> for SymOpRows {
    fn from(op: SymOp) -> Self {
        let mut matrix = [[0.0; 3]; 3];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (j, x) in row.iter_mut().enumerate() {
                *x = op.matrix[(i, j)];
            }
        }
        Self {
            matrix,
            translation: [op.translation[0], op.translation[1], op.translation[2]],
        }
    }
}

impl SymOp {
    pub fn new(matrix: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            matrix,
            translation,
        }
    }

    /// The identity operation.
    pub fn identity() -> Self {
        Self::new(Matrix3::identity(), Vector3::zeros())
    }

    /// A pure translation.
    pub fn translation_op(translation: Vector3<f64>) -> Self {
        Self::new(Matrix3::identity(), translation)
    }

    /// The linear (point) part of this operation.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// The translation part of this operation.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// The point part of this operation with the translation dropped.
    #[must_use]
    pub fn point_op(&self) -> Self {
        Self::new(self.matrix, Vector3::zeros())
    }

    /// Returns `true` if this operation preserves handedness.
    pub fn is_proper(&self) -> bool {
        self.matrix.determinant() > 0.0
    }

    /// Transforms a Cartesian position.
    pub fn apply_point(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * position + self.translation
    }

    /// Transforms a Cartesian displacement, which ignores the translation part.
    pub fn apply_vector(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * vector
    }

    /// The inverse operation $`\{\mathbf{R}^{\mathsf{T}} | -\mathbf{R}^{\mathsf{T}}\boldsymbol{\tau}\}`$.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv = self.matrix.transpose();
        Self::new(inv, -(inv * self.translation))
    }

    /// Returns a copy of this operation followed by an additional translation.
    #[must_use]
    pub fn translated(&self, translation: &Vector3<f64>) -> Self {
        Self::new(self.matrix, self.translation + translation)
    }

    /// Checks if two operations are equal within a threshold, optionally treating translations
    /// that differ by a vector of `periodicity` as equal.
    pub fn approx_eq(&self, other: &Self, periodicity: Option<&Lattice>, thresh: f64) -> bool {
        let matrices_equal = self
            .matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - b).abs() <= thresh);
        if !matrices_equal {
            return false;
        }
        let diff = self.translation - other.translation;
        match periodicity {
            Some(lattice) => lattice.as_lattice_vector(&diff).is_some(),
            None => diff.norm() <= thresh,
        }
    }
}

impl fmt::Debug for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for SymOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = (0..3)
            .map(|i| {
                format!(
                    "{:+.3} {:+.3} {:+.3}",
                    self.matrix[(i, 0)],
                    self.matrix[(i, 1)],
                    self.matrix[(i, 2)]
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        write!(
            f,
            "{{{rows} | {:+.4} {:+.4} {:+.4}}}",
            self.translation[0], self.translation[1], self.translation[2]
        )
    }
}

impl approx::AbsDiffEq for SymOp {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-7
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.approx_eq(other, None, epsilon)
    }
}

// ---
// Mul
// ---
impl Mul<&'_ SymOp> for &SymOp {
    type Output = SymOp;

    fn mul(self, rhs: &SymOp) -> Self::Output {
        SymOp::new(
            self.matrix * rhs.matrix,
            self.matrix * rhs.translation + self.translation,
        )
    }
}

impl Mul<SymOp> for SymOp {
    type Output = SymOp;

    fn mul(self, rhs: SymOp) -> Self::Output {
        &self * &rhs
    }
}
