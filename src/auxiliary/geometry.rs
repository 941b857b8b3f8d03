//! Lattices and geometrical manipulations.

use std::fmt;

use approx;
use itertools::iproduct;
use nalgebra::{Matrix3, Rotation3, UnitVector3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::SymmetryError;

#[cfg(test)]
#[path = "geometry_tests.rs"]
mod geometry_tests;

/// Default threshold for comparing Cartesian positions and fractional coordinates.
pub const DEFAULT_LATTICE_TOLERANCE: f64 = 1e-5;

// =================
// Utility functions
// =================

/// Rounds `x` to the nearest integer if it lies within `thresh` of it.
pub fn round_to_integer(x: f64, thresh: f64) -> Option<i64> {
    let rounded = x.round();
    if (x - rounded).abs() <= thresh {
        #[allow(clippy::cast_possible_truncation)]
        Some(rounded as i64)
    } else {
        None
    }
}

/// Returns a $`3 \times 3`$ rotation matrix in $`\mathbb{R}^3`$ corresponding to a rotation
/// through `angle` about `axis` raised to the power `power`.
#[must_use]
pub fn proper_rotation_matrix(angle: f64, axis: &Vector3<f64>, power: i32) -> Matrix3<f64> {
    let normalised_axis = UnitVector3::new_normalize(*axis);
    Rotation3::from_axis_angle(&normalised_axis, f64::from(power) * angle).into_inner()
}

// ==================
// Struct definitions
// ==================

/// Serialisable form of a [`Lattice`]: the lattice vectors are listed as rows.
#[derive(Clone, Serialize, Deserialize)]
struct LatticeVectors {
    vectors: [[f64; 3]; 3],

    #[serde(default = "default_lattice_tolerance")]
    tolerance: f64,
}

const fn default_lattice_tolerance() -> f64 {
    DEFAULT_LATTICE_TOLERANCE
}

/// A three-dimensional Bravais lattice.
///
/// The lattice vectors are stored as the columns of [`Self::column_matrix`], so that the
/// Cartesian position of the fractional coordinates $`\mathbf{f}`$ is $`\mathbf{L}\mathbf{f}`$.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LatticeVectors", into = "LatticeVectors")]
pub struct Lattice {
    column_matrix: Matrix3<f64>,

    inverse: Matrix3<f64>,

    /// Threshold for Cartesian and fractional comparisons.
    tolerance: f64,
}

impl TryFrom<LatticeVectors> for Lattice {
    type Error = SymmetryError;

    fn try_from(value: LatticeVectors) -> Result<Self, Self::Error> {
        let columns = value.vectors.map(Vector3::from);
        Lattice::new(Matrix3::from_columns(&columns), value.tolerance)
    }
}

impl From<Lattice> for LatticeVectors {
    fn from(value: Lattice) -> Self {
        let mut vectors = [[0.0; 3]; 3];
        value
            .column_matrix
            .column_iter()
            .enumerate()
            .for_each(|(i, col)| vectors[i] = [col[0], col[1], col[2]]);
        LatticeVectors {
            vectors,
            tolerance: value.tolerance,
        }
    }
}

impl Lattice {
    /// Constructs a lattice from a matrix whose columns are the lattice vectors.
    ///
    /// # Errors
    ///
    /// Errors if the lattice vectors are linearly dependent.
    pub fn new(column_matrix: Matrix3<f64>, tolerance: f64) -> Result<Self, SymmetryError> {
        let inverse = column_matrix
            .try_inverse()
            .filter(|_| column_matrix.determinant().abs() > tolerance)
            .ok_or_else(|| {
                SymmetryError::Configuration(format!(
                    "The lattice vectors {column_matrix} are linearly dependent."
                ))
            })?;
        Ok(Self {
            column_matrix,
            inverse,
            tolerance,
        })
    }

    /// The matrix whose columns are the lattice vectors.
    pub fn column_matrix(&self) -> &Matrix3<f64> {
        &self.column_matrix
    }

    /// The comparison threshold of this lattice.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The volume of the unit cell.
    pub fn volume(&self) -> f64 {
        self.column_matrix.determinant().abs()
    }

    /// Converts Cartesian coordinates into fractional coordinates.
    pub fn frac_coords(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * cart
    }

    /// Converts fractional coordinates into Cartesian coordinates.
    pub fn cart_coords(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.column_matrix * frac
    }

    /// The Cartesian vector of an integral lattice translation.
    pub fn lattice_vector(&self, unitcell: &Vector3<i64>) -> Vector3<f64> {
        self.column_matrix * unitcell.map(|x| x as f64)
    }

    /// Returns the integral lattice translation equal to the Cartesian vector `cart`, if there
    /// is one.
    pub fn as_lattice_vector(&self, cart: &Vector3<f64>) -> Option<Vector3<i64>> {
        let frac = self.frac_coords(cart);
        let ints = frac
            .iter()
            .map(|&x| round_to_integer(x, self.tolerance))
            .collect::<Option<Vec<_>>>()?;
        let unitcell = Vector3::new(ints[0], ints[1], ints[2]);
        if (self.lattice_vector(&unitcell) - cart).norm() <= self.tolerance {
            Some(unitcell)
        } else {
            None
        }
    }

    /// Returns `true` if `a` and `b` differ by a lattice translation.
    pub fn is_equivalent_position(&self, a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
        self.as_lattice_vector(&(a - b)).is_some()
    }

    /// Expresses a Cartesian linear map $`\mathbf{R}`$ in fractional coordinates,
    /// $`\mathbf{L}^{-1}\mathbf{R}\mathbf{L}`$, if the result is integral.
    pub fn integral_frac_matrix(&self, cart_matrix: &Matrix3<f64>) -> Option<Matrix3<i64>> {
        let frac = self.inverse * cart_matrix * self.column_matrix;
        let ints = frac
            .iter()
            .map(|&x| round_to_integer(x, self.tolerance))
            .collect::<Option<Vec<_>>>()?;
        Some(Matrix3::from_column_slice(&ints))
    }

    /// Enumerates the integral lattice translations $`\mathbf{n}`$ with
    /// $`\lVert \mathbf{L}\mathbf{n} - \mathbf{c} \rVert \le r`$.
    pub fn points_within(&self, centre: &Vector3<f64>, radius: f64) -> Vec<Vector3<i64>> {
        let frac_centre = self.frac_coords(centre);
        // The extent along fractional axis `i` of a ball of radius `r` is `r |row_i(L⁻¹)|`.
        let bounds = (0..3)
            .map(|i| {
                let extent = radius * self.inverse.row(i).norm();
                #[allow(clippy::cast_possible_truncation)]
                let lo = (frac_centre[i] - extent - self.tolerance).floor() as i64;
                #[allow(clippy::cast_possible_truncation)]
                let hi = (frac_centre[i] + extent + self.tolerance).ceil() as i64;
                (lo, hi)
            })
            .collect::<Vec<_>>();
        iproduct!(
            bounds[0].0..=bounds[0].1,
            bounds[1].0..=bounds[1].1,
            bounds[2].0..=bounds[2].1
        )
        .map(|(i, j, k)| Vector3::new(i, j, k))
        .filter(|n| (self.lattice_vector(n) - centre).norm() <= radius + self.tolerance)
        .collect()
    }
}

impl fmt::Debug for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lattice{:?}", LatticeVectors::from(self.clone()).vectors)
    }
}

impl fmt::Display for Lattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.column_matrix.column_iter().enumerate() {
            writeln!(
                f,
                "  a{}: ({:+.6}, {:+.6}, {:+.6})",
                i + 1,
                col[0],
                col[1],
                col[2]
            )?;
        }
        Ok(())
    }
}

impl approx::AbsDiffEq for Lattice {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        DEFAULT_LATTICE_TOLERANCE
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.column_matrix
            .iter()
            .zip(other.column_matrix.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}
