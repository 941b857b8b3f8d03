//! Miscellaneous numerical helpers bridging `ndarray` and `nalgebra`.

use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

#[cfg(test)]
#[path = "misc_tests.rs"]
mod misc_tests;

/// Converts an `ndarray` matrix into an `nalgebra` matrix.
pub(crate) fn to_dmatrix(arr: &Array2<f64>) -> DMatrix<f64> {
    let (nrows, ncols) = arr.dim();
    DMatrix::from_row_iterator(nrows, ncols, arr.iter().cloned())
}

/// Converts an `nalgebra` matrix into an `ndarray` matrix.
pub(crate) fn to_array2(mat: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn(mat.shape(), |(i, j)| mat[(i, j)])
}

/// Computes an orthonormal basis of the column space of `arr`.
///
/// # Returns
///
/// The orthonormal basis as the columns of a matrix, together with the numerical rank of `arr`
/// (the number of singular values larger than `thresh`).
pub(crate) fn orthonormal_column_basis(arr: &Array2<f64>, thresh: f64) -> (Array2<f64>, usize) {
    let (nrows, ncols) = arr.dim();
    if nrows == 0 || ncols == 0 {
        return (Array2::zeros((nrows, 0)), 0);
    }
    let svd = to_dmatrix(arr).svd(true, false);
    let Some(u) = svd.u else {
        return (Array2::zeros((nrows, 0)), 0);
    };
    let mut kept = svd
        .singular_values
        .iter()
        .enumerate()
        .filter(|(_, &s)| s > thresh)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    kept.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
    let rank = kept.len();
    if rank == 0 {
        return (Array2::zeros((nrows, 0)), 0);
    }
    let columns = kept
        .iter()
        .map(|&i| fix_sign(u.column(i).clone_owned()))
        .collect::<Vec<_>>();
    (to_array2(&DMatrix::from_columns(&columns)), rank)
}

/// Numerical rank of a matrix.
pub(crate) fn column_rank(arr: &Array2<f64>, thresh: f64) -> usize {
    orthonormal_column_basis(arr, thresh).1
}

/// Moore–Penrose pseudo-inverse of a matrix with full column rank.
pub(crate) fn pseudo_inverse(mat: &DMatrix<f64>, thresh: f64) -> Option<DMatrix<f64>> {
    mat.clone().pseudo_inverse(thresh).ok()
}

/// Flips the sign of a vector so that its first significant component is positive.
pub(crate) fn fix_sign(mut col: DVector<f64>) -> DVector<f64> {
    let max_abs = col.amax();
    if let Some(first) = col.iter().find(|x| x.abs() > 1e-3 * max_abs).copied() {
        if first < 0.0 {
            col.neg_mut();
        }
    }
    col
}
