//! Small dense linear algebra on `ndarray` matrices, backed by `faer`.

use faer::prelude::SolverCore;
use faer::{Mat, Side};
use ndarray::{Array1, Array2};

const MAX_DIAGONAL_RATIO: f64 = 1e12;

/// Inverse of a symmetric positive definite matrix.
///
/// Returns `None` when the Cholesky factorization fails.
pub fn invert_spd(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let n = matrix.nrows();
    if n == 0 || n != matrix.ncols() || matrix.iter().any(|value| !value.is_finite()) {
        return None;
    }
    let mat = Mat::<f64>::from_fn(n, n, |i, j| 0.5 * (matrix[[i, j]] + matrix[[j, i]]));
    let chol = mat.cholesky(Side::Lower).ok()?;
    let inverse = chol.inverse();
    let inverse = Array2::from_shape_fn((n, n), |(i, j)| inverse[(i, j)]);
    // Rounding can leave a tiny positive pivot on a rank-deficient matrix.
    let ill_conditioned = (0..n).any(|i| {
        let ratio = inverse[[i, i]] * matrix[[i, i]];
        !ratio.is_finite() || ratio > MAX_DIAGONAL_RATIO
    });
    if ill_conditioned {
        return None;
    }
    Some(inverse)
}

/// Quadratic form `v' A v`.
pub fn quadratic_form(matrix: &Array2<f64>, v: &Array1<f64>) -> f64 {
    v.dot(&matrix.dot(v))
}
