// =============================================================================
// ndarray ↔ nalgebra Conversion Utilities
// =============================================================================
//
// The solver stores everything in ndarray; the one place dense linear
// algebra is needed (the unpenalized refit on an active set) uses nalgebra
// for its factorizations. These helpers keep the conversion in one spot.
//
// =============================================================================

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Convert an ndarray Array2 to a nalgebra DMatrix.
///
/// Handles non-contiguous arrays by making a contiguous copy first.
#[inline]
pub fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (nrows, ncols) = (a.nrows(), a.ncols());
    let contig = if a.is_standard_layout() {
        a.clone()
    } else {
        a.as_standard_layout().to_owned()
    };
    DMatrix::from_row_slice(nrows, ncols, contig.as_slice().unwrap())
}

/// Convert an ndarray Array1 to a nalgebra DVector.
#[inline]
pub fn to_dvector(v: &Array1<f64>) -> DVector<f64> {
    DVector::from_row_slice(v.as_slice().unwrap_or(&v.to_vec()))
}

/// Convert a nalgebra DVector to an ndarray Array1.
#[inline]
pub fn to_array1(v: &DVector<f64>) -> Array1<f64> {
    Array1::from_vec(v.as_slice().to_vec())
}

/// Solve a symmetric positive-definite system Ax = b.
///
/// Tries Cholesky first (A is a weighted Gram matrix, so it should be
/// positive definite), falls back to LU. Returns None if the system is
/// singular, which the caller surfaces as a `LinearAlgebraError`.
pub fn solve_symmetric(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        Some(chol.solve(b))
    } else {
        a.clone().lu().solve(b)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_roundtrip_vector() {
        let v = array![1.0, 2.0, 3.0];
        let dv = to_dvector(&v);
        let back = to_array1(&dv);
        assert_eq!(v, back);
    }

    #[test]
    fn test_to_dmatrix_layout() {
        let a = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let m = to_dmatrix(&a);
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(1, 0)], 4.0);

        // Transposed views are not standard layout; the copy must fix that up.
        let t = a.t().to_owned();
        let mt = to_dmatrix(&t);
        assert_eq!(mt[(2, 0)], 3.0);
    }

    #[test]
    fn test_solve_symmetric_spd() {
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let b = DVector::from_row_slice(&[5.0, 4.0]);
        let x = solve_symmetric(&a, &b).unwrap();
        assert!((4.0 * x[0] + 1.0 * x[1] - 5.0).abs() < 1e-12);
        assert!((1.0 * x[0] + 3.0 * x[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_solve_symmetric_singular() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_row_slice(&[1.0, 2.0]);
        assert!(solve_symmetric(&a, &b).is_none());
    }
}
