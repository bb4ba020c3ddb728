//! Direct linear solver for small scattering boxes.
//!
//! Uses LU decomposition via `faer` to solve $\mathbf{A}\mathbf{u} = \mathbf{b}$
//! exactly. Appropriate when the box holds at most a few thousand voxels;
//! beyond that the dense matrix alone outgrows the matrix-free GMRES path.

use faer::linalg::solvers::SpSolver;
use ndarray::{Array1, Array2};
use num_complex::Complex64;

use crate::error::ResonaError;

/// Solve a dense complex system by LU decomposition with partial pivoting.
///
/// # Arguments
/// * `matrix` - Square system matrix $\mathbf{A}$.
/// * `rhs` - Right-hand side $\mathbf{b}$.
pub fn solve_direct(matrix: &Array2<Complex64>, rhs: &Array1<Complex64>) -> Result<Array1<Complex64>, ResonaError> {
    let dim = matrix.nrows();
    if dim != matrix.ncols() {
        return Err(ResonaError::shape(&[dim, dim], matrix.shape()));
    }
    if dim != rhs.len() {
        return Err(ResonaError::shape(&[dim], &[rhs.len()]));
    }

    let a = faer::Mat::<faer::complex_native::c64>::from_fn(dim, dim, |i, j| {
        let c = matrix[[i, j]];
        faer::complex_native::c64::new(c.re, c.im)
    });
    let b = faer::Col::<faer::complex_native::c64>::from_fn(dim, |i| {
        let c = rhs[i];
        faer::complex_native::c64::new(c.re, c.im)
    });

    let lu = a.partial_piv_lu();
    let x = lu.solve(&b);

    let solution: Array1<Complex64> = (0..dim)
        .map(|i| {
            let c = x[i];
            Complex64::new(c.re, c.im)
        })
        .collect();

    if solution.iter().any(|v| !(v.re.is_finite() && v.im.is_finite())) {
        return Err(ResonaError::LinAlgError("LU solve produced non-finite values (singular system)".into()));
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve_identity_system() {
        let dim = 5;
        let matrix = Array2::from_shape_fn((dim, dim), |(i, j)| {
            if i == j {
                Complex64::new(1.0, 0.0)
            } else {
                Complex64::new(0.0, 0.0)
            }
        });
        let rhs: Array1<Complex64> = (0..dim).map(|i| Complex64::new(i as f64, -1.0)).collect();
        let sol = solve_direct(&matrix, &rhs).unwrap();
        for i in 0..dim {
            assert!((sol[i] - rhs[i]).norm() < 1e-12);
        }
    }

    #[test]
    fn test_solve_complex_system() {
        let matrix = Array2::from_shape_vec(
            (2, 2),
            vec![
                Complex64::new(2.0, -1.0),
                Complex64::new(0.5, 0.0),
                Complex64::new(0.0, 1.0),
                Complex64::new(1.0, 1.0),
            ],
        )
        .unwrap();
        let rhs = array![Complex64::new(1.0, 0.0), Complex64::new(0.0, 3.0)];
        let sol = solve_direct(&matrix, &rhs).unwrap();
        let check = matrix.dot(&sol);
        for i in 0..2 {
            assert!((check[i] - rhs[i]).norm() < 1e-12, "row {}: {:?} vs {:?}", i, check[i], rhs[i]);
        }
    }

    #[test]
    fn test_rejects_mismatched_rhs() {
        let matrix = Array2::<Complex64>::zeros((3, 3));
        let rhs = Array1::<Complex64>::zeros(2);
        assert!(matches!(solve_direct(&matrix, &rhs), Err(ResonaError::ShapeMismatch { .. })));
    }
}
