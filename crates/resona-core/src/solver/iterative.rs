//! Restarted GMRES for matrix-free systems.
//!
//! GMRES (Generalised Minimal Residual method) builds an orthonormal Krylov
//! basis by modified Gram-Schmidt Arnoldi iteration and minimises the
//! residual over it with complex Givens rotations. Only matrix-vector
//! products are needed, so the scattering operator never has to be formed.
//!
//! Convergence is judged on the relative residual $\|b - Ax\| / \|b\|$. The
//! residual estimate from the rotated Hessenberg system is recorded after
//! each iteration; at every restart the true residual is recomputed.

use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::{norm, LinearOperator, SolveMethod, SolveReport};
use crate::error::ResonaError;

/// Hessenberg sub-diagonal below which the Krylov space is exhausted.
const BREAKDOWN_TOLERANCE: f64 = 1e-300;

/// GMRES configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GmresSettings {
    /// Target relative residual.
    pub tolerance: f64,
    /// Maximum number of matrix-vector products in total.
    pub max_iterations: usize,
    /// Krylov subspace dimension before a restart.
    pub restart: usize,
}

impl Default for GmresSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 500,
            restart: 50,
        }
    }
}

/// Solution and diagnostics of a GMRES run.
#[derive(Debug, Clone)]
pub struct GmresOutcome {
    pub solution: Array1<Complex64>,
    pub report: SolveReport,
}

fn inner(a: &Array1<Complex64>, b: &Array1<Complex64>) -> Complex64 {
    a.iter().zip(b.iter()).map(|(x, y)| x.conj() * y).sum()
}

/// Complex Givens rotation `(c, s)` that maps `(a, b)` to `(r, 0)` under
/// `[[conj(c), conj(s)], [-s, c]]`.
fn givens(a: Complex64, b: Complex64) -> (Complex64, Complex64, Complex64) {
    let r = (a.norm_sqr() + b.norm_sqr()).sqrt();
    if r == 0.0 {
        return (Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0), Complex64::new(0.0, 0.0));
    }
    (a / r, b / r, Complex64::new(r, 0.0))
}

/// Solve `op · x = rhs` with restarted GMRES.
///
/// # Arguments
/// * `op` - The system operator.
/// * `rhs` - Right-hand side.
/// * `x0` - Initial guess; zero when `None`.
/// * `settings` - Tolerance, iteration budget and restart length.
///
/// # Returns
/// The final iterate with a [`SolveReport`]. Exhausting the iteration
/// budget is not an error: the report carries `converged = false`.
pub fn solve_gmres<A: LinearOperator + ?Sized>(
    op: &A,
    rhs: &Array1<Complex64>,
    x0: Option<&Array1<Complex64>>,
    settings: &GmresSettings,
) -> Result<GmresOutcome, ResonaError> {
    let n = op.dim();
    if rhs.len() != n {
        return Err(ResonaError::shape(&[n], &[rhs.len()]));
    }
    if let Some(x0) = x0 {
        if x0.len() != n {
            return Err(ResonaError::shape(&[n], &[x0.len()]));
        }
    }
    if !(settings.tolerance.is_finite() && settings.tolerance > 0.0) || settings.restart == 0 {
        return Err(ResonaError::InvalidParameter(format!(
            "GMRES needs a positive tolerance and restart length, got {:?}",
            settings
        )));
    }

    let zero = Complex64::new(0.0, 0.0);
    let b_norm = norm(rhs);
    if b_norm == 0.0 {
        return Ok(GmresOutcome {
            solution: Array1::zeros(n),
            report: SolveReport {
                method: SolveMethod::Gmres,
                converged: true,
                iterations: 0,
                residual: 0.0,
                residual_history: vec![0.0],
            },
        });
    }

    let mut x = x0.cloned().unwrap_or_else(|| Array1::zeros(n));
    let mut history = Vec::new();
    let mut iterations = 0usize;

    loop {
        let r = rhs - &op.apply(&x)?;
        let beta = norm(&r);
        let rel = beta / b_norm;
        if history.is_empty() {
            history.push(rel);
        }
        if rel <= settings.tolerance || iterations >= settings.max_iterations || beta == 0.0 {
            return Ok(GmresOutcome {
                solution: x,
                report: SolveReport {
                    method: SolveMethod::Gmres,
                    converged: rel <= settings.tolerance,
                    iterations,
                    residual: rel,
                    residual_history: history,
                },
            });
        }

        let m = settings.restart.min(settings.max_iterations - iterations);
        let mut basis: Vec<Array1<Complex64>> = Vec::with_capacity(m + 1);
        basis.push(r.mapv(|v| v / beta));
        let mut h = vec![vec![zero; m]; m + 1];
        let mut cs = vec![zero; m];
        let mut sn = vec![zero; m];
        let mut g = vec![zero; m + 1];
        g[0] = Complex64::new(beta, 0.0);
        let mut used = 0;

        for j in 0..m {
            let mut w = op.apply(&basis[j])?;
            iterations += 1;

            for (i, v) in basis.iter().enumerate() {
                let hij = inner(v, &w);
                h[i][j] = hij;
                w.scaled_add(-hij, v);
            }
            let h_next = norm(&w);
            h[j + 1][j] = Complex64::new(h_next, 0.0);

            for i in 0..j {
                let upper = cs[i].conj() * h[i][j] + sn[i].conj() * h[i + 1][j];
                let lower = -sn[i] * h[i][j] + cs[i] * h[i + 1][j];
                h[i][j] = upper;
                h[i + 1][j] = lower;
            }
            let (c, s, r_jj) = givens(h[j][j], h[j + 1][j]);
            cs[j] = c;
            sn[j] = s;
            h[j][j] = r_jj;
            h[j + 1][j] = zero;
            g[j + 1] = -s * g[j];
            g[j] = c.conj() * g[j];

            used = j + 1;
            let estimate = g[j + 1].norm() / b_norm;
            history.push(estimate);

            if estimate <= settings.tolerance || h_next <= BREAKDOWN_TOLERANCE {
                break;
            }
            basis.push(w.mapv(|v| v / h_next));
        }

        // Back-substitution on the upper-triangular R y = g.
        let mut y = vec![zero; used];
        for i in (0..used).rev() {
            let mut acc = g[i];
            for k in (i + 1)..used {
                acc -= h[i][k] * y[k];
            }
            if h[i][i].norm() == 0.0 {
                return Err(ResonaError::LinAlgError("GMRES Hessenberg system is singular".into()));
            }
            y[i] = acc / h[i][i];
        }
        for (yi, v) in y.iter().zip(basis.iter()) {
            x.scaled_add(*yi, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::relative_residual;
    use ndarray::Array2;

    fn test_matrix(n: usize) -> Array2<Complex64> {
        Array2::from_shape_fn((n, n), |(i, j)| {
            if i == j {
                Complex64::new(3.0 + i as f64 * 0.1, 0.5)
            } else {
                Complex64::new(0.3 / (1.0 + (i as f64 - j as f64).abs()), -0.1)
            }
        })
    }

    #[test]
    fn test_gmres_solves_diagonally_dominant_system() {
        let a = test_matrix(20);
        let b: Array1<Complex64> = (0..20).map(|i| Complex64::new((i as f64).sin(), 1.0)).collect();
        let settings = GmresSettings {
            tolerance: 1e-10,
            max_iterations: 200,
            restart: 8,
        };
        let out = solve_gmres(&a, &b, None, &settings).unwrap();
        assert!(out.report.converged);
        assert!(out.report.iterations > 0);
        assert!(relative_residual(&a, &out.solution, &b).unwrap() <= 1e-10);
    }

    #[test]
    fn test_gmres_zero_rhs_returns_zero() {
        let a = test_matrix(4);
        let b = Array1::<Complex64>::zeros(4);
        let out = solve_gmres(&a, &b, None, &GmresSettings::default()).unwrap();
        assert!(out.report.converged);
        assert_eq!(out.report.iterations, 0);
        assert!(out.solution.iter().all(|v| v.norm() == 0.0));
    }

    #[test]
    fn test_gmres_exact_guess_needs_no_iterations() {
        let a = test_matrix(6);
        let x: Array1<Complex64> = (0..6).map(|i| Complex64::new(1.0, i as f64)).collect();
        let b = a.dot(&x);
        let out = solve_gmres(&a, &b, Some(&x), &GmresSettings::default()).unwrap();
        assert!(out.report.converged);
        assert_eq!(out.report.iterations, 0);
    }

    #[test]
    fn test_gmres_reports_non_convergence() {
        let a = test_matrix(30);
        let b: Array1<Complex64> = (0..30).map(|i| Complex64::new(1.0, i as f64)).collect();
        let settings = GmresSettings {
            tolerance: 1e-14,
            max_iterations: 2,
            restart: 2,
        };
        let out = solve_gmres(&a, &b, None, &settings).unwrap();
        assert!(!out.report.converged);
        assert_eq!(out.report.iterations, 2);
        assert!(out.report.residual > 1e-14);
    }
}
