//! Linear solvers for the scattering equation.
//!
//! The box-local system $(\mathbf{I} - k^2 V M_r)\,\mathbf{u} = \mathbf{u}_{\text{inc}}$
//! is solved either matrix-free with restarted GMRES ([`iterative`]) or,
//! for small boxes, by dense LU ([`direct`]). Both report how the solve went
//! through a [`SolveReport`]; callers decide what non-convergence means.

pub mod direct;
pub mod iterative;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::ResonaError;

/// A square linear map available only through its action on vectors.
pub trait LinearOperator {
    /// Number of unknowns.
    fn dim(&self) -> usize;

    /// Compute $\mathbf{A}\mathbf{x}$.
    fn apply(&self, x: &Array1<Complex64>) -> Result<Array1<Complex64>, ResonaError>;
}

impl LinearOperator for Array2<Complex64> {
    fn dim(&self) -> usize {
        self.nrows()
    }

    fn apply(&self, x: &Array1<Complex64>) -> Result<Array1<Complex64>, ResonaError> {
        if x.len() != self.ncols() {
            return Err(ResonaError::shape(&[self.ncols()], &[x.len()]));
        }
        Ok(self.dot(x))
    }
}

/// Which algorithm produced a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolveMethod {
    Direct,
    Gmres,
}

/// Outcome of a linear solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub method: SolveMethod,
    pub converged: bool,
    /// Matrix-vector products spent (zero for a direct solve).
    pub iterations: usize,
    /// Final relative residual $\|b - Ax\| / \|b\|$.
    pub residual: f64,
    /// Relative residual estimate after each iteration.
    pub residual_history: Vec<f64>,
}

pub(crate) fn norm(v: &Array1<Complex64>) -> f64 {
    v.iter().map(|z| z.norm_sqr()).sum::<f64>().sqrt()
}

/// Relative residual $\|b - Ax\| / \|b\|$ (absolute when $b = 0$).
pub fn relative_residual<A: LinearOperator + ?Sized>(
    op: &A,
    x: &Array1<Complex64>,
    b: &Array1<Complex64>,
) -> Result<f64, ResonaError> {
    let r = b - &op.apply(x)?;
    let b_norm = norm(b);
    let r_norm = norm(&r);
    Ok(if b_norm > 0.0 { r_norm / b_norm } else { r_norm })
}
