//! Error type shared by every stage of the harmonic pipeline.

use resona_compute::ComputeError;
use resona_geometry::GridError;
use resona_materials::MaterialError;
use thiserror::Error;

/// Errors that can occur while assembling operators, solving, or running
/// the harmonic cascade.
#[derive(Debug, Error)]
pub enum ResonaError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },

    #[error("No coupling rule for harmonic order {order} (table covers orders 1..={max_order})")]
    UnsupportedOrder { order: usize, max_order: usize },

    #[error("Trimmed box is empty at tolerance {tolerance:.3e}")]
    EmptyTrimmedBox { tolerance: f64 },

    #[error("Invalid scattering region: {0}")]
    InvalidRegion(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Solver failed to converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    #[error("Non-finite value in {0}")]
    NonFiniteField(String),

    #[error("Linear algebra error: {0}")]
    LinAlgError(String),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ResonaError {
    pub(crate) fn shape(expected: &[usize], got: &[usize]) -> Self {
        ResonaError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
