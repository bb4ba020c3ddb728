//! Compute backend trait and device abstraction.
//!
//! The [`ComputeBackend`] trait abstracts over execution environments so
//! that the operator code in `resona-core` remains device-agnostic. Arrays
//! cross this boundary as flat row-major slices with an explicit 3D shape.

use num_complex::Complex64;
use thiserror::Error;

/// Errors originating from compute backends.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Backend not available: {0}")]
    Unavailable(String),

    #[error("Buffer of length {got} does not match shape {shape:?} ({expected} elements)")]
    ShapeMismatch {
        shape: [usize; 3],
        expected: usize,
        got: usize,
    },

    #[error("Operand lengths differ: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// Describes the capabilities of a compute backend.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub compute_units: Option<usize>,
}

/// Transform direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FftDirection {
    Forward,
    /// Inverse transform, normalised by the number of elements.
    Inverse,
}

/// Abstraction over compute backends.
pub trait ComputeBackend: Send + Sync {
    /// Return information about the device.
    fn device_info(&self) -> DeviceInfo;

    /// In-place 3D discrete Fourier transform of a row-major buffer.
    ///
    /// The forward transform uses the $e^{-2\pi i\,jk/n}$ convention. The
    /// inverse transform is scaled by $1/(n_0 n_1 n_2)$ so that a forward
    /// transform followed by an inverse one is the identity.
    fn fft3(&self, data: &mut [Complex64], shape: [usize; 3], direction: FftDirection) -> Result<(), ComputeError>;

    /// Element-wise product `data[i] *= other[i]`.
    fn multiply_in_place(&self, data: &mut [Complex64], other: &[Complex64]) -> Result<(), ComputeError>;

    /// Evaluate `fill_fn` at every flat index of a buffer of length `len`.
    ///
    /// Used to sample Green's-function kernels, where each entry is
    /// independent of the others.
    fn parallel_fill(
        &self,
        len: usize,
        fill_fn: &(dyn Fn(usize) -> Complex64 + Send + Sync),
    ) -> Vec<Complex64>;
}

/// Check that a flat buffer holds exactly `shape[0] * shape[1] * shape[2]`
/// elements.
pub fn check_shape(len: usize, shape: [usize; 3]) -> Result<(), ComputeError> {
    let expected = shape[0] * shape[1] * shape[2];
    if len != expected {
        return Err(ComputeError::ShapeMismatch {
            shape,
            expected,
            got: len,
        });
    }
    Ok(())
}
