//! Material provider trait.
//!
//! All material sources implement [`MaterialProvider`], which returns the
//! acoustic properties of a medium and, from them, its frequency-dependent
//! complex wavenumber.

use num_complex::Complex64;
use thiserror::Error;

use crate::properties::MaterialProperties;

/// Errors from material providers.
#[derive(Debug, Error)]
pub enum MaterialError {
    #[error("Invalid material parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Material not found: {0}")]
    NotFound(String),

    #[error("Invalid frequency: {0} Hz (must be finite and positive)")]
    InvalidFrequency(f64),
}

/// Provides acoustic properties of a propagation medium.
pub trait MaterialProvider: Send + Sync {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Small-signal acoustic properties.
    fn properties(&self) -> MaterialProperties;

    /// Complex wavenumber $k = \omega / c + i\alpha(f)$ at frequency `f` (Hz).
    fn wavenumber(&self, frequency: f64) -> Result<Complex64, MaterialError> {
        self.properties().wavenumber(frequency)
    }
}
