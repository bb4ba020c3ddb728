//! Core types shared across the harmonic pipeline.

use std::sync::Arc;

use ndarray::Array3;
use num_complex::Complex64;
use resona_geometry::VoxelGrid;
use serde::{Deserialize, Serialize};

use crate::error::ResonaError;

/// The pressure field of one harmonic on the grid it was computed on.
///
/// Order 0 is the fundamental; order `n` oscillates at `(n + 1) f1`.
#[derive(Debug, Clone)]
pub struct HarmonicField {
    pub order: usize,
    /// Frequency of this harmonic (Hz).
    pub frequency: f64,
    /// Background wavenumber at `frequency` (m⁻¹).
    pub wavenumber: Complex64,
    pub grid: Arc<VoxelGrid>,
    /// Complex pressure amplitude (Pa).
    pub values: Array3<Complex64>,
}

impl HarmonicField {
    pub fn new(
        order: usize,
        frequency: f64,
        wavenumber: Complex64,
        grid: Arc<VoxelGrid>,
        values: Array3<Complex64>,
    ) -> Result<Self, ResonaError> {
        grid.check_shape(values.shape())?;
        check_finite(&values, &format!("harmonic order {order}"))?;
        Ok(Self {
            order,
            frequency,
            wavenumber,
            grid,
            values,
        })
    }

    /// Harmonic number `order + 1`.
    pub fn harmonic(&self) -> usize {
        self.order + 1
    }

    /// Largest pressure magnitude on the grid (Pa).
    pub fn peak(&self) -> f64 {
        self.values.iter().map(|v| v.norm()).fold(0.0, f64::max)
    }

    /// The field along the grid's central x-line.
    pub fn axis_line(&self) -> AxisLine {
        AxisLine::sample(&self.grid, &self.values)
    }
}

/// Field values along the central line parallel to x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisLine {
    /// Voxel-centre x coordinates (m).
    pub x: Vec<f64>,
    pub values: Vec<Complex64>,
}

impl AxisLine {
    /// Sample `field` at `(i, floor(M/2), floor(N/2))` for every `i`.
    pub fn sample(grid: &VoxelGrid, field: &Array3<Complex64>) -> Self {
        let (j, k) = grid.centre_line();
        let (l, _, _) = field.dim();
        Self {
            x: grid.axis_coordinates(0),
            values: (0..l).map(|i| field[[i, j, k]]).collect(),
        }
    }

    pub fn magnitudes(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.norm()).collect()
    }
}

/// Reject fields containing NaN or infinite entries.
pub fn check_finite(field: &Array3<Complex64>, what: &str) -> Result<(), ResonaError> {
    if field.iter().all(|v| v.re.is_finite() && v.im.is_finite()) {
        Ok(())
    } else {
        Err(ResonaError::NonFiniteField(what.to_string()))
    }
}
