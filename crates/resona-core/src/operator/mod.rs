//! The volume potential operator.
//!
//! Convolution of a voxel source with the Helmholtz Green's function is
//! evaluated as a circulant product in Fourier space:
//!
//! 1. assemble the Toeplitz kernel at wavenumber `k` for the grid
//!    ([`VolumePotentialOperator::assemble`]),
//! 2. embed it in a doubled circulant tensor and transform it once,
//! 3. for each input, zero-pad, transform, multiply, inverse-transform and
//!    keep the `L × M × N` corner ([`VolumePotentialOperator::apply`]).
//!
//! The result depends only on `(k, grid shape, spacing)` and is linear in
//! the input.

pub mod apply;
pub mod greens;
pub mod kernel;

use std::sync::Arc;

use ndarray::Array3;
use num_complex::Complex64;
use resona_compute::{ComputeBackend, CpuBackend, FftDirection};
use resona_geometry::VoxelGrid;

use crate::error::ResonaError;
pub use kernel::{KernelCache, KernelOperator};

/// Assembles and applies Green's-function kernels on a compute backend.
#[derive(Clone)]
pub struct VolumePotentialOperator {
    backend: Arc<dyn ComputeBackend>,
}

impl std::fmt::Debug for VolumePotentialOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumePotentialOperator")
            .field("backend", &self.backend.device_info().name)
            .finish()
    }
}

impl VolumePotentialOperator {
    pub fn new(backend: Arc<dyn ComputeBackend>) -> Self {
        Self { backend }
    }

    /// Operator running on the multithreaded CPU backend.
    pub fn cpu() -> Self {
        Self::new(Arc::new(CpuBackend::new()))
    }

    pub fn backend(&self) -> &dyn ComputeBackend {
        self.backend.as_ref()
    }

    /// Assemble the volume potential kernel $G\,dx^3$ at wavenumber `k`.
    pub fn assemble(&self, k: Complex64, grid: &VoxelGrid) -> Result<KernelOperator, ResonaError> {
        self.assemble_scaled(k, grid, Complex64::new(1.0, 0.0))
    }

    /// Assemble `prefactor * G dx^3`, e.g. `k²·V` for the scattering
    /// equation.
    pub fn assemble_scaled(
        &self,
        k: Complex64,
        grid: &VoxelGrid,
        prefactor: Complex64,
    ) -> Result<KernelOperator, ResonaError> {
        if !(k.re.is_finite() && k.im.is_finite()) || k.norm() == 0.0 {
            return Err(ResonaError::InvalidParameter(format!(
                "wavenumber must be finite and non-zero, got {k}"
            )));
        }
        let dims = grid.dims();
        let dx = grid.spacing();
        let [_, m, n] = dims;

        let values = self.backend.parallel_fill(grid.len(), &move |idx| {
            let offset = [idx / (m * n), (idx / n) % m, idx % n];
            prefactor * greens::lattice_sample(offset, dx, k)
        });
        let toeplitz = Array3::from_shape_vec(grid.shape(), values)
            .map_err(|e| ResonaError::LinAlgError(e.to_string()))?;

        let padded = kernel::padded_shape(dims);
        let mut spectrum = kernel::embed_circulant(&toeplitz);
        self.backend.fft3(&mut spectrum, padded, FftDirection::Forward)?;
        log::debug!(
            "Assembled kernel: k = {:.4e}, dims {:?}, padded {:?}",
            k,
            dims,
            padded
        );

        Ok(KernelOperator {
            k,
            prefactor,
            dims,
            spacing: dx,
            toeplitz,
            spectrum,
        })
    }
}

impl Default for VolumePotentialOperator {
    fn default() -> Self {
        Self::cpu()
    }
}
