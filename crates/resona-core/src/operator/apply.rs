//! FFT evaluation of a kernel against a voxel field.

use ndarray::Array3;
use num_complex::Complex64;
use rayon::prelude::*;
use resona_compute::FftDirection;

use super::{KernelOperator, VolumePotentialOperator};
use crate::error::ResonaError;

fn check_dims<T>(kernel: &KernelOperator, array: &Array3<T>) -> Result<(), ResonaError> {
    if array.shape() != &kernel.dims[..] {
        return Err(ResonaError::shape(&kernel.dims, array.shape()));
    }
    Ok(())
}

impl VolumePotentialOperator {
    /// Evaluate the kernel against `field`.
    ///
    /// The input is multiplied by `material` (a contrast) when given and
    /// zeroed outside `region`; the output is zeroed outside `region` as well.
    /// Every array must match the kernel's grid dimensions.
    pub fn apply(
        &self,
        kernel: &KernelOperator,
        field: &Array3<Complex64>,
        region: Option<&Array3<bool>>,
        material: Option<&Array3<Complex64>>,
    ) -> Result<Array3<Complex64>, ResonaError> {
        check_dims(kernel, field)?;
        if let Some(r) = region {
            check_dims(kernel, r)?;
        }
        if let Some(mr) = material {
            check_dims(kernel, mr)?;
        }

        let [l, m, n] = kernel.dims;
        let padded = kernel.padded_shape();
        let [_, pm, pn] = padded;
        let zero = Complex64::new(0.0, 0.0);

        let mut buffer = vec![zero; padded.iter().product()];
        buffer
            .par_chunks_mut(pm * pn)
            .take(l)
            .enumerate()
            .for_each(|(i, slab)| {
                for j in 0..m {
                    for k in 0..n {
                        let inside = region.map_or(true, |r| r[[i, j, k]]);
                        if !inside {
                            continue;
                        }
                        let mut v = field[[i, j, k]];
                        if let Some(mr) = material {
                            v *= mr[[i, j, k]];
                        }
                        slab[j * pn + k] = v;
                    }
                }
            });

        let backend = self.backend();
        backend.fft3(&mut buffer, padded, FftDirection::Forward)?;
        backend.multiply_in_place(&mut buffer, kernel.spectrum())?;
        backend.fft3(&mut buffer, padded, FftDirection::Inverse)?;

        let out = Array3::from_shape_fn((l, m, n), |(i, j, k)| {
            if region.map_or(true, |r| r[[i, j, k]]) {
                buffer[(i * pm + j) * pn + k]
            } else {
                zero
            }
        });
        Ok(out)
    }
}
