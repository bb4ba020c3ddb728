//! CPU compute backend using Rayon for shared-memory parallelism and
//! RustFFT for the one-dimensional transforms.
//!
//! A 3D transform is three passes of 1D transforms. The innermost axis is
//! contiguous and is transformed row by row in parallel. The middle axis is
//! gathered column by column inside each x-plane, planes in parallel. The
//! outermost axis is transposed into a scratch buffer so that its lines
//! become contiguous, transformed, and transposed back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use num_complex::Complex64;
use rayon::prelude::*;
use rustfft::{Fft, FftPlanner};

use crate::backend::{check_shape, ComputeBackend, ComputeError, DeviceInfo, FftDirection};

type PlanKey = (usize, bool);

/// CPU backend that parallelises work across threads via Rayon.
pub struct CpuBackend {
    num_threads: usize,
    planner: Mutex<FftPlanner<f64>>,
    plans: Mutex<HashMap<PlanKey, Arc<dyn Fft<f64>>>>,
}

impl CpuBackend {
    /// Create a new CPU backend using all available threads.
    pub fn new() -> Self {
        Self::with_threads(rayon::current_num_threads())
    }

    /// Create a CPU backend reporting a specified thread count.
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads,
            planner: Mutex::new(FftPlanner::new()),
            plans: Mutex::new(HashMap::new()),
        }
    }

    fn plan(&self, len: usize, direction: FftDirection) -> Result<Arc<dyn Fft<f64>>, ComputeError> {
        let key = (len, direction == FftDirection::Forward);
        let mut plans = self
            .plans
            .lock()
            .map_err(|_| ComputeError::Unavailable("FFT plan cache poisoned".into()))?;
        if let Some(plan) = plans.get(&key) {
            return Ok(Arc::clone(plan));
        }
        let mut planner = self
            .planner
            .lock()
            .map_err(|_| ComputeError::Unavailable("FFT planner poisoned".into()))?;
        let plan = match direction {
            FftDirection::Forward => planner.plan_fft_forward(len),
            FftDirection::Inverse => planner.plan_fft_inverse(len),
        };
        log::debug!("Planned {:?} FFT of length {}", direction, len);
        plans.insert(key, Arc::clone(&plan));
        Ok(plan)
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Transform along the contiguous innermost axis.
fn fft_inner(data: &mut [Complex64], n2: usize, fft: &Arc<dyn Fft<f64>>) {
    data.par_chunks_mut(n2).for_each(|row| fft.process(row));
}

/// Transform along the middle axis, one x-plane per task.
fn fft_middle(data: &mut [Complex64], n1: usize, n2: usize, fft: &Arc<dyn Fft<f64>>) {
    data.par_chunks_mut(n1 * n2).for_each(|plane| {
        let mut column = vec![Complex64::new(0.0, 0.0); n1];
        for k in 0..n2 {
            for j in 0..n1 {
                column[j] = plane[j * n2 + k];
            }
            fft.process(&mut column);
            for j in 0..n1 {
                plane[j * n2 + k] = column[j];
            }
        }
    });
}

/// Transform along the outermost axis via a transpose into `scratch`.
fn fft_outer(data: &mut [Complex64], n0: usize, plane: usize, fft: &Arc<dyn Fft<f64>>) {
    let mut scratch = vec![Complex64::new(0.0, 0.0); data.len()];
    {
        let data_ro: &[Complex64] = &*data;
        scratch.par_chunks_mut(n0).enumerate().for_each(|(line, col)| {
            for i in 0..n0 {
                col[i] = data_ro[i * plane + line];
            }
            fft.process(col);
        });
    }
    let scratch_ro: &[Complex64] = &scratch;
    data.par_chunks_mut(plane).enumerate().for_each(|(i, slab)| {
        for (line, v) in slab.iter_mut().enumerate() {
            *v = scratch_ro[line * n0 + i];
        }
    });
}

impl ComputeBackend for CpuBackend {
    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: format!("CPU ({} threads)", self.num_threads),
            compute_units: Some(self.num_threads),
        }
    }

    fn fft3(&self, data: &mut [Complex64], shape: [usize; 3], direction: FftDirection) -> Result<(), ComputeError> {
        check_shape(data.len(), shape)?;
        if data.is_empty() {
            return Ok(());
        }
        let [n0, n1, n2] = shape;

        if n2 > 1 {
            fft_inner(data, n2, &self.plan(n2, direction)?);
        }
        if n1 > 1 {
            fft_middle(data, n1, n2, &self.plan(n1, direction)?);
        }
        if n0 > 1 {
            fft_outer(data, n0, n1 * n2, &self.plan(n0, direction)?);
        }

        if direction == FftDirection::Inverse {
            let scale = 1.0 / data.len() as f64;
            data.par_iter_mut().for_each(|v| *v *= scale);
        }
        Ok(())
    }

    fn multiply_in_place(&self, data: &mut [Complex64], other: &[Complex64]) -> Result<(), ComputeError> {
        if data.len() != other.len() {
            return Err(ComputeError::LengthMismatch {
                left: data.len(),
                right: other.len(),
            });
        }
        data.par_iter_mut()
            .zip_eq(other.par_iter())
            .for_each(|(a, b)| *a *= *b);
        Ok(())
    }

    fn parallel_fill(
        &self,
        len: usize,
        fill_fn: &(dyn Fn(usize) -> Complex64 + Send + Sync),
    ) -> Vec<Complex64> {
        (0..len).into_par_iter().map(fill_fn).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn naive_dft3(data: &[Complex64], shape: [usize; 3]) -> Vec<Complex64> {
        let [n0, n1, n2] = shape;
        let mut out = vec![Complex64::new(0.0, 0.0); data.len()];
        for a in 0..n0 {
            for b in 0..n1 {
                for c in 0..n2 {
                    let mut acc = Complex64::new(0.0, 0.0);
                    for i in 0..n0 {
                        for j in 0..n1 {
                            for k in 0..n2 {
                                let phase = -2.0
                                    * std::f64::consts::PI
                                    * ((a * i) as f64 / n0 as f64
                                        + (b * j) as f64 / n1 as f64
                                        + (c * k) as f64 / n2 as f64);
                                acc += data[(i * n1 + j) * n2 + k] * Complex64::from_polar(1.0, phase);
                            }
                        }
                    }
                    out[(a * n1 + b) * n2 + c] = acc;
                }
            }
        }
        out
    }

    fn sample(shape: [usize; 3]) -> Vec<Complex64> {
        let len = shape[0] * shape[1] * shape[2];
        (0..len)
            .map(|i| Complex64::new((i as f64 * 0.37).sin(), (i as f64 * 0.11).cos()))
            .collect()
    }

    #[test]
    fn test_fft3_matches_naive_dft() {
        let backend = CpuBackend::new();
        let shape = [4, 3, 5];
        let input = sample(shape);
        let expected = naive_dft3(&input, shape);
        let mut data = input.clone();
        backend.fft3(&mut data, shape, FftDirection::Forward).unwrap();
        for (got, want) in data.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-10);
            assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_fft3_round_trip_is_identity() {
        let backend = CpuBackend::new();
        let shape = [6, 2, 1];
        let input = sample(shape);
        let mut data = input.clone();
        backend.fft3(&mut data, shape, FftDirection::Forward).unwrap();
        backend.fft3(&mut data, shape, FftDirection::Inverse).unwrap();
        for (got, want) in data.iter().zip(input.iter()) {
            assert_abs_diff_eq!(got.re, want.re, epsilon = 1e-12);
            assert_abs_diff_eq!(got.im, want.im, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fft3_rejects_wrong_length() {
        let backend = CpuBackend::new();
        let mut data = vec![Complex64::new(0.0, 0.0); 7];
        assert!(matches!(
            backend.fft3(&mut data, [2, 2, 2], FftDirection::Forward),
            Err(ComputeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_multiply_in_place() {
        let backend = CpuBackend::default();
        let mut a = vec![Complex64::new(1.0, 1.0); 3];
        let b = vec![Complex64::new(0.0, 2.0); 3];
        backend.multiply_in_place(&mut a, &b).unwrap();
        assert_eq!(a[0], Complex64::new(-2.0, 2.0));
        assert!(backend.multiply_in_place(&mut a, &b[..2]).is_err());
    }

    #[test]
    fn test_parallel_fill_order() {
        let backend = CpuBackend::with_threads(2);
        let v = backend.parallel_fill(5, &|i| Complex64::new(i as f64, 0.0));
        assert_eq!(v[4], Complex64::new(4.0, 0.0));
        assert_eq!(backend.device_info().compute_units, Some(2));
    }
}
