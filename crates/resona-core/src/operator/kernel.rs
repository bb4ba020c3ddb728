//! Toeplitz kernels, their circulant embedding, and a small kernel cache.
//!
//! For a grid of `L × M × N` voxels the interaction between two voxels
//! depends only on their index offset, so the kernel is a Toeplitz tensor
//! `T[i, j, k]` over non-negative offsets. Embedding it in a
//! `2L × 2M × 2N` circulant tensor turns the aperiodic convolution into a
//! periodic one that FFTs evaluate exactly: along each axis, index `e < L`
//! holds offset `e`, index `L` is zero, and index `e > L` holds offset
//! `2L - e`.

use std::collections::VecDeque;
use std::sync::Arc;

use ndarray::Array3;
use num_complex::Complex64;
use resona_geometry::VoxelGrid;

use super::VolumePotentialOperator;
use crate::error::ResonaError;

/// An assembled, pre-transformed convolution kernel bound to a grid shape
/// and spacing.
#[derive(Debug, Clone)]
pub struct KernelOperator {
    pub(crate) k: Complex64,
    pub(crate) prefactor: Complex64,
    pub(crate) dims: [usize; 3],
    pub(crate) spacing: f64,
    pub(crate) toeplitz: Array3<Complex64>,
    pub(crate) spectrum: Vec<Complex64>,
}

impl KernelOperator {
    /// Wavenumber the kernel was sampled at.
    pub fn wavenumber(&self) -> Complex64 {
        self.k
    }

    /// Scalar folded into every kernel entry.
    pub fn prefactor(&self) -> Complex64 {
        self.prefactor
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Kernel entries over non-negative offsets (prefactor included).
    pub fn toeplitz(&self) -> &Array3<Complex64> {
        &self.toeplitz
    }

    /// Forward-transformed circulant embedding, row-major.
    pub fn spectrum(&self) -> &[Complex64] {
        &self.spectrum
    }

    pub fn padded_shape(&self) -> [usize; 3] {
        padded_shape(self.dims)
    }

    /// Kernel value coupling voxel `q` to voxel `p`.
    pub fn entry(&self, q: [usize; 3], p: [usize; 3]) -> Complex64 {
        self.toeplitz[[q[0].abs_diff(p[0]), q[1].abs_diff(p[1]), q[2].abs_diff(p[2])]]
    }

    /// Whether this kernel is valid for `(k, prefactor)` on `grid`.
    pub fn matches(&self, k: Complex64, prefactor: Complex64, grid: &VoxelGrid) -> bool {
        self.k == k && self.prefactor == prefactor && self.dims == grid.dims() && self.spacing == grid.spacing()
    }
}

pub fn padded_shape(dims: [usize; 3]) -> [usize; 3] {
    [2 * dims[0], 2 * dims[1], 2 * dims[2]]
}

/// Offset stored at embedding index `e` along an axis of `n` voxels.
#[inline]
pub(crate) fn circulant_offset(e: usize, n: usize) -> Option<usize> {
    match e.cmp(&n) {
        std::cmp::Ordering::Less => Some(e),
        std::cmp::Ordering::Equal => None,
        std::cmp::Ordering::Greater => Some(2 * n - e),
    }
}

/// Mirror a Toeplitz tensor into its `2L × 2M × 2N` circulant embedding.
pub fn embed_circulant(toeplitz: &Array3<Complex64>) -> Vec<Complex64> {
    let (l, m, n) = toeplitz.dim();
    let [pl, pm, pn] = padded_shape([l, m, n]);
    let zero = Complex64::new(0.0, 0.0);
    let mut out = vec![zero; pl * pm * pn];
    for e0 in 0..pl {
        let Some(o0) = circulant_offset(e0, l) else {
            continue;
        };
        for e1 in 0..pm {
            let Some(o1) = circulant_offset(e1, m) else {
                continue;
            };
            let row = (e0 * pm + e1) * pn;
            for e2 in 0..pn {
                if let Some(o2) = circulant_offset(e2, n) {
                    out[row + e2] = toeplitz[[o0, o1, o2]];
                }
            }
        }
    }
    out
}

/// Keeps the most recently assembled kernels.
///
/// Kernels are reused only on an exact match of wavenumber, prefactor, grid
/// dimensions and spacing; the grid origin does not enter the kernel.
#[derive(Debug)]
pub struct KernelCache {
    entries: VecDeque<Arc<KernelOperator>>,
    capacity: usize,
}

impl KernelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return a cached kernel for `(k, prefactor, grid)` or assemble one.
    pub fn get_or_assemble(
        &mut self,
        operator: &VolumePotentialOperator,
        k: Complex64,
        grid: &VoxelGrid,
        prefactor: Complex64,
    ) -> Result<Arc<KernelOperator>, ResonaError> {
        if let Some(hit) = self.entries.iter().find(|e| e.matches(k, prefactor, grid)) {
            log::debug!("Kernel cache hit: k = {:.4e}, dims {:?}", k, grid.dims());
            return Ok(Arc::clone(hit));
        }
        log::debug!("Kernel cache miss: k = {:.4e}, dims {:?}", k, grid.dims());
        let kernel = Arc::new(operator.assemble_scaled(k, grid, prefactor)?);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Arc::clone(&kernel));
        Ok(kernel)
    }
}

impl Default for KernelCache {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circulant_offsets() {
        let offs: Vec<Option<usize>> = (0..6).map(|e| circulant_offset(e, 3)).collect();
        assert_eq!(offs, vec![Some(0), Some(1), Some(2), None, Some(2), Some(1)]);
    }

    #[test]
    fn test_embedding_mirrors_and_zeroes_midplane() {
        let t = Array3::from_shape_fn((2, 1, 1), |(i, _, _)| Complex64::new(i as f64 + 1.0, 0.0));
        let c = embed_circulant(&t);
        // Shape (4, 2, 2); the y and z midplanes are zero.
        assert_eq!(c.len(), 16);
        let at = |a: usize, b: usize, d: usize| c[(a * 2 + b) * 2 + d];
        assert_eq!(at(0, 0, 0), Complex64::new(1.0, 0.0));
        assert_eq!(at(1, 0, 0), Complex64::new(2.0, 0.0));
        assert_eq!(at(2, 0, 0), Complex64::new(0.0, 0.0));
        assert_eq!(at(3, 0, 0), Complex64::new(2.0, 0.0));
        assert_eq!(at(0, 1, 0), Complex64::new(0.0, 0.0));
        assert_eq!(at(0, 0, 1), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_cache_reuses_and_evicts() {
        let op = VolumePotentialOperator::cpu();
        let grid = VoxelGrid::new([0.0; 3], 1e-3, [3, 3, 2]).unwrap();
        let one = Complex64::new(1.0, 0.0);
        let mut cache = KernelCache::new(2);
        let a = cache.get_or_assemble(&op, Complex64::new(1000.0, 1.0), &grid, one).unwrap();
        let b = cache.get_or_assemble(&op, Complex64::new(1000.0, 1.0), &grid, one).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        cache.get_or_assemble(&op, Complex64::new(2000.0, 1.0), &grid, one).unwrap();
        cache.get_or_assemble(&op, Complex64::new(3000.0, 1.0), &grid, one).unwrap();
        assert_eq!(cache.len(), 2);
        let c = cache.get_or_assemble(&op, Complex64::new(1000.0, 1.0), &grid, one).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
