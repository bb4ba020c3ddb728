//! Accuracy of a volume potential versus the size of the source domain.
//!
//! For a decreasing ladder of tolerances `τ`, the source is trimmed to the
//! smallest index box holding every voxel with `|S| > τ·max|S|`, zeroed
//! outside that box, and propagated over the full grid. Comparing the
//! on-axis lines shows how far the domain can be cut before the field moves.

use ndarray::Array3;
use num_complex::Complex64;
use resona_geometry::mask::{embed_box, extract_box};
use resona_geometry::{IndexBox, VoxelGrid};
use serde::{Deserialize, Serialize};

use crate::error::ResonaError;
use crate::operator::{KernelOperator, VolumePotentialOperator};
use crate::types::AxisLine;

/// `10^{-0.5}, 10^{-0.75}, …, 10^{-4}`.
pub fn default_tolerances() -> Vec<f64> {
    (0..15).map(|i| 10f64.powf(-0.5 - 0.25 * i as f64)).collect()
}

/// Result of propagating the source trimmed at one tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceRecord {
    pub tolerance: f64,
    pub bbox: IndexBox,
    /// Lower face of the trimmed box (m).
    pub extent_min: [f64; 3],
    /// Upper face of the trimmed box (m).
    pub extent_max: [f64; 3],
    pub line: AxisLine,
}

/// Runs domain-truncation studies over a fixed tolerance ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceAnalyzer {
    tolerances: Vec<f64>,
}

impl ConvergenceAnalyzer {
    /// Tolerances are sorted into descending order.
    pub fn new(mut tolerances: Vec<f64>) -> Result<Self, ResonaError> {
        if tolerances.is_empty() {
            return Err(ResonaError::InvalidParameter("no convergence tolerances given".into()));
        }
        if let Some(bad) = tolerances.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(ResonaError::InvalidParameter(format!(
                "convergence tolerances must be positive, got {bad}"
            )));
        }
        tolerances.sort_by(|a, b| b.total_cmp(a));
        tolerances.dedup();
        Ok(Self { tolerances })
    }

    pub fn tolerances(&self) -> &[f64] {
        &self.tolerances
    }

    /// Propagate `source` once per tolerance.
    ///
    /// `kernel` must be assembled on `grid`. Fails with
    /// [`ResonaError::EmptyTrimmedBox`] at the first tolerance whose box is
    /// empty.
    pub fn study(
        &self,
        operator: &VolumePotentialOperator,
        kernel: &KernelOperator,
        source: &Array3<Complex64>,
        grid: &VoxelGrid,
    ) -> Result<Vec<ConvergenceRecord>, ResonaError> {
        grid.check_shape(source.shape())?;
        let mut records = Vec::with_capacity(self.tolerances.len());
        for &tolerance in &self.tolerances {
            let bbox = trimmed_box(source, tolerance)?;
            let trimmed = embed_box(&extract_box(source, &bbox)?, &bbox, grid.dims())?;
            let field = operator.apply(kernel, &trimmed, None, None)?;

            let half = 0.5 * grid.spacing();
            let lo = grid.coordinate(bbox.min);
            let hi = grid.coordinate(bbox.max);
            log::debug!(
                "Trimmed source at tolerance {:.3e}: box {:?}..={:?} ({} voxels)",
                tolerance,
                bbox.min,
                bbox.max,
                bbox.volume()
            );
            records.push(ConvergenceRecord {
                tolerance,
                bbox,
                extent_min: [lo[0] - half, lo[1] - half, lo[2] - half],
                extent_max: [hi[0] + half, hi[1] + half, hi[2] + half],
                line: AxisLine::sample(grid, &field),
            });
        }
        Ok(records)
    }
}

impl Default for ConvergenceAnalyzer {
    fn default() -> Self {
        Self {
            tolerances: default_tolerances(),
        }
    }
}

/// Inclusive bounding box of the voxels where `|S| > tolerance · max|S|`.
pub fn trimmed_box(source: &Array3<Complex64>, tolerance: f64) -> Result<IndexBox, ResonaError> {
    let peak = source.iter().map(|v| v.norm()).fold(0.0, f64::max);
    let threshold = tolerance * peak;
    IndexBox::enclosing(
        source
            .indexed_iter()
            .filter(|(_, v)| v.norm() > threshold)
            .map(|((i, j, k), _)| [i, j, k]),
    )
    .ok_or(ResonaError::EmptyTrimmedBox { tolerance })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::GaussianSource;
    use approx::assert_relative_eq;

    fn gaussian(grid: &VoxelGrid) -> Array3<Complex64> {
        GaussianSource {
            centre: grid.centre(),
            width: 3.0 * grid.spacing(),
            amplitude: 1.0,
        }
        .on_grid(grid)
    }

    #[test]
    fn test_default_tolerance_ladder() {
        let t = default_tolerances();
        assert_eq!(t.len(), 15);
        assert_relative_eq!(t[0], 10f64.powf(-0.5), max_relative = 1e-12);
        assert_relative_eq!(t[14], 1e-4, max_relative = 1e-12);
    }

    #[test]
    fn test_tolerances_sorted_descending() {
        let a = ConvergenceAnalyzer::new(vec![1e-3, 0.1, 1e-2]).unwrap();
        assert_eq!(a.tolerances(), &[0.1, 1e-2, 1e-3]);
        assert!(ConvergenceAnalyzer::new(vec![]).is_err());
        assert!(ConvergenceAnalyzer::new(vec![-0.1]).is_err());
    }

    #[test]
    fn test_trimmed_box_of_single_voxel() {
        let mut s = Array3::<Complex64>::zeros((5, 4, 3));
        s[[2, 1, 1]] = Complex64::new(0.0, 3.0);
        let b = trimmed_box(&s, 0.5).unwrap();
        assert_eq!(b, IndexBox::new([2, 1, 1], [2, 1, 1]).unwrap());
    }

    #[test]
    fn test_empty_box_cases() {
        let zero = Array3::<Complex64>::zeros((3, 3, 3));
        assert!(matches!(
            trimmed_box(&zero, 0.1),
            Err(ResonaError::EmptyTrimmedBox { .. })
        ));
        let mut s = zero.clone();
        s[[1, 1, 1]] = Complex64::new(1.0, 0.0);
        assert!(matches!(trimmed_box(&s, 1.0), Err(ResonaError::EmptyTrimmedBox { .. })));
    }

    #[test]
    fn test_box_grows_as_tolerance_falls() {
        let grid = VoxelGrid::new([0.0; 3], 1e-4, [12, 10, 10]).unwrap();
        let source = gaussian(&grid);
        let mut last = 0;
        for t in default_tolerances() {
            let v = trimmed_box(&source, t).unwrap().volume();
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn test_study_records_extents() {
        let grid = VoxelGrid::new([0.0; 3], 1e-4, [8, 6, 6]).unwrap();
        let op = VolumePotentialOperator::cpu();
        let kernel = op.assemble(Complex64::new(6000.0, 1.0), &grid).unwrap();
        let source = gaussian(&grid);
        let analyzer = ConvergenceAnalyzer::new(vec![0.5, 1e-3]).unwrap();
        let records = analyzer.study(&op, &kernel, &source, &grid).unwrap();

        assert_eq!(records.len(), 2);
        for r in &records {
            assert_eq!(r.line.x.len(), 8);
            let lo = grid.coordinate(r.bbox.min);
            assert_relative_eq!(r.extent_min[0], lo[0] - 0.5e-4, max_relative = 1e-12);
        }
        assert!(records[0].bbox.volume() <= records[1].bbox.volume());
    }
}
