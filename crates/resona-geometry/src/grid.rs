//! Uniform voxel grids.
//!
//! A [`VoxelGrid`] is cell-centred: `origin` is the centre of voxel
//! `(0, 0, 0)` and voxel `(i, j, k)` sits at `origin + (i, j, k) * dx`. The
//! grid therefore covers the faces `origin - dx/2` to
//! `origin + (dims - 1/2) * dx`, and its extents are `dims * dx`.
//!
//! Grids are immutable. Refinement produces a new grid, which the
//! [`GridManager`] publishes as a fresh `Arc<VoxelGrid>` so that fields
//! computed on earlier grids keep a handle to the grid they live on.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Slack (in voxels) subtracted before rounding a voxel count up, so that an
/// extent which is an exact multiple of the spacing does not gain a plane
/// from floating-point noise.
const COUNT_EPSILON: f64 = 1e-9;

/// Errors from grid construction, refinement and interpolation.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Invalid voxel spacing: {0} (must be finite and positive)")]
    InvalidSpacing(f64),

    #[error("Invalid extent along axis {axis}: {value} (must be finite and positive)")]
    InvalidExtent { axis: usize, value: f64 },

    #[error("Invalid refinement factor: {0} (must be finite and >= 1)")]
    InvalidFactor(f64),

    #[error("Index box {min:?}..={max:?} does not fit grid dimensions {dims:?}")]
    BoxOutOfBounds {
        min: [usize; 3],
        max: [usize; 3],
        dims: [usize; 3],
    },

    #[error("Field shape {got:?} does not match grid dimensions {expected:?}")]
    ShapeMismatch { expected: [usize; 3], got: Vec<usize> },

    #[error("Non-finite value produced while sampling at {point:?}")]
    NonFiniteSample { point: [f64; 3] },
}

/// Inclusive per-axis voxel index box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBox {
    pub min: [usize; 3],
    pub max: [usize; 3],
}

impl IndexBox {
    /// Box from inclusive bounds, or `None` if `min > max` on any axis.
    pub fn new(min: [usize; 3], max: [usize; 3]) -> Option<Self> {
        (0..3).all(|a| min[a] <= max[a]).then_some(Self { min, max })
    }

    /// The box covering every voxel of a grid with the given dimensions.
    pub fn full(dims: [usize; 3]) -> Self {
        Self {
            min: [0; 3],
            max: [dims[0] - 1, dims[1] - 1, dims[2] - 1],
        }
    }

    /// Smallest box containing every index yielded, or `None` if empty.
    pub fn enclosing<I>(indices: I) -> Option<Self>
    where
        I: IntoIterator<Item = [usize; 3]>,
    {
        let mut iter = indices.into_iter();
        let first = iter.next()?;
        let mut bbox = Self {
            min: first,
            max: first,
        };
        for idx in iter {
            for a in 0..3 {
                bbox.min[a] = bbox.min[a].min(idx[a]);
                bbox.max[a] = bbox.max[a].max(idx[a]);
            }
        }
        Some(bbox)
    }

    pub fn dims(&self) -> [usize; 3] {
        [
            self.max[0] - self.min[0] + 1,
            self.max[1] - self.min[1] + 1,
            self.max[2] - self.min[2] + 1,
        ]
    }

    /// Number of voxels in the box.
    pub fn volume(&self) -> usize {
        let d = self.dims();
        d[0] * d[1] * d[2]
    }

    pub fn contains(&self, idx: [usize; 3]) -> bool {
        (0..3).all(|a| idx[a] >= self.min[a] && idx[a] <= self.max[a])
    }

    pub fn contains_box(&self, other: &IndexBox) -> bool {
        self.contains(other.min) && self.contains(other.max)
    }

    /// Whether the box lies inside a grid of the given dimensions.
    pub fn fits(&self, dims: [usize; 3]) -> bool {
        (0..3).all(|a| self.max[a] < dims[a])
    }
}

/// A uniform, isotropic, cell-centred voxel grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxelGrid {
    origin: [f64; 3],
    spacing: f64,
    dims: [usize; 3],
}

impl VoxelGrid {
    /// Build a grid from the centre of its first voxel, the spacing, and the
    /// voxel counts `(L, M, N)`.
    pub fn new(origin: [f64; 3], spacing: f64, dims: [usize; 3]) -> Result<Self, GridError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(GridError::InvalidSpacing(spacing));
        }
        for (axis, &n) in dims.iter().enumerate() {
            if n == 0 {
                return Err(GridError::InvalidExtent { axis, value: 0.0 });
            }
        }
        Ok(Self {
            origin,
            spacing,
            dims,
        })
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Dimensions as an `ndarray` shape tuple.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.dims[0], self.dims[1], self.dims[2])
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn voxel_volume(&self) -> f64 {
        self.spacing.powi(3)
    }

    /// Physical extents `dims * dx` (m).
    pub fn extents(&self) -> [f64; 3] {
        [
            self.dims[0] as f64 * self.spacing,
            self.dims[1] as f64 * self.spacing,
            self.dims[2] as f64 * self.spacing,
        ]
    }

    /// Position of the near faces (m).
    pub fn lower_face(&self) -> [f64; 3] {
        let h = 0.5 * self.spacing;
        [self.origin[0] - h, self.origin[1] - h, self.origin[2] - h]
    }

    /// Position of the far faces (m).
    pub fn upper_face(&self) -> [f64; 3] {
        let mut face = [0.0; 3];
        for a in 0..3 {
            face[a] = self.origin[a] + (self.dims[a] as f64 - 0.5) * self.spacing;
        }
        face
    }

    /// Geometric centre of the grid (m).
    pub fn centre(&self) -> [f64; 3] {
        let mut c = [0.0; 3];
        for a in 0..3 {
            c[a] = self.origin[a] + 0.5 * (self.dims[a] as f64 - 1.0) * self.spacing;
        }
        c
    }

    /// Centre of voxel `idx` (m).
    pub fn coordinate(&self, idx: [usize; 3]) -> [f64; 3] {
        [
            self.origin[0] + idx[0] as f64 * self.spacing,
            self.origin[1] + idx[1] as f64 * self.spacing,
            self.origin[2] + idx[2] as f64 * self.spacing,
        ]
    }

    /// Voxel-centre coordinates along one axis.
    pub fn axis_coordinates(&self, axis: usize) -> Vec<f64> {
        (0..self.dims[axis])
            .map(|i| self.origin[axis] + i as f64 * self.spacing)
            .collect()
    }

    /// All voxel centres in row-major (x slowest, z fastest) order.
    pub fn points(&self) -> Vec<[f64; 3]> {
        let [l, m, n] = self.dims;
        let mut pts = Vec::with_capacity(self.len());
        for i in 0..l {
            for j in 0..m {
                for k in 0..n {
                    pts.push(self.coordinate([i, j, k]));
                }
            }
        }
        pts
    }

    /// Transverse indices of the central line parallel to x.
    pub fn centre_line(&self) -> (usize, usize) {
        (self.dims[1] / 2, self.dims[2] / 2)
    }

    /// The box-local grid covering `bbox`, sharing this grid's spacing.
    pub fn sub_grid(&self, bbox: &IndexBox) -> Result<VoxelGrid, GridError> {
        if !bbox.fits(self.dims) {
            return Err(GridError::BoxOutOfBounds {
                min: bbox.min,
                max: bbox.max,
                dims: self.dims,
            });
        }
        VoxelGrid::new(self.coordinate(bbox.min), self.spacing, bbox.dims())
    }

    /// Reject an array whose shape differs from the grid dimensions.
    pub fn check_shape(&self, shape: &[usize]) -> Result<(), GridError> {
        if shape != &self.dims[..] {
            return Err(GridError::ShapeMismatch {
                expected: self.dims,
                got: shape.to_vec(),
            });
        }
        Ok(())
    }
}

fn voxel_count(axis: usize, extent: f64, spacing: f64) -> Result<usize, GridError> {
    if !(extent.is_finite() && extent > 0.0) {
        return Err(GridError::InvalidExtent {
            axis,
            value: extent,
        });
    }
    Ok(((extent / spacing - COUNT_EPSILON).ceil() as usize).max(1))
}

/// Lay out a grid covering `extents` at the given spacing.
///
/// The first plane of voxel centres sits at `x = anchor[0]` (the transducer
/// side of the domain) and the transverse axes are centred on
/// `(anchor[1], anchor[2])`. Each axis holds `ceil(extent / dx)` voxels.
pub fn generate_grid(spacing: f64, extents: [f64; 3], anchor: [f64; 3]) -> Result<VoxelGrid, GridError> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(GridError::InvalidSpacing(spacing));
    }
    let mut dims = [0usize; 3];
    for a in 0..3 {
        dims[a] = voxel_count(a, extents[a], spacing)?;
    }
    let origin = [
        anchor[0],
        anchor[1] - 0.5 * (dims[1] as f64 - 1.0) * spacing,
        anchor[2] - 0.5 * (dims[2] as f64 - 1.0) * spacing,
    ];
    VoxelGrid::new(origin, spacing, dims)
}

/// Lay out a single-plane grid (`N = 1`) in the `z = anchor[2]` plane.
pub fn generate_grid_2d(spacing: f64, extents: [f64; 2], anchor: [f64; 3]) -> Result<VoxelGrid, GridError> {
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(GridError::InvalidSpacing(spacing));
    }
    let l = voxel_count(0, extents[0], spacing)?;
    let m = voxel_count(1, extents[1], spacing)?;
    let origin = [anchor[0], anchor[1] - 0.5 * (m as f64 - 1.0) * spacing, anchor[2]];
    VoxelGrid::new(origin, spacing, [l, m, 1])
}

/// Refine a grid by `factor`: spacing and extents shrink by the same factor.
///
/// The far x-face of the refined grid coincides with the far x-face of the
/// input grid and the transverse centre is unchanged, so the refined domain
/// retreats towards the focal region as higher harmonics concentrate there.
pub fn refine_grid(grid: &VoxelGrid, factor: f64) -> Result<VoxelGrid, GridError> {
    if !(factor.is_finite() && factor >= 1.0) {
        return Err(GridError::InvalidFactor(factor));
    }
    let spacing = grid.spacing() / factor;
    let extents = grid.extents();
    let mut dims = [0usize; 3];
    for a in 0..3 {
        dims[a] = voxel_count(a, extents[a] / factor, spacing)?;
    }

    let far_x = grid.upper_face()[0];
    let centre = grid.centre();
    let origin = [
        far_x - (dims[0] as f64 - 0.5) * spacing,
        centre[1] - 0.5 * (dims[1] as f64 - 1.0) * spacing,
        centre[2] - 0.5 * (dims[2] as f64 - 1.0) * spacing,
    ];
    VoxelGrid::new(origin, spacing, dims)
}

/// Owns the lifecycle of the current computational grid.
#[derive(Debug, Clone)]
pub struct GridManager {
    current: Arc<VoxelGrid>,
    generation: usize,
}

impl GridManager {
    pub fn new(grid: VoxelGrid) -> Self {
        Self {
            current: Arc::new(grid),
            generation: 0,
        }
    }

    /// Generate the initial grid; see [`generate_grid`].
    pub fn generate(spacing: f64, extents: [f64; 3], anchor: [f64; 3]) -> Result<Self, GridError> {
        Ok(Self::new(generate_grid(spacing, extents, anchor)?))
    }

    pub fn current(&self) -> Arc<VoxelGrid> {
        Arc::clone(&self.current)
    }

    /// How many refinements have been applied.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Replace the current grid with its refinement and return it.
    pub fn refine(&mut self, factor: f64) -> Result<Arc<VoxelGrid>, GridError> {
        let refined = refine_grid(&self.current, factor)?;
        log::info!(
            "Refined grid (generation {}): dx {:.4e} -> {:.4e} m, dims {:?}",
            self.generation + 1,
            self.current.spacing(),
            refined.spacing(),
            refined.dims()
        );
        self.current = Arc::new(refined);
        self.generation += 1;
        Ok(self.current())
    }
}
