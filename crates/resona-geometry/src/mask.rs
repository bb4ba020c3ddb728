//! Voxelised regions and index-box extraction.

use ndarray::{s, Array3};
use num_complex::Complex64;

use crate::grid::{GridError, IndexBox, VoxelGrid};
use crate::primitives::Primitive;

/// Boolean occupancy of a grid: `true` where a voxel centre lies inside the
/// region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    inside: Array3<bool>,
}

impl RegionMask {
    /// Voxelise a single primitive by testing voxel centres.
    pub fn from_primitive(grid: &VoxelGrid, primitive: &Primitive) -> Self {
        Self::from_primitives(grid, std::slice::from_ref(primitive))
    }

    /// Voxelise the union of several primitives.
    pub fn from_primitives(grid: &VoxelGrid, primitives: &[Primitive]) -> Self {
        let inside = Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
            let p = grid.coordinate([i, j, k]);
            primitives.iter().any(|prim| prim.contains(&p))
        });
        Self { inside }
    }

    pub fn from_array(inside: Array3<bool>) -> Self {
        Self { inside }
    }

    pub fn as_array(&self) -> &Array3<bool> {
        &self.inside
    }

    pub fn dims(&self) -> [usize; 3] {
        let (l, m, n) = self.inside.dim();
        [l, m, n]
    }

    /// Number of voxels inside the region.
    pub fn count(&self) -> usize {
        self.inside.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.inside.iter().any(|&b| b)
    }

    /// Minimal inclusive index box around the region, `None` if empty.
    pub fn bounding_box(&self) -> Option<IndexBox> {
        IndexBox::enclosing(
            self.inside
                .indexed_iter()
                .filter(|(_, b)| **b)
                .map(|((i, j, k), _)| [i, j, k]),
        )
    }

    /// The part of the mask inside `bbox`.
    pub fn restrict(&self, bbox: &IndexBox) -> Result<RegionMask, GridError> {
        Ok(Self {
            inside: extract_box(&self.inside, bbox)?,
        })
    }

    /// Zero every value outside the region.
    pub fn apply(&self, field: &mut Array3<Complex64>) -> Result<(), GridError> {
        if field.dim() != self.inside.dim() {
            return Err(GridError::ShapeMismatch {
                expected: self.dims(),
                got: field.shape().to_vec(),
            });
        }
        ndarray::Zip::from(field).and(&self.inside).for_each(|v, &inside| {
            if !inside {
                *v = Complex64::new(0.0, 0.0);
            }
        });
        Ok(())
    }
}

/// Copy the values inside `bbox` into a box-sized array.
pub fn extract_box<T: Clone>(field: &Array3<T>, bbox: &IndexBox) -> Result<Array3<T>, GridError> {
    let (l, m, n) = field.dim();
    if !bbox.fits([l, m, n]) {
        return Err(GridError::BoxOutOfBounds {
            min: bbox.min,
            max: bbox.max,
            dims: [l, m, n],
        });
    }
    Ok(field
        .slice(s![
            bbox.min[0]..=bbox.max[0],
            bbox.min[1]..=bbox.max[1],
            bbox.min[2]..=bbox.max[2]
        ])
        .to_owned())
}

/// Place box-local `values` into a zero array of shape `dims`.
pub fn embed_box(values: &Array3<Complex64>, bbox: &IndexBox, dims: [usize; 3]) -> Result<Array3<Complex64>, GridError> {
    if !bbox.fits(dims) {
        return Err(GridError::BoxOutOfBounds {
            min: bbox.min,
            max: bbox.max,
            dims,
        });
    }
    let bd = bbox.dims();
    if values.shape() != &bd[..] {
        return Err(GridError::ShapeMismatch {
            expected: bd,
            got: values.shape().to_vec(),
        });
    }
    let mut out = Array3::zeros((dims[0], dims[1], dims[2]));
    out.slice_mut(s![
        bbox.min[0]..=bbox.max[0],
        bbox.min[1]..=bbox.max[1],
        bbox.min[2]..=bbox.max[2]
    ])
    .assign(values);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::generate_grid;
    use crate::primitives::{Slab, Sphere};

    #[test]
    fn test_sphere_mask_bbox() {
        let grid = generate_grid(1.0, [11.0, 11.0, 11.0], [0.0, 0.0, 0.0]).unwrap();
        let sphere = Primitive::Sphere(Sphere {
            centre: [5.0, 0.0, 0.0],
            radius: 2.0,
        });
        let mask = RegionMask::from_primitive(&grid, &sphere);
        let bbox = mask.bounding_box().unwrap();
        assert_eq!(bbox.min, [3, 3, 3]);
        assert_eq!(bbox.max, [7, 7, 7]);
        assert!(mask.count() > 0);
    }

    #[test]
    fn test_empty_mask_has_no_bbox() {
        let grid = generate_grid(1.0, [4.0; 3], [0.0; 3]).unwrap();
        let slab = Primitive::Slab(Slab {
            x_min: 100.0,
            x_max: 101.0,
        });
        let mask = RegionMask::from_primitive(&grid, &slab);
        assert!(mask.is_empty());
        assert!(mask.bounding_box().is_none());
    }

    #[test]
    fn test_extract_and_embed() {
        let field = Array3::from_shape_fn((4, 4, 4), |(i, j, k)| Complex64::new((i * 16 + j * 4 + k) as f64, 0.0));
        let bbox = IndexBox::new([1, 1, 2], [2, 3, 3]).unwrap();
        let part = extract_box(&field, &bbox).unwrap();
        assert_eq!(part.dim(), (2, 3, 2));
        assert_eq!(part[[0, 0, 0]], field[[1, 1, 2]]);

        let back = embed_box(&part, &bbox, [4, 4, 4]).unwrap();
        assert_eq!(back[[2, 3, 3]], field[[2, 3, 3]]);
        assert_eq!(back[[0, 0, 0]], Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_apply_zeroes_outside() {
        let mut inside = Array3::from_elem((2, 1, 1), false);
        inside[[1, 0, 0]] = true;
        let mask = RegionMask::from_array(inside);
        let mut field = Array3::from_elem((2, 1, 1), Complex64::new(1.0, 1.0));
        mask.apply(&mut field).unwrap();
        assert_eq!(field[[0, 0, 0]], Complex64::new(0.0, 0.0));
        assert_eq!(field[[1, 0, 0]], Complex64::new(1.0, 1.0));
    }
}
