//! Interpolation of complex voxel fields onto arbitrary points or grids.
//!
//! Fields are cell-centred. A point belongs to the source domain when it lies
//! between the outer voxel faces; outside, the [`OutOfDomain`] policy decides
//! whether the sample is zero or taken from the nearest boundary value.
//! Trilinear sampling between the outermost centre and the face holds the
//! boundary value constant.

use ndarray::Array3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::grid::{GridError, VoxelGrid};

/// Tolerance (in voxels) for treating a point on an outer face as inside.
const FACE_TOLERANCE: f64 = 1e-9;

/// How values between voxel centres are reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterpolationMethod {
    /// Value of the voxel containing the point.
    #[default]
    Nearest,
    /// Trilinear blend of the eight surrounding voxel centres.
    Trilinear,
}

/// What to return for points outside the source domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutOfDomain {
    /// Treat the field as zero outside the domain.
    #[default]
    Zero,
    /// Project the point onto the domain and sample there.
    Clamp,
}

#[inline]
fn clamp_f64(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Continuous cell-centred index of `x` along one axis.
#[inline]
fn continuous_index(x: f64, origin: f64, spacing: f64) -> f64 {
    (x - origin) / spacing
}

#[inline]
fn lerp(a: Complex64, b: Complex64, t: f64) -> Complex64 {
    a + (b - a) * t
}

/// Lower neighbour index and blend weight along an axis of `n` voxels.
#[inline]
fn bracket(u: f64, n: usize) -> (usize, usize, f64) {
    if n == 1 {
        return (0, 0, 0.0);
    }
    let u = clamp_f64(u, 0.0, (n - 1) as f64);
    let i0 = (u.floor() as usize).min(n - 2);
    (i0, i0 + 1, u - i0 as f64)
}

fn sample(
    grid: &VoxelGrid,
    field: &Array3<Complex64>,
    point: &[f64; 3],
    method: InterpolationMethod,
    fallback: OutOfDomain,
) -> Complex64 {
    let origin = grid.origin();
    let dx = grid.spacing();
    let dims = grid.dims();

    let mut u = [0.0; 3];
    for a in 0..3 {
        let ua = continuous_index(point[a], origin[a], dx);
        let lo = -0.5 - FACE_TOLERANCE;
        let hi = dims[a] as f64 - 0.5 + FACE_TOLERANCE;
        if !(lo..=hi).contains(&ua) {
            match fallback {
                OutOfDomain::Zero => return Complex64::new(0.0, 0.0),
                OutOfDomain::Clamp => {}
            }
        }
        u[a] = clamp_f64(ua, -0.5, dims[a] as f64 - 0.5);
    }

    match method {
        InterpolationMethod::Nearest => {
            let idx = [0, 1, 2].map(|a| (u[a].round().max(0.0) as usize).min(dims[a] - 1));
            field[idx]
        }
        InterpolationMethod::Trilinear => {
            let (i0, i1, tx) = bracket(u[0], dims[0]);
            let (j0, j1, ty) = bracket(u[1], dims[1]);
            let (k0, k1, tz) = bracket(u[2], dims[2]);

            let c00 = lerp(field[[i0, j0, k0]], field[[i1, j0, k0]], tx);
            let c10 = lerp(field[[i0, j1, k0]], field[[i1, j1, k0]], tx);
            let c01 = lerp(field[[i0, j0, k1]], field[[i1, j0, k1]], tx);
            let c11 = lerp(field[[i0, j1, k1]], field[[i1, j1, k1]], tx);
            let c0 = lerp(c00, c10, ty);
            let c1 = lerp(c01, c11, ty);
            lerp(c0, c1, tz)
        }
    }
}

/// Sample `field` (living on `grid`) at each of `points`.
///
/// Returns [`GridError::ShapeMismatch`] if the field does not match the grid,
/// and [`GridError::NonFiniteSample`] if a sample is NaN or infinite.
pub fn interpolate(
    grid: &VoxelGrid,
    field: &Array3<Complex64>,
    points: &[[f64; 3]],
    method: InterpolationMethod,
    fallback: OutOfDomain,
) -> Result<Vec<Complex64>, GridError> {
    grid.check_shape(field.shape())?;
    points
        .iter()
        .map(|p| {
            let v = sample(grid, field, p, method, fallback);
            if v.re.is_finite() && v.im.is_finite() {
                Ok(v)
            } else {
                Err(GridError::NonFiniteSample { point: *p })
            }
        })
        .collect()
}

/// Resample `field` from `source` onto every voxel centre of `target`.
pub fn remap(
    source: &VoxelGrid,
    field: &Array3<Complex64>,
    target: &VoxelGrid,
    method: InterpolationMethod,
    fallback: OutOfDomain,
) -> Result<Array3<Complex64>, GridError> {
    source.check_shape(field.shape())?;
    let out = Array3::from_shape_fn(target.shape(), |(i, j, k)| {
        sample(source, field, &target.coordinate([i, j, k]), method, fallback)
    });
    if let Some(((i, j, k), _)) = out
        .indexed_iter()
        .find(|(_, v)| !(v.re.is_finite() && v.im.is_finite()))
    {
        return Err(GridError::NonFiniteSample {
            point: target.coordinate([i, j, k]),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{generate_grid, refine_grid};
    use approx::assert_abs_diff_eq;

    fn ramp_grid() -> (VoxelGrid, Array3<Complex64>) {
        let grid = VoxelGrid::new([0.0; 3], 1.0, [4, 3, 2]).unwrap();
        let field = Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
            Complex64::new(i as f64 + 10.0 * j as f64, k as f64)
        });
        (grid, field)
    }

    #[test]
    fn test_nearest_at_centres_is_exact() {
        let (grid, field) = ramp_grid();
        let pts = grid.points();
        let vals = interpolate(&grid, &field, &pts, InterpolationMethod::Nearest, OutOfDomain::Zero).unwrap();
        for (v, f) in vals.iter().zip(field.iter()) {
            assert_eq!(v, f);
        }
    }

    #[test]
    fn test_trilinear_reproduces_linear_field() {
        let (grid, field) = ramp_grid();
        let v = interpolate(
            &grid,
            &field,
            &[[1.25, 0.5, 0.75]],
            InterpolationMethod::Trilinear,
            OutOfDomain::Zero,
        )
        .unwrap()[0];
        assert_abs_diff_eq!(v.re, 1.25 + 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v.im, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_domain_zero_and_clamp() {
        let (grid, field) = ramp_grid();
        let outside = [[10.0, 1.0, 0.0]];
        let zero = interpolate(&grid, &field, &outside, InterpolationMethod::Trilinear, OutOfDomain::Zero).unwrap();
        assert_eq!(zero[0], Complex64::new(0.0, 0.0));

        let clamped =
            interpolate(&grid, &field, &outside, InterpolationMethod::Trilinear, OutOfDomain::Clamp).unwrap();
        assert_eq!(clamped[0], field[[3, 1, 0]]);
    }

    #[test]
    fn test_point_on_outer_face_is_inside() {
        let (grid, field) = ramp_grid();
        let face = [[3.5, 0.0, 0.0]];
        let v = interpolate(&grid, &field, &face, InterpolationMethod::Nearest, OutOfDomain::Zero).unwrap();
        assert_eq!(v[0], field[[3, 0, 0]]);
    }

    #[test]
    fn test_non_finite_is_rejected() {
        let (grid, mut field) = ramp_grid();
        field[[0, 0, 0]] = Complex64::new(f64::NAN, 0.0);
        let res = interpolate(&grid, &field, &[[0.0; 3]], InterpolationMethod::Nearest, OutOfDomain::Zero);
        assert!(matches!(res, Err(GridError::NonFiniteSample { .. })));
    }

    #[test]
    fn test_remap_onto_refined_grid() {
        let grid = generate_grid(1.0, [8.0, 4.0, 4.0], [0.0, 0.0, 0.0]).unwrap();
        let field = Array3::from_elem(grid.shape(), Complex64::new(2.0, -1.0));
        let fine = refine_grid(&grid, 2.0).unwrap();
        let out = remap(&grid, &field, &fine, InterpolationMethod::Trilinear, OutOfDomain::Zero).unwrap();
        assert_eq!(out.dim(), fine.shape());
        for v in out.iter() {
            assert_abs_diff_eq!(v.re, 2.0, epsilon = 1e-12);
            assert_abs_diff_eq!(v.im, -1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let (grid, _) = ramp_grid();
        let wrong = Array3::<Complex64>::zeros((2, 2, 2));
        assert!(matches!(
            interpolate(&grid, &wrong, &[[0.0; 3]], InterpolationMethod::Nearest, OutOfDomain::Zero),
            Err(GridError::ShapeMismatch { .. })
        ));
    }
}
