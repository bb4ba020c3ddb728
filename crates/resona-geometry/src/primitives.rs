//! Parametric primitives describing inclusions in the propagation medium.
//!
//! Each primitive defines a closed region in 3D space that can be voxelised
//! into a [`RegionMask`](crate::mask::RegionMask). Primitives are fully
//! described by their TOML parameters. All lengths are in metres.

use serde::{Deserialize, Serialize};

/// A closed region of space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Primitive {
    Sphere(Sphere),
    Slab(Slab),
    Cuboid(Cuboid),
    Cylinder(Cylinder),
    Ellipsoid(Ellipsoid),
}

/// A sphere defined by its centre and radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Centre position (m).
    pub centre: [f64; 3],
    /// Radius (m).
    pub radius: f64,
}

/// A layer perpendicular to the propagation axis, unbounded transversely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slab {
    /// Near face along x (m).
    pub x_min: f64,
    /// Far face along x (m).
    pub x_max: f64,
}

/// An axis-aligned cuboid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    /// Centre position (m).
    pub centre: [f64; 3],
    /// Half-extents along x, y, z (m).
    pub half_extents: [f64; 3],
}

/// A finite circular cylinder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    /// Centre of the bottom end-cap (m).
    pub base_centre: [f64; 3],
    /// Axis direction (normalised internally).
    pub axis: [f64; 3],
    /// Length along the axis (m).
    pub length: f64,
    /// Radius (m).
    pub radius: f64,
}

/// An axis-aligned ellipsoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    /// Centre position (m).
    pub centre: [f64; 3],
    /// Semi-axis lengths along x, y, z (m).
    pub semi_axes: [f64; 3],
}

fn unit(v: [f64; 3]) -> [f64; 3] {
    let n = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if n > 0.0 {
        [v[0] / n, v[1] / n, v[2] / n]
    } else {
        [1.0, 0.0, 0.0]
    }
}

impl Primitive {
    /// Check whether a point lies inside this primitive (boundary included).
    pub fn contains(&self, point: &[f64; 3]) -> bool {
        match self {
            Primitive::Sphere(s) => {
                let dx = point[0] - s.centre[0];
                let dy = point[1] - s.centre[1];
                let dz = point[2] - s.centre[2];
                dx * dx + dy * dy + dz * dz <= s.radius * s.radius
            }
            Primitive::Slab(s) => point[0] >= s.x_min && point[0] <= s.x_max,
            Primitive::Cuboid(c) => (0..3).all(|a| (point[a] - c.centre[a]).abs() <= c.half_extents[a]),
            Primitive::Cylinder(c) => {
                let a = unit(c.axis);
                let d = [
                    point[0] - c.base_centre[0],
                    point[1] - c.base_centre[1],
                    point[2] - c.base_centre[2],
                ];
                let t = d[0] * a[0] + d[1] * a[1] + d[2] * a[2];
                if t < 0.0 || t > c.length {
                    return false;
                }
                let r_sq = (0..3).map(|i| (d[i] - t * a[i]).powi(2)).sum::<f64>();
                r_sq <= c.radius * c.radius
            }
            Primitive::Ellipsoid(e) => {
                let s: f64 = (0..3)
                    .map(|a| ((point[a] - e.centre[a]) / e.semi_axes[a]).powi(2))
                    .sum();
                s <= 1.0
            }
        }
    }

    /// Axis-aligned bounding box: returns (min_corner, max_corner).
    ///
    /// Unbounded directions are reported as infinite.
    pub fn bounding_box(&self) -> ([f64; 3], [f64; 3]) {
        match self {
            Primitive::Sphere(s) => (s.centre.map(|c| c - s.radius), s.centre.map(|c| c + s.radius)),
            Primitive::Slab(s) => (
                [s.x_min, f64::NEG_INFINITY, f64::NEG_INFINITY],
                [s.x_max, f64::INFINITY, f64::INFINITY],
            ),
            Primitive::Cuboid(c) => {
                let mut lo = c.centre;
                let mut hi = c.centre;
                for a in 0..3 {
                    lo[a] -= c.half_extents[a];
                    hi[a] += c.half_extents[a];
                }
                (lo, hi)
            }
            Primitive::Cylinder(c) => {
                let a = unit(c.axis);
                let top = [
                    c.base_centre[0] + c.length * a[0],
                    c.base_centre[1] + c.length * a[1],
                    c.base_centre[2] + c.length * a[2],
                ];
                let mut lo = [0.0; 3];
                let mut hi = [0.0; 3];
                for i in 0..3 {
                    // Half-width of the end-cap disc projected onto axis i.
                    let reach = c.radius * (1.0 - a[i] * a[i]).max(0.0).sqrt();
                    lo[i] = c.base_centre[i].min(top[i]) - reach;
                    hi[i] = c.base_centre[i].max(top[i]) + reach;
                }
                (lo, hi)
            }
            Primitive::Ellipsoid(e) => {
                let mut lo = e.centre;
                let mut hi = e.centre;
                for a in 0..3 {
                    lo[a] -= e.semi_axes[a];
                    hi[a] += e.semi_axes[a];
                }
                (lo, hi)
            }
        }
    }
}
