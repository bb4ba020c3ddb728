//! Rigid transformations used to position and steer transducers.
//!
//! A [`Transform`] is a linear map followed by a translation. Bowl
//! transducers are tilted with [`Transform::rotation_about_y`], which pivots
//! around a fixed point so that the geometric focus can be held in place.

use nalgebra::{Matrix3, Rotation3, Vector3};

/// An affine transformation: linear part + translation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// 3x3 rotation matrix.
    pub matrix: Matrix3<f64>,
    /// Translation vector (m).
    pub translation: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl Transform {
    /// Create a pure translation.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::new(dx, dy, dz),
        }
    }

    /// Rotation by `angle` radians about the y-axis through the origin.
    ///
    /// Positive angles turn +x towards -z (right-handed about +y).
    pub fn rotation_y(angle: f64) -> Self {
        let rot = Rotation3::from_axis_angle(&Vector3::y_axis(), angle);
        Self {
            matrix: *rot.matrix(),
            translation: Vector3::zeros(),
        }
    }

    /// Rotation by `angle` radians about the y-parallel axis through `pivot`.
    pub fn rotation_about_y(angle: f64, pivot: [f64; 3]) -> Self {
        Transform::translation(-pivot[0], -pivot[1], -pivot[2])
            .then(&Transform::rotation_y(angle))
            .then(&Transform::translation(pivot[0], pivot[1], pivot[2]))
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix3::identity() && self.translation == Vector3::zeros()
    }

    /// Apply this transformation to a 3D point.
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        let v = Vector3::new(point[0], point[1], point[2]);
        let result = self.matrix * v + self.translation;
        [result.x, result.y, result.z]
    }

    /// Compose two transforms: self followed by other.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            matrix: other.matrix * self.matrix,
            translation: other.matrix * self.translation + other.translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_identity_transform() {
        let t = Transform::default();
        assert!(t.is_identity());
        let result = t.apply(&[1.0, 2.0, 3.0]);
        assert_eq!(result, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_quarter_turn_about_y() {
        let t = Transform::rotation_y(std::f64::consts::FRAC_PI_2);
        let r = t.apply(&[1.0, 0.0, 0.0]);
        assert_abs_diff_eq!(r[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(r[2], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pivot_is_fixed() {
        let pivot = [0.06, 0.0, 0.0];
        let t = Transform::rotation_about_y(0.3, pivot);
        let p = t.apply(&pivot);
        for a in 0..3 {
            assert_abs_diff_eq!(p[a], pivot[a], epsilon = 1e-15);
        }
        // Distances to the pivot are preserved.
        let q = t.apply(&[0.0, 0.01, 0.0]);
        let d0 = (0.06f64.powi(2) + 0.01f64.powi(2)).sqrt();
        let d1 = ((q[0] - 0.06).powi(2) + q[1].powi(2) + q[2].powi(2)).sqrt();
        assert_abs_diff_eq!(d0, d1, epsilon = 1e-14);
    }
}
