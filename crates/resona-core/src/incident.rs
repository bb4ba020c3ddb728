//! Incident fields: focused bowl transducers and synthetic sources.
//!
//! A bowl is a spherical cap of radius of curvature `R` whose axis is x,
//! with its apex at the origin and its geometric focus at `(R, 0, 0)`. The
//! radiated pressure is the Rayleigh integral over the cap,
//!
//! $$
//! p(\mathbf{r}) = -\frac{ik\,p_0}{2\pi} \int_S \frac{e^{ik|\mathbf{r} - \mathbf{r}'|}}{|\mathbf{r} - \mathbf{r}'|} \, dS',
//! $$
//!
//! evaluated by summing over ring-and-segment area elements.

use std::f64::consts::PI;

use ndarray::Array3;
use num_complex::Complex64;
use rayon::prelude::*;
use resona_geometry::transform::Transform;
use resona_geometry::VoxelGrid;
use resona_materials::MaterialProperties;
use serde::{Deserialize, Serialize};

use crate::error::ResonaError;

/// Points closer than this to the sphere containing the bowl are set to
/// zero, where the element sum is singular (m).
pub const BOWL_EXCLUSION_DISTANCE: f64 = 5.0e-4;

/// Default number of surface elements in the Rayleigh sum.
pub const DEFAULT_BOWL_ELEMENTS: usize = 4096;

/// A focused spherical-cap transducer with an optional central aperture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowlTransducer {
    /// Radius of curvature (m).
    pub radius_of_curvature: f64,
    /// Outer aperture radius (m).
    pub outer_radius: f64,
    /// Radius of the central hole (m); zero for a solid bowl.
    #[serde(default)]
    pub inner_radius: f64,
    /// Target number of area elements.
    #[serde(default = "default_elements")]
    pub n_elements: usize,
    /// Tilt about the y-axis through the focus (rad).
    #[serde(default)]
    pub rotation_y: f64,
    /// Surface pressure amplitude `p0` (Pa).
    #[serde(default = "default_surface_pressure")]
    pub surface_pressure: f64,
}

fn default_elements() -> usize {
    DEFAULT_BOWL_ELEMENTS
}

fn default_surface_pressure() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy)]
struct Element {
    position: [f64; 3],
    area: f64,
}

impl BowlTransducer {
    pub fn new(radius_of_curvature: f64, outer_radius: f64, inner_radius: f64) -> Result<Self, ResonaError> {
        let bowl = Self {
            radius_of_curvature,
            outer_radius,
            inner_radius,
            n_elements: DEFAULT_BOWL_ELEMENTS,
            rotation_y: 0.0,
            surface_pressure: 1.0,
        };
        bowl.validate()?;
        Ok(bowl)
    }

    pub fn validate(&self) -> Result<(), ResonaError> {
        let roc = self.radius_of_curvature;
        let ok = roc.is_finite()
            && roc > 0.0
            && self.inner_radius >= 0.0
            && self.inner_radius < self.outer_radius
            && self.outer_radius <= roc
            && self.n_elements > 0
            && self.rotation_y.is_finite()
            && self.surface_pressure.is_finite();
        if !ok {
            return Err(ResonaError::InvalidParameter(format!(
                "bowl geometry needs 0 <= inner < outer <= R and at least one element, got {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Polar angles of the inner and outer rims seen from the focus.
    fn rim_angles(&self) -> (f64, f64) {
        let roc = self.radius_of_curvature;
        ((self.inner_radius / roc).asin(), (self.outer_radius / roc).asin())
    }

    fn transform(&self) -> Transform {
        if self.rotation_y == 0.0 {
            Transform::default()
        } else {
            Transform::rotation_about_y(self.rotation_y, [self.radius_of_curvature, 0.0, 0.0])
        }
    }

    /// Geometric focus (m).
    pub fn focus(&self) -> [f64; 3] {
        self.transform().apply(&[self.radius_of_curvature, 0.0, 0.0])
    }

    /// Axial position of the outer rim plane before rotation (m).
    pub fn rim_depth(&self) -> f64 {
        let roc = self.radius_of_curvature;
        roc - (roc * roc - self.outer_radius * self.outer_radius).sqrt()
    }

    /// Radiating area of the cap minus the aperture cap (m²).
    pub fn surface_area(&self) -> f64 {
        let (t_in, t_out) = self.rim_angles();
        2.0 * PI * self.radius_of_curvature.powi(2) * (t_in.cos() - t_out.cos())
    }

    fn elements(&self) -> Vec<Element> {
        let roc = self.radius_of_curvature;
        let n_rings = ((self.n_elements as f64 / 4.0).sqrt().floor() as usize).max(1);
        let n_segments = (self.n_elements / n_rings).max(4);
        let (t_in, t_out) = self.rim_angles();
        let d_theta = (t_out - t_in) / n_rings as f64;
        let transform = self.transform();

        let mut elements = Vec::with_capacity(n_rings * n_segments);
        for ring in 0..n_rings {
            let ta = t_in + ring as f64 * d_theta;
            let tb = ta + d_theta;
            let theta = 0.5 * (ta + tb);
            let band = 2.0 * PI * roc * roc * (ta.cos() - tb.cos());
            let area = band / n_segments as f64;
            for seg in 0..n_segments {
                let phi = 2.0 * PI * (seg as f64 + 0.5) / n_segments as f64;
                let local = [
                    roc - roc * theta.cos(),
                    roc * theta.sin() * phi.cos(),
                    roc * theta.sin() * phi.sin(),
                ];
                elements.push(Element {
                    position: transform.apply(&local),
                    area,
                });
            }
        }
        elements
    }

    /// Radiated pressure at each of `points` for wavenumber `k`.
    pub fn incident_field(&self, k: Complex64, points: &[[f64; 3]]) -> Result<Vec<Complex64>, ResonaError> {
        self.validate()?;
        let elements = self.elements();
        let focus = self.focus();
        let roc = self.radius_of_curvature;
        let prefactor = -Complex64::i() * k * self.surface_pressure / (2.0 * PI);
        let zero = Complex64::new(0.0, 0.0);

        let values: Vec<Complex64> = points
            .par_iter()
            .map(|p| {
                let from_focus = ((p[0] - focus[0]).powi(2) + (p[1] - focus[1]).powi(2) + (p[2] - focus[2]).powi(2)).sqrt();
                if (from_focus - roc).abs() < BOWL_EXCLUSION_DISTANCE {
                    return zero;
                }
                let mut acc = zero;
                for e in &elements {
                    let r = ((p[0] - e.position[0]).powi(2)
                        + (p[1] - e.position[1]).powi(2)
                        + (p[2] - e.position[2]).powi(2))
                    .sqrt();
                    acc += (Complex64::i() * k * r).exp() * (e.area / r);
                }
                prefactor * acc
            })
            .collect();

        if values.iter().any(|v| !(v.re.is_finite() && v.im.is_finite())) {
            return Err(ResonaError::NonFiniteField("bowl incident field".into()));
        }
        Ok(values)
    }

    /// Radiated pressure at every voxel centre of `grid`.
    pub fn incident_on_grid(&self, k: Complex64, grid: &VoxelGrid) -> Result<Array3<Complex64>, ResonaError> {
        let values = self.incident_field(k, &grid.points())?;
        Array3::from_shape_vec(grid.shape(), values).map_err(|e| ResonaError::LinAlgError(e.to_string()))
    }
}

/// Surface pressure amplitude `p0 = sqrt(2 rho c P / A)` (Pa) that makes the
/// bowl radiate acoustic power `power` (W) into `material`.
pub fn normalise_power(
    power: f64,
    material: &MaterialProperties,
    transducer: &BowlTransducer,
) -> Result<f64, ResonaError> {
    if !(power.is_finite() && power >= 0.0) {
        return Err(ResonaError::InvalidParameter(format!("acoustic power must be non-negative, got {power}")));
    }
    transducer.validate()?;
    Ok((2.0 * material.impedance() * power / transducer.surface_area()).sqrt())
}

/// A real Gaussian bump, used as a synthetic fundamental field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianSource {
    /// Centre (m).
    pub centre: [f64; 3],
    /// Standard deviation (m).
    pub width: f64,
    /// Peak amplitude (Pa).
    pub amplitude: f64,
}

impl GaussianSource {
    pub fn on_grid(&self, grid: &VoxelGrid) -> Array3<Complex64> {
        let inv = 1.0 / (2.0 * self.width * self.width);
        Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
            let p = grid.coordinate([i, j, k]);
            let r2: f64 = (0..3).map(|a| (p[a] - self.centre[a]).powi(2)).sum();
            Complex64::new(self.amplitude * (-r2 * inv).exp(), 0.0)
        })
    }
}
