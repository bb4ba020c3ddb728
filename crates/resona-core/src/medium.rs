//! Propagation media: a background with optional region-masked inclusions.

use ndarray::Array3;
use num_complex::Complex64;
use resona_geometry::{Primitive, RegionMask, VoxelGrid};
use resona_materials::MaterialProperties;
use serde::{Deserialize, Serialize};

use crate::error::ResonaError;

/// A region of the medium with its own properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inclusion {
    pub region: Primitive,
    pub properties: MaterialProperties,
}

/// Background material plus inclusions. Where inclusions overlap the later
/// one wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medium {
    pub background: MaterialProperties,
    #[serde(default)]
    pub inclusions: Vec<Inclusion>,
}

/// Per-voxel material properties sampled on a grid.
#[derive(Debug, Clone)]
pub struct MediumMap {
    pub c: Array3<f64>,
    pub rho: Array3<f64>,
    pub beta: Array3<f64>,
}

impl MediumMap {
    /// $\beta / (\rho c^4)$ at every voxel.
    pub fn nonlinear_coefficient(&self) -> Array3<f64> {
        let mut out = self.beta.clone();
        ndarray::Zip::from(&mut out)
            .and(&self.rho)
            .and(&self.c)
            .for_each(|b, &rho, &c| *b /= rho * c.powi(4));
        out
    }
}

/// The nonlinear source coefficient of a medium on a grid.
#[derive(Debug, Clone)]
pub enum Nonlinearity {
    Uniform(f64),
    PerVoxel(Array3<f64>),
}

impl Nonlinearity {
    #[inline]
    pub fn at(&self, idx: [usize; 3]) -> f64 {
        match self {
            Nonlinearity::Uniform(v) => *v,
            Nonlinearity::PerVoxel(a) => a[idx],
        }
    }
}

impl Medium {
    pub fn homogeneous(background: MaterialProperties) -> Self {
        Self {
            background,
            inclusions: Vec::new(),
        }
    }

    pub fn with_inclusion(mut self, region: Primitive, properties: MaterialProperties) -> Self {
        self.inclusions.push(Inclusion { region, properties });
        self
    }

    pub fn is_homogeneous(&self) -> bool {
        self.inclusions.is_empty()
    }

    pub fn validate(&self) -> Result<(), ResonaError> {
        self.background.validate()?;
        for inc in &self.inclusions {
            inc.properties.validate()?;
        }
        Ok(())
    }

    /// Properties at a point.
    pub fn properties_at(&self, point: &[f64; 3]) -> &MaterialProperties {
        self.inclusions
            .iter()
            .rev()
            .find(|inc| inc.region.contains(point))
            .map_or(&self.background, |inc| &inc.properties)
    }

    /// Union of all inclusion regions on `grid`.
    pub fn region_mask(&self, grid: &VoxelGrid) -> RegionMask {
        let prims: Vec<Primitive> = self.inclusions.iter().map(|i| i.region.clone()).collect();
        RegionMask::from_primitives(grid, &prims)
    }

    pub fn sample(&self, grid: &VoxelGrid) -> MediumMap {
        let props = Array3::from_shape_fn(grid.shape(), |(i, j, k)| *self.properties_at(&grid.coordinate([i, j, k])));
        MediumMap {
            c: props.mapv(|p| p.c),
            rho: props.mapv(|p| p.rho),
            beta: props.mapv(|p| p.beta),
        }
    }

    pub fn nonlinearity(&self, grid: &VoxelGrid) -> Nonlinearity {
        if self.is_homogeneous() {
            Nonlinearity::Uniform(self.background.nonlinear_coefficient())
        } else {
            Nonlinearity::PerVoxel(self.sample(grid).nonlinear_coefficient())
        }
    }

    /// Contrast $M_r = (k_{\text{inc}} / k_{\text{bg}})^2 - 1$ at `frequency`,
    /// zero outside every inclusion.
    pub fn contrast(&self, grid: &VoxelGrid, frequency: f64) -> Result<Array3<Complex64>, ResonaError> {
        let k_bg = self.background.wavenumber(frequency)?;
        let mut per_inclusion = Vec::with_capacity(self.inclusions.len());
        for inc in &self.inclusions {
            let ratio = inc.properties.wavenumber(frequency)? / k_bg;
            per_inclusion.push(ratio * ratio - 1.0);
        }
        let zero = Complex64::new(0.0, 0.0);
        Ok(Array3::from_shape_fn(grid.shape(), |(i, j, k)| {
            let p = grid.coordinate([i, j, k]);
            self.inclusions
                .iter()
                .zip(per_inclusion.iter())
                .rev()
                .find(|(inc, _)| inc.region.contains(&p))
                .map_or(zero, |(_, mr)| *mr)
        }))
    }
}
