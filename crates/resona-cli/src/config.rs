//! TOML configuration deserialisation for cascade jobs.

use std::path::Path;

use anyhow::{Context, Result};
use resona_core::cascade::CascadeSettings;
use resona_core::scattering::ScatteringSettings;
use resona_core::BowlTransducer;
use resona_geometry::Primitive;
use resona_materials::{preset, MaterialProperties, MaterialProvider};
use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub medium: MaterialConfig,
    pub transducer: TransducerConfig,
    pub domain: DomainConfig,
    #[serde(default)]
    pub cascade: CascadeSettings,
    pub scatterer: Option<ScattererConfig>,
    pub convergence: Option<ConvergenceConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// A material given by preset name, explicit values, or a preset with
/// individual overrides.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialConfig {
    pub preset: Option<String>,
    pub c: Option<f64>,
    pub rho: Option<f64>,
    pub alpha0: Option<f64>,
    pub eta: Option<f64>,
    pub beta: Option<f64>,
}

impl MaterialConfig {
    pub fn resolve(&self) -> Result<MaterialProperties> {
        let base = match &self.preset {
            Some(name) => Some(preset(name)?.properties()),
            None => None,
        };
        let pick = |value: Option<f64>, from_base: Option<f64>, key: &str| {
            value
                .or(from_base)
                .with_context(|| format!("material needs '{key}' when no preset is given"))
        };
        let props = MaterialProperties::new(
            pick(self.c, base.map(|b| b.c), "c")?,
            pick(self.rho, base.map(|b| b.rho), "rho")?,
            pick(self.alpha0, base.map(|b| b.alpha0), "alpha0")?,
            pick(self.eta, base.map(|b| b.eta), "eta")?,
            pick(self.beta, base.map(|b| b.beta), "beta")?,
        )?;
        Ok(props)
    }
}

/// Focused bowl transducer. Diameters are given as on a datasheet.
#[derive(Debug, Deserialize)]
pub struct TransducerConfig {
    #[serde(default = "default_transducer_name")]
    pub name: String,
    /// Drive frequency (Hz).
    pub frequency: f64,
    pub radius_of_curvature: f64,
    pub outer_diameter: f64,
    #[serde(default)]
    pub inner_diameter: f64,
    /// Total acoustic power (W).
    pub power: f64,
    #[serde(default = "default_elements")]
    pub n_elements: usize,
    #[serde(default)]
    pub rotation_y: f64,
}

impl TransducerConfig {
    /// The bowl with unit surface pressure.
    pub fn bowl(&self) -> Result<BowlTransducer> {
        let mut bowl = BowlTransducer::new(
            self.radius_of_curvature,
            0.5 * self.outer_diameter,
            0.5 * self.inner_diameter,
        )
        .with_context(|| format!("transducer '{}'", self.name))?;
        bowl.n_elements = self.n_elements;
        bowl.rotation_y = self.rotation_y;
        bowl.validate()?;
        Ok(bowl)
    }
}

fn default_transducer_name() -> String {
    "bowl".into()
}

fn default_elements() -> usize {
    resona_core::incident::DEFAULT_BOWL_ELEMENTS
}

/// Computational domain along the transducer axis.
#[derive(Debug, Deserialize)]
pub struct DomainConfig {
    /// Voxels per fundamental wavelength.
    #[serde(default = "default_ppw")]
    pub points_per_wavelength: f64,
    /// Near x-plane (m). Defaults to just inside the bowl rim.
    pub x_start: Option<f64>,
    /// Far x-plane (m).
    pub x_end: f64,
    /// Transverse width in y and z (m).
    pub width: f64,
}

fn default_ppw() -> f64 {
    6.0
}

impl DomainConfig {
    pub fn x_start(&self, transducer: &TransducerConfig) -> f64 {
        self.x_start.unwrap_or_else(|| {
            let roc = transducer.radius_of_curvature;
            let a = 0.5 * transducer.outer_diameter;
            roc - 0.99 * (roc * roc - a * a).sqrt()
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ScattererConfig {
    pub shape: Primitive,
    pub material: MaterialConfig,
    #[serde(flatten)]
    pub settings: ScatteringSettings,
}

#[derive(Debug, Deserialize)]
pub struct ConvergenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to the ladder `10^-0.5 … 10^-4`.
    pub tolerances: Option<Vec<f64>>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save on-axis lines as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_axis_csv: bool,
    /// Whether to save the run summary and convergence store as JSON (default: true).
    #[serde(default = "default_true")]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_axis_csv: true,
            save_json: true,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &Path) -> Result<JobConfig> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<JobConfig> {
    Ok(toml::from_str(content)?)
}
