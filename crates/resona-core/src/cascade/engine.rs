//! The harmonic cascade driver.
//!
//! Starting from the fundamental, each step builds the nonlinear source of
//! the next order from the fields already computed, propagates it with the
//! volume potential at that harmonic's own wavenumber and appends the result
//! to the history. Before some orders the grid is refined; the fields the
//! source needs are then remapped onto the new grid while the history keeps
//! the originals.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array3;
use num_complex::Complex64;
use resona_geometry::interp::remap;
use resona_geometry::{GridManager, IndexBox, InterpolationMethod, OutOfDomain, VoxelGrid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::coupling::{nonlinear_source, CouplingTable, DEFAULT_MAX_HARMONIC};
use super::history::HarmonicHistory;
use crate::convergence::{ConvergenceAnalyzer, ConvergenceRecord};
use crate::error::ResonaError;
use crate::medium::{Medium, Nonlinearity};
use crate::operator::{KernelCache, VolumePotentialOperator};
use crate::scattering::ScatteringCoupler;
use crate::solver::SolveReport;
use crate::types::HarmonicField;

/// When the cascade refines its grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefinementPolicy {
    /// Keep the initial grid throughout.
    Never,
    /// Refine before order `n` when `n - 1` is a power of two, i.e. right
    /// after orders 1, 2, 4, 8, …
    #[default]
    AfterPowersOfTwo,
    /// Refine before order `n ≥ 2` when `n` is a power of two.
    AtPowersOfTwo,
}

impl RefinementPolicy {
    /// Whether the grid is refined before computing `order`.
    pub fn fires(self, order: usize) -> bool {
        if order < 2 {
            return false;
        }
        match self {
            RefinementPolicy::Never => false,
            RefinementPolicy::AfterPowersOfTwo => (order - 1).is_power_of_two(),
            RefinementPolicy::AtPowersOfTwo => order.is_power_of_two(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    /// Number of harmonics to compute, the fundamental included.
    pub harmonics: usize,
    /// Highest harmonic number in the coupling table.
    pub max_harmonic: usize,
    pub refinement: RefinementPolicy,
    pub refinement_factor: f64,
    pub interpolation: InterpolationMethod,
    pub out_of_domain: OutOfDomain,
    pub kernel_cache_capacity: usize,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            harmonics: 5,
            max_harmonic: DEFAULT_MAX_HARMONIC,
            refinement: RefinementPolicy::default(),
            refinement_factor: 2.0,
            interpolation: InterpolationMethod::default(),
            out_of_domain: OutOfDomain::default(),
            kernel_cache_capacity: 4,
        }
    }
}

/// How the scattering solve went for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReport {
    pub order: usize,
    pub bbox: IndexBox,
    pub report: SolveReport,
}

/// Everything a finished (or aborted) cascade produced.
#[derive(Debug, Clone, Default)]
pub struct CascadeOutput {
    pub history: HarmonicHistory,
    /// Convergence records keyed by order.
    pub convergence: BTreeMap<usize, Vec<ConvergenceRecord>>,
    pub scattering: Vec<OrderReport>,
}

/// A cascade that stopped early, with the orders computed before the error.
#[derive(Debug, Error)]
#[error("harmonic cascade stopped after {} completed orders: {error}", .output.history.len())]
pub struct CascadeFailure {
    pub output: CascadeOutput,
    #[source]
    pub error: ResonaError,
}

pub struct HarmonicCascade {
    settings: CascadeSettings,
    fundamental_frequency: f64,
    medium: Medium,
    couplings: CouplingTable,
    grids: GridManager,
    operator: VolumePotentialOperator,
    kernels: KernelCache,
    scattering: Option<ScatteringCoupler>,
    convergence: Option<ConvergenceAnalyzer>,
    nonlinearity: Nonlinearity,
    /// Previous orders on the current grid.
    working: Vec<Arc<HarmonicField>>,
    output: CascadeOutput,
}

impl HarmonicCascade {
    pub fn new(
        settings: CascadeSettings,
        fundamental_frequency: f64,
        medium: Medium,
        grids: GridManager,
        operator: VolumePotentialOperator,
    ) -> Result<Self, ResonaError> {
        if !(fundamental_frequency.is_finite() && fundamental_frequency > 0.0) {
            return Err(ResonaError::InvalidParameter(format!(
                "fundamental frequency must be positive, got {fundamental_frequency}"
            )));
        }
        if settings.harmonics == 0 {
            return Err(ResonaError::InvalidParameter("at least one harmonic must be requested".into()));
        }
        if !(settings.refinement_factor.is_finite() && settings.refinement_factor >= 1.0) {
            return Err(ResonaError::InvalidParameter(format!(
                "refinement factor must be at least 1, got {}",
                settings.refinement_factor
            )));
        }
        medium.validate()?;
        let couplings = CouplingTable::new(settings.max_harmonic)?;
        let nonlinearity = medium.nonlinearity(&grids.current());
        let kernels = KernelCache::new(settings.kernel_cache_capacity);

        Ok(Self {
            settings,
            fundamental_frequency,
            medium,
            couplings,
            grids,
            operator,
            kernels,
            scattering: None,
            convergence: None,
            nonlinearity,
            working: Vec::new(),
            output: CascadeOutput::default(),
        })
    }

    /// Scatter every order off the medium's inclusions.
    pub fn with_scattering(mut self, coupler: ScatteringCoupler) -> Self {
        self.scattering = Some(coupler);
        self
    }

    /// Run a domain-truncation study on every nonlinear source.
    pub fn with_convergence(mut self, analyzer: ConvergenceAnalyzer) -> Self {
        self.convergence = Some(analyzer);
        self
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    pub fn history(&self) -> &HarmonicHistory {
        &self.output.history
    }

    pub fn grid(&self) -> Arc<VoxelGrid> {
        self.grids.current()
    }

    pub fn couplings(&self) -> &CouplingTable {
        &self.couplings
    }

    /// Prior orders as seen by the next step, all on the current grid.
    pub fn working(&self) -> &[Arc<HarmonicField>] {
        &self.working
    }

    fn frequency(&self, order: usize) -> f64 {
        (order + 1) as f64 * self.fundamental_frequency
    }

    /// Apply the optional scattering step to a field of `order` on `grid`.
    fn scatter(
        &mut self,
        order: usize,
        grid: &VoxelGrid,
        values: Array3<Complex64>,
    ) -> Result<Array3<Complex64>, ResonaError> {
        let frequency = self.frequency(order);
        let Some(coupler) = &self.scattering else {
            return Ok(values);
        };
        let result = coupler.scatter(&self.operator, &mut self.kernels, &self.medium, grid, &values, frequency)?;
        self.output.scattering.push(OrderReport {
            order,
            bbox: result.bbox,
            report: result.report,
        });
        Ok(result.total)
    }

    fn record(&mut self, field: HarmonicField) -> Result<Arc<HarmonicField>, ResonaError> {
        let field = self.output.history.push(field)?;
        self.working.push(Arc::clone(&field));
        log::info!(
            "Harmonic {} ({:.3} MHz): peak |p| = {:.4e} Pa, grid {:?} at dx = {:.4e} m",
            field.harmonic(),
            field.frequency / 1e6,
            field.peak(),
            field.grid.dims(),
            field.grid.spacing()
        );
        Ok(field)
    }

    /// Record the fundamental, scattering it first when a coupler is set.
    pub fn seed(&mut self, incident: Array3<Complex64>) -> Result<Arc<HarmonicField>, ResonaError> {
        if !self.output.history.is_empty() {
            return Err(ResonaError::InvalidParameter("cascade is already seeded".into()));
        }
        let grid = self.grids.current();
        grid.check_shape(incident.shape())?;
        let k = self.medium.background.wavenumber(self.fundamental_frequency)?;
        let values = self.scatter(0, &grid, incident)?;
        let field = HarmonicField::new(0, self.fundamental_frequency, k, grid, values)?;
        self.record(field)
    }

    /// Refine the grid and rebuild the working set on it.
    ///
    /// Every prior order is remapped from the grid it was computed on, never
    /// from an earlier remapped copy.
    fn refine(&mut self) -> Result<(), ResonaError> {
        let grid = self.grids.refine(self.settings.refinement_factor)?;
        let (method, fallback) = (self.settings.interpolation, self.settings.out_of_domain);
        self.working = self
            .output
            .history
            .iter()
            .map(|f| {
                let values = remap(&f.grid, &f.values, &grid, method, fallback)?;
                let moved = HarmonicField::new(f.order, f.frequency, f.wavenumber, Arc::clone(&grid), values)?;
                Ok(Arc::new(moved))
            })
            .collect::<Result<_, ResonaError>>()?;
        self.nonlinearity = self.medium.nonlinearity(&grid);
        Ok(())
    }

    /// Compute the next order.
    pub fn step(&mut self) -> Result<Arc<HarmonicField>, ResonaError> {
        let order = self.output.history.len();
        if order == 0 {
            return Err(ResonaError::InvalidParameter("cascade must be seeded with the fundamental".into()));
        }
        let coupling = self.couplings.get(order)?.clone();
        if self.settings.refinement.fires(order) {
            self.refine()?;
        }
        let grid = self.grids.current();

        let source = {
            let fields: Vec<&Array3<Complex64>> = self.working.iter().map(|f| &f.values).collect();
            let omega = 2.0 * PI * self.fundamental_frequency;
            nonlinear_source(&coupling, &fields, omega, &self.nonlinearity)?
        };
        log::debug!("Order {order} source: {}", coupling.describe());

        let frequency = self.frequency(order);
        let k = self.medium.background.wavenumber(frequency)?;
        let kernel = self
            .kernels
            .get_or_assemble(&self.operator, k, &grid, Complex64::new(1.0, 0.0))?;

        if let Some(analyzer) = &self.convergence {
            let records = analyzer.study(&self.operator, &kernel, &source, &grid)?;
            self.output.convergence.insert(order, records);
        }

        let values = self.operator.apply(&kernel, &source, None, None)?;
        let values = self.scatter(order, &grid, values)?;
        let field = HarmonicField::new(order, frequency, k, grid, values)?;
        self.record(field)
    }

    /// Hand back everything computed so far.
    pub fn finish(self) -> CascadeOutput {
        self.output
    }

    /// Seed with `incident` and step until `settings.harmonics` orders exist.
    ///
    /// On error the orders already computed are returned inside the
    /// [`CascadeFailure`].
    pub fn run(mut self, incident: Array3<Complex64>) -> Result<CascadeOutput, CascadeFailure> {
        if let Err(error) = self.seed(incident) {
            return Err(CascadeFailure {
                output: self.finish(),
                error,
            });
        }
        while self.output.history.len() < self.settings.harmonics {
            if let Err(error) = self.step() {
                return Err(CascadeFailure {
                    output: self.finish(),
                    error,
                });
            }
        }
        Ok(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refinement_policies() {
        let fired = |p: RefinementPolicy| (1..10).filter(|&n| p.fires(n)).collect::<Vec<_>>();
        assert_eq!(fired(RefinementPolicy::Never), Vec::<usize>::new());
        assert_eq!(fired(RefinementPolicy::AfterPowersOfTwo), vec![2, 3, 5, 9]);
        assert_eq!(fired(RefinementPolicy::AtPowersOfTwo), vec![2, 4, 8]);
    }

    #[test]
    fn test_settings_from_partial_json() {
        let s: CascadeSettings = serde_json::from_str(r#"{"harmonics": 3, "refinement": "never"}"#).unwrap();
        assert_eq!(s.harmonics, 3);
        assert_eq!(s.refinement, RefinementPolicy::Never);
        assert_eq!(s.max_harmonic, DEFAULT_MAX_HARMONIC);
    }
}
