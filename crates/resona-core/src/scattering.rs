//! Coupling of a harmonic field to inclusions via the volume integral
//! equation.
//!
//! Inside an inclusion of contrast $M_r = (k_{\text{inc}}/k)^2 - 1$ the
//! total field $u$ satisfies
//!
//! $$
//! u - k^2 V[M_r u] = u_{\text{inc}}.
//! $$
//!
//! The system is solved on the smallest index box around the inclusions,
//! then the induced source $M_r u$ radiates over the full grid:
//! $u_{\text{tot}} = u_{\text{inc}} + k^2 V[M_r u]$.

use ndarray::{Array1, Array2, Array3};
use num_complex::Complex64;
use resona_geometry::mask::{embed_box, extract_box};
use resona_geometry::{IndexBox, RegionMask, VoxelGrid};
use serde::{Deserialize, Serialize};

use crate::error::ResonaError;
use crate::medium::Medium;
use crate::operator::{KernelCache, KernelOperator, VolumePotentialOperator};
use crate::solver::direct::solve_direct;
use crate::solver::iterative::{solve_gmres, GmresSettings};
use crate::solver::{relative_residual, LinearOperator, SolveMethod, SolveReport};

/// Configuration of the box-local solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatteringSettings {
    /// GMRES relative residual target.
    pub tolerance: f64,
    pub max_iterations: usize,
    pub restart: usize,
    /// Boxes with at most this many voxels are solved by dense LU.
    pub direct_threshold: usize,
    /// Turn a non-converged solve into an error instead of a warning.
    pub require_convergence: bool,
}

impl Default for ScatteringSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-5,
            max_iterations: 500,
            restart: 50,
            direct_threshold: 512,
            require_convergence: false,
        }
    }
}

/// Total field on the scatterer's bounding box.
#[derive(Debug, Clone)]
pub struct InducedSource {
    pub bbox: IndexBox,
    /// Box-local total field `u`.
    pub values: Array3<Complex64>,
    pub report: SolveReport,
}

/// Result of scattering one harmonic.
#[derive(Debug, Clone)]
pub struct ScatteringResult {
    pub total: Array3<Complex64>,
    pub bbox: IndexBox,
    pub report: SolveReport,
}

/// `x ↦ x - K[M_r x]` on a box-local grid.
struct BoxSystem<'a> {
    operator: &'a VolumePotentialOperator,
    kernel: &'a KernelOperator,
    contrast: &'a Array3<Complex64>,
}

impl LinearOperator for BoxSystem<'_> {
    fn dim(&self) -> usize {
        self.contrast.len()
    }

    fn apply(&self, x: &Array1<Complex64>) -> Result<Array1<Complex64>, ResonaError> {
        let field = Array3::from_shape_vec(self.contrast.dim(), x.to_vec())
            .map_err(|e| ResonaError::LinAlgError(e.to_string()))?;
        let kv = self.operator.apply(self.kernel, &field, None, Some(self.contrast))?;
        Ok(x - &Array1::from_iter(kv.iter().copied()))
    }
}

/// Dense form of the box system, `A[p, q] = δ_pq - K(p, q) M_r[q]`.
fn dense_box_matrix(kernel: &KernelOperator, contrast: &Array3<Complex64>) -> Array2<Complex64> {
    let (l, m, n) = contrast.dim();
    let unravel = |p: usize| [p / (m * n), (p / n) % m, p % n];
    let size = l * m * n;
    Array2::from_shape_fn((size, size), |(p, q)| {
        let (ip, iq) = (unravel(p), unravel(q));
        let coupling = kernel.entry(ip, iq) * contrast[iq];
        if p == q {
            Complex64::new(1.0, 0.0) - coupling
        } else {
            -coupling
        }
    })
}

/// Solves the scattering problem for the inclusions of a [`Medium`].
#[derive(Debug, Clone, Default)]
pub struct ScatteringCoupler {
    pub settings: ScatteringSettings,
}

impl ScatteringCoupler {
    pub fn new(settings: ScatteringSettings) -> Self {
        Self { settings }
    }

    /// The voxelised inclusions of `medium` on `grid` and their bounding box.
    ///
    /// Fails when the medium has no inclusions, when they miss the grid, or
    /// when a bounded side of an inclusion lies outside the grid faces by more
    /// than half a voxel.
    pub fn region(&self, medium: &Medium, grid: &VoxelGrid) -> Result<(RegionMask, IndexBox), ResonaError> {
        if medium.inclusions.is_empty() {
            return Err(ResonaError::InvalidRegion("medium has no inclusions".into()));
        }
        let lower = grid.lower_face();
        let upper = grid.upper_face();
        let slack = 0.5 * grid.spacing();
        for (n, inc) in medium.inclusions.iter().enumerate() {
            let (lo, hi) = inc.region.bounding_box();
            for a in 0..3 {
                let outside = (lo[a].is_finite() && lo[a] < lower[a] - slack)
                    || (hi[a].is_finite() && hi[a] > upper[a] + slack);
                if outside {
                    return Err(ResonaError::InvalidRegion(format!(
                        "inclusion {n} spans [{:.4e}, {:.4e}] m on axis {a}, beyond the grid [{:.4e}, {:.4e}] m",
                        lo[a], hi[a], lower[a], upper[a]
                    )));
                }
            }
        }
        let mask = medium.region_mask(grid);
        let bbox = mask
            .bounding_box()
            .ok_or_else(|| ResonaError::InvalidRegion("inclusions contain no voxel centres".into()))?;
        Ok((mask, bbox))
    }

    /// Solve `u - k²V[M_r u] = u_inc` on a box-local grid.
    ///
    /// `contrast`, `region` and `incident` are all box-local; the contrast is
    /// zeroed outside `region`. The solve is seeded with the incident field.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_region(
        &self,
        operator: &VolumePotentialOperator,
        kernels: &mut KernelCache,
        contrast: &Array3<Complex64>,
        region: &RegionMask,
        box_grid: &VoxelGrid,
        bbox: IndexBox,
        incident: &Array3<Complex64>,
        k: Complex64,
    ) -> Result<InducedSource, ResonaError> {
        box_grid.check_shape(contrast.shape())?;
        box_grid.check_shape(incident.shape())?;
        let mut contrast = contrast.clone();
        region.apply(&mut contrast)?;

        let kernel = kernels.get_or_assemble(operator, k, box_grid, k * k)?;
        let rhs = Array1::from_iter(incident.iter().copied());

        let (solution, report) = if box_grid.len() <= self.settings.direct_threshold {
            let matrix = dense_box_matrix(&kernel, &contrast);
            let x = solve_direct(&matrix, &rhs)?;
            let residual = relative_residual(&matrix, &x, &rhs)?;
            let report = SolveReport {
                method: SolveMethod::Direct,
                converged: residual <= self.settings.tolerance,
                iterations: 0,
                residual,
                residual_history: vec![residual],
            };
            (x, report)
        } else {
            let system = BoxSystem {
                operator,
                kernel: &kernel,
                contrast: &contrast,
            };
            let settings = GmresSettings {
                tolerance: self.settings.tolerance,
                max_iterations: self.settings.max_iterations,
                restart: self.settings.restart,
            };
            let outcome = solve_gmres(&system, &rhs, Some(&rhs), &settings)?;
            (outcome.solution, outcome.report)
        };

        if !report.converged {
            if self.settings.require_convergence {
                return Err(ResonaError::ConvergenceFailure {
                    iterations: report.iterations,
                    residual: report.residual,
                });
            }
            log::warn!(
                "Scattering solve did not converge ({:?}, {} iterations, residual {:.2e})",
                report.method,
                report.iterations,
                report.residual
            );
        }

        let values = Array3::from_shape_vec(box_grid.shape(), solution.to_vec())
            .map_err(|e| ResonaError::LinAlgError(e.to_string()))?;
        Ok(InducedSource { bbox, values, report })
    }

    /// Radiate the induced source over the full grid and add it to the
    /// incident field.
    #[allow(clippy::too_many_arguments)]
    pub fn merge(
        &self,
        operator: &VolumePotentialOperator,
        kernels: &mut KernelCache,
        incident: &Array3<Complex64>,
        induced: &InducedSource,
        contrast: &Array3<Complex64>,
        k: Complex64,
        grid: &VoxelGrid,
    ) -> Result<Array3<Complex64>, ResonaError> {
        grid.check_shape(incident.shape())?;
        let source = embed_box(&induced.values, &induced.bbox, grid.dims())?;
        let kernel = kernels.get_or_assemble(operator, k, grid, k * k)?;
        let scattered = operator.apply(&kernel, &source, None, Some(contrast))?;
        Ok(incident + &scattered)
    }

    /// Scatter `incident` (at `frequency`) off the inclusions of `medium`.
    pub fn scatter(
        &self,
        operator: &VolumePotentialOperator,
        kernels: &mut KernelCache,
        medium: &Medium,
        grid: &VoxelGrid,
        incident: &Array3<Complex64>,
        frequency: f64,
    ) -> Result<ScatteringResult, ResonaError> {
        let k = medium.background.wavenumber(frequency)?;
        let (mask, bbox) = self.region(medium, grid)?;
        let contrast = medium.contrast(grid, frequency)?;
        let box_grid = grid.sub_grid(&bbox)?;

        let induced = self.solve_region(
            operator,
            kernels,
            &extract_box(&contrast, &bbox)?,
            &mask.restrict(&bbox)?,
            &box_grid,
            bbox,
            &extract_box(incident, &bbox)?,
            k,
        )?;
        log::debug!(
            "Scattering box {:?}..={:?} ({} voxels) solved by {:?}: residual {:.2e}",
            bbox.min,
            bbox.max,
            bbox.volume(),
            induced.report.method,
            induced.report.residual
        );
        let total = self.merge(operator, kernels, incident, &induced, &contrast, k, grid)?;
        Ok(ScatteringResult {
            total,
            bbox,
            report: induced.report,
        })
    }
}
