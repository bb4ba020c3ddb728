//! # Resona Core
//!
//! Frequency-domain model of nonlinear focused ultrasound. The pressure field
//! is split into harmonics of the driving frequency; each harmonic above the
//! fundamental is the volume potential of a source built from lower ones.
//!
//! ## Architecture
//!
//! Every harmonic is propagated by the same FFT-accelerated volume potential
//! ([`operator::VolumePotentialOperator`]), assembled once per wavenumber and
//! grid. The [`cascade::HarmonicCascade`] drives the orders in sequence and
//! refines the grid as the field concentrates at the focus. Inclusions in the
//! medium are handled by the [`scattering::ScatteringCoupler`], which solves a
//! volume integral equation on the inclusion's bounding box.
//!
//! ## Modules
//!
//! - [`types`]: harmonic fields and on-axis lines.
//! - [`operator`]: Green's function kernels and their FFT evaluation.
//! - [`cascade`]: coupling rules, history and the cascade driver.
//! - [`scattering`]: box-local scattering solve and merge.
//! - [`solver`]: GMRES and dense LU.
//! - [`convergence`]: accuracy versus source-domain truncation.
//! - [`medium`]: background and inclusion materials on a grid.
//! - [`incident`]: bowl transducers and synthetic fields.
//! - [`store`]: keyed storage of convergence studies.

pub mod cascade;
pub mod convergence;
pub mod error;
pub mod incident;
pub mod medium;
pub mod operator;
pub mod scattering;
pub mod solver;
pub mod store;
pub mod types;

pub use cascade::{CascadeFailure, CascadeOutput, CascadeSettings, HarmonicCascade, RefinementPolicy};
pub use convergence::{ConvergenceAnalyzer, ConvergenceRecord};
pub use error::ResonaError;
pub use incident::{normalise_power, BowlTransducer, GaussianSource};
pub use medium::Medium;
pub use operator::{KernelCache, KernelOperator, VolumePotentialOperator};
pub use scattering::{ScatteringCoupler, ScatteringSettings};
pub use store::ConvergenceStore;
pub use types::{AxisLine, HarmonicField};
