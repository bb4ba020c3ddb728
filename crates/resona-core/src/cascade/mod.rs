//! The quasi-linear harmonic cascade.
//!
//! - [`coupling`]: which products of lower orders drive each harmonic.
//! - [`history`]: the append-only record of computed orders.
//! - [`engine`]: the driver that steps through the orders, refining the grid
//!   on the way.

pub mod coupling;
pub mod engine;
pub mod history;

pub use coupling::{nonlinear_source, CouplingTable, OrderCoupling};
pub use engine::{CascadeFailure, CascadeOutput, CascadeSettings, HarmonicCascade, OrderReport, RefinementPolicy};
pub use history::HarmonicHistory;
