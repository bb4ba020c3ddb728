//! # Resona Materials
//!
//! Acoustic material properties for the Resona framework. Every medium
//! implements the [`MaterialProvider`](provider::MaterialProvider) trait,
//! which yields the small-signal properties `(c, rho, alpha0, eta, beta)`
//! and the derived complex wavenumber at any frequency.
//!
//! ## Available data
//!
//! | Source | Module |
//! |--------|--------|
//! | Water, liver, fat presets | [`presets`] |
//! | User-supplied values | [`properties::MaterialProperties`] |
//!
//! ## Attenuation
//!
//! Absorption follows a frequency power law. The coefficient `alpha0` is
//! given in dB/m at 1 MHz and converted to Np/m with
//! [`units::NEPER_TO_DB`].

pub mod presets;
pub mod properties;
pub mod provider;
pub mod units;

pub use presets::{preset, TissuePreset, PRESETS};
pub use properties::MaterialProperties;
pub use provider::{MaterialError, MaterialProvider};
