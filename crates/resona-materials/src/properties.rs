//! Small-signal acoustic properties and the power-law attenuation model.
//!
//! Absorption follows
//!
//! $$
//! \alpha(f) = \frac{\alpha_0}{8.686} \left(\frac{f}{1\,\text{MHz}}\right)^{\eta}
//! \quad [\text{Np/m}]
//! $$
//!
//! and enters the wavenumber as $k = 2\pi f / c + i\alpha(f)$, so that a
//! field $e^{ikx}$ decays along the direction of propagation.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::provider::{MaterialError, MaterialProvider};
use crate::units::{db_to_neper, MHZ};

/// Acoustic properties of a homogeneous medium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    /// Sound speed (m/s).
    pub c: f64,
    /// Density (kg/m³).
    pub rho: f64,
    /// Attenuation coefficient at 1 MHz (dB/m).
    pub alpha0: f64,
    /// Power-law exponent of the attenuation.
    pub eta: f64,
    /// Coefficient of nonlinearity.
    pub beta: f64,
}

impl MaterialProperties {
    pub fn new(c: f64, rho: f64, alpha0: f64, eta: f64, beta: f64) -> Result<Self, MaterialError> {
        let props = Self {
            c,
            rho,
            alpha0,
            eta,
            beta,
        };
        props.validate()?;
        Ok(props)
    }

    /// Reject non-physical values.
    pub fn validate(&self) -> Result<(), MaterialError> {
        let positive = [("c", self.c), ("rho", self.rho)];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(MaterialError::InvalidParameter { name, value });
            }
        }
        let non_negative = [("alpha0", self.alpha0), ("eta", self.eta)];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(MaterialError::InvalidParameter { name, value });
            }
        }
        if !self.beta.is_finite() {
            return Err(MaterialError::InvalidParameter {
                name: "beta",
                value: self.beta,
            });
        }
        Ok(())
    }

    /// Attenuation $\alpha(f)$ in Np/m.
    pub fn attenuation(&self, frequency: f64) -> Result<f64, MaterialError> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(MaterialError::InvalidFrequency(frequency));
        }
        Ok(db_to_neper(self.alpha0 * (frequency / MHZ).powf(self.eta)))
    }

    /// Complex wavenumber at frequency `f` (m⁻¹).
    pub fn wavenumber(&self, frequency: f64) -> Result<Complex64, MaterialError> {
        let alpha = self.attenuation(frequency)?;
        Ok(Complex64::new(2.0 * PI * frequency / self.c, alpha))
    }

    /// Wavelength $c / f$ (m).
    pub fn wavelength(&self, frequency: f64) -> f64 {
        self.c / frequency
    }

    /// Characteristic impedance $\rho c$ (Rayl).
    pub fn impedance(&self) -> f64 {
        self.rho * self.c
    }

    /// The nonlinear source coefficient $\beta / (\rho c^4)$.
    pub fn nonlinear_coefficient(&self) -> f64 {
        self.beta / (self.rho * self.c.powi(4))
    }
}

impl MaterialProvider for MaterialProperties {
    fn name(&self) -> &str {
        "custom"
    }

    fn properties(&self) -> MaterialProperties {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::NEPER_TO_DB;
    use approx::assert_relative_eq;

    fn water() -> MaterialProperties {
        MaterialProperties::new(1480.0, 1000.0, 0.2, 2.0, 3.5).unwrap()
    }

    #[test]
    fn test_attenuation_power_law() {
        let w = water();
        let a1 = w.attenuation(1.0e6).unwrap();
        let a2 = w.attenuation(2.0e6).unwrap();
        assert_relative_eq!(a1, 0.2 / NEPER_TO_DB, max_relative = 1e-14);
        assert_relative_eq!(a2, 4.0 * a1, max_relative = 1e-14);
    }

    #[test]
    fn test_wavenumber_components() {
        let w = water();
        let f = 1.1e6;
        let k = w.wavenumber(f).unwrap();
        assert_relative_eq!(k.re, 2.0 * PI * f / 1480.0, max_relative = 1e-14);
        assert_relative_eq!(k.im, w.attenuation(f).unwrap(), max_relative = 1e-14);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(MaterialProperties::new(0.0, 1000.0, 0.2, 2.0, 3.5).is_err());
        assert!(MaterialProperties::new(1480.0, 1000.0, -1.0, 2.0, 3.5).is_err());
        assert!(matches!(
            water().attenuation(0.0),
            Err(MaterialError::InvalidFrequency(_))
        ));
    }

    #[test]
    fn test_nonlinear_coefficient() {
        let w = water();
        assert_relative_eq!(
            w.nonlinear_coefficient(),
            3.5 / (1000.0 * 1480.0f64.powi(4)),
            max_relative = 1e-14
        );
    }
}
