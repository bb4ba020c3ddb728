//! Tabulated tissue presets.
//!
//! Values are representative small-signal properties at body temperature
//! for water, liver and fat. Attenuation coefficients are in dB/m at 1 MHz.

use crate::properties::MaterialProperties;
use crate::provider::{MaterialError, MaterialProvider};

/// A named set of tabulated properties.
#[derive(Debug, Clone, Copy)]
pub struct TissuePreset {
    pub name: &'static str,
    pub description: &'static str,
    pub properties: MaterialProperties,
}

impl MaterialProvider for TissuePreset {
    fn name(&self) -> &str {
        self.name
    }

    fn properties(&self) -> MaterialProperties {
        self.properties
    }
}

/// All built-in presets.
pub const PRESETS: [TissuePreset; 3] = [
    TissuePreset {
        name: "water",
        description: "Degassed water",
        properties: MaterialProperties {
            c: 1480.0,
            rho: 1000.0,
            alpha0: 0.2,
            eta: 2.0,
            beta: 3.5,
        },
    },
    TissuePreset {
        name: "liver",
        description: "Liver tissue",
        properties: MaterialProperties {
            c: 1590.0,
            rho: 1060.0,
            alpha0: 90.0,
            eta: 1.1,
            beta: 4.4,
        },
    },
    TissuePreset {
        name: "fat",
        description: "Adipose tissue",
        properties: MaterialProperties {
            c: 1629.0,
            rho: 1000.0,
            alpha0: 58.0,
            eta: 1.0,
            beta: 4.5,
        },
    },
];

/// Look up a preset by name (case-insensitive).
pub fn preset(name: &str) -> Result<TissuePreset, MaterialError> {
    PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .copied()
        .ok_or_else(|| MaterialError::NotFound(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for p in PRESETS.iter() {
            p.properties.validate().unwrap();
            assert!(p.wavenumber(1.0e6).unwrap().im > 0.0);
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(preset("Liver").unwrap().properties.c, 1590.0);
        assert!(matches!(preset("bone"), Err(MaterialError::NotFound(_))));
    }
}
