//! Unit conventions and conversion constants.

/// Decibels per neper (20 / ln 10).
pub const NEPER_TO_DB: f64 = 8.686;

/// One megahertz (Hz), the reference frequency of the attenuation law.
pub const MHZ: f64 = 1.0e6;

/// Convert an attenuation in dB/m to Np/m.
#[inline]
pub fn db_to_neper(alpha_db: f64) -> f64 {
    alpha_db / NEPER_TO_DB
}
