//! Nonlinear coupling between harmonics.
//!
//! In the quasi-linear cascade the source driving harmonic `h = n + 1`
//! (order `n`) is built from products of lower orders whose frequencies add
//! up to `h f1`:
//!
//! $$
//! S_n = -\frac{\beta\,\omega^2}{\rho c^4} \, \frac{h^2}{2}
//! \sum_{\substack{i \le j \\ i + j = n - 1}} m_{ij}\, P_i P_j,
//! \qquad m_{ij} = \begin{cases} 1 & i = j \\ 2 & i \ne j \end{cases}
//! $$
//!
//! with $\omega$ the fundamental angular frequency. The table below is
//! generated from that rule, not written out by hand.

use ndarray::Array3;
use num_complex::Complex64;
use serde::Serialize;

use crate::error::ResonaError;
use crate::medium::Nonlinearity;

/// Highest harmonic number covered by default.
pub const DEFAULT_MAX_HARMONIC: usize = 7;

/// One product `m · P_lower · P_upper` in a source term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CouplingTerm {
    pub lower: usize,
    pub upper: usize,
    pub multiplicity: u32,
}

/// The coupling rule of a single order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCoupling {
    pub order: usize,
    /// `h² / 2` for harmonic `h = order + 1`.
    pub weight: f64,
    pub terms: Vec<CouplingTerm>,
}

impl OrderCoupling {
    fn generate(order: usize) -> Self {
        let h = (order + 1) as f64;
        let terms = (0..order)
            .map(|i| (i, order - 1 - i))
            .filter(|(i, j)| i <= j)
            .map(|(i, j)| CouplingTerm {
                lower: i,
                upper: j,
                multiplicity: if i == j { 1 } else { 2 },
            })
            .collect();
        Self {
            order,
            weight: 0.5 * h * h,
            terms,
        }
    }

    fn min_multiplicity(&self) -> u32 {
        self.terms.iter().map(|t| t.multiplicity).min().unwrap_or(1)
    }

    /// The common factor of the source, `-w · min(m)`: `-2, -9, -8, -25, …`
    /// for orders `1, 2, 3, 4, …`.
    pub fn scalar_multiplier(&self) -> f64 {
        -self.weight * f64::from(self.min_multiplicity())
    }

    /// Multiplicity of `term` left after the common factor is pulled out.
    pub fn residual_multiplicity(&self, term: &CouplingTerm) -> u32 {
        term.multiplicity / self.min_multiplicity()
    }

    /// Human-readable form, e.g. `-8 (P1^2 + 2 P0 P2)`.
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .terms
            .iter()
            .rev()
            .map(|t| {
                let coef = match self.residual_multiplicity(t) {
                    1 => String::new(),
                    m => format!("{m} "),
                };
                if t.lower == t.upper {
                    format!("{coef}P{}^2", t.lower)
                } else {
                    format!("{coef}P{} P{}", t.lower, t.upper)
                }
            })
            .collect();
        format!("{} ({})", self.scalar_multiplier(), parts.join(" + "))
    }
}

/// Coupling rules for orders `1 ..= max_harmonic - 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CouplingTable {
    max_harmonic: usize,
    orders: Vec<OrderCoupling>,
}

impl CouplingTable {
    /// Build the table up to harmonic number `max_harmonic` (at least 2).
    pub fn new(max_harmonic: usize) -> Result<Self, ResonaError> {
        if max_harmonic < 2 {
            return Err(ResonaError::InvalidParameter(format!(
                "max_harmonic must be at least 2, got {max_harmonic}"
            )));
        }
        Ok(Self {
            max_harmonic,
            orders: (1..max_harmonic).map(OrderCoupling::generate).collect(),
        })
    }

    pub fn max_harmonic(&self) -> usize {
        self.max_harmonic
    }

    /// Highest order with a coupling rule.
    pub fn max_order(&self) -> usize {
        self.max_harmonic - 1
    }

    pub fn get(&self, order: usize) -> Result<&OrderCoupling, ResonaError> {
        if order == 0 {
            return Err(ResonaError::UnsupportedOrder {
                order,
                max_order: self.max_order(),
            });
        }
        self.orders.get(order - 1).ok_or(ResonaError::UnsupportedOrder {
            order,
            max_order: self.max_order(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderCoupling> {
        self.orders.iter()
    }
}

impl Default for CouplingTable {
    fn default() -> Self {
        Self {
            max_harmonic: DEFAULT_MAX_HARMONIC,
            orders: (1..DEFAULT_MAX_HARMONIC).map(OrderCoupling::generate).collect(),
        }
    }
}

/// Evaluate the source of `coupling.order` from the fields of lower orders.
///
/// # Arguments
/// * `coupling` - Rule for the order being driven.
/// * `fields` - Fields of orders `0 .. coupling.order`, all on one grid.
/// * `omega` - Fundamental angular frequency (rad/s).
/// * `nonlinearity` - $\beta / (\rho c^4)$, uniform or per voxel.
pub fn nonlinear_source(
    coupling: &OrderCoupling,
    fields: &[&Array3<Complex64>],
    omega: f64,
    nonlinearity: &Nonlinearity,
) -> Result<Array3<Complex64>, ResonaError> {
    if fields.len() < coupling.order {
        return Err(ResonaError::InvalidParameter(format!(
            "order {} needs {} lower-order fields, got {}",
            coupling.order,
            coupling.order,
            fields.len()
        )));
    }
    let shape = fields[0].shape();
    for f in &fields[1..coupling.order] {
        if f.shape() != shape {
            return Err(ResonaError::shape(shape, f.shape()));
        }
    }
    if let Nonlinearity::PerVoxel(nl) = nonlinearity {
        if nl.shape() != shape {
            return Err(ResonaError::shape(shape, nl.shape()));
        }
    }

    let scale = -omega * omega * coupling.weight;
    let dim = fields[0].dim();
    Ok(Array3::from_shape_fn(dim, |(i, j, k)| {
        let idx = [i, j, k];
        let acc: Complex64 = coupling
            .terms
            .iter()
            .map(|t| fields[t.lower][idx] * fields[t.upper][idx] * f64::from(t.multiplicity))
            .sum();
        acc * (scale * nonlinearity.at(idx))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_multipliers() {
        let table = CouplingTable::default();
        let got: Vec<f64> = table.iter().map(|c| c.scalar_multiplier()).collect();
        assert_eq!(got, vec![-2.0, -9.0, -8.0, -25.0, -18.0, -49.0]);
    }

    #[test]
    fn test_fourth_harmonic_terms() {
        let table = CouplingTable::default();
        let c = table.get(3).unwrap();
        assert_eq!(c.describe(), "-8 (P1^2 + 2 P0 P2)");
        assert_eq!(c.terms.len(), 2);
    }

    #[test]
    fn test_second_harmonic_is_square_of_fundamental() {
        let table = CouplingTable::default();
        let c = table.get(1).unwrap();
        assert_eq!(
            c.terms,
            vec![CouplingTerm {
                lower: 0,
                upper: 0,
                multiplicity: 1
            }]
        );
    }

    #[test]
    fn test_unsupported_orders() {
        let table = CouplingTable::new(3).unwrap();
        assert!(table.get(2).is_ok());
        assert!(matches!(
            table.get(3),
            Err(ResonaError::UnsupportedOrder { order: 3, max_order: 2 })
        ));
        assert!(table.get(0).is_err());
        assert!(CouplingTable::new(1).is_err());
    }

    #[test]
    fn test_source_for_third_harmonic() {
        let table = CouplingTable::default();
        let p0 = Array3::from_elem((2, 1, 1), Complex64::new(1.0, 1.0));
        let p1 = Array3::from_elem((2, 1, 1), Complex64::new(0.5, 0.0));
        let nl = Nonlinearity::Uniform(1e-9);
        let omega = 2.0;
        let s = nonlinear_source(table.get(2).unwrap(), &[&p0, &p1], omega, &nl).unwrap();
        // -9 * omega^2 * nl * P0 * P1
        let want = Complex64::new(1.0, 1.0) * 0.5 * (-9.0 * 4.0 * 1e-9);
        assert_relative_eq!(s[[1, 0, 0]].re, want.re, max_relative = 1e-14);
        assert_relative_eq!(s[[1, 0, 0]].im, want.im, max_relative = 1e-14);
    }

    #[test]
    fn test_source_uses_per_voxel_coefficient() {
        let table = CouplingTable::default();
        let p0 = Array3::from_elem((3, 1, 1), Complex64::new(2.0, -1.0));
        let mut map = Array3::from_elem((3, 1, 1), 1e-9);
        map[[1, 0, 0]] = 4e-9;
        let omega = 3.0;
        let s = nonlinear_source(table.get(1).unwrap(), &[&p0], omega, &Nonlinearity::PerVoxel(map)).unwrap();

        let square = Complex64::new(2.0, -1.0).powi(2);
        let outside = square * (-2.0 * omega * omega * 1e-9);
        assert_relative_eq!(s[[0, 0, 0]].re, outside.re, max_relative = 1e-14);
        assert_relative_eq!(s[[0, 0, 0]].im, outside.im, max_relative = 1e-14);
        assert_relative_eq!((s[[1, 0, 0]] / s[[2, 0, 0]]).re, 4.0, max_relative = 1e-14);
        assert_eq!(s[[0, 0, 0]], s[[2, 0, 0]]);

        let wrong = Nonlinearity::PerVoxel(Array3::from_elem((2, 1, 1), 1e-9));
        assert!(nonlinear_source(table.get(1).unwrap(), &[&p0], omega, &wrong).is_err());
    }

    #[test]
    fn test_source_needs_lower_orders() {
        let table = CouplingTable::default();
        let p0 = Array3::from_elem((1, 1, 1), Complex64::new(1.0, 0.0));
        assert!(nonlinear_source(table.get(2).unwrap(), &[&p0], 1.0, &Nonlinearity::Uniform(1.0)).is_err());
    }
}
