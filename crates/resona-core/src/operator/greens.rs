//! Scalar Helmholtz Green's function on a voxel lattice.
//!
//! The volume potential of a source density $s$ is
//!
//! $$
//! V[s](\mathbf{r}) = \int G(\mathbf{r} - \mathbf{r}') \, s(\mathbf{r}') \, d\mathbf{r}',
//! \qquad G(R) = \frac{e^{ikR}}{4\pi R}.
//! $$
//!
//! On a uniform grid each voxel contributes $G(R)\,dx^3$ sampled at its
//! centre. The singular self-contribution is integrated analytically over
//! the sphere of equal volume.

use std::f64::consts::PI;

use num_complex::Complex64;

/// $G(R) = e^{ikR} / (4\pi R)$ for $R > 0$.
///
/// # Arguments
/// * `r` - Distance between observation and source points (m).
/// * `k` - Complex wavenumber (m⁻¹); a positive imaginary part attenuates.
pub fn greens_function(r: f64, k: Complex64) -> Complex64 {
    let ikr = Complex64::i() * k * r;
    ikr.exp() / (4.0 * PI * r)
}

/// Radius of the sphere with the same volume as a cube of side `dx`.
pub fn equivalent_radius(dx: f64) -> f64 {
    (3.0 * dx.powi(3) / (4.0 * PI)).cbrt()
}

/// Integral of $G$ over the equal-volume sphere centred on the observation
/// point:
///
/// $$
/// \int_{|r|<a} G \, dV = \left(\frac{1}{k^2} - \frac{ia}{k}\right) e^{ika} - \frac{1}{k^2}.
/// $$
pub fn self_term(k: Complex64, dx: f64) -> Complex64 {
    let a = equivalent_radius(dx);
    let inv_k2 = 1.0 / (k * k);
    (inv_k2 - Complex64::i() * a / k) * (Complex64::i() * k * a).exp() - inv_k2
}

/// Kernel entry for a lattice offset `(i, j, k)` voxels: the self term at
/// the origin, otherwise $G(R)\,dx^3$.
pub fn lattice_sample(offset: [usize; 3], dx: f64, k: Complex64) -> Complex64 {
    if offset == [0, 0, 0] {
        return self_term(k, dx);
    }
    let r = dx
        * ((offset[0] * offset[0] + offset[1] * offset[1] + offset[2] * offset[2]) as f64).sqrt();
    greens_function(r, k) * dx.powi(3)
}
