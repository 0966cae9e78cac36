//! The unpolarized reflectivity kernel interface and its backends.
//!
//! Every backend computes the same complex amplitude `r(kz)`; they differ
//! only in how the layer recursion is arranged numerically. Backends are
//! plain values selected through [`Backend`], so callers and configuration
//! files pick one without knowing the concrete type.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::constants::{KZ_EPSILON, PI4};
use crate::error::Result;
use crate::matrix::CharacteristicMatrix;
use crate::parratt::Parratt;
use crate::slab::{Slab, Stack};

/// A sharp-interface reflectivity calculator for a single `kz > 0`.
///
/// Implementations receive fronting..=backing layers and must treat the
/// roughness of layer `j` as the Nevot-Croce width of interface `j`/`j + 1`.
pub trait ReflectivityKernel: Send + Sync {
    fn name(&self) -> &'static str;

    fn amplitude_at(&self, layers: &[Slab], kz: f64) -> Complex64;
}

/// Numerically equivalent kernel implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Backing-to-fronting recursion of reflection amplitudes.
    #[default]
    Parratt,
    /// Abeles characteristic-matrix product.
    Matrix,
}

impl Backend {
    pub fn kernel(&self) -> &'static dyn ReflectivityKernel {
        match self {
            Backend::Parratt => &Parratt,
            Backend::Matrix => &CharacteristicMatrix,
        }
    }

    /// Complex reflection amplitudes of `stack` at each `kz`.
    pub fn amplitudes(&self, stack: &Stack, kz: &[f64]) -> Vec<Complex64> {
        amplitudes_with(self.kernel(), stack, kz)
    }
}

/// Evaluate `kernel` at every `kz`, handling grazing and back-side incidence.
///
/// Negative `kz` is incidence from the backing side: the stack is reversed
/// and evaluated at `|kz|`. Points with `|kz|` below [`KZ_EPSILON`] return
/// `-1` (or `0` for a stack with no contrast). Points whose evaluation
/// overflows come back as non-finite values.
pub fn amplitudes_with(
    kernel: &dyn ReflectivityKernel,
    stack: &Stack,
    kz: &[f64],
) -> Vec<Complex64> {
    debug!(
        backend = kernel.name(),
        layers = stack.len(),
        points = kz.len(),
        "evaluating reflectivity kernel"
    );
    let reversed = kz.iter().any(|&k| k <= -KZ_EPSILON).then(|| stack.reversed());
    let grazing = if stack.is_uniform() {
        Complex64::new(0.0, 0.0)
    } else {
        Complex64::new(-1.0, 0.0)
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = kz.iter();

    #[cfg(feature = "parallel")]
    let iterator = kz.par_iter();

    let r: Vec<Complex64> = iterator
        .map(|&k| {
            if k.abs() < KZ_EPSILON {
                grazing
            } else if k > 0.0 {
                kernel.amplitude_at(stack.layers(), k)
            } else {
                let back = reversed.as_ref().unwrap_or(stack);
                kernel.amplitude_at(back.layers(), -k)
            }
        })
        .collect();

    report_non_finite(kernel.name(), &r);
    r
}

/// Scalar reflection amplitude from column arrays using the default backend.
///
/// # Arguments
/// * `kz` - Vertical wavevector, `Q / 2` (Å⁻¹)
/// * `thickness` - Interior layer thicknesses, length N (Å)
/// * `sld_real` - SLD including fronting (index 0) and backing (index N + 1), Å⁻²
/// * `sld_imag` - Absorptive SLD, length N + 2 (zeros if `None`)
/// * `roughness` - Interface roughness, length N + 1 (zeros if `None`);
///   entry `j` sits between layer `j` and `j + 1`
pub fn reflectivity(
    kz: &[f64],
    thickness: &[f64],
    sld_real: &[f64],
    sld_imag: Option<&[f64]>,
    roughness: Option<&[f64]>,
) -> Result<Vec<Complex64>> {
    crate::error::check_finite("kz", kz)?;
    let stack = Stack::from_arrays(thickness, sld_real, sld_imag, roughness)?;
    Ok(Backend::default().amplitudes(&stack, kz))
}

/// `|r|²` for each amplitude.
pub fn intensity(r: &[Complex64]) -> Vec<f64> {
    r.iter().map(|z| z.norm_sqr()).collect()
}

/// Vertical wavevector in a layer, on the branch with `Im k ≥ 0`.
///
/// `k² = kz² − 4π(ρ − ρ_ref) + 4πi·ρi`, so a downward wave `exp(i k z)` never
/// grows inside the stack.
#[inline]
pub(crate) fn vertical_wavevector(
    kz_sq: f64,
    sld_ref: f64,
    sld_real: f64,
    sld_imag: f64,
) -> Complex64 {
    let k_sq = Complex64::new(kz_sq - PI4 * (sld_real - sld_ref), PI4 * sld_imag);
    let k = k_sq.sqrt();
    if k.im < 0.0 { -k } else { k }
}

/// Fresnel coefficient `(k − k') / (k + k')`, zero between identical media.
#[inline]
pub(crate) fn fresnel(k: Complex64, k_next: Complex64) -> Complex64 {
    let sum = k + k_next;
    if sum.norm_sqr() == 0.0 {
        Complex64::new(0.0, 0.0)
    } else {
        (k - k_next) / sum
    }
}

/// Nevot-Croce damping `exp(−2 k k' σ²)` of an interface's Fresnel coefficient.
#[inline]
pub(crate) fn nevot_croce(k: Complex64, k_next: Complex64, sigma: f64) -> Complex64 {
    if sigma == 0.0 {
        Complex64::new(1.0, 0.0)
    } else {
        (k * k_next * (-2.0 * sigma * sigma)).exp()
    }
}

pub(crate) fn report_non_finite(source: &'static str, r: &[Complex64]) {
    let bad = r.iter().filter(|z| !z.is_finite()).count();
    if bad > 0 {
        warn!(source, non_finite = bad, total = r.len(), "non-finite reflectivity points");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wavevector_branch_decays() {
        // below the critical edge the wave is evanescent
        let k = vertical_wavevector(1e-6, 0.0, 2.07e-6, 0.0);
        assert_eq!(k.re, 0.0);
        assert!(k.im > 0.0);
        // absorption gives a positive imaginary part
        let k = vertical_wavevector(1e-3, 0.0, 2.07e-6, 1e-7);
        assert!(k.re > 0.0 && k.im > 0.0);
    }

    #[test]
    fn test_fresnel_identical_media() {
        let z = Complex64::new(0.0, 0.0);
        assert_eq!(fresnel(z, z), z);
    }

    #[test]
    fn test_grazing_and_uniform() {
        let stack = Stack::from_arrays(&[], &[0.0, 2.07e-6], None, None).unwrap();
        let r = Backend::Parratt.amplitudes(&stack, &[0.0]);
        assert_eq!(r[0], Complex64::new(-1.0, 0.0));

        let flat = Stack::from_arrays(&[50.0], &[1e-6, 1e-6, 1e-6], None, None).unwrap();
        let r = Backend::Parratt.amplitudes(&flat, &[0.0, 0.01]);
        assert_eq!(r[0], Complex64::new(0.0, 0.0));
        assert!(r[1].norm() < 1e-15);
    }

    #[test]
    fn test_negative_kz_reflects_from_backing() {
        let stack = Stack::from_arrays(&[], &[0.0, 2.07e-6], None, None).unwrap();
        let r = Backend::Parratt.amplitudes(&stack, &[-0.05]);
        let k0 = vertical_wavevector(0.0025, 2.07e-6, 2.07e-6, 0.0);
        let k1 = vertical_wavevector(0.0025, 2.07e-6, 0.0, 0.0);
        let expected = (k0 - k1) / (k0 + k1);
        assert_relative_eq!(r[0].re, expected.re, max_relative = 1e-12);
    }

    #[test]
    fn test_reflectivity_rejects_bad_shapes() {
        assert!(reflectivity(&[0.01], &[10.0], &[0.0, 1e-6], None, None).is_err());
        assert!(reflectivity(&[f64::NAN], &[], &[0.0, 1e-6], None, None).is_err());
        assert!(reflectivity(&[0.01], &[-10.0], &[0.0, 1e-6, 2e-6], None, None).is_err());
    }
}
