//! Parratt recursion: combine interface reflection amplitudes from the
//! backing medium up to the fronting medium.

use num_complex::Complex64;

use crate::kernel::{ReflectivityKernel, fresnel, nevot_croce, vertical_wavevector};
use crate::slab::Slab;

/// Default backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parratt;

impl ReflectivityKernel for Parratt {
    fn name(&self) -> &'static str {
        "parratt"
    }

    fn amplitude_at(&self, layers: &[Slab], kz: f64) -> Complex64 {
        recurse(layers, kz, layers[0].sld_real, |_, slab| slab.sld_real)
    }
}

/// Reflection amplitude at `kz` with a caller-chosen real SLD per layer.
///
/// `sld_of(j, slab)` gives the real SLD layer `j` presents to the neutron,
/// which lets the collinear magnetic path reuse this loop for each spin.
/// `sld_ref` is the SLD that `kz` is measured against.
pub(crate) fn recurse<F>(layers: &[Slab], kz: f64, sld_ref: f64, sld_of: F) -> Complex64
where
    F: Fn(usize, &Slab) -> f64,
{
    let kz_sq = kz * kz;
    let last = layers.len() - 1;
    let wavevector = |j: usize| {
        let slab = &layers[j];
        vertical_wavevector(kz_sq, sld_ref, sld_of(j, slab), slab.sld_imag)
    };

    let i2 = Complex64::new(0.0, 2.0);
    let one = Complex64::new(1.0, 0.0);
    let mut k_next = wavevector(last);
    let mut r = Complex64::new(0.0, 0.0);
    for j in (0..last).rev() {
        let k = wavevector(j);
        let f = fresnel(k, k_next) * nevot_croce(k, k_next, layers[j].roughness);
        // Im k ≥ 0, so |phase| ≤ 1 however thick or absorbing the layer is
        let phase = (i2 * k_next * layers[j + 1].thickness).exp();
        let rp = r * phase;
        r = (f + rp) / (one + f * rp);
        k_next = k;
    }
    r
}
