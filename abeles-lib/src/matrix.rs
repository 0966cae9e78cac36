//! Abeles characteristic-matrix backend.
//!
//! Layer `j` contributes `[[1, r_j], [r_j·e_j, e_j]]` with
//! `e_j = exp(2i k_j d_j)`; this is the textbook layer matrix multiplied by
//! `exp(i k_j d_j)`, which leaves the amplitude ratio unchanged but keeps
//! every entry bounded by one. The running product is renormalized after
//! each layer so deep stacks cannot underflow.

use num_complex::Complex64;

use crate::kernel::{ReflectivityKernel, fresnel, nevot_croce, vertical_wavevector};
use crate::slab::Slab;
use crate::spinor::Mat2;

#[derive(Debug, Clone, Copy, Default)]
pub struct CharacteristicMatrix;

impl ReflectivityKernel for CharacteristicMatrix {
    fn name(&self) -> &'static str {
        "matrix"
    }

    fn amplitude_at(&self, layers: &[Slab], kz: f64) -> Complex64 {
        let kz_sq = kz * kz;
        let sld_ref = layers[0].sld_real;
        let wavevector =
            |slab: &Slab| vertical_wavevector(kz_sq, sld_ref, slab.sld_real, slab.sld_imag);

        let i2 = Complex64::new(0.0, 2.0);
        let one = Complex64::new(1.0, 0.0);
        let mut product = Mat2::IDENTITY;
        let mut k = wavevector(&layers[0]);
        for j in 0..layers.len() - 1 {
            let k_next = wavevector(&layers[j + 1]);
            let r = fresnel(k, k_next) * nevot_croce(k, k_next, layers[j].roughness);
            let e = (i2 * k * layers[j].thickness).exp();
            product = product * Mat2::new(one, r, r * e, e);

            let norm = product.max_norm();
            if norm > 0.0 && norm.is_finite() {
                product = product.scale(1.0 / norm);
            }
            k = k_next;
        }
        product.get(1, 0) / product.get(0, 0)
    }
}
