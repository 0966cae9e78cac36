//! Polarized neutron reflectivity.
//!
//! Each layer presents the neutron with the nuclear SLD plus a magnetic term
//! `±B`, where `B` is the in-plane magnetization plus the Zeeman shift of
//! the applied field. Expressed in the guide-field frame (`z'` along the
//! field), `B·σ` is diagonalized per layer and the two eigenmodes are
//! propagated together through the same backing-to-fronting sweep as the
//! scalar kernel, with 2×2 matrices in place of scalars. The off-diagonal
//! entries of the result are the spin-flip amplitudes.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::constants::{B2SLD, KZ_EPSILON, KZ_FLOOR};
use crate::error::{Result, ReflError, check_finite};
use crate::kernel::{report_non_finite, vertical_wavevector};
use crate::parratt;
use crate::slab::{Slab, Stack};
use crate::spinor::{Mat2, SpinBasis, sin_cos_deg};

/// Relative transverse field below which a layer counts as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// Orientation and strength of the applied guide field.
///
/// `aguide` is in degrees: 270° puts the field in the sample plane, along
/// the axis from which `theta_m` is measured. `h` is in tesla.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideField {
    #[serde(default = "default_aguide")]
    pub aguide: f64,
    #[serde(default)]
    pub h: f64,
}

fn default_aguide() -> f64 {
    270.0
}

impl Default for GuideField {
    fn default() -> Self {
        GuideField {
            aguide: default_aguide(),
            h: 0.0,
        }
    }
}

impl GuideField {
    pub fn new(aguide: f64, h: f64) -> Self {
        GuideField { aguide, h }
    }

    fn validate(&self) -> Result<()> {
        if !self.aguide.is_finite() || !self.h.is_finite() {
            return Err(ReflError::InvalidConfig(format!(
                "guide field must be finite, got aguide={} h={}",
                self.aguide, self.h
            )));
        }
        Ok(())
    }

    /// Effective magnetic SLD vector `(bx', by', bz')` felt in `slab`, with
    /// `z'` along the guide field.
    ///
    /// The field is tilted out of the sample plane by `α = aguide − 270°`;
    /// magnetization lies in the sample plane at `theta_m` from the in-plane
    /// guide axis. The Zeeman term `B2SLD·h` lies along `z'` in every layer.
    pub fn local_field(&self, slab: &Slab) -> [f64; 3] {
        let (sin_t, cos_t) = sin_cos_deg(slab.theta_m);
        let (sin_a, cos_a) = sin_cos_deg(self.aguide - 270.0);
        let rho_m = slab.sld_magnetic;
        [
            rho_m * sin_t,
            -rho_m * cos_t * sin_a,
            rho_m * cos_t * cos_a + B2SLD * self.h,
        ]
    }
}

/// How to treat magnetization that is not parallel to the guide field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagneticMode {
    /// Full spinor recursion with spin-flip scattering.
    #[default]
    Full,
    /// Two independent scalar passes with `ρ ± B`. Rejects any layer whose
    /// field is not parallel or antiparallel to the guide field.
    Collinear,
}

/// A polarization cross section: incident spin, then reflected spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrossSection {
    #[serde(rename = "--")]
    MinusMinus,
    #[serde(rename = "-+")]
    MinusPlus,
    #[serde(rename = "+-")]
    PlusMinus,
    #[serde(rename = "++")]
    PlusPlus,
}

impl CrossSection {
    pub const ALL: [CrossSection; 4] = [
        CrossSection::MinusMinus,
        CrossSection::MinusPlus,
        CrossSection::PlusMinus,
        CrossSection::PlusPlus,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CrossSection::MinusMinus => "--",
            CrossSection::MinusPlus => "-+",
            CrossSection::PlusMinus => "+-",
            CrossSection::PlusPlus => "++",
        }
    }

    pub fn is_spin_flip(&self) -> bool {
        matches!(self, CrossSection::MinusPlus | CrossSection::PlusMinus)
    }

    /// (incident, reflected) spin indices, 0 for `+` and 1 for `−`.
    fn indices(&self) -> (usize, usize) {
        match self {
            CrossSection::MinusMinus => (1, 1),
            CrossSection::MinusPlus => (1, 0),
            CrossSection::PlusMinus => (0, 1),
            CrossSection::PlusPlus => (0, 0),
        }
    }
}

/// The four spin-dependent reflection amplitudes at each `kz`.
#[derive(Debug, Clone, PartialEq)]
pub struct MagneticAmplitudes {
    pub mm: Vec<Complex64>,
    pub mp: Vec<Complex64>,
    pub pm: Vec<Complex64>,
    pub pp: Vec<Complex64>,
    /// Re κ of the `+` and `−` states in the incident medium, per point.
    incident_flux: Vec<[f64; 2]>,
}

impl MagneticAmplitudes {
    fn from_matrices(matrices: &[Mat2], incident_flux: Vec<[f64; 2]>) -> Self {
        // r_ab = R[b][a]: column is the incident spin, row the reflected one
        let pick = |row: usize, col: usize| -> Vec<Complex64> {
            matrices.iter().map(|m| m.get(row, col)).collect()
        };
        MagneticAmplitudes {
            mm: pick(1, 1),
            mp: pick(0, 1),
            pm: pick(1, 0),
            pp: pick(0, 0),
            incident_flux,
        }
    }

    pub fn len(&self) -> usize {
        self.pp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pp.is_empty()
    }

    pub fn get(&self, xs: CrossSection) -> &[Complex64] {
        match xs {
            CrossSection::MinusMinus => &self.mm,
            CrossSection::MinusPlus => &self.mp,
            CrossSection::PlusMinus => &self.pm,
            CrossSection::PlusPlus => &self.pp,
        }
    }

    /// Reflected intensity of one cross section.
    ///
    /// Spin-flip channels are scaled by `Re κ_out / Re κ_in`: with an applied
    /// field the two spin states travel at different speeds in the incident
    /// medium, so equal amplitudes do not carry equal flux. Points where the
    /// incident state does not propagate are returned uncorrected.
    pub fn reflectivity(&self, xs: CrossSection) -> Vec<f64> {
        let amplitudes = self.get(xs);
        if !xs.is_spin_flip() {
            return amplitudes.iter().map(|r| r.norm_sqr()).collect();
        }
        let (incident, reflected) = xs.indices();
        amplitudes
            .iter()
            .zip(&self.incident_flux)
            .map(|(r, flux)| {
                if flux[incident] > 0.0 {
                    r.norm_sqr() * flux[reflected] / flux[incident]
                } else {
                    r.norm_sqr()
                }
            })
            .collect()
    }
}

/// Layers whose effective field is not parallel to the guide field.
pub fn non_collinear_layers(stack: &Stack, guide: &GuideField) -> Vec<usize> {
    stack
        .layers()
        .iter()
        .enumerate()
        .filter(|(_, slab)| !is_collinear(guide.local_field(slab)))
        .map(|(j, _)| j)
        .collect()
}

fn is_collinear([bx, by, bz]: [f64; 3]) -> bool {
    let transverse = bx.hypot(by);
    transverse == 0.0 || transverse <= COLLINEAR_TOLERANCE * transverse.hypot(bz)
}

/// Spin-dependent amplitudes of `stack` at each `kz`.
///
/// Negative `kz` is incidence from the backing side. Points with
/// `|kz| < KZ_EPSILON` give `r++ = r−− = −1` and no spin flip.
pub fn magnetic_amplitudes(
    stack: &Stack,
    kz: &[f64],
    guide: &GuideField,
    mode: MagneticMode,
) -> Result<MagneticAmplitudes> {
    guide.validate()?;
    check_finite("kz", kz)?;
    debug!(
        layers = stack.len(),
        points = kz.len(),
        aguide = guide.aguide,
        h = guide.h,
        ?mode,
        "evaluating magnetic kernel"
    );

    let front = SpinStack::new(stack, guide);
    let back = kz
        .iter()
        .any(|&k| k <= -KZ_EPSILON)
        .then(|| SpinStack::new(&stack.reversed(), guide));

    if mode == MagneticMode::Collinear {
        for (layer, basis) in front.bases.iter().enumerate() {
            if !basis.collinear {
                let [bx, by, bz] = guide.local_field(&front.layers[layer]);
                return Err(ReflError::NonCollinear {
                    layer,
                    angle: bx.hypot(by).atan2(bz).to_degrees(),
                });
            }
        }
    } else {
        for (layer, basis) in front.bases.iter().enumerate() {
            if !basis.collinear {
                trace!(layer, "non-collinear layer, spin-flip scattering enabled");
            }
        }
    }

    let grazing = if stack.is_uniform() && !stack.is_magnetic() {
        Mat2::ZERO
    } else {
        Mat2::IDENTITY.scale(-1.0)
    };

    #[cfg(not(feature = "parallel"))]
    let iterator = kz.iter();

    #[cfg(feature = "parallel")]
    let iterator = kz.par_iter();

    let results: Vec<(Mat2, [f64; 2])> = iterator
        .map(|&k| {
            if k.abs() < KZ_EPSILON {
                return (grazing, [0.0, 0.0]);
            }
            let spin_stack = if k > 0.0 {
                &front
            } else {
                back.as_ref().unwrap_or(&front)
            };
            let k = k.abs();
            let r = match mode {
                MagneticMode::Full => spin_stack.spinor_amplitude(k),
                MagneticMode::Collinear => spin_stack.collinear_amplitude(k),
            };
            (r, spin_stack.incident_flux(k))
        })
        .collect();

    let (matrices, flux): (Vec<Mat2>, Vec<[f64; 2]>) = results.into_iter().unzip();
    let amplitudes = MagneticAmplitudes::from_matrices(&matrices, flux);
    for xs in CrossSection::ALL {
        report_non_finite(xs.label(), amplitudes.get(xs));
    }
    Ok(amplitudes)
}

/// Spin-dependent amplitudes from column arrays, full spinor treatment.
///
/// # Arguments
/// * `kz` - Vertical wavevector, `Q / 2` (Å⁻¹)
/// * `thickness` - Interior layer thicknesses, length N (Å)
/// * `sld_real` - Nuclear SLD, length N + 2 (Å⁻²)
/// * `sld_imag` - Absorptive SLD, length N + 2 (zeros if `None`)
/// * `theta_m` - In-plane magnetization angle from the guide axis, length N + 2 (degrees)
/// * `sld_magnetic` - Magnetic SLD magnitude, length N + 2 (Å⁻²)
/// * `roughness` - Interface roughness, length N + 1 (zeros if `None`)
/// * `aguide` - Guide field angle (degrees, 270 = in plane)
/// * `h` - Applied field (T)
#[allow(clippy::too_many_arguments)]
pub fn magnetic_reflectivity(
    kz: &[f64],
    thickness: &[f64],
    sld_real: &[f64],
    sld_imag: Option<&[f64]>,
    theta_m: &[f64],
    sld_magnetic: &[f64],
    roughness: Option<&[f64]>,
    aguide: f64,
    h: f64,
) -> Result<MagneticAmplitudes> {
    let stack = Stack::from_arrays(thickness, sld_real, sld_imag, roughness)?
        .with_magnetism(sld_magnetic, theta_m)?;
    magnetic_amplitudes(&stack, kz, &GuideField::new(aguide, h), MagneticMode::Full)
}

/// A stack prepared for spinor propagation: per-layer eigenbases and the
/// basis overlaps at each interface.
struct SpinStack {
    layers: Vec<Slab>,
    bases: Vec<SpinBasis>,
    /// Longitudinal field per layer, used by the collinear pass.
    field_z: Vec<f64>,
    /// `U_j† U_{j+1}` for each interface.
    overlaps: Vec<Mat2>,
}

impl SpinStack {
    fn new(stack: &Stack, guide: &GuideField) -> Self {
        let layers = stack.layers().to_vec();
        let fields: Vec<[f64; 3]> = layers.iter().map(|s| guide.local_field(s)).collect();
        let bases: Vec<SpinBasis> = fields
            .iter()
            .map(|&b| {
                let basis = SpinBasis::from_field(b);
                if !basis.collinear && is_collinear(b) {
                    // numerically parallel: keep the exact guide-frame basis
                    SpinBasis::from_field([0.0, 0.0, b[2]])
                } else {
                    basis
                }
            })
            .collect();
        let overlaps = bases
            .windows(2)
            .map(|pair| {
                if pair[0].collinear && pair[1].collinear {
                    Mat2::IDENTITY
                } else {
                    pair[0].vectors.adjoint() * pair[1].vectors
                }
            })
            .collect();
        SpinStack {
            layers,
            bases,
            field_z: fields.iter().map(|b| b[2]).collect(),
            overlaps,
        }
    }

    /// Vertical wavevectors of the two eigenmodes in layer `j`.
    fn wavevectors(&self, kz_sq: f64, j: usize) -> [Complex64; 2] {
        let slab = &self.layers[j];
        let sld_ref = self.layers[0].sld_real;
        self.bases[j]
            .values
            .map(|split| vertical_wavevector(kz_sq, sld_ref, slab.sld_real + split, slab.sld_imag))
    }

    fn incident_flux(&self, kz: f64) -> [f64; 2] {
        self.wavevectors(kz * kz, 0).map(|k| k.re)
    }

    fn spinor_amplitude(&self, kz: f64) -> Mat2 {
        let kz_sq = kz * kz;
        let last = self.layers.len() - 1;
        let i = Complex64::new(0.0, 1.0);
        let half = Complex64::new(0.5, 0.0);

        let mut k_next = self.wavevectors(kz_sq, last);
        let mut r = Mat2::ZERO;
        for j in (0..last).rev() {
            let k = self.wavevectors(kz_sq, j);
            let d = self.layers[j + 1].thickness;
            let phase = Mat2::diag((i * k_next[0] * d).exp(), (i * k_next[1] * d).exp());
            let x = phase * r * phase;

            let s = &self.overlaps[j];
            let sigma_sq = self.layers[j].roughness.powi(2);
            let mut same = Mat2::ZERO;
            let mut cross = Mat2::ZERO;
            for m in 0..2 {
                let km = if k[m].norm() < KZ_FLOOR {
                    Complex64::new(KZ_FLOOR, 0.0)
                } else {
                    k[m]
                };
                for n in 0..2 {
                    let ratio = k_next[n] / km;
                    let (mut a, mut b) = (half * (1.0 + ratio), half * (1.0 - ratio));
                    if sigma_sq > 0.0 {
                        let minus = km - k_next[n];
                        let plus = km + k_next[n];
                        a *= (-0.5 * sigma_sq * minus * minus).exp();
                        b *= (-0.5 * sigma_sq * plus * plus).exp();
                    }
                    same.0[m][n] = s.get(m, n) * a;
                    cross.0[m][n] = s.get(m, n) * b;
                }
            }

            // down = (same + cross·X)·down', up = (cross + same·X)·down'
            let Some(inverse) = (same + cross * x).inverse() else {
                return Mat2::nan();
            };
            r = (cross + same * x) * inverse;
            k_next = k;
        }

        let u0 = self.bases[0].vectors;
        if self.bases[0].collinear {
            r
        } else {
            u0 * r * u0.adjoint()
        }
    }

    fn collinear_amplitude(&self, kz: f64) -> Mat2 {
        let sld_ref = self.layers[0].sld_real;
        let plus =
            parratt::recurse(&self.layers, kz, sld_ref, |j, s| s.sld_real + self.field_z[j]);
        let minus =
            parratt::recurse(&self.layers, kz, sld_ref, |j, s| s.sld_real - self.field_z[j]);
        Mat2::diag(plus, minus)
    }
}
