/// 4π, the prefactor relating SLD to the square of the vertical wavevector.
pub const PI4: f64 = 4.0 * std::f64::consts::PI;

/// Customary SLD unit (Å⁻²). Tables quoted as "2.07" mean 2.07e-6 Å⁻².
pub const SLD_UNIT: f64 = 1e-6;

/// Magnetic SLD produced by an applied field of 1 T (Å⁻²/T).
pub const B2SLD: f64 = 2.31604654e-6;

/// Ratio σ / FWHM for a Gaussian: 1 / (2·sqrt(2 ln 2)).
pub const FWHM_TO_SIGMA: f64 = 0.424_660_900_144_009_5;

/// |kz| below which the incident wave is treated as grazing (Å⁻¹).
pub const KZ_EPSILON: f64 = 1e-10;

/// Smallest wavevector magnitude used as a divisor inside the spinor recursion.
pub const KZ_FLOOR: f64 = 1e-30;
