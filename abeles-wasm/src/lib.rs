//! WASM bindings for the abeles reflectivity engine.
//!
//! Layer arguments follow the web calculators' layout: `depth`, `rho`,
//! `irho` (and `rhoM`, `thetaM`) have one entry per layer including both
//! boundary media, `sigma` has one entry per interface, and SLDs are in
//! units of 10⁻⁶ Å⁻².
//!
//! Build with:
//! ```sh
//! wasm-pack build abeles-wasm
//! ```

use wasm_bindgen::prelude::*;

use abeles::constants::SLD_UNIT;
use abeles::{
    CrossSection, DEFAULT_POINTS, GuideField, MagneticMode, Probe, ReflError, Resolution,
    ResolutionConfig, SimulationConfig, Stack, WidthConvention,
};

fn to_js(e: ReflError) -> JsError {
    JsError::new(&e.to_string())
}

fn scaled(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| v * SLD_UNIT).collect()
}

fn build_stack(
    depth: &[f64],
    sigma: &[f64],
    rho: &[f64],
    irho: &[f64],
) -> Result<Stack, ReflError> {
    if depth.len() < 2 {
        return Err(ReflError::TooFewLayers(depth.len()));
    }
    let thickness = &depth[1..depth.len() - 1];
    Stack::from_arrays(thickness, &scaled(rho), Some(&scaled(irho)), Some(sigma))
}

fn interleave(values: impl Iterator<Item = abeles::Complex64>) -> Vec<f64> {
    values.flat_map(|z| [z.re, z.im]).collect()
}

// ── Amplitudes ──

/// Complex reflection amplitude at each `kz`, as interleaved `[re, im, ...]`.
#[wasm_bindgen]
pub fn refl(
    depth: &[f64],
    sigma: &[f64],
    rho: &[f64],
    irho: &[f64],
    kz: &[f64],
) -> Result<Vec<f64>, JsError> {
    let stack = build_stack(depth, sigma, rho, irho).map_err(to_js)?;
    Ok(interleave(abeles::Backend::default().amplitudes(&stack, kz).into_iter()))
}

/// Offset between the calculators' `thetaM` (270° parallel to the guide
/// field) and the library's `theta_m` (0° parallel).
const THETA_M_OFFSET: f64 = 270.0;

#[allow(clippy::too_many_arguments)]
fn spin_amplitudes(
    depth: &[f64],
    sigma: &[f64],
    rho: &[f64],
    irho: &[f64],
    rho_m: &[f64],
    theta_m: &[f64],
    h: f64,
    aguide: f64,
    kz: &[f64],
) -> Result<Vec<f64>, ReflError> {
    let theta_m: Vec<f64> = theta_m.iter().map(|t| t - THETA_M_OFFSET).collect();
    let stack = build_stack(depth, sigma, rho, irho)?.with_magnetism(&scaled(rho_m), &theta_m)?;
    let guide = GuideField::new(aguide, h);
    let amps = abeles::magnetic_amplitudes(&stack, kz, &guide, MagneticMode::Full)?;
    let per_point = (0..amps.len()).flat_map(|i| CrossSection::ALL.map(|xs| amps.get(xs)[i]));
    Ok(interleave(per_point))
}

/// Spin-resolved amplitudes at each `kz`: eight values per point, the
/// `--`, `-+`, `+-`, `++` amplitudes as `re, im` pairs.
///
/// `thetaM` and `AGUIDE` are in degrees, `H` in tesla. `thetaM = 270`
/// puts the magnetization parallel to the guide field, `thetaM = 0` or
/// `180` across it.
#[wasm_bindgen]
#[allow(clippy::too_many_arguments, non_snake_case)]
pub fn magrefl(
    depth: &[f64],
    sigma: &[f64],
    rho: &[f64],
    irho: &[f64],
    rhoM: &[f64],
    thetaM: &[f64],
    H: f64,
    AGUIDE: f64,
    kz: &[f64],
) -> Result<Vec<f64>, JsError> {
    spin_amplitudes(depth, sigma, rho, irho, rhoM, thetaM, H, AGUIDE, kz).map_err(to_js)
}

// ── Smeared reflectivity ──

/// Resolution-smeared `|r|²` at each `q` with `dQ = dq_over_q·Q` (1σ),
/// integrated with `points` quadrature nodes (0 selects the default rule).
#[wasm_bindgen]
pub fn reflectivity(
    depth: &[f64],
    sigma: &[f64],
    rho: &[f64],
    irho: &[f64],
    q: &[f64],
    dq_over_q: f64,
    points: usize,
) -> Result<Vec<f64>, JsError> {
    smeared_reflectivity(depth, sigma, rho, irho, q, dq_over_q, points).map_err(to_js)
}

fn smeared_reflectivity(
    depth: &[f64],
    sigma: &[f64],
    rho: &[f64],
    irho: &[f64],
    q: &[f64],
    dq_over_q: f64,
    points: usize,
) -> Result<Vec<f64>, ReflError> {
    let stack = build_stack(depth, sigma, rho, irho)?;
    let probe = Probe::new(q.to_vec()).with_resolution(Resolution::Fractional(dq_over_q));
    let config = SimulationConfig {
        resolution: ResolutionConfig {
            points: if points == 0 { DEFAULT_POINTS } else { points },
            ..Default::default()
        },
        ..Default::default()
    };
    abeles::simulate(&stack, &probe, &config)
}

/// Smear a tabulated curve `(q_calc, r_calc)` onto `q` with per-point `dq`.
#[wasm_bindgen]
pub fn smear(
    q: &[f64],
    dq: &[f64],
    q_calc: &[f64],
    r_calc: &[f64],
    points: usize,
    fwhm: bool,
) -> Result<Vec<f64>, JsError> {
    let config = ResolutionConfig {
        points,
        width: if fwhm {
            WidthConvention::Fwhm
        } else {
            WidthConvention::Sigma
        },
        ..Default::default()
    };
    let dq = Resolution::PointWise(dq.to_vec());
    abeles::convolve_samples(q, &dq, &config, q_calc, r_calc).map_err(to_js)
}
