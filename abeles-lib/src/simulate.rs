//! End-to-end calculation: roughness model, kernel, resolution, then
//! `scale·R + background`.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{Result, ReflError, check_finite};
use crate::kernel::{Backend, intensity};
use crate::magnetic::{CrossSection, GuideField, MagneticMode, magnetic_amplitudes};
use crate::resolution::{Resolution, ResolutionConfig, SmearingPlan, convolve};
use crate::roughness::RoughnessModel;
use crate::slab::Stack;

/// Measurement points and their resolution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Probe {
    /// Wavevector transfer Q (Å⁻¹).
    pub q: Vec<f64>,
    #[serde(default)]
    pub resolution: Resolution,
}

impl Probe {
    pub fn new(q: Vec<f64>) -> Self {
        Probe {
            q,
            resolution: Resolution::None,
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// `kz = Q / 2` for each point.
    pub fn kz(&self) -> Vec<f64> {
        self.q.iter().map(|q| 0.5 * q).collect()
    }
}

/// Everything that selects how a reflectivity curve is computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub backend: Backend,
    pub roughness: RoughnessModel,
    pub resolution: ResolutionConfig,
    pub scale: f64,
    pub background: f64,
    pub magnetic_mode: MagneticMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            backend: Backend::default(),
            roughness: RoughnessModel::default(),
            resolution: ResolutionConfig::default(),
            scale: 1.0,
            background: 0.0,
            magnetic_mode: MagneticMode::default(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || !self.background.is_finite() {
            return Err(ReflError::InvalidConfig(format!(
                "scale and background must be finite, got {} and {}",
                self.scale, self.background
            )));
        }
        self.resolution.validate()
    }

    fn observe(&self, r: Vec<f64>) -> Vec<f64> {
        r.into_iter()
            .map(|r| self.scale * r + self.background)
            .collect()
    }
}

/// Smeared reflectivity of the four polarization cross sections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolarizedReflectivity {
    pub mm: Vec<f64>,
    pub mp: Vec<f64>,
    pub pm: Vec<f64>,
    pub pp: Vec<f64>,
}

impl PolarizedReflectivity {
    pub fn get(&self, xs: CrossSection) -> &[f64] {
        match xs {
            CrossSection::MinusMinus => &self.mm,
            CrossSection::MinusPlus => &self.mp,
            CrossSection::PlusMinus => &self.pm,
            CrossSection::PlusPlus => &self.pp,
        }
    }
}

/// Unpolarized reflectivity of a non-magnetic stack at each probe point.
///
/// Magnetized stacks are rejected; their cross sections come from
/// [`simulate_polarized`].
#[instrument(skip_all, fields(layers = stack.len(), points = probe.q.len()))]
pub fn simulate(stack: &Stack, probe: &Probe, config: &SimulationConfig) -> Result<Vec<f64>> {
    config.validate()?;
    if stack.is_magnetic() {
        return Err(ReflError::InvalidConfig(
            "stack is magnetized; use simulate_polarized for its cross sections".to_string(),
        ));
    }
    let stack = config.roughness.apply(stack)?;
    let r = convolve(&probe.q, &probe.resolution, &config.resolution, |q| {
        let kz: Vec<f64> = q.iter().map(|q| 0.5 * q).collect();
        Ok(intensity(&config.backend.amplitudes(&stack, &kz)))
    })?;
    Ok(config.observe(r))
}

/// Spin-resolved reflectivity at each probe point.
///
/// The kernel is evaluated once per quadrature abscissa and the same
/// smearing is applied to all four cross sections.
#[instrument(skip_all, fields(layers = stack.len(), points = probe.q.len()))]
pub fn simulate_polarized(
    stack: &Stack,
    probe: &Probe,
    guide: &GuideField,
    config: &SimulationConfig,
) -> Result<PolarizedReflectivity> {
    config.validate()?;
    check_finite("q", &probe.q)?;
    let stack = config.roughness.apply(stack)?;
    let plan = SmearingPlan::new(&probe.q, &probe.resolution, &config.resolution)?;
    let kz: Vec<f64> = plan.abscissae().iter().map(|q| 0.5 * q).collect();
    let amplitudes = magnetic_amplitudes(&stack, &kz, guide, config.magnetic_mode)?;
    let smeared = |xs: CrossSection| config.observe(plan.reduce(&amplitudes.reflectivity(xs)));
    Ok(PolarizedReflectivity {
        mm: smeared(CrossSection::MinusMinus),
        mp: smeared(CrossSection::MinusPlus),
        pm: smeared(CrossSection::PlusMinus),
        pp: smeared(CrossSection::PlusPlus),
    })
}
