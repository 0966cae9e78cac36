//! Instrumental resolution smearing in Q.
//!
//! Each output point `Q_i` is a weighted average of the intrinsic curve at
//! abscissae `Q_i + σ_i·x_j`, where `(x_j, w_j)` is one unit quadrature rule
//! shared by every point. A [`SmearingPlan`] lays out all abscissae up front
//! so the kernel can be evaluated in a single batch.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::FWHM_TO_SIGMA;
use crate::error::{Result, ReflError, check_finite, check_len, check_non_negative};
use crate::interp::{interp, interp_semilog};
use crate::quadrature::gauss_legendre;

/// Shape of the resolution function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelShape {
    #[default]
    Gaussian,
    /// Box of half-width `√3·σ`, which has standard deviation `σ`.
    Uniform,
}

/// How a `dQ` value is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidthConvention {
    /// One standard deviation.
    #[default]
    Sigma,
    /// Full width at half maximum of a Gaussian.
    Fwhm,
}

/// What to do with quadrature nodes that fall across `Q = 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeQ {
    /// Drop them and renormalize the remaining weights.
    #[default]
    Truncate,
    /// Mirror them back to the point's side of zero.
    Reflect,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub shape: KernelShape,
    pub width: WidthConvention,
    /// Quadrature points per output point.
    pub points: usize,
    /// Integration half-width in σ for the Gaussian shape.
    pub half_width: f64,
    pub negative_q: NegativeQ,
}

/// Default rule size. Converged to better than 1e-4 on micron-thick films at
/// dQ/Q = 0.05, where the fringe period is comparable to the kernel width.
pub const DEFAULT_POINTS: usize = 75;

impl Default for ResolutionConfig {
    fn default() -> Self {
        ResolutionConfig {
            shape: KernelShape::Gaussian,
            width: WidthConvention::Sigma,
            points: DEFAULT_POINTS,
            half_width: 3.5,
            negative_q: NegativeQ::Truncate,
        }
    }
}

impl ResolutionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.points == 0 {
            return Err(ReflError::InvalidResolution(
                "at least one quadrature point is required".to_string(),
            ));
        }
        if !(self.half_width > 0.0 && self.half_width.is_finite()) {
            return Err(ReflError::InvalidResolution(format!(
                "half_width must be positive, got {}",
                self.half_width
            )));
        }
        Ok(())
    }

    /// Standard deviation corresponding to a `dQ` value.
    pub fn sigma(&self, dq: f64) -> f64 {
        match self.width {
            WidthConvention::Sigma => dq,
            WidthConvention::Fwhm => dq * FWHM_TO_SIGMA,
        }
    }

    /// Unit rule: offsets in σ and normalized weights.
    fn unit_rule(&self) -> (Vec<f64>, Vec<f64>) {
        let (t, w) = gauss_legendre(self.points);
        let (x, mut w): (Vec<f64>, Vec<f64>) = match self.shape {
            KernelShape::Gaussian => t
                .iter()
                .zip(&w)
                .map(|(&t, &w)| {
                    let x = self.half_width * t;
                    (x, w * (-0.5 * x * x).exp())
                })
                .unzip(),
            KernelShape::Uniform => (t.iter().map(|&t| 3f64.sqrt() * t).collect(), w),
        };
        let total: f64 = w.iter().sum();
        w.iter_mut().for_each(|w| *w /= total);
        (x, w)
    }
}

/// Resolution width of every point.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Resolution {
    /// No smearing.
    #[default]
    None,
    /// `dQ = f·|Q|`.
    Fractional(f64),
    /// The same `dQ` everywhere.
    Constant(f64),
    /// One `dQ` per point.
    PointWise(Vec<f64>),
}

impl Resolution {
    /// `dQ` at each point of `q`, in the units the config expects.
    pub fn widths(&self, q: &[f64]) -> Result<Vec<f64>> {
        let dq = match self {
            Resolution::None => vec![0.0; q.len()],
            Resolution::Fractional(f) => {
                check_non_negative("dq/q", &[*f])?;
                q.iter().map(|q| f * q.abs()).collect()
            }
            Resolution::Constant(dq) => {
                check_non_negative("dq", &[*dq])?;
                vec![*dq; q.len()]
            }
            Resolution::PointWise(dq) => {
                check_len("dq", dq, q.len())?;
                check_non_negative("dq", dq)?;
                dq.clone()
            }
        };
        Ok(dq)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Resolution::None)
    }
}

/// Abscissae and weights for smearing a curve at a fixed set of points.
#[derive(Debug, Clone, PartialEq)]
pub struct SmearingPlan {
    abscissae: Vec<f64>,
    weights: Vec<f64>,
    /// Point `i` owns `abscissae[offsets[i]..offsets[i + 1]]`.
    offsets: Vec<usize>,
}

impl SmearingPlan {
    pub fn new(q: &[f64], resolution: &Resolution, config: &ResolutionConfig) -> Result<Self> {
        check_finite("q", q)?;
        config.validate()?;
        let dq = resolution.widths(q)?;
        let (x, w) = config.unit_rule();

        let mut abscissae = Vec::with_capacity(q.len() * x.len());
        let mut weights = Vec::with_capacity(q.len() * x.len());
        let mut offsets = Vec::with_capacity(q.len() + 1);
        offsets.push(0);
        for (&qi, &dqi) in q.iter().zip(&dq) {
            let sigma = config.sigma(dqi);
            let start = abscissae.len();
            if sigma > 0.0 {
                for (&xj, &wj) in x.iter().zip(&w) {
                    let a = qi + sigma * xj;
                    let crossed = if qi > 0.0 {
                        a < 0.0
                    } else if qi < 0.0 {
                        a > 0.0
                    } else {
                        a < 0.0
                    };
                    match (crossed, config.negative_q) {
                        (false, _) => {
                            abscissae.push(a);
                            weights.push(wj);
                        }
                        (true, NegativeQ::Reflect) => {
                            abscissae.push(-a);
                            weights.push(wj);
                        }
                        (true, NegativeQ::Truncate) => {}
                    }
                }
                let total: f64 = weights[start..].iter().sum();
                if total > 0.0 {
                    weights[start..].iter_mut().for_each(|w| *w /= total);
                }
            }
            if abscissae.len() == start {
                abscissae.push(qi);
                weights.push(1.0);
            }
            offsets.push(abscissae.len());
        }
        debug!(
            points = q.len(),
            evaluations = abscissae.len(),
            shape = ?config.shape,
            "resolution plan"
        );
        Ok(SmearingPlan {
            abscissae,
            weights,
            offsets,
        })
    }

    /// Every Q at which the intrinsic curve is needed, point by point.
    pub fn abscissae(&self) -> &[f64] {
        &self.abscissae
    }

    /// Number of output points.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Weighted sums of `values` (one per abscissa) for each output point.
    pub fn reduce(&self, values: &[f64]) -> Vec<f64> {
        self.offsets
            .windows(2)
            .map(|span| {
                let range = span[0]..span[1];
                self.weights[range.clone()]
                    .iter()
                    .zip(&values[range])
                    .map(|(w, v)| w * v)
                    .sum()
            })
            .collect()
    }
}

/// Smear `kernel` (a function of Q returning R at each Q) over the
/// resolution of each point of `q`.
pub fn convolve<F>(
    q: &[f64],
    dq: &Resolution,
    config: &ResolutionConfig,
    kernel: F,
) -> Result<Vec<f64>>
where
    F: FnOnce(&[f64]) -> Result<Vec<f64>>,
{
    let plan = SmearingPlan::new(q, dq, config)?;
    let values = kernel(plan.abscissae())?;
    check_len("kernel output", &values, plan.abscissae().len())?;
    Ok(plan.reduce(&values))
}

/// Smear a tabulated curve `(q_calc, r_calc)`.
///
/// `q_calc` must be strictly ascending. The table is interpolated
/// semi-logarithmically when every `r_calc` is positive, linearly
/// otherwise, and clamped at its ends.
pub fn convolve_samples(
    q: &[f64],
    dq: &Resolution,
    config: &ResolutionConfig,
    q_calc: &[f64],
    r_calc: &[f64],
) -> Result<Vec<f64>> {
    if q_calc.is_empty() {
        return Err(ReflError::InvalidResolution(
            "tabulated curve is empty".to_string(),
        ));
    }
    check_len("r_calc", r_calc, q_calc.len())?;
    check_finite("q_calc", q_calc)?;
    if let Some(i) = q_calc.windows(2).position(|p| p[1] <= p[0]) {
        return Err(ReflError::InvalidResolution(format!(
            "q_calc must be strictly ascending (index {})",
            i + 1
        )));
    }
    let semilog = r_calc.iter().all(|&r| r > 0.0);
    convolve(q, dq, config, |at| {
        Ok(if semilog {
            interp_semilog(at, q_calc, r_calc)
        } else {
            interp(at, q_calc, r_calc)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn identity(q: &[f64]) -> Result<Vec<f64>> {
        Ok(q.to_vec())
    }

    fn square(q: &[f64]) -> Result<Vec<f64>> {
        Ok(q.iter().map(|q| q * q).collect())
    }

    #[test]
    fn test_no_resolution_is_exact() {
        let q = [0.01, 0.05, 0.1];
        let r = convolve(&q, &Resolution::None, &ResolutionConfig::default(), square).unwrap();
        assert_eq!(r, vec![0.01 * 0.01, 0.05 * 0.05, 0.1 * 0.1]);
    }

    #[test]
    fn test_symmetric_rule_preserves_linear() {
        let q = [0.05, 0.1, 0.2];
        let config = ResolutionConfig::default();
        let r = convolve(&q, &Resolution::Constant(0.002), &config, identity).unwrap();
        for (a, b) in r.iter().zip(&q) {
            assert_relative_eq!(a, b, max_relative = 1e-13);
        }
    }

    #[test]
    fn test_uniform_variance() {
        let config = ResolutionConfig {
            shape: KernelShape::Uniform,
            ..Default::default()
        };
        let r = convolve(&[0.1], &Resolution::Constant(0.01), &config, square).unwrap();
        assert_relative_eq!(r[0], 0.01 + 1e-4, max_relative = 1e-12);
    }

    #[test]
    fn test_fwhm_convention() {
        let config = ResolutionConfig {
            width: WidthConvention::Fwhm,
            ..Default::default()
        };
        assert_relative_eq!(config.sigma(2.354_820_045), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_negative_q_truncate_and_reflect() {
        let q = [0.001];
        let dq = Resolution::Constant(0.001);
        let plan = SmearingPlan::new(&q, &dq, &ResolutionConfig::default()).unwrap();
        assert!(plan.abscissae().iter().all(|&a| a >= 0.0));
        assert!(plan.abscissae().len() < DEFAULT_POINTS);

        let reflect = ResolutionConfig {
            negative_q: NegativeQ::Reflect,
            ..Default::default()
        };
        let plan = SmearingPlan::new(&q, &dq, &reflect).unwrap();
        assert_eq!(plan.abscissae().len(), DEFAULT_POINTS);
        assert!(plan.abscissae().iter().all(|&a| a >= 0.0));

        // negative points stay negative
        let plan = SmearingPlan::new(&[-0.001], &dq, &ResolutionConfig::default()).unwrap();
        assert!(plan.abscissae().iter().all(|&a| a <= 0.0));
    }

    #[test]
    fn test_fractional_scales_with_q() {
        let q = [0.02, 0.2];
        let config = ResolutionConfig::default();
        let plan = SmearingPlan::new(&q, &Resolution::Fractional(0.05), &config).unwrap();
        let a = plan.abscissae();
        let n = config.points;
        let spread_low = a[n - 1] - a[0];
        let spread_high = a[2 * n - 1] - a[n];
        assert_relative_eq!(spread_high / spread_low, 10.0, max_relative = 1e-12);
    }

    #[test]
    fn test_invalid_inputs() {
        let config = ResolutionConfig {
            points: 0,
            ..Default::default()
        };
        assert!(matches!(
            convolve(&[0.1], &Resolution::Constant(0.01), &config, identity),
            Err(ReflError::InvalidResolution(_))
        ));
        assert!(matches!(
            SmearingPlan::new(
                &[0.1, 0.2],
                &Resolution::PointWise(vec![0.01]),
                &ResolutionConfig::default()
            ),
            Err(ReflError::LengthMismatch { field: "dq", .. })
        ));
        let unsorted = convolve_samples(
            &[0.1],
            &Resolution::None,
            &ResolutionConfig::default(),
            &[0.2, 0.1],
            &[1.0, 1.0],
        );
        assert!(unsorted.is_err());
    }

    #[test]
    fn test_convolve_samples_matches_table_without_smearing() {
        let q_calc = [0.01, 0.02, 0.03];
        let r_calc = [1.0, 1e-2, 1e-4];
        let config = ResolutionConfig::default();
        let r = convolve_samples(&[0.015, 0.02], &Resolution::None, &config, &q_calc, &r_calc)
            .unwrap();
        assert_relative_eq!(r[0], 1e-1, max_relative = 1e-12);
        assert_relative_eq!(r[1], 1e-2, max_relative = 1e-12);
    }

    #[test]
    fn test_config_from_json() {
        let config: ResolutionConfig =
            serde_json::from_str(r#"{"width":"fwhm","points":51}"#).unwrap();
        assert_eq!(config.points, 51);
        assert_eq!(config.width, WidthConvention::Fwhm);
        assert_eq!(config.half_width, 3.5);
        let res: Resolution =
            serde_json::from_str(r#"{"kind":"fractional","value":0.05}"#).unwrap();
        assert_eq!(res, Resolution::Fractional(0.05));
    }
}
