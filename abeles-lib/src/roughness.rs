//! Interface roughness models.
//!
//! [`RoughnessModel::NevotCroce`] leaves the stack alone and lets the kernel
//! damp each interface's Fresnel coefficient. [`RoughnessModel::Microslab`]
//! replaces the graded regions around rough interfaces with thin sharp slabs
//! sampled from a smooth profile, which the kernel then treats exactly.
//!
//! Depth `z` is measured from interface 0 (fronting / first layer) into the
//! stack. Interface `j` sits at the summed thickness of layers `1..=j`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ReflError};
use crate::slab::{Slab, Stack};
use crate::special::erf;
use crate::spinor::sin_cos_deg;

/// Upper bound on the slabs one [`microslab`] call may produce.
pub const MAX_SLABS: usize = 1_000_000;

/// Shape of the SLD step across one rough interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceProfile {
    /// Error function; the derivative is a Gaussian of rms width σ.
    #[default]
    Erf,
    /// Hyperbolic tangent with its width chosen to give the same rms σ.
    Tanh,
}

impl InterfaceProfile {
    /// Fraction of the step completed at offset `u` from an interface of
    /// rms width `sigma`. Exactly 0 or 1 beyond [`extent`](Self::extent).
    pub fn step(&self, u: f64, sigma: f64) -> f64 {
        let ext = self.extent(sigma);
        if u <= -ext {
            return 0.0;
        }
        if u >= ext {
            return 1.0;
        }
        match self {
            InterfaceProfile::Erf => 0.5 * (1.0 + erf(u / (std::f64::consts::SQRT_2 * sigma))),
            InterfaceProfile::Tanh => {
                // sech² has variance π²w²/12
                let w = 2.0 * 3f64.sqrt() * sigma / std::f64::consts::PI;
                0.5 * (1.0 + (u / w).tanh())
            }
        }
    }

    /// Half-width of the graded region around an interface.
    pub fn extent(&self, sigma: f64) -> f64 {
        match self {
            InterfaceProfile::Erf => 6.0 * sigma,
            InterfaceProfile::Tanh => 12.0 * sigma,
        }
    }
}

/// How interface roughness enters the calculation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum RoughnessModel {
    /// Analytic damping `exp(−2 k k' σ²)` inside the kernel.
    #[default]
    NevotCroce,
    /// Explicit discretization of graded interfaces into slabs of at most
    /// `dz` Å.
    Microslab {
        dz: f64,
        #[serde(default)]
        profile: InterfaceProfile,
    },
}

impl RoughnessModel {
    /// The stack the kernel should see under this model.
    pub fn apply<'a>(&self, stack: &'a Stack) -> Result<Cow<'a, Stack>> {
        match *self {
            RoughnessModel::NevotCroce => Ok(Cow::Borrowed(stack)),
            RoughnessModel::Microslab { dz, profile } => {
                check_step(dz)?;
                if !stack.has_roughness() {
                    return Ok(Cow::Borrowed(stack));
                }
                microslab(stack, dz, profile).map(Cow::Owned)
            }
        }
    }
}

/// One sample of the depth profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfilePoint {
    pub z: f64,
    pub sld_real: f64,
    pub sld_imag: f64,
    pub sld_magnetic: f64,
    pub theta_m: f64,
}

/// Evaluate the graded SLD profile of `stack` at depths `z`.
pub fn sld_profile(stack: &Stack, z: &[f64], profile: InterfaceProfile) -> Vec<ProfilePoint> {
    let graded = GradedProfile::new(stack, profile);
    z.iter()
        .map(|&z| {
            let s = graded.sample(z);
            ProfilePoint {
                z,
                sld_real: s.sld_real,
                sld_imag: s.sld_imag,
                sld_magnetic: s.sld_magnetic,
                theta_m: s.theta_m,
            }
        })
        .collect()
}

/// Replace every rough interface with sharp slabs no thicker than `dz`.
///
/// The graded window around each rough interface is cut into equal slabs
/// sampled at their midpoints; regions outside every window keep the
/// original layer values. Magnetization is blended as an in-plane vector.
/// Adjacent identical slabs are merged, and slabs identical to a boundary
/// medium are absorbed into it. The returned stack has no roughness.
///
/// A step that would cut the windows into more than [`MAX_SLABS`] slabs is
/// rejected with [`ReflError::InvalidStepSize`].
pub fn microslab(stack: &Stack, dz: f64, profile: InterfaceProfile) -> Result<Stack> {
    check_step(dz)?;
    let graded = GradedProfile::new(stack, profile);

    let mut windows: Vec<(f64, f64)> = graded
        .interfaces
        .iter()
        .map(|i| {
            let ext = profile.extent(i.sigma);
            (i.z - ext, i.z + ext)
        })
        .collect();
    windows.sort_by(|a, b| a.0.total_cmp(&b.0));
    let windows = merge_windows(windows);

    let mut cuts: Vec<f64> = graded.depth.clone();
    cuts.extend(windows.iter().flat_map(|&(lo, hi)| [lo, hi]));
    cuts.sort_by(f64::total_cmp);
    cuts.dedup_by(|a, b| (*a - *b).abs() <= 1e-9);

    let counts: Vec<f64> = cuts
        .windows(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let mid = 0.5 * (a + b);
            if windows.iter().any(|&(lo, hi)| mid > lo && mid < hi) {
                ((b - a) / dz).ceil().max(1.0)
            } else {
                1.0
            }
        })
        .collect();
    let total: f64 = counts.iter().sum();
    if total > MAX_SLABS as f64 {
        warn!(dz, slabs = total, limit = MAX_SLABS, "microslab step too fine");
        return Err(ReflError::InvalidStepSize(dz));
    }

    let mut slabs: Vec<Slab> = Vec::new();
    for (pair, &n) in cuts.windows(2).zip(&counts) {
        let (a, b) = (pair[0], pair[1]);
        let n = n as usize;
        let h = (b - a) / n as f64;
        for i in 0..n {
            let mut slab = graded.sample(a + (i as f64 + 0.5) * h);
            slab.thickness = h;
            push_merged(&mut slabs, slab);
        }
    }

    let front = boundary(stack.fronting());
    let back = boundary(stack.backing());
    let start = slabs.iter().take_while(|s| same_material(s, &front)).count();
    let tail = slabs[start..]
        .iter()
        .rev()
        .take_while(|s| same_material(s, &back))
        .count();
    let end = slabs.len() - tail;

    let mut layers = Vec::with_capacity(end - start + 2);
    layers.push(front);
    layers.extend_from_slice(&slabs[start..end]);
    layers.push(back);
    debug!(
        source_layers = stack.len(),
        slabs = layers.len() - 2,
        dz,
        "microslab discretization"
    );
    Stack::new(layers)
}

/// Cut a layer whose composition varies with depth into sharp slabs.
///
/// `profile` is evaluated at the midpoint of each of the
/// `ceil(thickness / dz)` equal slabs, with `z` measured from the top of the
/// layer. Its `thickness` and `roughness` are overwritten; adjacent identical
/// slabs are merged. The slabs slot between the boundary media of a
/// [`Stack`], e.g. a helical magnetization `theta_m(z) = 360 z / period`.
pub fn sample_layer<F>(thickness: f64, dz: f64, profile: F) -> Result<Vec<Slab>>
where
    F: Fn(f64) -> Slab,
{
    check_step(dz)?;
    if !thickness.is_finite() {
        return Err(ReflError::NonFinite {
            field: "thickness",
            index: 0,
        });
    }
    if thickness < 0.0 {
        return Err(ReflError::NegativeValue {
            field: "thickness",
            index: 0,
            value: thickness,
        });
    }
    let n = (thickness / dz).ceil().max(1.0);
    if n > MAX_SLABS as f64 {
        warn!(dz, slabs = n, limit = MAX_SLABS, "layer sampling step too fine");
        return Err(ReflError::InvalidStepSize(dz));
    }
    let n = n as usize;
    let h = thickness / n as f64;

    let mut slabs = Vec::new();
    for i in 0..n {
        let slab = Slab {
            thickness: h,
            roughness: 0.0,
            ..profile((i as f64 + 0.5) * h)
        };
        push_merged(&mut slabs, slab);
    }
    debug!(thickness, dz, slabs = slabs.len(), "sampled layer profile");
    Ok(slabs)
}

fn check_step(dz: f64) -> Result<()> {
    if dz > 0.0 && dz.is_finite() {
        Ok(())
    } else {
        Err(ReflError::InvalidStepSize(dz))
    }
}

fn merge_windows(sorted: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(sorted.len());
    for (lo, hi) in sorted {
        match merged.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

fn boundary(slab: &Slab) -> Slab {
    Slab {
        thickness: 0.0,
        roughness: 0.0,
        ..*slab
    }
}

fn same_material(a: &Slab, b: &Slab) -> bool {
    a.sld_real == b.sld_real
        && a.sld_imag == b.sld_imag
        && a.sld_magnetic == b.sld_magnetic
        && (a.sld_magnetic == 0.0 || a.theta_m == b.theta_m)
}

fn push_merged(slabs: &mut Vec<Slab>, slab: Slab) {
    match slabs.last_mut() {
        Some(last) if same_material(last, &slab) => last.thickness += slab.thickness,
        _ => slabs.push(slab),
    }
}

/// Nuclear real, nuclear imaginary, and the two in-plane magnetization
/// components of a slab.
fn components(slab: &Slab) -> [f64; 4] {
    let (sin, cos) = sin_cos_deg(slab.theta_m);
    [
        slab.sld_real,
        slab.sld_imag,
        slab.sld_magnetic * cos,
        slab.sld_magnetic * sin,
    ]
}

struct RoughInterface {
    z: f64,
    sigma: f64,
    delta: [f64; 4],
}

struct GradedProfile<'a> {
    layers: &'a [Slab],
    /// Depth of interface `j`, nondecreasing.
    depth: Vec<f64>,
    interfaces: Vec<RoughInterface>,
    shape: InterfaceProfile,
}

impl<'a> GradedProfile<'a> {
    fn new(stack: &'a Stack, shape: InterfaceProfile) -> Self {
        let layers = stack.layers();
        let mut depth = Vec::with_capacity(layers.len() - 1);
        let mut z = 0.0;
        for j in 0..layers.len() - 1 {
            if j > 0 {
                z += layers[j].thickness;
            }
            depth.push(z);
        }
        let interfaces = (0..layers.len() - 1)
            .filter(|&j| layers[j].roughness > 0.0)
            .map(|j| {
                let above = components(&layers[j]);
                let below = components(&layers[j + 1]);
                RoughInterface {
                    z: depth[j],
                    sigma: layers[j].roughness,
                    delta: std::array::from_fn(|k| below[k] - above[k]),
                }
            })
            .collect();
        GradedProfile {
            layers,
            depth,
            interfaces,
            shape,
        }
    }

    /// Material at depth `z`.
    ///
    /// The sharp-interface layer at `z` is corrected by `Δv·(step − H)` for
    /// each rough interface, which is exactly zero outside its window, so
    /// ungraded regions reproduce the original layer bit for bit.
    fn sample(&self, z: f64) -> Slab {
        let base = self.layers[self.depth.partition_point(|&d| d <= z)];
        let mut v = components(&base);
        let mut graded = false;
        for iface in &self.interfaces {
            let u = z - iface.z;
            let sharp = if u >= 0.0 { 1.0 } else { 0.0 };
            let c = self.shape.step(u, iface.sigma) - sharp;
            if c != 0.0 {
                graded = true;
                for (value, delta) in v.iter_mut().zip(iface.delta) {
                    *value += c * delta;
                }
            }
        }
        if !graded {
            return boundary(&base);
        }
        let sld_magnetic = v[2].hypot(v[3]);
        Slab {
            thickness: 0.0,
            sld_real: v[0],
            sld_imag: v[1].max(0.0),
            roughness: 0.0,
            sld_magnetic,
            theta_m: if sld_magnetic > 0.0 {
                v[3].atan2(v[2]).to_degrees()
            } else {
                0.0
            },
        }
    }
}
