//! Layered media: slabs and the fronting-to-backing stack they form.
//!
//! A [`Stack`] holds its layers in one contiguous array, index 0 being the
//! fronting medium (where the beam comes from) and the last index the
//! backing medium. Both boundary media are semi-infinite, so their thickness
//! is ignored.
//!
//! Roughness convention: the roughness of slab `j` is the rms width of the
//! interface *below* it, between slab `j` and slab `j + 1`. A stack with `N`
//! interior layers therefore has `N + 1` interfaces, and the backing slab's
//! roughness is ignored.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::SLD_UNIT;
use crate::error::{Result, ReflError, check_finite, check_len, check_non_negative};

/// One layer of a stratified medium.
///
/// SLDs are absolute (Å⁻²); thickness and roughness are in Å; `theta_m` is in
/// degrees, measured in the sample plane from the in-plane guide field axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Slab {
    pub thickness: f64,
    pub sld_real: f64,
    #[serde(default)]
    pub sld_imag: f64,
    /// Rms width of the interface between this slab and the next one down.
    #[serde(default)]
    pub roughness: f64,
    #[serde(default)]
    pub sld_magnetic: f64,
    #[serde(default)]
    pub theta_m: f64,
}

impl Slab {
    pub fn new(thickness: f64, sld_real: f64, sld_imag: f64, roughness: f64) -> Self {
        Slab {
            thickness,
            sld_real,
            sld_imag,
            roughness,
            sld_magnetic: 0.0,
            theta_m: 0.0,
        }
    }

    /// A semi-infinite medium with the given SLD.
    pub fn medium(sld_real: f64, sld_imag: f64) -> Self {
        Slab::new(0.0, sld_real, sld_imag, 0.0)
    }

    pub fn with_magnetism(mut self, sld_magnetic: f64, theta_m: f64) -> Self {
        self.sld_magnetic = sld_magnetic;
        self.theta_m = theta_m;
        self
    }

    pub fn is_magnetic(&self) -> bool {
        self.sld_magnetic != 0.0
    }
}

/// Conditions that are physically questionable but still computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StackWarning {
    /// An interface is rougher than one of the layers it bounds.
    RoughnessExceedsThickness {
        interface: usize,
        layer: usize,
        roughness: f64,
        thickness: f64,
    },
}

/// Fronting medium, interior layers, backing medium.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Slab>", into = "Vec<Slab>")]
pub struct Stack {
    layers: Vec<Slab>,
}

impl Stack {
    /// Validate and build a stack from fronting..=backing slabs.
    pub fn new(mut layers: Vec<Slab>) -> Result<Self> {
        if layers.len() < 2 {
            return Err(ReflError::TooFewLayers(layers.len()));
        }
        let last = layers.len() - 1;
        layers[0].thickness = 0.0;
        layers[last].thickness = 0.0;
        layers[last].roughness = 0.0;

        for (i, slab) in layers.iter().enumerate() {
            if !slab.sld_real.is_finite() {
                return Err(at("sld_real", i));
            }
            if !slab.theta_m.is_finite() {
                return Err(at("theta_m", i));
            }
            for (field, value) in [
                ("thickness", slab.thickness),
                ("sld_imag", slab.sld_imag),
                ("roughness", slab.roughness),
                ("sld_magnetic", slab.sld_magnetic),
            ] {
                if !value.is_finite() {
                    return Err(at(field, i));
                }
                if value < 0.0 {
                    return Err(ReflError::NegativeValue {
                        field,
                        index: i,
                        value,
                    });
                }
            }
        }

        let stack = Stack { layers };
        for warning in stack.warnings() {
            let StackWarning::RoughnessExceedsThickness {
                interface,
                layer,
                roughness,
                thickness,
            } = warning;
            warn!(
                interface,
                layer,
                roughness,
                thickness,
                "interface roughness exceeds adjacent layer thickness"
            );
        }
        Ok(stack)
    }

    /// Build a stack from column arrays.
    ///
    /// # Arguments
    /// * `thickness` - Interior layer thicknesses, length N
    /// * `sld_real` - SLD of every layer including both boundaries, length N + 2
    /// * `sld_imag` - Absorptive SLD, length N + 2 (zeros if `None`)
    /// * `roughness` - Interface roughness, length N + 1 (zeros if `None`);
    ///   entry `j` sits between layer `j` and `j + 1`
    pub fn from_arrays(
        thickness: &[f64],
        sld_real: &[f64],
        sld_imag: Option<&[f64]>,
        roughness: Option<&[f64]>,
    ) -> Result<Self> {
        let n = thickness.len();
        check_len("sld_real", sld_real, n + 2)?;
        check_non_negative("thickness", thickness)?;
        check_finite("sld_real", sld_real)?;
        if let Some(irho) = sld_imag {
            check_len("sld_imag", irho, n + 2)?;
            check_non_negative("sld_imag", irho)?;
        }
        if let Some(sigma) = roughness {
            check_len("roughness", sigma, n + 1)?;
            check_non_negative("roughness", sigma)?;
        }

        let layers = (0..n + 2)
            .map(|i| Slab {
                thickness: if i == 0 || i == n + 1 { 0.0 } else { thickness[i - 1] },
                sld_real: sld_real[i],
                sld_imag: sld_imag.map_or(0.0, |v| v[i]),
                roughness: roughness.and_then(|v| v.get(i).copied()).unwrap_or(0.0),
                sld_magnetic: 0.0,
                theta_m: 0.0,
            })
            .collect();
        Stack::new(layers)
    }

    /// Attach magnetic SLD magnitudes and in-plane angles (degrees), one per layer.
    pub fn with_magnetism(mut self, sld_magnetic: &[f64], theta_m: &[f64]) -> Result<Self> {
        let len = self.layers.len();
        check_len("sld_magnetic", sld_magnetic, len)?;
        check_len("theta_m", theta_m, len)?;
        check_non_negative("sld_magnetic", sld_magnetic)?;
        check_finite("theta_m", theta_m)?;
        for ((slab, &rhom), &thetam) in self.layers.iter_mut().zip(sld_magnetic).zip(theta_m) {
            slab.sld_magnetic = rhom;
            slab.theta_m = thetam;
        }
        Ok(self)
    }

    /// Import a `thickness, sld, isld, roughness` table, one row per layer.
    ///
    /// SLDs are in units of 10⁻⁶ Å⁻². The table stores each interface's
    /// roughness on the row *below* it (row `i` describes the interface
    /// between rows `i - 1` and `i`), so the roughness column is shifted up by
    /// one row on import. The fronting row's roughness and both boundary
    /// thicknesses are ignored.
    pub fn from_layer_table(rows: &[[f64; 4]]) -> Result<Self> {
        let layers = rows
            .iter()
            .enumerate()
            .map(|(i, row)| Slab {
                thickness: row[0],
                sld_real: row[1] * SLD_UNIT,
                sld_imag: row[2] * SLD_UNIT,
                roughness: rows.get(i + 1).map_or(0.0, |below| below[3]),
                sld_magnetic: 0.0,
                theta_m: 0.0,
            })
            .collect();
        Stack::new(layers)
    }

    /// Repeat the interior layers `block` (stack indices) `n` times in place.
    ///
    /// The roughness of the block's last layer is used between repeats and
    /// for the interface below the final repeat.
    pub fn with_repeats(&self, block: Range<usize>, n: usize) -> Result<Self> {
        let last = self.layers.len() - 1;
        if block.start < 1 || block.end > last || block.is_empty() {
            return Err(ReflError::InvalidConfig(format!(
                "repeat block {block:?} must lie within interior layers 1..{last}"
            )));
        }
        if n == 0 {
            return Err(ReflError::InvalidConfig(
                "repeat count must be at least 1".to_string(),
            ));
        }
        let mut layers = Vec::with_capacity(self.layers.len() + block.len() * (n - 1));
        layers.extend_from_slice(&self.layers[..block.start]);
        for _ in 0..n {
            layers.extend_from_slice(&self.layers[block.clone()]);
        }
        layers.extend_from_slice(&self.layers[block.end..]);
        Stack::new(layers)
    }

    /// The same stack seen from the backing side.
    pub fn reversed(&self) -> Stack {
        let len = self.layers.len();
        let layers = (0..len)
            .map(|i| {
                let mut slab = self.layers[len - 1 - i];
                slab.roughness = if i + 1 < len {
                    self.layers[len - 2 - i].roughness
                } else {
                    0.0
                };
                slab
            })
            .collect();
        Stack { layers }
    }

    pub fn layers(&self) -> &[Slab] {
        &self.layers
    }

    /// Number of layers including both boundary media.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn interior_count(&self) -> usize {
        self.layers.len() - 2
    }

    pub fn interface_count(&self) -> usize {
        self.layers.len() - 1
    }

    pub fn fronting(&self) -> &Slab {
        &self.layers[0]
    }

    pub fn backing(&self) -> &Slab {
        &self.layers[self.layers.len() - 1]
    }

    /// Interior thicknesses, length N.
    pub fn thickness(&self) -> Vec<f64> {
        self.interior().iter().map(|s| s.thickness).collect()
    }

    /// Interface roughness, length N + 1.
    pub fn roughness(&self) -> Vec<f64> {
        self.layers[..self.layers.len() - 1]
            .iter()
            .map(|s| s.roughness)
            .collect()
    }

    pub fn total_thickness(&self) -> f64 {
        self.interior().iter().map(|s| s.thickness).sum()
    }

    pub fn is_magnetic(&self) -> bool {
        self.layers.iter().any(Slab::is_magnetic)
    }

    pub fn has_roughness(&self) -> bool {
        self.layers.iter().any(|s| s.roughness > 0.0)
    }

    /// True when every layer has the fronting medium's nuclear SLD.
    pub fn is_uniform(&self) -> bool {
        let front = self.layers[0];
        self.layers
            .iter()
            .all(|s| s.sld_real == front.sld_real && s.sld_imag == front.sld_imag)
    }

    /// Interfaces whose roughness exceeds the thickness of an adjacent
    /// interior layer. Such profiles are computed but are rarely physical.
    pub fn warnings(&self) -> Vec<StackWarning> {
        let last = self.layers.len() - 1;
        let mut out = Vec::new();
        for j in 0..last {
            let sigma = self.layers[j].roughness;
            if sigma <= 0.0 {
                continue;
            }
            for layer in [j, j + 1] {
                if layer == 0 || layer == last {
                    continue;
                }
                let thickness = self.layers[layer].thickness;
                if sigma > thickness {
                    out.push(StackWarning::RoughnessExceedsThickness {
                        interface: j,
                        layer,
                        roughness: sigma,
                        thickness,
                    });
                }
            }
        }
        out
    }

    fn interior(&self) -> &[Slab] {
        &self.layers[1..self.layers.len() - 1]
    }
}

impl TryFrom<Vec<Slab>> for Stack {
    type Error = ReflError;

    fn try_from(layers: Vec<Slab>) -> Result<Self> {
        Stack::new(layers)
    }
}

impl From<Stack> for Vec<Slab> {
    fn from(stack: Stack) -> Self {
        stack.layers
    }
}

fn at(field: &'static str, index: usize) -> ReflError {
    ReflError::NonFinite { field, index }
}
