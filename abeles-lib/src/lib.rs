//! Specular reflectivity of stratified media.
//!
//! Scalar amplitudes come from [`kernel`] (Parratt or characteristic-matrix
//! backends), spin-resolved ones from [`magnetic`]. [`roughness`] decides
//! how graded interfaces enter, [`resolution`] smears the result, and
//! [`simulate`] chains the three.

pub mod constants;
pub mod error;
pub mod interp;
pub mod kernel;
pub mod magnetic;
pub mod matrix;
pub mod parratt;
pub mod quadrature;
pub mod resolution;
pub mod roughness;
pub mod simulate;
pub mod slab;
pub mod special;
pub mod spinor;

pub use error::{ReflError, Result};
pub use kernel::{Backend, ReflectivityKernel, intensity, reflectivity};
pub use magnetic::{
    CrossSection, GuideField, MagneticAmplitudes, MagneticMode, magnetic_amplitudes,
    magnetic_reflectivity, non_collinear_layers,
};
pub use matrix::CharacteristicMatrix;
pub use parratt::Parratt;
pub use resolution::{
    DEFAULT_POINTS, KernelShape, NegativeQ, Resolution, ResolutionConfig, SmearingPlan,
    WidthConvention, convolve, convolve_samples,
};
pub use roughness::{
    InterfaceProfile, MAX_SLABS, ProfilePoint, RoughnessModel, microslab, sample_layer,
    sld_profile,
};
pub use simulate::{PolarizedReflectivity, Probe, SimulationConfig, simulate, simulate_polarized};
pub use slab::{Slab, Stack, StackWarning};

pub use num_complex::Complex64;
