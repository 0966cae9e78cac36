use thiserror::Error;

/// Errors reported before any reflectivity is computed.
///
/// Numerical trouble at a single Q point is never an error: it shows up as a
/// non-finite value in the output array instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReflError {
    #[error("a stack needs fronting and backing media, got {0} layer(s)")]
    TooFewLayers(usize),

    #[error("{field} has length {actual}, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{field}[{index}] = {value} must not be negative")]
    NegativeValue {
        field: &'static str,
        index: usize,
        value: f64,
    },

    #[error("{field}[{index}] is not finite")]
    NonFinite { field: &'static str, index: usize },

    #[error(
        "layer {layer} is magnetized {angle} degrees away from the guide field; \
         collinear mode cannot represent spin-flip scattering"
    )]
    NonCollinear { layer: usize, angle: f64 },

    #[error("invalid microslab step size: {0}")]
    InvalidStepSize(f64),

    #[error("invalid resolution: {0}")]
    InvalidResolution(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ReflError>;

pub(crate) fn check_len(field: &'static str, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(ReflError::LengthMismatch {
            field,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_finite(field: &'static str, values: &[f64]) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ReflError::NonFinite { field, index }),
        None => Ok(()),
    }
}

pub(crate) fn check_non_negative(field: &'static str, values: &[f64]) -> Result<()> {
    check_finite(field, values)?;
    match values.iter().position(|&v| v < 0.0) {
        Some(index) => Err(ReflError::NegativeValue {
            field,
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}
