//! Error function for the Gaussian interface profile.

const FRAC_2_SQRT_PI: f64 = std::f64::consts::FRAC_2_SQRT_PI;

/// Switch from the power series to the continued fraction.
const SERIES_LIMIT: f64 = 3.0;

/// `erf(x) = 2/√π ∫₀ˣ exp(−t²) dt`.
pub fn erf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let a = x.abs();
    let value = if a < SERIES_LIMIT {
        erf_series(a)
    } else {
        1.0 - erfc_fraction(a)
    };
    value.copysign(x)
}

// erf(x) = 2/√π · exp(−x²) · Σ 2ⁿ x²ⁿ⁺¹ / (2n+1)!!, all terms positive
fn erf_series(x: f64) -> f64 {
    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    for n in 1..200 {
        term *= 2.0 * x2 / (2 * n + 1) as f64;
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
    }
    FRAC_2_SQRT_PI * (-x2).exp() * sum
}

// erfc(x) = exp(−x²)/√π · 1/(x + ½/(x + 1/(x + 3⁄2/(x + …)))), x ≥ SERIES_LIMIT
fn erfc_fraction(x: f64) -> f64 {
    let mut t = x;
    for n in (1..=80).rev() {
        t = x + 0.5 * n as f64 / t;
    }
    0.5 * FRAC_2_SQRT_PI * (-x * x).exp() / t
}
