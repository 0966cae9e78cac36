/// Linear interpolation on a tabulated reflectivity curve.
///
/// `xp` must be ascending. Values outside the table are clamped to the end
/// values.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    x.iter().map(|&xi| interp_one(xi, xp, fp)).collect()
}

/// Interpolate a single value.
pub fn interp_one(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[xp.len() - 1] {
        return fp[fp.len() - 1];
    }

    let idx = xp.partition_point(|&v| v < x);
    if xp[idx] == x {
        return fp[idx];
    }

    let lo = idx - 1;
    let t = (x - xp[lo]) / (xp[idx] - xp[lo]);
    fp[lo] + t * (fp[idx] - fp[lo])
}

/// Linear in `x`, logarithmic in `f`.
///
/// Reflectivity falls by decades across a table, so straight lines in
/// `log R` follow the curve far better than straight lines in `R`. Every
/// `fp` must be positive.
pub fn interp_semilog(x: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    let log_fp: Vec<f64> = fp.iter().map(|v| v.ln()).collect();
    interp(x, xp, &log_fp).into_iter().map(f64::exp).collect()
}
