//! Gauss–Legendre quadrature on `[-1, 1]`.

use std::f64::consts::PI;

/// Nodes and weights of the `n`-point Gauss–Legendre rule on `[-1, 1]`.
///
/// Nodes are ascending and symmetric about zero; weights sum to 2. Roots of
/// `P_n` are found by Newton iteration from Chebyshev-like initial guesses.
/// `n = 0` gives empty vectors.
pub fn gauss_legendre(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut nodes = vec![0.0; n];
    let mut weights = vec![0.0; n];
    let nf = n as f64;
    for i in 0..n.div_ceil(2) {
        let mut x = (PI * (i as f64 + 0.75) / (nf + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() <= 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        nodes[i] = -x;
        nodes[n - 1 - i] = x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
    (nodes, weights)
}

// P_n(x) and P_n'(x) by the three-term recurrence
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = 0.0;
    for j in 0..n {
        let jf = j as f64;
        let p2 = p1;
        p1 = p0;
        p0 = ((2.0 * jf + 1.0) * x * p1 - jf * p2) / (jf + 1.0);
    }
    let dp = n as f64 * (x * p0 - p1) / (x * x - 1.0);
    (p0, dp)
}
