//! 2×2 complex matrices and the spin eigenbasis of a magnetic layer.

use std::ops::{Add, Mul};

use num_complex::Complex64;

/// A 2×2 complex matrix, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat2(pub [[Complex64; 2]; 2]);

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

impl Mat2 {
    pub const ZERO: Mat2 = Mat2([[ZERO, ZERO], [ZERO, ZERO]]);
    pub const IDENTITY: Mat2 = Mat2([[ONE, ZERO], [ZERO, ONE]]);

    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Mat2([[a, b], [c, d]])
    }

    pub fn diag(a: Complex64, d: Complex64) -> Self {
        Mat2([[a, ZERO], [ZERO, d]])
    }

    pub fn nan() -> Self {
        let n = Complex64::new(f64::NAN, f64::NAN);
        Mat2([[n, n], [n, n]])
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.0[row][col]
    }

    pub fn det(&self) -> Complex64 {
        let m = &self.0;
        m[0][0] * m[1][1] - m[0][1] * m[1][0]
    }

    /// `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Mat2> {
        let det = self.det();
        if det.norm_sqr() == 0.0 || !det.is_finite() {
            return None;
        }
        let m = &self.0;
        let inv = det.inv();
        Some(Mat2([
            [m[1][1] * inv, -m[0][1] * inv],
            [-m[1][0] * inv, m[0][0] * inv],
        ]))
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Mat2 {
        let m = &self.0;
        Mat2([
            [m[0][0].conj(), m[1][0].conj()],
            [m[0][1].conj(), m[1][1].conj()],
        ])
    }

    pub fn scale(&self, s: f64) -> Mat2 {
        let m = &self.0;
        Mat2([[m[0][0] * s, m[0][1] * s], [m[1][0] * s, m[1][1] * s]])
    }

    /// Largest entry magnitude.
    pub fn max_norm(&self) -> f64 {
        self.0
            .iter()
            .flatten()
            .map(|z| z.norm())
            .fold(0.0, f64::max)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().flatten().all(|z| z.is_finite())
    }
}

impl Mul for Mat2 {
    type Output = Mat2;

    fn mul(self, rhs: Mat2) -> Mat2 {
        let a = &self.0;
        let b = &rhs.0;
        Mat2([
            [
                a[0][0] * b[0][0] + a[0][1] * b[1][0],
                a[0][0] * b[0][1] + a[0][1] * b[1][1],
            ],
            [
                a[1][0] * b[0][0] + a[1][1] * b[1][0],
                a[1][0] * b[0][1] + a[1][1] * b[1][1],
            ],
        ])
    }
}

impl Add for Mat2 {
    type Output = Mat2;

    fn add(self, rhs: Mat2) -> Mat2 {
        let a = &self.0;
        let b = &rhs.0;
        Mat2([
            [a[0][0] + b[0][0], a[0][1] + b[0][1]],
            [a[1][0] + b[1][0], a[1][1] + b[1][1]],
        ])
    }
}

/// Eigen-decomposition of `B·σ` for one layer, in the guide-field frame.
///
/// Mode 0 is the "up-like" state: it reduces to spin-up along the guide
/// field when `B` is collinear with it, and its eigenvalue is then `B·ĥ`
/// (negative for antiparallel magnetization). Mode 1 has the opposite
/// eigenvalue. Columns of `vectors` are the eigenvectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinBasis {
    pub values: [f64; 2],
    pub vectors: Mat2,
    pub collinear: bool,
}

impl SpinBasis {
    /// `field` = (bx, by, bz) with `z` along the guide field (Å⁻²).
    pub fn from_field(field: [f64; 3]) -> Self {
        let [bx, by, bz] = field;
        if bx == 0.0 && by == 0.0 {
            return SpinBasis {
                values: [bz, -bz],
                vectors: Mat2::IDENTITY,
                collinear: true,
            };
        }
        let b = (bx * bx + by * by + bz * bz).sqrt();
        let s = if bz < 0.0 { -1.0 } else { 1.0 };
        let lead = b + bz.abs();
        let norm = (lead * lead + bx * bx + by * by).sqrt();
        let lead = Complex64::new(lead / norm, 0.0);
        // s(bx + i by) and s(-(bx - i by)) keep the leading components positive
        let up_lower = Complex64::new(s * bx / norm, s * by / norm);
        let down_upper = Complex64::new(-s * bx / norm, s * by / norm);
        SpinBasis {
            values: [s * b, -s * b],
            vectors: Mat2::new(lead, down_upper, up_lower, lead),
            collinear: false,
        }
    }
}

/// `(sin, cos)` of an angle in degrees, exact at multiples of 90°.
pub fn sin_cos_deg(deg: f64) -> (f64, f64) {
    let quarter = deg / 90.0;
    let nearest = quarter.round();
    if (quarter - nearest).abs() < 1e-12 {
        return match (nearest as i64).rem_euclid(4) {
            0 => (0.0, 1.0),
            1 => (1.0, 0.0),
            2 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        };
    }
    deg.to_radians().sin_cos()
}
