//! Real, orthonormal spherical harmonics and their angular derivatives.
//!
//! Modes are addressed by a single flattened index `i = l * l + l + m`, for
//! degree `l >= 0` and order `-l <= m <= l`. For `m > 0` the harmonic is
//! `sqrt(2) N P_l^m(cos θ) cos(m φ)`, for `m < 0` it is
//! `sqrt(2) N P_l^|m|(cos θ) sin(|m| φ)`, and for `m = 0` it is
//! `N P_l(cos θ)`, where `N = sqrt((2l + 1) / 4π (l - m)! / (l + m)!)`. The
//! associated Legendre functions carry no Condon-Shortley phase.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};




/// The flattened index of mode `(l, m)`.
pub fn flat_index(l: usize, m: i64) -> usize {
    ((l * l + l) as i64 + m) as usize
}

/// The degree `l` of a flattened mode index.
pub fn degree(index: usize) -> usize {
    let mut l = (index as f64).sqrt() as usize;

    while l * l > index {
        l -= 1
    }
    while (l + 1) * (l + 1) <= index {
        l += 1
    }
    l
}

/// The order `m` of a flattened mode index.
pub fn order(index: usize) -> i64 {
    let l = degree(index);
    index as i64 - (l * l + l) as i64
}




/// A function of θ together with its first and second θ-derivatives.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Jet {
    v: f64,
    d1: f64,
    d2: f64,
}

impl Jet {
    fn constant(v: f64) -> Self {
        Self { v, d1: 0.0, d2: 0.0 }
    }
}

impl Add for Jet {
    type Output = Jet;
    fn add(self, b: Jet) -> Jet {
        Jet { v: self.v + b.v, d1: self.d1 + b.d1, d2: self.d2 + b.d2 }
    }
}

impl Sub for Jet {
    type Output = Jet;
    fn sub(self, b: Jet) -> Jet {
        Jet { v: self.v - b.v, d1: self.d1 - b.d1, d2: self.d2 - b.d2 }
    }
}

impl Mul for Jet {
    type Output = Jet;
    fn mul(self, b: Jet) -> Jet {
        Jet {
            v: self.v * b.v,
            d1: self.d1 * b.v + self.v * b.d1,
            d2: self.d2 * b.v + 2.0 * self.d1 * b.d1 + self.v * b.d2,
        }
    }
}

impl Mul<f64> for Jet {
    type Output = Jet;
    fn mul(self, s: f64) -> Jet {
        Jet { v: self.v * s, d1: self.d1 * s, d2: self.d2 * s }
    }
}




/// Associated Legendre functions `P_l^m(cos θ)` with their θ-derivatives,
/// for `0 <= m <= l <= lmax`, indexed `[l][m]`.
fn associated_legendre(lmax: usize, theta: f64) -> Vec<Vec<Jet>> {
    let (s, c) = theta.sin_cos();
    let sin = Jet { v: s, d1: c, d2: -s };
    let cos = Jet { v: c, d1: -s, d2: -c };

    let mut p: Vec<Vec<Jet>> = (0..=lmax).map(|l| vec![Jet::default(); l + 1]).collect();
    p[0][0] = Jet::constant(1.0);

    for m in 0..=lmax {
        if m > 0 {
            p[m][m] = sin * p[m - 1][m - 1] * (2 * m - 1) as f64;
        }
        if m + 1 <= lmax {
            p[m + 1][m] = cos * p[m][m] * (2 * m + 1) as f64;
        }
        for l in m + 2..=lmax {
            let a = (2 * l - 1) as f64;
            let b = (l + m - 1) as f64;
            p[l][m] = (cos * p[l - 1][m] * a - p[l - 2][m] * b) * (1.0 / (l - m) as f64);
        }
    }
    p
}

fn normalization(l: usize, m: usize) -> f64 {
    let ratio: f64 = (l - m + 1..=l + m).map(|k| 1.0 / k as f64).product();
    ((2 * l + 1) as f64 / (4.0 * PI) * ratio).sqrt()
}




/// The value and angular derivatives of one harmonic at one point.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HarmonicValues {
    pub y: f64,
    pub y_t: f64,
    pub y_p: f64,
    pub y_tt: f64,
    pub y_tp: f64,
    pub y_pp: f64,
}

/// Evaluate the first `nmodes` real harmonics (in flattened order) at the
/// angle `(θ, φ)`.
pub fn real_harmonics(nmodes: usize, theta: f64, phi: f64) -> Vec<HarmonicValues> {
    if nmodes == 0 {
        return Vec::new()
    }
    let lmax = degree(nmodes - 1);
    let p = associated_legendre(lmax, theta);

    (0..nmodes).map(|i| {
        let l = degree(i);
        let m = order(i);
        let k = m.unsigned_abs() as usize;
        let jet = p[l][k] * normalization(l, k);

        if m == 0 {
            return HarmonicValues { y: jet.v, y_t: jet.d1, y_tt: jet.d2, ..Default::default() }
        }
        let kf = k as f64;
        let (sin, cos) = (kf * phi).sin_cos();
        let jet = jet * 2f64.sqrt();

        if m > 0 {
            HarmonicValues {
                y: jet.v * cos,
                y_t: jet.d1 * cos,
                y_tt: jet.d2 * cos,
                y_p: -kf * jet.v * sin,
                y_tp: -kf * jet.d1 * sin,
                y_pp: -kf * kf * jet.v * cos,
            }
        } else {
            HarmonicValues {
                y: jet.v * sin,
                y_t: jet.d1 * sin,
                y_tt: jet.d2 * sin,
                y_p: kf * jet.v * cos,
                y_tp: kf * jet.d1 * cos,
                y_pp: -kf * kf * jet.v * sin,
            }
        }
    }).collect()
}




#[cfg(test)]
mod test {

    use std::f64::consts::PI;
    use approx::assert_relative_eq;
    use super::{degree, flat_index, order, real_harmonics};

    #[test]
    fn flat_index_round_trips() {
        for l in 0..8 {
            for m in -(l as i64)..=l as i64 {
                let i = flat_index(l, m);
                assert_eq!(degree(i), l);
                assert_eq!(order(i), m);
            }
        }
    }

    #[test]
    fn low_order_harmonics_match_closed_forms() {
        let (theta, phi) = (0.7, 1.9);
        let y = real_harmonics(9, theta, phi);
        let c0 = (1.0 / (4.0 * PI)).sqrt();
        let c1 = (3.0 / (4.0 * PI)).sqrt();

        assert_relative_eq!(y[0].y, c0, epsilon = 1e-14);
        assert_relative_eq!(y[2].y, c1 * theta.cos(), epsilon = 1e-14);
        assert_relative_eq!(y[3].y, c1 * theta.sin() * phi.cos(), epsilon = 1e-14);
        assert_relative_eq!(y[1].y, c1 * theta.sin() * phi.sin(), epsilon = 1e-14);
        assert_relative_eq!(y[2].y_t, -c1 * theta.sin(), epsilon = 1e-14);
        assert_relative_eq!(y[3].y_tp, -c1 * theta.cos() * phi.sin(), epsilon = 1e-14);

        let c20 = (5.0 / (16.0 * PI)).sqrt();
        assert_relative_eq!(y[6].y, c20 * (3.0 * theta.cos().powi(2) - 1.0), epsilon = 1e-14);
    }

    #[test]
    fn derivatives_agree_with_finite_differences() {
        let (theta, phi, h) = (1.1, 0.4, 1e-5);
        let y = real_harmonics(25, theta, phi);
        let tp = real_harmonics(25, theta + h, phi);
        let tm = real_harmonics(25, theta - h, phi);
        let pp = real_harmonics(25, theta, phi + h);
        let pm = real_harmonics(25, theta, phi - h);

        for i in 0..25 {
            assert_relative_eq!(y[i].y_t, (tp[i].y - tm[i].y) / (2.0 * h), epsilon = 1e-8);
            assert_relative_eq!(y[i].y_p, (pp[i].y - pm[i].y) / (2.0 * h), epsilon = 1e-8);
            assert_relative_eq!(y[i].y_tt, (tp[i].y_t - tm[i].y_t) / (2.0 * h), epsilon = 1e-7);
            assert_relative_eq!(y[i].y_pp, (pp[i].y_p - pm[i].y_p) / (2.0 * h), epsilon = 1e-7);
            assert_relative_eq!(y[i].y_tp, (pp[i].y_t - pm[i].y_t) / (2.0 * h), epsilon = 1e-7);
        }
    }
}
