//! Statistical utility functions shared across modules
//!
//! Polygamma functions needed by the empirical Bayes prior fit, plus small
//! order-statistic helpers used by normalization and summarization.

/// Digamma function psi(x)
pub fn digamma(x: f64) -> f64 {
    statrs::function::gamma::digamma(x)
}

/// Trigamma function psi'(x)
///
/// Shifts the argument up with psi'(x) = psi'(x + 1) + 1/x^2 until x >= 8,
/// then applies the asymptotic expansion.
pub fn trigamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }

    let mut result = 0.0;
    let mut z = x;
    while z < 8.0 {
        result += 1.0 / (z * z);
        z += 1.0;
    }

    let z2 = z * z;
    let z3 = z2 * z;
    let z5 = z3 * z2;
    let z7 = z5 * z2;
    let z9 = z7 * z2;
    result + 1.0 / z + 0.5 / z2 + 1.0 / (6.0 * z3) - 1.0 / (30.0 * z5) + 1.0 / (42.0 * z7)
        - 1.0 / (30.0 * z9)
}

/// Tetragamma function psi''(x), for x > 0
pub fn tetragamma(x: f64) -> f64 {
    let mut result = 0.0;
    let mut z = x;
    while z < 8.0 {
        result -= 2.0 / (z * z * z);
        z += 1.0;
    }

    let z2 = z * z;
    let z3 = z2 * z;
    let z4 = z2 * z2;
    let z6 = z4 * z2;
    let z8 = z6 * z2;
    let z10 = z8 * z2;
    result - 1.0 / z2 - 1.0 / z3 - 0.5 / z4 + 1.0 / (6.0 * z6) - 1.0 / (6.0 * z8)
        + 3.0 / (10.0 * z10)
}

/// Solve trigamma(x) = y for x > 0 by Newton iteration.
///
/// Starts from 0.5 + 1/y, which lies above the root, so the Newton steps
/// decrease monotonically. Very large and very small targets use the leading
/// terms of the expansion directly.
pub fn trigamma_inverse(y: f64) -> f64 {
    if !y.is_finite() || y <= 0.0 {
        return f64::NAN;
    }
    if y > 1e7 {
        return 1.0 / y.sqrt();
    }
    if y < 1e-6 {
        return 1.0 / y;
    }

    let mut x = 0.5 + 1.0 / y;
    for iter in 0..50 {
        let tri = trigamma(x);
        let dif = tri * (1.0 - tri / y) / tetragamma(x);
        x += dif;
        if -dif / x < 1e-8 {
            return x;
        }
        if iter == 49 {
            log::warn!("trigamma_inverse: iteration limit exceeded for y={:.6e}", y);
        }
    }
    x
}

/// Median of a slice; NaN values are ignored. Returns NaN for empty input.
pub fn median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Arithmetic mean; NaN for empty input
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
