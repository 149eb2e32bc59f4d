//! P-value and quantile helpers for t and normal statistics

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// Two-sided p-value of a standard normal statistic: 2 * P(Z > |z|)
pub fn pvalue_normal(z: f64) -> f64 {
    if z.is_nan() {
        return f64::NAN;
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => 2.0 * normal.sf(z.abs()),
        Err(_) => f64::NAN,
    }
}

/// Two-sided p-value of a t-statistic: 2 * P(T_df > |t|).
///
/// Infinite `df` falls back to the normal tail; an infinite statistic gives 0.
pub fn pvalue_t(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    if df.is_infinite() {
        return pvalue_normal(t);
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

/// Upper-tail probability P(T_df > t)
pub fn t_upper_tail(t: f64, df: f64) -> f64 {
    if t.is_nan() || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if df.is_infinite() {
        return Normal::new(0.0, 1.0).map(|n| n.sf(t)).unwrap_or(f64::NAN);
    }
    StudentsT::new(0.0, 1.0, df)
        .map(|dist| dist.sf(t))
        .unwrap_or(f64::NAN)
}

/// Upper-tail quantile: the q with P(T_df > q) = p
pub fn t_upper_quantile(p: f64, df: f64) -> f64 {
    if !(0.0..=1.0).contains(&p) || df.is_nan() || df <= 0.0 {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::INFINITY;
    }
    if p == 1.0 {
        return f64::NEG_INFINITY;
    }
    // Evaluate in the lower tail by symmetry for precision at small p
    if df.is_infinite() {
        return Normal::new(0.0, 1.0)
            .map(|n| -n.inverse_cdf(p))
            .unwrap_or(f64::NAN);
    }
    StudentsT::new(0.0, 1.0, df)
        .map(|dist| -dist.inverse_cdf(p))
        .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_symmetric() {
        let p1 = pvalue_t(2.0, 5.0);
        let p2 = pvalue_t(-2.0, 5.0);
        assert!((p1 - p2).abs() < 1e-12);
        assert!((pvalue_normal(1.959963984540054) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_pvalue_zero_statistic() {
        assert!((pvalue_t(0.0, 4.0) - 1.0).abs() < 1e-10);
        assert!((pvalue_normal(0.0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_pvalue_t_distribution() {
        // With large df, t-distribution approaches normal
        let p_normal = pvalue_normal(2.0);
        let p_t_large = pvalue_t(2.0, 1000.0);
        assert!((p_normal - p_t_large).abs() < 0.001);

        // With small df, t-distribution gives larger p-values
        let p_t_small = pvalue_t(2.0, 3.0);
        assert!(p_t_small > p_normal);

        assert_eq!(pvalue_t(2.0, f64::INFINITY), p_normal);
        assert_eq!(pvalue_t(f64::INFINITY, 3.0), 0.0);
        assert!(pvalue_t(f64::NAN, 3.0).is_nan());
        assert!(pvalue_t(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_t_quantile_inverts_tail() {
        // qt(0.025, 10, lower = FALSE) = 2.228139
        let q = t_upper_quantile(0.025, 10.0);
        assert!((q - 2.228139).abs() < 1e-5);
        assert!((t_upper_tail(q, 10.0) - 0.025).abs() < 1e-6);
    }
}
