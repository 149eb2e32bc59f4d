//! Empirical Bayes moderation of per-feature variances
//!
//! Residual variances from all features are pooled into a scaled inverse
//! chi-square prior; each feature's variance is then shrunk toward the prior
//! and used for moderated t-statistics, p-values and log-odds (B) of
//! differential expression.

mod prior;

pub use prior::{fit_f_dist, squeeze_var, tmixture_var_prior, VariancePrior, INFINITE_DF_PRIOR};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{LimmaError, Result};
use crate::lm::{ContrastFit, LinearFit};
use crate::testing::pvalue_t;

/// Tuning of the empirical Bayes step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EbayesParams {
    /// Assumed proportion of differentially expressed features, in (0, 1)
    pub proportion: f64,
    /// Bounds on the prior standard deviation of log fold changes, in units
    /// of the prior residual standard deviation
    pub stdev_coef_lim: [f64; 2],
}

impl Default for EbayesParams {
    fn default() -> Self {
        Self {
            proportion: 0.01,
            stdev_coef_lim: [0.1, 4.0],
        }
    }
}

impl EbayesParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.proportion > 0.0 && self.proportion < 1.0) {
            return Err(LimmaError::InvalidConfig {
                reason: format!("proportion must lie in (0, 1), got {}", self.proportion),
            });
        }
        let [lo, hi] = self.stdev_coef_lim;
        if !(lo >= 0.0 && hi >= lo && hi.is_finite()) {
            return Err(LimmaError::InvalidConfig {
                reason: format!(
                    "stdev_coef_lim must satisfy 0 <= lower <= upper, got [{}, {}]",
                    lo, hi
                ),
            });
        }
        Ok(())
    }
}

/// Per-feature outcome of the fit; flagged rows still appear in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Ok,
    /// Raw residual variance is zero; only the moderated statistics are usable
    ZeroVariance,
    /// No residual degrees of freedom; statistics rely on the prior alone
    NoResidualDf,
    /// Statistic could not be computed
    NonFinite,
}

impl FeatureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Ok => "ok",
            FeatureStatus::ZeroVariance => "zero_variance",
            FeatureStatus::NoResidualDf => "no_residual_df",
            FeatureStatus::NonFinite => "non_finite",
        }
    }

    pub fn is_flagged(&self) -> bool {
        *self != FeatureStatus::Ok
    }
}

/// Moderated statistics of one feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeratedResult {
    /// Posterior (shrunken) residual variance
    pub s2_post: f64,
    /// Moderated t-statistic
    pub t: f64,
    /// Two-sided p-value of the moderated t
    pub p_value: f64,
    /// Residual df plus prior df, capped at the pooled residual df
    pub df_total: f64,
    /// Log-odds of differential expression (B-statistic)
    pub lods: f64,
    pub status: FeatureStatus,
}

/// Moderated fit for all features
#[derive(Debug, Clone)]
pub struct ModeratedFit {
    pub prior: VariancePrior,
    /// Prior variance of non-zero log fold changes
    pub var_prior: f64,
    /// Sum of residual df over all usable features
    pub df_pooled: f64,
    pub results: Vec<ModeratedResult>,
}

impl ModeratedFit {
    pub fn p_values(&self) -> Vec<f64> {
        self.results.iter().map(|r| r.p_value).collect()
    }

    pub fn n_flagged(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_flagged()).count()
    }
}

/// Log-odds that the feature is differentially expressed
fn log_odds(
    t: f64,
    df_total: f64,
    v1: f64,
    var_prior: f64,
    proportion: f64,
    infinite_prior: bool,
) -> f64 {
    let r = (v1 + var_prior) / v1;
    let t2 = t * t;
    let kernel = if infinite_prior {
        t2 * (1.0 - 1.0 / r) / 2.0
    } else {
        (1.0 + df_total) / 2.0 * ((t2 + df_total) / (t2 / r + df_total)).ln()
    };
    (proportion / (1.0 - proportion)).ln() - r.ln() / 2.0 + kernel
}

/// Residual variances at or below this are rounding noise of a constant feature
pub const ZERO_VARIANCE_TOL: f64 = 1e-20;

fn classify(coefficients_finite: bool, df_residual: f64, sigma2: f64, t: f64) -> FeatureStatus {
    if !coefficients_finite {
        FeatureStatus::NonFinite
    } else if df_residual == 0.0 {
        FeatureStatus::NoResidualDf
    } else if !t.is_finite() {
        FeatureStatus::NonFinite
    } else if sigma2 <= ZERO_VARIANCE_TOL {
        FeatureStatus::ZeroVariance
    } else {
        FeatureStatus::Ok
    }
}

/// Moderate a contrast: fit the variance prior over all features, then
/// compute posterior variances, moderated t, p-values and B-statistics.
///
/// The prior fit is a single reduction over all features; the per-feature
/// statistics that follow run in parallel.
pub fn moderate(
    fit: &LinearFit,
    contrast: &ContrastFit,
    params: &EbayesParams,
) -> Result<ModeratedFit> {
    params.validate()?;
    if fit.n_features() != contrast.results.len() {
        return Err(LimmaError::DimensionMismatch {
            expected: format!("{} contrast rows", fit.n_features()),
            got: format!("{} contrast rows", contrast.results.len()),
        });
    }

    let sigma2 = fit.sigma2();
    let df_residual = fit.df_residual();

    let prior = fit_f_dist(&sigma2, &df_residual);
    log::info!(
        "Variance prior: df = {:.3}, s2 = {:.5}",
        prior.df_prior,
        prior.s2_prior
    );
    if prior.is_infinite() {
        log::info!(
            "Residual variances are no more dispersed than expected; \
             using the prior variance for all features"
        );
    }

    let s2_post = squeeze_var(&sigma2, &df_residual, &prior);

    let df_pooled: f64 = fit
        .fits
        .iter()
        .filter(|f| f.sigma2.is_finite())
        .map(|f| f.df_residual)
        .sum();

    let stdev_unscaled = contrast.stdev_unscaled;
    let partial: Vec<(f64, f64, f64)> = (0..fit.n_features())
        .into_par_iter()
        .map(|i| {
            let log_fc = contrast.results[i].log_fc;
            let t = log_fc / stdev_unscaled / s2_post[i].sqrt();
            let d0 = if prior.df_prior.is_nan() { 0.0 } else { prior.df_prior };
            let df_total = (df_residual[i] + d0).min(df_pooled);
            (t, df_total, pvalue_t(t, df_total))
        })
        .collect();

    // B-statistic prior on the fold-change variance
    let t_all: Vec<f64> = partial.iter().map(|p| p.0).collect();
    let df_all: Vec<f64> = partial.iter().map(|p| p.1).collect();
    let [lo, hi] = params.stdev_coef_lim;
    let v0_lim = (lo * lo / prior.s2_prior, hi * hi / prior.s2_prior);
    let mut var_prior =
        tmixture_var_prior(&t_all, stdev_unscaled, &df_all, params.proportion, Some(v0_lim));
    if var_prior.is_nan() {
        var_prior = 1.0 / prior.s2_prior;
        log::warn!(
            "Estimation of fold-change prior variance failed; using 1/s2_prior = {:.5}",
            var_prior
        );
    } else {
        log::debug!("Fold-change prior variance: {:.5}", var_prior);
    }

    let v1 = stdev_unscaled * stdev_unscaled;
    let results: Vec<ModeratedResult> = partial
        .par_iter()
        .zip(fit.fits.par_iter())
        .zip(s2_post.par_iter())
        .map(|((&(t, df_total, p_value), f), &s2)| {
            let finite = f.coefficients.iter().all(|c| c.is_finite());
            let status = classify(finite, f.df_residual, f.sigma2, t);
            let lods = if t.is_finite() {
                log_odds(t, df_total, v1, var_prior, params.proportion, prior.is_infinite())
            } else {
                f64::NAN
            };
            ModeratedResult {
                s2_post: s2,
                t,
                p_value,
                df_total,
                lods,
                status,
            }
        })
        .collect();

    let moderated = ModeratedFit {
        prior,
        var_prior,
        df_pooled,
        results,
    };
    if moderated.n_flagged() > 0 {
        log::warn!("{} features flagged during moderation", moderated.n_flagged());
    }
    Ok(moderated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ExpressionMatrix, GroupLevels};
    use crate::lm::{design_from_group_string, evaluate_contrast, fit_linear_model, Contrast};
    use crate::testing::pvalue_normal;
    use ndarray::Array2;

    /// 40 features over 3 + 3 samples; feature 0 strongly up, feature 1 constant
    fn fixture() -> (LinearFit, ContrastFit) {
        let n = 40;
        let samples: Vec<String> = (1..=6).map(|i| format!("s{}", i)).collect();
        let mut values = Array2::zeros((n, 6));
        for i in 0..n {
            for j in 0..6 {
                // Deterministic noise with feature-specific spread
                let noise = (((i * 7 + j * 13) % 11) as f64 - 5.0) * 0.05 * (1.0 + (i % 5) as f64);
                values[[i, j]] = 8.0 + noise;
            }
        }
        for j in 3..6 {
            values[[0, j]] += 4.0;
        }
        for j in 0..6 {
            values[[1, j]] = 7.0;
        }
        let ids: Vec<String> = (0..n).map(|i| format!("f{}", i)).collect();
        let expr = ExpressionMatrix::new(values, ids, samples.clone()).unwrap();
        let design = design_from_group_string(&samples, "000111", &GroupLevels::default()).unwrap();
        let fit = fit_linear_model(&expr, &design).unwrap();
        let cf = evaluate_contrast(&fit, &Contrast::default()).unwrap();
        (fit, cf)
    }

    #[test]
    fn test_moderate_flags_and_significance() {
        let (fit, cf) = fixture();
        let m = moderate(&fit, &cf, &EbayesParams::default()).unwrap();

        assert_eq!(m.results.len(), 40);
        assert!(m.prior.s2_prior > 0.0);

        let up = m.results[0];
        assert!(up.t > 0.0);
        assert!(up.p_value < 1e-3);
        assert_eq!(up.status, FeatureStatus::Ok);

        let flat = m.results[1];
        assert_eq!(flat.status, FeatureStatus::ZeroVariance);
        assert!(cf.results[1].log_fc.abs() < 1e-12);
        assert!(flat.t.abs() < 1e-9);
        assert!(flat.p_value > 0.99);
        assert!(flat.s2_post > 0.0);

        for r in &m.results {
            assert!(r.df_total <= m.df_pooled);
            assert!(r.df_total >= 4.0);
            assert!(r.p_value >= 0.0 && r.p_value <= 1.0);
        }
        // Largest effect has the largest log-odds
        let best = m
            .results
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.lods.total_cmp(&b.1.lods))
            .map(|(i, _)| i);
        assert_eq!(best, Some(0));
    }

    #[test]
    fn test_moderate_swap_symmetry() {
        let (fit, cf) = fixture();
        let cf_rev = evaluate_contrast(&fit, &Contrast::default().swapped()).unwrap();
        let a = moderate(&fit, &cf, &EbayesParams::default()).unwrap();
        let b = moderate(&fit, &cf_rev, &EbayesParams::default()).unwrap();
        for (x, y) in a.results.iter().zip(b.results.iter()) {
            assert!((x.t + y.t).abs() < 1e-9);
            assert!((x.p_value - y.p_value).abs() < 1e-12);
            assert!((x.lods - y.lods).abs() < 1e-9);
        }
    }

    /// Every feature has the same within-group spread, so the residual
    /// variances are no more dispersed than chance and the prior df is infinite
    #[test]
    fn test_infinite_prior_uses_t_tail_at_pooled_df() {
        let n = 30;
        let samples: Vec<String> = (1..=6).map(|i| format!("s{}", i)).collect();
        let mut values = Array2::zeros((n, 6));
        for i in 0..n {
            let control = 8.0 + 0.25 * i as f64;
            let case = if i % 3 == 0 { control + 2.0 } else { control };
            for (j, offset) in [-1.0, 0.0, 1.0].iter().enumerate() {
                values[[i, j]] = control + offset;
                values[[i, j + 3]] = case + offset;
            }
        }
        let ids: Vec<String> = (0..n).map(|i| format!("f{}", i)).collect();
        let expr = ExpressionMatrix::new(values, ids, samples.clone()).unwrap();
        let design =
            design_from_group_string(&samples, "000111", &GroupLevels::default()).unwrap();
        let fit = fit_linear_model(&expr, &design).unwrap();
        let cf = evaluate_contrast(&fit, &Contrast::default()).unwrap();
        let m = moderate(&fit, &cf, &EbayesParams::default()).unwrap();

        assert!(m.prior.is_infinite());
        assert_eq!(m.df_pooled, 120.0);
        for (i, r) in m.results.iter().enumerate() {
            assert_eq!(r.df_total, 120.0);
            assert!((r.s2_post - m.prior.s2_prior).abs() < 1e-12);
            assert!((r.p_value - pvalue_t(r.t, 120.0)).abs() < 1e-12);
            if i % 3 == 0 {
                // Heavier tail than the normal at 120 df
                assert!(r.t > 2.0);
                assert!(r.p_value > pvalue_normal(r.t));
            }
        }
    }

    #[test]
    fn test_invalid_proportion() {
        let (fit, cf) = fixture();
        let params = EbayesParams {
            proportion: 1.5,
            ..EbayesParams::default()
        };
        let err = moderate(&fit, &cf, &params).unwrap_err();
        assert!(matches!(err, LimmaError::InvalidConfig { .. }));
    }

    #[test]
    fn test_log_odds_increases_with_t() {
        let low = log_odds(1.0, 10.0, 0.5, 2.0, 0.01, false);
        let high = log_odds(5.0, 10.0, 0.5, 2.0, 0.01, false);
        assert!(high > low);
        let inf_low = log_odds(1.0, 10.0, 0.5, 2.0, 0.01, true);
        let inf_high = log_odds(5.0, 10.0, 0.5, 2.0, 0.01, true);
        assert!(inf_high > inf_low);
    }
}
