//! Prior estimation for variance moderation
//!
//! The residual variances s2_g are modelled as scaled F / inverse chi-square
//! draws around a common prior: s2_g ~ s0^2 * F(d_g, d0). Moments of
//! log(s2_g) give d0 and s0^2.

use crate::stats::{digamma, mean, median, trigamma, trigamma_inverse};
use crate::testing::{t_upper_quantile, t_upper_tail};

/// Prior degrees of freedom above which the prior is treated as infinite
pub const INFINITE_DF_PRIOR: f64 = 1e6;

/// Estimated variance prior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariancePrior {
    /// Prior degrees of freedom d0 (may be infinite)
    pub df_prior: f64,
    /// Prior variance s0^2
    pub s2_prior: f64,
}

impl VariancePrior {
    pub fn is_infinite(&self) -> bool {
        self.df_prior > INFINITE_DF_PRIOR
    }
}

/// Moment estimate of the scaled F distribution of `x` with first df `df1`.
///
/// Entries with non-finite x or df1 <= 0 are ignored. A single usable value
/// gives d0 = 0 (no moderation); no usable value gives NaN for both.
pub fn fit_f_dist(x: &[f64], df1: &[f64]) -> VariancePrior {
    let (values, dfs): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(df1.iter())
        .filter(|&(&v, &d)| v.is_finite() && d.is_finite() && d > 1e-15 && v > -1e-15)
        .map(|(&v, &d)| (v.max(0.0), d))
        .unzip();

    let n = values.len();
    if n == 0 {
        return VariancePrior {
            df_prior: f64::NAN,
            s2_prior: f64::NAN,
        };
    }
    if n == 1 {
        return VariancePrior {
            df_prior: 0.0,
            s2_prior: values[0],
        };
    }

    // Zero variances would send the log moments to -inf
    let mut m = median(&values);
    if m == 0.0 {
        log::warn!("More than half of residual variances are exactly zero");
        m = 1.0;
    }
    let floor = 1e-5 * m;

    let e: Vec<f64> = values
        .iter()
        .zip(dfs.iter())
        .map(|(&v, &d)| v.max(floor).ln() - digamma(d / 2.0) + (d / 2.0).ln())
        .collect();
    let emean = mean(&e);
    let evar_raw = e.iter().map(|v| (v - emean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let evar = evar_raw - mean(&dfs.iter().map(|d| trigamma(d / 2.0)).collect::<Vec<_>>());

    log::debug!("fit_f_dist: n = {}, mean log = {:.5}, excess var = {:.5}", n, emean, evar);

    if evar > 0.0 {
        let df_prior = 2.0 * trigamma_inverse(evar);
        let s2_prior = (emean + digamma(df_prior / 2.0) - (df_prior / 2.0).ln()).exp();
        VariancePrior { df_prior, s2_prior }
    } else {
        VariancePrior {
            df_prior: f64::INFINITY,
            s2_prior: emean.exp(),
        }
    }
}

/// Posterior variances: (d * s2 + d0 * s0^2) / (d + d0).
///
/// With an infinite prior every feature gets s0^2. A feature with no
/// residual df takes the prior variance.
pub fn squeeze_var(var: &[f64], df: &[f64], prior: &VariancePrior) -> Vec<f64> {
    let d0 = prior.df_prior;
    let s0 = prior.s2_prior;

    var.iter()
        .zip(df.iter())
        .map(|(&s2, &d)| {
            if d == 0.0 {
                s0
            } else if s2.is_nan() {
                f64::NAN
            } else if prior.is_infinite() {
                s0
            } else if d0 == 0.0 || d0.is_nan() {
                s2
            } else {
                (d * s2 + d0 * s0) / (d + d0)
            }
        })
        .collect()
}

/// Prior variance of the true log fold changes among DE features.
///
/// Matches the observed top |t| tail to a two-component t mixture in which a
/// fraction `proportion` of features are differentially expressed. Returns
/// NaN if there are too few features to fit. `v0_lim` clamps each estimate
/// before averaging.
pub fn tmixture_var_prior(
    t: &[f64],
    stdev_unscaled: f64,
    df: &[f64],
    proportion: f64,
    v0_lim: Option<(f64, f64)>,
) -> f64 {
    let (mut tstat, mut dfs): (Vec<f64>, Vec<f64>) = t
        .iter()
        .zip(df.iter())
        .filter(|&(&tv, &d)| !tv.is_nan() && !d.is_nan())
        .map(|(&tv, &d)| (tv.abs(), d))
        .unzip();

    let n = tstat.len();
    let ntarget = (proportion / 2.0 * n as f64).ceil() as usize;
    if ntarget < 1 {
        return f64::NAN;
    }
    let p = (ntarget as f64 / n as f64).max(proportion);

    // Bring every statistic onto the largest df
    let max_df = dfs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for (tv, d) in tstat.iter_mut().zip(dfs.iter_mut()) {
        if *d < max_df {
            let tail = t_upper_tail(*tv, *d);
            if tail > 0.0 {
                *tv = t_upper_quantile(tail, max_df);
            }
            *d = max_df;
        }
    }

    tstat.sort_by(|a, b| b.total_cmp(a));
    let v1 = stdev_unscaled * stdev_unscaled;

    let v0: Vec<f64> = tstat
        .iter()
        .take(ntarget)
        .enumerate()
        .map(|(k, &tv)| {
            let r = (k + 1) as f64;
            let p0 = 2.0 * t_upper_tail(tv, max_df);
            let ptarget = ((r - 0.5) / n as f64 - (1.0 - p) * p0) / p;
            let mut v = 0.0;
            if ptarget > p0 {
                let qtarget = t_upper_quantile(ptarget / 2.0, max_df);
                v = v1 * ((tv / qtarget).powi(2) - 1.0);
            }
            match v0_lim {
                Some((lo, hi)) => v.max(lo).min(hi),
                None => v,
            }
        })
        .collect();

    mean(&v0)
}
