//! Ordinary least squares fit of every feature against the design

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use super::design::DesignMatrix;
use crate::data::ExpressionMatrix;
use crate::error::{LimmaError, Result};

/// Per-feature linear model fit
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFit {
    /// One coefficient per design column (group means for an indicator design)
    pub coefficients: Vec<f64>,
    /// Residual degrees of freedom (n_samples - n_coefs)
    pub df_residual: f64,
    /// Residual variance: RSS / df_residual; NaN when df_residual is zero
    pub sigma2: f64,
}

/// Fits for all features, aligned with the expression matrix rows
#[derive(Debug, Clone)]
pub struct LinearFit {
    pub feature_ids: Vec<String>,
    pub fits: Vec<FeatureFit>,
    /// Average log2 expression per feature
    pub ave_expr: Vec<f64>,
    /// Unscaled coefficient covariance, (X'X)^-1
    pub cov_unscaled: Array2<f64>,
    /// Coefficient (design column) names
    pub coef_names: Vec<String>,
    /// Number of samples per design column
    pub group_sizes: Vec<usize>,
}

impl LinearFit {
    pub fn n_features(&self) -> usize {
        self.fits.len()
    }

    /// Residual variances of all features
    pub fn sigma2(&self) -> Vec<f64> {
        self.fits.iter().map(|f| f.sigma2).collect()
    }

    pub fn df_residual(&self) -> Vec<f64> {
        self.fits.iter().map(|f| f.df_residual).collect()
    }
}

/// Cholesky factor L of a symmetric positive definite matrix (A = L L').
///
/// Returns None when a pivot is not clearly positive, i.e. the matrix is
/// singular or indefinite.
fn cholesky(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let scale = a[[i, i]].abs().max(f64::MIN_POSITIVE);
                if sum <= 1e-10 * scale || !sum.is_finite() {
                    return None;
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Inverse of a symmetric positive definite matrix from its Cholesky factor
fn invert_spd(a: ArrayView2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let l = cholesky(a)?;
    let mut inv = Array2::zeros((n, n));

    for col in 0..n {
        // Forward solve L y = e_col
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = if i == col { 1.0 } else { 0.0 };
            for k in 0..i {
                sum -= l[[i, k]] * y[k];
            }
            y[i] = sum / l[[i, i]];
        }
        // Back solve L' x = y
        for i in (0..n).rev() {
            let mut sum = y[i];
            for k in (i + 1)..n {
                sum -= l[[k, i]] * inv[[k, col]];
            }
            inv[[i, col]] = sum / l[[i, i]];
        }
    }
    Some(inv)
}

/// Fit one feature: beta = (X'X)^-1 X'y, sigma2 = RSS / (n - p)
pub fn fit_single_feature(
    y: ArrayView1<f64>,
    design: ArrayView2<f64>,
    cov_unscaled: ArrayView2<f64>,
) -> FeatureFit {
    let (n, p) = design.dim();
    let df_residual = n.saturating_sub(p) as f64;

    if y.iter().any(|v| !v.is_finite()) {
        return FeatureFit {
            coefficients: vec![f64::NAN; p],
            df_residual,
            sigma2: f64::NAN,
        };
    }

    let xty: Array1<f64> = design.t().dot(&y);
    let beta: Array1<f64> = cov_unscaled.dot(&xty);
    let fitted = design.dot(&beta);
    let rss: f64 = y
        .iter()
        .zip(fitted.iter())
        .map(|(&obs, &fit)| (obs - fit).powi(2))
        .sum();

    let sigma2 = if df_residual > 0.0 {
        rss / df_residual
    } else {
        f64::NAN
    };

    FeatureFit {
        coefficients: beta.to_vec(),
        df_residual,
        sigma2,
    }
}

/// Fit the linear model to every feature in parallel.
///
/// Fails with `RankDeficientDesign` if a design column is empty (a group with
/// no samples) or X'X cannot be inverted.
pub fn fit_linear_model(expr: &ExpressionMatrix, design: &DesignMatrix) -> Result<LinearFit> {
    if expr.n_samples() != design.n_samples() {
        return Err(LimmaError::DimensionMismatch {
            expected: format!("{} samples in design", expr.n_samples()),
            got: format!("{} samples in design", design.n_samples()),
        });
    }

    let x = design.matrix();
    for (j, sum) in design.column_sums().iter().enumerate() {
        if *sum == 0.0 {
            return Err(LimmaError::RankDeficientDesign {
                reason: format!("group '{}' has no samples", design.column_names()[j]),
            });
        }
    }

    let xtx = x.t().dot(&x);
    let cov_unscaled = invert_spd(xtx.view()).ok_or_else(|| LimmaError::RankDeficientDesign {
        reason: "design columns are linearly dependent".to_string(),
    })?;

    if design.residual_df() == 0 {
        log::warn!("Design leaves no residual degrees of freedom; variances are undefined");
    }

    log::info!(
        "Fitting linear model: {} features, {} samples, {} coefficients",
        expr.n_features(),
        design.n_samples(),
        design.n_coefs()
    );

    let values = expr.values();
    let fits: Vec<FeatureFit> = (0..expr.n_features())
        .into_par_iter()
        .map(|i| fit_single_feature(values.row(i), x, cov_unscaled.view()))
        .collect();

    let n_failed = fits.iter().filter(|f| f.coefficients.iter().any(|c| !c.is_finite())).count();
    if n_failed > 0 {
        log::warn!(
            "{} features contain non-finite expression values and were not fitted",
            n_failed
        );
    }

    Ok(LinearFit {
        feature_ids: expr.feature_ids().to_vec(),
        fits,
        ave_expr: expr.feature_means(),
        cov_unscaled,
        coef_names: design.column_names().iter().map(|s| s.to_string()).collect(),
        group_sizes: design.column_sums().iter().map(|&s| s as usize).collect(),
    })
}
