//! Contrasts between fitted group coefficients

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::fitting::LinearFit;
use crate::error::{LimmaError, Result};

/// Effect of `numerator` relative to `denominator`: coef(numerator) - coef(denominator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contrast {
    pub numerator: String,
    pub denominator: String,
}

impl Contrast {
    pub fn new(numerator: &str, denominator: &str) -> Self {
        Self {
            numerator: numerator.to_string(),
            denominator: denominator.to_string(),
        }
    }

    /// Opposite direction; negates fold changes and t-statistics
    pub fn swapped(&self) -> Self {
        Self {
            numerator: self.denominator.clone(),
            denominator: self.numerator.clone(),
        }
    }

    pub fn describe(&self) -> String {
        format!("{} - {}", self.numerator, self.denominator)
    }

    /// Contrast weight vector over the named coefficients
    pub fn weights(&self, coef_names: &[String]) -> Result<Vec<f64>> {
        if self.numerator == self.denominator {
            return Err(LimmaError::InvalidContrast {
                reason: format!("numerator and denominator are both '{}'", self.numerator),
            });
        }
        let find = |level: &str| {
            coef_names
                .iter()
                .position(|n| n == level)
                .ok_or_else(|| LimmaError::InvalidContrast {
                    reason: format!(
                        "unknown group '{}' (design groups: {})",
                        level,
                        coef_names.join(", ")
                    ),
                })
        };
        let num = find(&self.numerator)?;
        let den = find(&self.denominator)?;

        let mut weights = vec![0.0; coef_names.len()];
        weights[num] = 1.0;
        weights[den] = -1.0;
        Ok(weights)
    }
}

impl Default for Contrast {
    fn default() -> Self {
        Self::new("case", "control")
    }
}

/// Per-feature contrast estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContrastResult {
    /// Log2 fold change
    pub log_fc: f64,
    /// sigma * stdev_unscaled
    pub std_error: f64,
    /// Ordinary t-statistic, log_fc / std_error
    pub t: f64,
}

/// Contrast evaluated for every feature of a fit
#[derive(Debug, Clone)]
pub struct ContrastFit {
    pub contrast: Contrast,
    /// sqrt(c' (X'X)^-1 c); sqrt(1/n_A + 1/n_B) for an indicator design
    pub stdev_unscaled: f64,
    pub results: Vec<ContrastResult>,
}

/// Evaluate a contrast for all features
pub fn evaluate_contrast(fit: &LinearFit, contrast: &Contrast) -> Result<ContrastFit> {
    let weights = contrast.weights(&fit.coef_names)?;

    let cov = &fit.cov_unscaled;
    let mut variance = 0.0;
    for (i, wi) in weights.iter().enumerate() {
        for (j, wj) in weights.iter().enumerate() {
            variance += wi * cov[[i, j]] * wj;
        }
    }
    let stdev_unscaled = variance.sqrt();

    log::info!(
        "Evaluating contrast {} (unscaled stdev {:.4})",
        contrast.describe(),
        stdev_unscaled
    );

    let results: Vec<ContrastResult> = fit
        .fits
        .par_iter()
        .map(|f| {
            let log_fc: f64 = f
                .coefficients
                .iter()
                .zip(weights.iter())
                .map(|(b, w)| b * w)
                .sum();
            let std_error = f.sigma2.sqrt() * stdev_unscaled;
            ContrastResult {
                log_fc,
                std_error,
                t: log_fc / std_error,
            }
        })
        .collect();

    Ok(ContrastFit {
        contrast: contrast.clone(),
        stdev_unscaled,
        results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ExpressionMatrix, GroupLevels};
    use crate::lm::design::design_from_group_string;
    use crate::lm::fitting::fit_linear_model;
    use ndarray::array;

    fn fixture() -> LinearFit {
        let samples: Vec<String> = (1..=5).map(|i| format!("s{}", i)).collect();
        let expr = ExpressionMatrix::new(
            array![[1.0, 2.0, 3.0, 7.0, 9.0], [4.0, 4.0, 4.0, 4.0, 4.0]],
            vec!["up".into(), "flat".into()],
            samples.clone(),
        )
        .unwrap();
        let design = design_from_group_string(&samples, "00011", &GroupLevels::default()).unwrap();
        fit_linear_model(&expr, &design).unwrap()
    }

    #[test]
    fn test_contrast_fold_change_and_se() {
        let fit = fixture();
        let cf = evaluate_contrast(&fit, &Contrast::default()).unwrap();

        // control mean 2, case mean 8
        let r = cf.results[0];
        assert!((r.log_fc - 6.0).abs() < 1e-12);
        // sigma2 = (2 + 2) / 3; se = sqrt(sigma2 * (1/3 + 1/2))
        let expected_se = ((4.0f64 / 3.0) * (1.0 / 3.0 + 1.0 / 2.0)).sqrt();
        assert!((r.std_error - expected_se).abs() < 1e-12);
        assert!((r.t - 6.0 / expected_se).abs() < 1e-9);
        assert!((cf.stdev_unscaled - (5.0f64 / 6.0).sqrt()).abs() < 1e-12);

        assert!(cf.results[1].log_fc.abs() < 1e-12);
    }

    #[test]
    fn test_swapped_contrast_negates() {
        let fit = fixture();
        let forward = evaluate_contrast(&fit, &Contrast::default()).unwrap();
        let reverse = evaluate_contrast(&fit, &Contrast::default().swapped()).unwrap();

        let (a, b) = (forward.results[0], reverse.results[0]);
        assert!((a.log_fc + b.log_fc).abs() < 1e-12);
        assert!((a.t + b.t).abs() < 1e-9);
        assert!((a.std_error - b.std_error).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_contrast() {
        let fit = fixture();
        let err = evaluate_contrast(&fit, &Contrast::new("case", "case")).unwrap_err();
        assert!(matches!(err, LimmaError::InvalidContrast { .. }));

        let err = evaluate_contrast(&fit, &Contrast::new("treated", "control")).unwrap_err();
        assert!(err.to_string().contains("treated"));
    }
}
