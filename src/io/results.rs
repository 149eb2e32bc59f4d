//! Differential expression results table

use serde::{Deserialize, Serialize};

use crate::ebayes::{FeatureStatus, ModeratedFit};
use crate::error::{LimmaError, Result};
use crate::lm::{Contrast, ContrastFit, LinearFit};
use crate::testing::AdjustMethod;

/// Per-feature results of one contrast, one entry per feature in every column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimmaResults {
    /// Feature (probeset) identifiers
    pub feature_ids: Vec<String>,
    /// Average log2 expression across all samples
    pub ave_expr: Vec<f64>,
    /// Log2 fold change of the contrast
    pub log_fc: Vec<f64>,
    /// Ordinary standard error of the log fold change
    pub std_error: Vec<f64>,
    /// Ordinary (unmoderated) t-statistic
    pub raw_t: Vec<f64>,
    /// Moderated t-statistic
    pub t: Vec<f64>,
    /// Raw p-values of the moderated t
    pub p_values: Vec<f64>,
    /// Adjusted p-values
    pub adj_p_values: Vec<f64>,
    /// Log-odds of differential expression
    pub b: Vec<f64>,
    /// Raw residual variance
    pub sigma2: Vec<f64>,
    /// Posterior residual variance
    pub s2_post: Vec<f64>,
    /// Degrees of freedom of the moderated t
    pub df_total: Vec<f64>,
    pub status: Vec<FeatureStatus>,
    pub contrast: Contrast,
    pub adjust_method: AdjustMethod,
}

impl LimmaResults {
    /// Assemble the table from the fitted stages and adjusted p-values
    pub fn from_stages(
        fit: &LinearFit,
        contrast: &ContrastFit,
        moderated: &ModeratedFit,
        adj_p_values: Vec<f64>,
        adjust_method: AdjustMethod,
    ) -> Result<Self> {
        let n = fit.n_features();
        if contrast.results.len() != n || moderated.results.len() != n || adj_p_values.len() != n {
            return Err(LimmaError::DimensionMismatch {
                expected: format!("{} rows in every stage", n),
                got: format!(
                    "{} contrast, {} moderated, {} adjusted",
                    contrast.results.len(),
                    moderated.results.len(),
                    adj_p_values.len()
                ),
            });
        }

        Ok(Self {
            feature_ids: fit.feature_ids.clone(),
            ave_expr: fit.ave_expr.clone(),
            log_fc: contrast.results.iter().map(|r| r.log_fc).collect(),
            std_error: contrast.results.iter().map(|r| r.std_error).collect(),
            raw_t: contrast.results.iter().map(|r| r.t).collect(),
            t: moderated.results.iter().map(|r| r.t).collect(),
            p_values: moderated.p_values(),
            adj_p_values,
            b: moderated.results.iter().map(|r| r.lods).collect(),
            sigma2: fit.sigma2(),
            s2_post: moderated.results.iter().map(|r| r.s2_post).collect(),
            df_total: moderated.results.iter().map(|r| r.df_total).collect(),
            status: moderated.results.iter().map(|r| r.status).collect(),
            contrast: contrast.contrast.clone(),
            adjust_method,
        })
    }

    /// Get number of features
    pub fn n_features(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_ids.is_empty()
    }

    /// New table with the given rows, in the given order, all columns kept
    pub fn subset(&self, rows: &[usize]) -> Self {
        fn pick<T: Clone>(col: &[T], rows: &[usize]) -> Vec<T> {
            rows.iter().map(|&i| col[i].clone()).collect()
        }
        Self {
            feature_ids: pick(&self.feature_ids, rows),
            ave_expr: pick(&self.ave_expr, rows),
            log_fc: pick(&self.log_fc, rows),
            std_error: pick(&self.std_error, rows),
            raw_t: pick(&self.raw_t, rows),
            t: pick(&self.t, rows),
            p_values: pick(&self.p_values, rows),
            adj_p_values: pick(&self.adj_p_values, rows),
            b: pick(&self.b, rows),
            sigma2: pick(&self.sigma2, rows),
            s2_post: pick(&self.s2_post, rows),
            df_total: pick(&self.df_total, rows),
            status: pick(&self.status, rows),
            contrast: self.contrast.clone(),
            adjust_method: self.adjust_method,
        }
    }

    /// Row index of a feature
    pub fn position(&self, feature_id: &str) -> Option<usize> {
        self.feature_ids.iter().position(|id| id == feature_id)
    }

    /// Features with adjusted p-value below `alpha`
    pub fn significant_features(&self, alpha: f64) -> Vec<&str> {
        self.feature_ids
            .iter()
            .zip(self.adj_p_values.iter())
            .filter(|(_, &p)| p.is_finite() && p < alpha)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Significant features with log fold change above `min_lfc`
    pub fn upregulated_features(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.feature_ids
            .iter()
            .zip(self.adj_p_values.iter().zip(self.log_fc.iter()))
            .filter(|(_, (&p, &lfc))| p.is_finite() && p < alpha && lfc > min_lfc)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Significant features with log fold change below `-min_lfc`
    pub fn downregulated_features(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.feature_ids
            .iter()
            .zip(self.adj_p_values.iter().zip(self.log_fc.iter()))
            .filter(|(_, (&p, &lfc))| p.is_finite() && p < alpha && lfc < -min_lfc)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Summary counts at the given thresholds
    pub fn summary(&self, alpha: f64, min_lfc: f64) -> ResultsSummary {
        ResultsSummary {
            total_features: self.n_features(),
            features_tested: self.p_values.iter().filter(|p| !p.is_nan()).count(),
            flagged: self.status.iter().filter(|s| s.is_flagged()).count(),
            significant: self.significant_features(alpha).len(),
            upregulated: self.upregulated_features(alpha, min_lfc).len(),
            downregulated: self.downregulated_features(alpha, min_lfc).len(),
            alpha,
            min_lfc,
            contrast: self.contrast.describe(),
        }
    }
}

/// Summary of a results table
#[derive(Debug, Clone)]
pub struct ResultsSummary {
    pub total_features: usize,
    pub features_tested: usize,
    pub flagged: usize,
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub alpha: f64,
    pub min_lfc: f64,
    pub contrast: String,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Differential Expression Summary ({})", self.contrast)?;
        writeln!(f, "==============================================")?;
        writeln!(f, "Total features: {}", self.total_features)?;
        writeln!(f, "Features tested: {}", self.features_tested)?;
        writeln!(f, "Flagged features: {}", self.flagged)?;
        writeln!(f, "Significant (adj.P < {}): {}", self.alpha, self.significant)?;
        writeln!(f, "  Up (logFC > {}): {}", self.min_lfc, self.upregulated)?;
        writeln!(f, "  Down (logFC < -{}): {}", self.min_lfc, self.downregulated)?;
        Ok(())
    }
}
