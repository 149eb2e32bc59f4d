//! Threshold selection of differentially expressed genes

use serde::{Deserialize, Serialize};

use crate::error::{LimmaError, Result};
use crate::io::LimmaResults;

/// Selection thresholds; both comparisons are strict
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegThresholds {
    /// Keep rows with adjusted p-value below this
    pub adj_p_threshold: f64,
    /// Keep rows with |log2 fold change| above this
    pub fold_change_threshold: f64,
}

impl Default for DegThresholds {
    fn default() -> Self {
        Self {
            adj_p_threshold: 0.05,
            fold_change_threshold: 2.0,
        }
    }
}

impl DegThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(self.adj_p_threshold > 0.0 && self.adj_p_threshold <= 1.0) {
            return Err(LimmaError::InvalidConfig {
                reason: format!("adj_p_threshold must lie in (0, 1], got {}", self.adj_p_threshold),
            });
        }
        if !(self.fold_change_threshold >= 0.0 && self.fold_change_threshold.is_finite()) {
            return Err(LimmaError::InvalidConfig {
                reason: format!(
                    "fold_change_threshold must be a non-negative number, got {}",
                    self.fold_change_threshold
                ),
            });
        }
        Ok(())
    }

    /// Row predicate; NaN statistics never pass
    pub fn passes(&self, adj_p: f64, log_fc: f64) -> bool {
        adj_p < self.adj_p_threshold && log_fc.abs() > self.fold_change_threshold
    }
}

/// Select DEG rows from the full results table.
///
/// Rows are ordered by ascending adjusted p-value, then raw p-value, then
/// their position in the input; every column is kept.
pub fn select_degs(results: &LimmaResults, thresholds: &DegThresholds) -> Result<LimmaResults> {
    thresholds.validate()?;

    let mut rows: Vec<usize> = (0..results.n_features())
        .filter(|&i| thresholds.passes(results.adj_p_values[i], results.log_fc[i]))
        .collect();

    // Stable sort keeps input order among exact ties
    rows.sort_by(|&a, &b| {
        results.adj_p_values[a]
            .total_cmp(&results.adj_p_values[b])
            .then(results.p_values[a].total_cmp(&results.p_values[b]))
    });

    log::info!(
        "Selected {} of {} features (adj.P < {}, |logFC| > {})",
        rows.len(),
        results.n_features(),
        thresholds.adj_p_threshold,
        thresholds.fold_change_threshold
    );

    Ok(results.subset(&rows))
}
