//! Normalization of raw probe intensities into a log2 expression matrix
//!
//! Stages, in order: background adjustment (minimum subtraction plus an
//! additive offset), quantile normalization across samples, log2
//! transformation, and per-feature probeset summarization.

mod quantile;
mod summarize;

pub use quantile::{quantile_normalize, subtract_minimum};
pub use summarize::{median_polish, summarize_block, SummarizationMethod};

use std::collections::HashMap;

use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{ExpressionMatrix, RawIntensityProvider};
use crate::error::{LimmaError, Result};

/// Background adjustment applied before normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMethod {
    /// Only the additive offset is applied
    None,
    /// Subtract each sample's minimum intensity, then add the offset
    MinimumSubtract,
}

/// Configurable parameters for the normalizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    pub background: BackgroundMethod,
    /// Added to every intensity before log2; must be positive
    pub offset: f64,
    /// Align sample distributions by quantile normalization
    pub quantile: bool,
    pub summarization: SummarizationMethod,
    /// Median polish sweep limit
    pub max_iter: usize,
    /// Median polish relative convergence tolerance
    pub epsilon: f64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            background: BackgroundMethod::MinimumSubtract,
            offset: 1.0,
            quantile: true,
            summarization: SummarizationMethod::MedianPolish,
            max_iter: 10,
            epsilon: 0.01,
        }
    }
}

/// Validate raw input and copy it into a dense (probes x samples) matrix
fn collect_intensities<P: RawIntensityProvider + ?Sized>(raw: &P) -> Result<Array2<f64>> {
    let n_probes = raw.n_probes();
    let n_samples = raw.n_samples();

    if n_samples == 0 {
        return Err(LimmaError::MalformedInput {
            reason: "Raw data contains no samples".to_string(),
        });
    }
    if n_probes == 0 {
        return Err(LimmaError::MalformedInput {
            reason: "Raw data contains no probes".to_string(),
        });
    }

    let mut x = Array2::zeros((n_probes, n_samples));
    for i in 0..n_probes {
        for j in 0..n_samples {
            let v = raw.intensity(i, j);
            if v.is_nan() || v < 0.0 || v.is_infinite() {
                return Err(LimmaError::MalformedInput {
                    reason: format!(
                        "Invalid intensity {} for probe '{}' in sample '{}'",
                        v,
                        raw.probe_ids()[i],
                        raw.sample_ids()[j]
                    ),
                });
            }
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

/// Group probe rows by feature, features in order of first appearance
fn probes_by_feature<P: RawIntensityProvider + ?Sized>(raw: &P) -> (Vec<String>, Vec<Vec<usize>>) {
    let mut feature_ids: Vec<String> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for i in 0..raw.n_probes() {
        let feature = raw.feature_id(i);
        match index.get(feature) {
            Some(&k) => members[k].push(i),
            None => {
                index.insert(feature, feature_ids.len());
                feature_ids.push(feature.to_string());
                members.push(vec![i]);
            }
        }
    }
    (feature_ids, members)
}

/// Normalize raw intensities into a log2 expression matrix.
///
/// Pure transform: the provider is only read. Fails with `MalformedInput` on
/// empty input or any negative / non-finite intensity.
pub fn normalize<P: RawIntensityProvider + ?Sized>(
    raw: &P,
    params: &NormalizeParams,
) -> Result<ExpressionMatrix> {
    if !params.offset.is_finite() || params.offset <= 0.0 {
        return Err(LimmaError::InvalidConfig {
            reason: format!("Normalization offset must be positive, got {}", params.offset),
        });
    }

    let mut x = collect_intensities(raw)?;
    log::info!(
        "Normalizing {} probes x {} samples (background: {:?}, quantile: {}, summarization: {:?})",
        x.nrows(),
        x.ncols(),
        params.background,
        params.quantile,
        params.summarization
    );

    if params.background == BackgroundMethod::MinimumSubtract {
        subtract_minimum(&mut x);
    }
    x.mapv_inplace(|v| v + params.offset);

    if params.quantile {
        x = quantile_normalize(&x);
    }

    x.mapv_inplace(f64::log2);

    let (feature_ids, members) = probes_by_feature(raw);
    log::debug!("{} probes grouped into {} features", raw.n_probes(), feature_ids.len());

    let rows: Vec<Vec<f64>> = members
        .par_iter()
        .map(|probe_rows| {
            let block = x.select(Axis(0), probe_rows);
            summarize_block(block.view(), params.summarization, params.max_iter, params.epsilon)
        })
        .collect();

    let n_samples = x.ncols();
    let mut values = Array2::zeros((rows.len(), n_samples));
    for (i, row) in rows.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            values[[i, j]] = v;
        }
    }

    ExpressionMatrix::new(values, feature_ids, raw.sample_ids().to_vec())
}
