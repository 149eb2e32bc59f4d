//! Probeset summarization: reduce the probes of one feature to one value per sample

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::stats::{mean, median};

/// How probes belonging to one feature are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarizationMethod {
    /// Tukey median polish; value = overall effect + sample effect
    MedianPolish,
    /// Per-sample median over probes
    Median,
    /// Per-sample mean over probes
    Mean,
}

/// Summarize a (probes x samples) log2 block into one value per sample
pub fn summarize_block(
    block: ArrayView2<f64>,
    method: SummarizationMethod,
    max_iter: usize,
    epsilon: f64,
) -> Vec<f64> {
    if block.nrows() == 1 {
        return block.row(0).to_vec();
    }
    match method {
        SummarizationMethod::MedianPolish => median_polish(block, max_iter, epsilon),
        SummarizationMethod::Median => block
            .axis_iter(Axis(1))
            .map(|col| median(&col.to_vec()))
            .collect(),
        SummarizationMethod::Mean => block
            .axis_iter(Axis(1))
            .map(|col| mean(&col.to_vec()))
            .collect(),
    }
}

/// Tukey's median polish over a (probes x samples) block.
///
/// Alternately sweeps row medians and column medians out of the residuals
/// until the absolute residual sum changes by less than `epsilon` relative to
/// its value, or `max_iter` sweeps have run. Returns overall + column effect
/// for each sample.
pub fn median_polish(block: ArrayView2<f64>, max_iter: usize, epsilon: f64) -> Vec<f64> {
    let (n_rows, n_cols) = block.dim();
    let mut z: Array2<f64> = block.to_owned();
    let mut overall = 0.0;
    let mut row_eff = vec![0.0; n_rows];
    let mut col_eff = vec![0.0; n_cols];
    let mut old_sum = 0.0;

    for _ in 0..max_iter {
        // Row sweep
        for (i, mut row) in z.axis_iter_mut(Axis(0)).enumerate() {
            let delta = median(&row.to_vec());
            row.mapv_inplace(|v| v - delta);
            row_eff[i] += delta;
        }
        let delta = median(&col_eff);
        col_eff.iter_mut().for_each(|c| *c -= delta);
        overall += delta;

        // Column sweep
        for (j, mut col) in z.axis_iter_mut(Axis(1)).enumerate() {
            let delta = median(&col.to_vec());
            col.mapv_inplace(|v| v - delta);
            col_eff[j] += delta;
        }
        let delta = median(&row_eff);
        row_eff.iter_mut().for_each(|r| *r -= delta);
        overall += delta;

        let new_sum: f64 = z.iter().map(|v| v.abs()).sum();
        let converged = new_sum == 0.0 || (new_sum - old_sum).abs() < epsilon * new_sum;
        if converged {
            break;
        }
        old_sum = new_sum;
    }

    col_eff.iter().map(|c| overall + c).collect()
}
