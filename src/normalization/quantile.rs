//! Background adjustment and quantile normalization of raw intensities

use ndarray::{Array2, Axis};

/// Subtract each sample's minimum intensity, so the dimmest probe sits at zero
pub fn subtract_minimum(x: &mut Array2<f64>) {
    for mut col in x.axis_iter_mut(Axis(1)) {
        let min = col.iter().copied().fold(f64::INFINITY, f64::min);
        if min.is_finite() {
            col.mapv_inplace(|v| v - min);
        }
    }
}

/// Quantile normalization across samples
///
/// Every sample column is mapped onto the mean sorted distribution, so all
/// columns end up with identical marginal distributions. Tied values within a
/// column receive the average of the reference quantiles their ranks span,
/// which keeps the result independent of input order.
pub fn quantile_normalize(x: &Array2<f64>) -> Array2<f64> {
    let (n_rows, n_cols) = x.dim();
    if n_rows == 0 || n_cols == 0 {
        return x.clone();
    }

    // Row order of each column after sorting
    let orders: Vec<Vec<usize>> = x
        .axis_iter(Axis(1))
        .map(|col| {
            let mut idx: Vec<usize> = (0..n_rows).collect();
            idx.sort_by(|&a, &b| col[a].total_cmp(&col[b]));
            idx
        })
        .collect();

    // Reference distribution: mean of the k-th smallest value across columns
    let mut reference = vec![0.0; n_rows];
    for (j, order) in orders.iter().enumerate() {
        for (k, &i) in order.iter().enumerate() {
            reference[k] += x[[i, j]];
        }
    }
    for r in reference.iter_mut() {
        *r /= n_cols as f64;
    }

    let mut out = Array2::zeros((n_rows, n_cols));
    for (j, order) in orders.iter().enumerate() {
        let mut start = 0;
        while start < n_rows {
            let value = x[[order[start], j]];
            let mut end = start + 1;
            while end < n_rows && x[[order[end], j]] == value {
                end += 1;
            }
            let tied_mean = reference[start..end].iter().sum::<f64>() / (end - start) as f64;
            for &i in &order[start..end] {
                out[[i, j]] = tied_mean;
            }
            start = end;
        }
    }

    out
}
