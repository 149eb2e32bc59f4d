//! Multiple testing correction of raw p-values
//!
//! NaN p-values (untestable features) keep a NaN adjustment and are not
//! counted towards the number of tests.

use serde::{Deserialize, Serialize};

/// P-value adjustment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustMethod {
    /// Benjamini-Hochberg false discovery rate
    #[default]
    #[serde(alias = "bh", alias = "fdr")]
    BenjaminiHochberg,
    /// Bonferroni family-wise error rate
    Bonferroni,
}

/// Adjust p-values with the chosen method
pub fn adjust_pvalues(pvalues: &[f64], method: AdjustMethod) -> Vec<f64> {
    match method {
        AdjustMethod::BenjaminiHochberg => benjamini_hochberg(pvalues),
        AdjustMethod::Bonferroni => bonferroni(pvalues),
    }
}

/// Benjamini-Hochberg step-up adjustment.
///
/// Sort ascending, take p * m / rank, then the running minimum from the
/// largest p-value down, capped at 1. Output is in input order.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let mut tested: Vec<usize> = (0..n).filter(|&i| !pvalues[i].is_nan()).collect();
    let m = tested.len();

    let mut padj = vec![f64::NAN; n];
    if m == 0 {
        return padj;
    }

    tested.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));

    let mut running_min = f64::INFINITY;
    for (pos, &i) in tested.iter().enumerate().rev() {
        let rank = (pos + 1) as f64;
        let adj = (pvalues[i] * m as f64 / rank).min(1.0);
        running_min = running_min.min(adj);
        padj[i] = running_min;
    }

    padj
}

/// Bonferroni adjustment: p * m capped at 1
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| !p.is_nan()).count() as f64;
    pvalues
        .iter()
        .map(|&p| if p.is_nan() { f64::NAN } else { (p * m).min(1.0) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_known_values() {
        // p.adjust(c(0.01, 0.04, 0.03, 0.02), "BH") = 0.04 0.04 0.04 0.04
        let padj = benjamini_hochberg(&[0.01, 0.04, 0.03, 0.02]);
        for adj in &padj {
            assert!((adj - 0.04).abs() < 1e-12);
        }

        // p.adjust(c(0.001, 0.01, 0.05, 0.1, 0.8), "BH")
        let padj = benjamini_hochberg(&[0.001, 0.01, 0.05, 0.1, 0.8]);
        let expected = [0.005, 0.025, 0.0833333333333333, 0.125, 0.8];
        for (a, e) in padj.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_bh_not_below_raw_and_monotone() {
        let pvalues = vec![0.2, 0.001, 0.6, 0.04, 0.04, 0.9, 0.013, 0.5];
        let padj = benjamini_hochberg(&pvalues);

        for (p, adj) in pvalues.iter().zip(padj.iter()) {
            assert!(adj >= p);
            assert!(*adj <= 1.0);
        }

        let mut order: Vec<usize> = (0..pvalues.len()).collect();
        order.sort_by(|&a, &b| pvalues[a].total_cmp(&pvalues[b]));
        for w in order.windows(2) {
            assert!(padj[w[0]] <= padj[w[1]]);
        }
    }

    #[test]
    fn test_bh_with_nan() {
        let padj = benjamini_hochberg(&[0.01, f64::NAN, 0.03, 0.02]);
        assert!(padj[1].is_nan());
        // m = 3, not 4
        assert!((padj[0] - 0.03).abs() < 1e-12);
        assert!(benjamini_hochberg(&[f64::NAN]).iter().all(|p| p.is_nan()));
        assert!(benjamini_hochberg(&[]).is_empty());
    }

    #[test]
    fn test_bonferroni() {
        let padj = adjust_pvalues(&[0.01, 0.5, f64::NAN], AdjustMethod::Bonferroni);
        assert!((padj[0] - 0.02).abs() < 1e-12);
        assert_eq!(padj[1], 1.0);
        assert!(padj[2].is_nan());
    }
}
