//! rust_limma: microarray differential expression analysis in Rust
//!
//! Raw probe intensities are normalized into a log2 expression matrix, one
//! linear model per feature is fitted against a two-group design, residual
//! variances are moderated by empirical Bayes, p-values are corrected for
//! multiple testing and the DEG list is selected by adjusted p-value and
//! fold change. DEGs can then be joined with an annotation table.
//!
//! # Example
//!
//! ```ignore
//! use rust_limma::prelude::*;
//!
//! let raw = read_intensity_matrix("intensities.tsv")?;
//! let config = AnalysisConfig::default();
//!
//! let output = run_pipeline(&raw, "100111000", &config)?;
//! println!("{}", output.summary(&config));
//! write_results("degs.tsv", &output.degs)?;
//! ```

pub mod annotate;
pub mod cli;
pub mod config;
pub mod data;
pub mod ebayes;
pub mod error;
pub mod filter;
pub mod io;
pub mod lm;
pub mod normalization;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::annotate::{merge_annotations, AnnotatedDeg, JoinPolicy, MergeReport};
    pub use crate::config::AnalysisConfig;
    pub use crate::data::{
        AnnotationRecord, AnnotationTable, ExpressionMatrix, GroupLevel, GroupLevels,
        RawIntensities, RawIntensityProvider, Sample, SampleSubset,
    };
    pub use crate::ebayes::{moderate, EbayesParams, FeatureStatus, ModeratedFit};
    pub use crate::error::{LimmaError, Result};
    pub use crate::filter::{select_degs, DegThresholds};
    pub use crate::io::{
        read_annotation, read_intensity_matrix, read_probe_map, write_annotated,
        write_expression, write_results, LimmaResults, ResultsSummary,
    };
    pub use crate::lm::{
        design_from_group_string, evaluate_contrast, fit_linear_model, Contrast, ContrastFit,
        DesignMatrix, LinearFit,
    };
    pub use crate::normalization::{normalize, NormalizeParams, SummarizationMethod};
    pub use crate::testing::{adjust_pvalues, benjamini_hochberg, AdjustMethod};
}

use prelude::*;

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub expression: ExpressionMatrix,
    pub design: DesignMatrix,
    pub moderated: ModeratedFit,
    /// Full, unfiltered results in feature order
    pub results: LimmaResults,
    /// DEG rows, ordered by adjusted p-value
    pub degs: LimmaResults,
}

impl PipelineOutput {
    pub fn summary(&self, config: &AnalysisConfig) -> ResultsSummary {
        self.results
            .summary(config.selection.adj_p_threshold, config.selection.fold_change_threshold)
    }
}

/// Drop samples from the raw data and the positional group string together
pub fn exclude_samples<'a, P: RawIntensityProvider + ?Sized>(
    raw: &'a P,
    group_string: &str,
    excluded: &[String],
) -> Result<(SampleSubset<'a, P>, String)> {
    let codes: Vec<char> = group_string.trim().chars().collect();
    if codes.len() != raw.n_samples() {
        return Err(LimmaError::CardinalityMismatch {
            expected: raw.n_samples(),
            got: codes.len(),
        });
    }

    let kept = SampleSubset::new(raw, excluded)?;
    let remaining: String = kept.columns().iter().map(|&j| codes[j]).collect();

    if !excluded.is_empty() {
        log::info!("Excluded {} samples: {}", excluded.len(), excluded.join(", "));
    }
    Ok((kept, remaining))
}

/// Run the complete analysis: normalize, fit, moderate, adjust and select.
///
/// Configuration and group string are validated before any computation.
pub fn run_pipeline<P: RawIntensityProvider + ?Sized>(
    raw: &P,
    group_string: &str,
    config: &AnalysisConfig,
) -> Result<PipelineOutput> {
    config.validate()?;

    let (raw, group_string) = exclude_samples(raw, group_string, &config.exclude_samples)?;

    // Step 1: Design (validates the group string)
    let design = design_from_group_string(raw.sample_ids(), &group_string, &config.groups)?;

    // Step 2: Normalize
    let expression = normalize(&raw, &config.normalization)?;

    // Step 3: Fit linear model
    let fit = fit_linear_model(&expression, &design)?;

    // Step 4: Contrast
    let contrast = evaluate_contrast(&fit, &config.contrast)?;

    // Step 5: Empirical Bayes moderation
    let moderated = moderate(&fit, &contrast, &config.ebayes)?;

    // Step 6: Multiple testing correction
    let adj_p_values = adjust_pvalues(&moderated.p_values(), config.adjust_method);
    let results = LimmaResults::from_stages(
        &fit,
        &contrast,
        &moderated,
        adj_p_values,
        config.adjust_method,
    )?;

    // Step 7: DEG selection
    let degs = select_degs(&results, &config.selection)?;

    Ok(PipelineOutput {
        expression,
        design,
        moderated,
        results,
        degs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use std::collections::HashMap;

    const GROUPS: &str = "100111000";
    const N_FEATURES: usize = 1000;
    const UP: [usize; 3] = [105, 317, 733];
    const DOWN: [usize; 3] = [209, 526, 841];

    /// Uniform value in [0, 1) from a splitmix64 step
    fn jitter(seed: u64) -> f64 {
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    /// 1000 features x 2 probes over 9 samples with +/-4% multiplicative noise.
    /// Feature 0 is a flat background probeset; UP / DOWN features change
    /// 16-fold in the case samples, everything else is unchanged.
    fn raw_fixture() -> RawIntensities {
        let n_samples = GROUPS.len();
        let case: Vec<bool> = GROUPS.chars().map(|c| c == '1').collect();

        let mut values = Array2::zeros((N_FEATURES * 2, n_samples));
        let mut probe_map = HashMap::new();
        let mut probe_ids = Vec::new();
        for i in 0..N_FEATURES {
            for k in 0..2 {
                let row = i * 2 + k;
                let probe = format!("p{}_{}", i, k);
                probe_map.insert(probe.clone(), feature(i));
                probe_ids.push(probe);
                for j in 0..n_samples {
                    let v = if i == 0 {
                        50.0
                    } else {
                        let affinity = if k == 0 { 1.0 } else { 1.3 };
                        let base = 1000.0 * 2f64.powf(i as f64 / 100.0) * affinity;
                        let noise = 1.0 + 0.08 * (jitter((row * 16 + j) as u64) - 0.5);
                        let effect = match (case[j], UP.contains(&i), DOWN.contains(&i)) {
                            (true, true, _) => 16.0,
                            (true, _, true) => 1.0 / 16.0,
                            _ => 1.0,
                        };
                        base * noise * effect
                    };
                    values[[row, j]] = v;
                }
            }
        }

        let sample_ids = (1..=n_samples).map(|j| format!("GSM{}", j)).collect();
        RawIntensities::new(values, probe_ids, sample_ids)
            .unwrap()
            .with_probe_map(&probe_map)
            .unwrap()
    }

    fn is_null(i: usize) -> bool {
        i != 0 && !UP.contains(&i) && !DOWN.contains(&i)
    }

    fn feature(i: usize) -> String {
        format!("{}_at", 1000 + i)
    }

    #[test]
    fn test_full_pipeline() {
        let config = AnalysisConfig::default();
        let raw = raw_fixture();
        let output = run_pipeline(&raw, GROUPS, &config).unwrap();
        let res = &output.results;

        assert_eq!(res.n_features(), N_FEATURES);
        assert_eq!(output.expression.n_samples(), 9);
        assert_eq!(output.design.column_sums(), vec![5.0, 4.0]);

        for &i in &UP {
            let row = res.position(&feature(i)).unwrap();
            assert!(res.log_fc[row] > 2.0, "{} should be up-regulated", feature(i));
        }
        for &i in &DOWN {
            let row = res.position(&feature(i)).unwrap();
            assert!(res.log_fc[row] < -2.0, "{} should be down-regulated", feature(i));
        }

        // Flat background feature: zero fold change, not significant, flagged
        let flat = res.position(&feature(0)).unwrap();
        assert!(res.log_fc[flat].abs() < 1e-9);
        assert!(res.p_values[flat] > 0.5);
        assert_eq!(res.status[flat], FeatureStatus::ZeroVariance);

        // Unchanged features keep a small fold change and stay non-significant
        for i in (0..N_FEATURES).filter(|&i| is_null(i)) {
            let row = res.position(&feature(i)).unwrap();
            assert!(res.log_fc[row].abs() < 0.5, "{} lfc {}", feature(i), res.log_fc[row]);
            assert!(res.adj_p_values[row] > 0.01, "{} adj {}", feature(i), res.adj_p_values[row]);
        }

        // Adjusted p-values never fall below raw p-values
        for (p, adj) in res.p_values.iter().zip(res.adj_p_values.iter()) {
            assert!(adj >= p);
        }

        // Exactly the changed features are selected, and they are a subset of the table
        let mut selected: Vec<String> = output.degs.feature_ids.clone();
        selected.sort();
        let mut expected: Vec<String> = UP.iter().chain(DOWN.iter()).map(|&i| feature(i)).collect();
        expected.sort();
        assert_eq!(selected, expected);
        for w in output.degs.adj_p_values.windows(2) {
            assert!(w[0] <= w[1]);
        }

        let summary = output.summary(&config);
        assert_eq!(summary.upregulated, 3);
        assert_eq!(summary.downregulated, 3);
        println!("{}", summary);
    }

    #[test]
    fn test_swapped_contrast_is_symmetric() {
        let config = AnalysisConfig::default();
        let mut swapped = config.clone();
        swapped.contrast = config.contrast.swapped();

        let raw = raw_fixture();
        let a = run_pipeline(&raw, GROUPS, &config).unwrap().results;
        let b = run_pipeline(&raw, GROUPS, &swapped).unwrap().results;

        for i in 0..a.n_features() {
            assert!((a.log_fc[i] + b.log_fc[i]).abs() < 1e-9);
            assert!((a.t[i] + b.t[i]).abs() < 1e-6);
            assert!((a.p_values[i] - b.p_values[i]).abs() < 1e-12);
            assert!((a.adj_p_values[i] - b.adj_p_values[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sample_exclusion() {
        let mut config = AnalysisConfig::default();
        config.exclude_samples = vec!["GSM4".to_string()];
        let raw = raw_fixture();
        let output = run_pipeline(&raw, GROUPS, &config).unwrap();
        assert_eq!(output.expression.n_samples(), 8);
        assert_eq!(output.design.column_sums(), vec![5.0, 3.0]);
        assert!(!output.expression.sample_ids().contains(&"GSM4".to_string()));
        assert_eq!(output.degs.n_features(), 6);

        let (kept, remaining) = exclude_samples(&raw, GROUPS, &["GSM1".to_string()]).unwrap();
        assert_eq!(remaining, "00111000");
        assert_eq!(kept.n_samples(), 8);
        assert_eq!(kept.intensity(3, 0), raw.intensity(3, 1));

        let (kept, remaining) = exclude_samples(&raw, GROUPS, &[]).unwrap();
        assert_eq!(remaining, GROUPS);
        assert_eq!(kept.sample_ids(), raw.sample_ids());

        let err = exclude_samples(&raw, GROUPS, &["GSM10".to_string()]).unwrap_err();
        assert!(matches!(err, LimmaError::MalformedInput { .. }));
    }

    #[test]
    fn test_input_errors_fail_fast() {
        let raw = raw_fixture();
        let config = AnalysisConfig::default();

        let err = run_pipeline(&raw, "10011100", &config).unwrap_err();
        assert!(matches!(err, LimmaError::CardinalityMismatch { expected: 9, got: 8 }));
        assert_eq!(err.stage(), "design");

        let err = run_pipeline(&raw, "100121000", &config).unwrap_err();
        assert!(matches!(err, LimmaError::InvalidGroupLabel { position: 4, .. }));

        let err = run_pipeline(&raw, "000000000", &config).unwrap_err();
        assert!(matches!(err, LimmaError::RankDeficientDesign { .. }));
    }

    #[test]
    fn test_annotation_of_degs() {
        let config = AnalysisConfig::default();
        let raw = raw_fixture();
        let output = run_pipeline(&raw, GROUPS, &config).unwrap();
        let unannotated = DOWN[2];
        let duplicated = UP[0];

        // One DEG without annotation, one with two annotation rows
        let records: Vec<AnnotationRecord> = UP
            .iter()
            .chain(DOWN.iter())
            .filter(|&&i| i != unannotated)
            .map(|&i| {
                let symbol = format!("GENE{}", i);
                AnnotationRecord::new(&feature(i), Some(symbol.as_str()), None, None)
            })
            .chain(std::iter::once(AnnotationRecord::new(
                &feature(duplicated),
                Some("GENE_B"),
                None,
                None,
            )))
            .collect();
        let table = AnnotationTable::new(records);

        let (rows, report) = merge_annotations(&output.degs, &table, JoinPolicy::FanOut).unwrap();
        assert_eq!(rows.len(), output.degs.n_features() + 1);
        assert_eq!(report.unmatched, vec![feature(unannotated)]);
        let missing = rows.iter().find(|r| r.feature_id == feature(unannotated)).unwrap();
        assert!(missing.gene_symbol.is_none());
    }
}
