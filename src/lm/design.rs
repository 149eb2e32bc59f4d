//! Design matrix creation for the linear model

use ndarray::{Array2, ArrayView2, Axis};

use crate::data::{GroupLevels, Sample};
use crate::error::{LimmaError, Result};

/// Samples x groups indicator matrix without intercept ("~ 0 + group").
///
/// Column j holds 1.0 for samples in the j-th group of the canonical order.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    matrix: Array2<f64>,
    samples: Vec<Sample>,
    groups: GroupLevels,
}

impl DesignMatrix {
    /// Wrap an arbitrary full design; columns are named after `groups`
    pub fn from_matrix(
        matrix: Array2<f64>,
        samples: Vec<Sample>,
        groups: GroupLevels,
    ) -> Result<Self> {
        if matrix.nrows() != samples.len() {
            return Err(LimmaError::DimensionMismatch {
                expected: format!("{} design rows", samples.len()),
                got: format!("{} design rows", matrix.nrows()),
            });
        }
        if matrix.ncols() != groups.len() {
            return Err(LimmaError::DimensionMismatch {
                expected: format!("{} design columns", groups.len()),
                got: format!("{} design columns", matrix.ncols()),
            });
        }
        Ok(Self {
            matrix,
            samples,
            groups,
        })
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn groups(&self) -> &GroupLevels {
        &self.groups
    }

    pub fn n_samples(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn n_coefs(&self) -> usize {
        self.matrix.ncols()
    }

    /// Coefficient names, one per column
    pub fn column_names(&self) -> Vec<&str> {
        self.groups.names()
    }

    /// Sum of each indicator column (group sizes for an indicator design)
    pub fn column_sums(&self) -> Vec<f64> {
        self.matrix.axis_iter(Axis(1)).map(|col| col.sum()).collect()
    }

    /// Residual degrees of freedom of a fit against this design
    pub fn residual_df(&self) -> usize {
        self.n_samples().saturating_sub(self.n_coefs())
    }
}

/// Build an indicator design from per-sample group labels.
///
/// `labels` must have one entry per sample, each naming one of `groups`.
pub fn build_design(
    sample_ids: &[String],
    labels: &[String],
    groups: &GroupLevels,
) -> Result<DesignMatrix> {
    if labels.len() != sample_ids.len() {
        return Err(LimmaError::CardinalityMismatch {
            expected: sample_ids.len(),
            got: labels.len(),
        });
    }

    let n_samples = sample_ids.len();
    let mut matrix = Array2::zeros((n_samples, groups.len()));
    let mut samples = Vec::with_capacity(n_samples);

    for (i, (id, label)) in sample_ids.iter().zip(labels.iter()).enumerate() {
        let col = groups
            .index_of(label)
            .ok_or_else(|| LimmaError::InvalidGroupLabel {
                label: label.clone(),
                position: i,
                allowed: groups.names().join(", "),
            })?;
        matrix[[i, col]] = 1.0;
        samples.push(Sample {
            id: id.clone(),
            group: label.clone(),
        });
    }

    let design = DesignMatrix::from_matrix(matrix, samples, groups.clone())?;

    log::info!(
        "Design: {}",
        design
            .column_names()
            .iter()
            .zip(design.column_sums())
            .map(|(name, n)| format!("{}={}", name, n))
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(design)
}

/// Build an indicator design from a positional group string such as "100111000"
pub fn design_from_group_string(
    sample_ids: &[String],
    group_string: &str,
    groups: &GroupLevels,
) -> Result<DesignMatrix> {
    let n_codes = group_string.trim().chars().count();
    if n_codes != sample_ids.len() {
        return Err(LimmaError::CardinalityMismatch {
            expected: sample_ids.len(),
            got: n_codes,
        });
    }
    let labels = groups.decode(group_string)?;
    build_design(sample_ids, &labels, groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("GSM{}", i)).collect()
    }

    #[test]
    fn test_nine_sample_design_column_sums() {
        let groups = GroupLevels::default();
        let design = design_from_group_string(&sample_ids(9), "100111000", &groups).unwrap();

        assert_eq!(design.matrix().dim(), (9, 2));
        assert_eq!(design.column_names(), vec!["control", "case"]);
        assert_eq!(design.column_sums(), vec![5.0, 4.0]);
        assert_eq!(design.residual_df(), 7);

        // Every row sums to one
        for row in design.matrix().axis_iter(Axis(0)) {
            assert_eq!(row.sum(), 1.0);
        }
        // First sample is "1" -> case column
        assert_eq!(design.matrix()[[0, 1]], 1.0);
        assert_eq!(design.samples()[0].group, "case");
    }

    #[test]
    fn test_cardinality_mismatch() {
        let groups = GroupLevels::default();
        let err = design_from_group_string(&sample_ids(9), "10011100", &groups).unwrap_err();
        assert!(matches!(err, LimmaError::CardinalityMismatch { expected: 9, got: 8 }));
    }

    #[test]
    fn test_invalid_label() {
        let groups = GroupLevels::default();
        let labels = vec!["control".to_string(), "treated".to_string()];
        let err = build_design(&sample_ids(2), &labels, &groups).unwrap_err();
        assert!(matches!(err, LimmaError::InvalidGroupLabel { position: 1, .. }));

        let err = design_from_group_string(&sample_ids(3), "102", &groups).unwrap_err();
        assert!(matches!(err, LimmaError::InvalidGroupLabel { position: 2, .. }));
    }

    #[test]
    fn test_empty_group_builds_zero_column() {
        let groups = GroupLevels::default();
        let design = design_from_group_string(&sample_ids(3), "000", &groups).unwrap();
        assert_eq!(design.column_sums(), vec![3.0, 0.0]);
    }
}
