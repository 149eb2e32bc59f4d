//! Left join of the DEG table against an annotation reference
//!
//! Every DEG row appears in the output; rows without a matching annotation
//! keep empty gene fields. Duplicate annotation keys are resolved by the
//! configured [`JoinPolicy`].

use serde::{Deserialize, Serialize};

use crate::data::{AnnotationRecord, AnnotationTable};
use crate::error::{LimmaError, Result};
use crate::io::LimmaResults;

/// Separator used when concatenating values of duplicate annotation rows
pub const CONCAT_SEPARATOR: &str = " /// ";

/// Handling of features with more than one annotation row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// One output row per matching annotation row
    #[default]
    FanOut,
    /// Keep the first matching annotation row
    First,
    /// One output row with the distinct values of each field joined
    Concatenate,
    /// Fail on a duplicated key
    Strict,
}

/// A DEG row with its annotation fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedDeg {
    pub feature_id: String,
    pub gene_symbol: Option<String>,
    pub entrez_id: Option<String>,
    pub description: Option<String>,
    pub log_fc: f64,
    pub ave_expr: f64,
    pub t: f64,
    pub p_value: f64,
    pub adj_p_value: f64,
    pub b: f64,
}

impl AnnotatedDeg {
    pub fn is_annotated(&self) -> bool {
        self.gene_symbol.is_some() || self.entrez_id.is_some() || self.description.is_some()
    }
}

/// What the join did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub input_rows: usize,
    pub output_rows: usize,
    /// DEG features with no annotation entry
    pub unmatched: Vec<String>,
    /// DEG features with more than one annotation entry
    pub duplicated: Vec<String>,
}

fn concat_distinct<'a, I>(values: I) -> Option<String>
where
    I: Iterator<Item = Option<&'a String>>,
{
    let mut seen: Vec<&str> = Vec::new();
    for v in values.flatten() {
        if !seen.contains(&v.as_str()) {
            seen.push(v);
        }
    }
    if seen.is_empty() {
        None
    } else {
        Some(seen.join(CONCAT_SEPARATOR))
    }
}

/// Left join DEG rows with annotation records on the feature identifier
pub fn merge_annotations(
    degs: &LimmaResults,
    annotation: &AnnotationTable,
    policy: JoinPolicy,
) -> Result<(Vec<AnnotatedDeg>, MergeReport)> {
    let mut rows = Vec::with_capacity(degs.n_features());
    let mut report = MergeReport {
        input_rows: degs.n_features(),
        ..MergeReport::default()
    };

    for i in 0..degs.n_features() {
        let feature_id = &degs.feature_ids[i];
        let matches = annotation.lookup(feature_id);

        let row = |record: Option<&AnnotationRecord>| AnnotatedDeg {
            feature_id: feature_id.clone(),
            gene_symbol: record.and_then(|r| r.gene_symbol.clone()),
            entrez_id: record.and_then(|r| r.entrez_id.clone()),
            description: record.and_then(|r| r.description.clone()),
            log_fc: degs.log_fc[i],
            ave_expr: degs.ave_expr[i],
            t: degs.t[i],
            p_value: degs.p_values[i],
            adj_p_value: degs.adj_p_values[i],
            b: degs.b[i],
        };

        if matches.is_empty() {
            log::warn!("{}", LimmaError::JoinKeyMismatch {
                feature_id: feature_id.clone(),
            });
            report.unmatched.push(feature_id.clone());
            rows.push(row(None));
            continue;
        }

        if matches.len() > 1 {
            report.duplicated.push(feature_id.clone());
            if policy == JoinPolicy::Strict {
                return Err(LimmaError::DuplicateAnnotationKey {
                    feature_id: feature_id.clone(),
                    count: matches.len(),
                });
            }
        }

        match policy {
            JoinPolicy::FanOut => rows.extend(matches.iter().map(|r| row(Some(*r)))),
            JoinPolicy::First | JoinPolicy::Strict => rows.push(row(matches.first().copied())),
            JoinPolicy::Concatenate => {
                let mut merged = row(None);
                merged.gene_symbol =
                    concat_distinct(matches.iter().map(|r| r.gene_symbol.as_ref()));
                merged.entrez_id = concat_distinct(matches.iter().map(|r| r.entrez_id.as_ref()));
                merged.description =
                    concat_distinct(matches.iter().map(|r| r.description.as_ref()));
                rows.push(merged);
            }
        }
    }

    report.output_rows = rows.len();
    log::info!(
        "Annotated {} DEG rows into {} rows ({} unmatched, {} duplicated, policy {:?})",
        report.input_rows,
        report.output_rows,
        report.unmatched.len(),
        report.duplicated.len(),
        policy
    );

    Ok((rows, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::results::tests::table;

    fn degs() -> LimmaResults {
        table(&[("A", 3.0, 0.001, 0.01), ("X", -4.0, 0.0001, 0.001), ("D", 2.5, 0.002, 0.02)])
    }

    fn reference() -> AnnotationTable {
        AnnotationTable::new(vec![
            AnnotationRecord::new("A", Some("GENEA"), Some("101"), Some("gene a")),
            AnnotationRecord::new("D", Some("GENED1"), Some("401"), None),
            AnnotationRecord::new("D", Some("GENED2"), Some("401"), Some("gene d2")),
            AnnotationRecord::new("Z", Some("GENEZ"), None, None),
        ])
    }

    #[test]
    fn test_missing_annotation_keeps_row() {
        let (rows, report) = merge_annotations(&degs(), &reference(), JoinPolicy::First).unwrap();
        assert_eq!(rows.len(), 3);
        let x = rows.iter().find(|r| r.feature_id == "X").unwrap();
        assert!(x.gene_symbol.is_none());
        assert!(x.entrez_id.is_none());
        assert!(!x.is_annotated());
        assert_eq!(x.log_fc, -4.0);
        assert_eq!(report.unmatched, vec!["X".to_string()]);
    }

    #[test]
    fn test_fan_out_duplicates() {
        let (rows, report) = merge_annotations(&degs(), &reference(), JoinPolicy::FanOut).unwrap();
        // Never drops a row; grows by one for the duplicated key
        assert!(rows.len() >= 3);
        assert_eq!(rows.len(), 4);
        assert_eq!(report.duplicated, vec!["D".to_string()]);
        let d: Vec<_> = rows.iter().filter(|r| r.feature_id == "D").collect();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].gene_symbol.as_deref(), Some("GENED1"));
        assert_eq!(d[1].gene_symbol.as_deref(), Some("GENED2"));
    }

    #[test]
    fn test_equal_count_without_duplicates() {
        let unique = AnnotationTable::new(vec![
            AnnotationRecord::new("A", Some("GENEA"), None, None),
            AnnotationRecord::new("D", Some("GENED"), None, None),
        ]);
        let (rows, report) = merge_annotations(&degs(), &unique, JoinPolicy::FanOut).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(report.output_rows, report.input_rows);
        // DEG order is kept
        let ids: Vec<&str> = rows.iter().map(|r| r.feature_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "X", "D"]);
    }

    #[test]
    fn test_concatenate_and_strict() {
        let (rows, _) = merge_annotations(&degs(), &reference(), JoinPolicy::Concatenate).unwrap();
        assert_eq!(rows.len(), 3);
        let d = rows.iter().find(|r| r.feature_id == "D").unwrap();
        assert_eq!(d.gene_symbol.as_deref(), Some("GENED1 /// GENED2"));
        assert_eq!(d.entrez_id.as_deref(), Some("401"));
        assert_eq!(d.description.as_deref(), Some("gene d2"));

        let err = merge_annotations(&degs(), &reference(), JoinPolicy::Strict).unwrap_err();
        assert!(matches!(err, LimmaError::DuplicateAnnotationKey { count: 2, .. }));
    }
}
