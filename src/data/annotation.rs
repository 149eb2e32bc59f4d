//! Probeset annotation reference table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One annotation row: feature identifier mapped to gene identifiers
///
/// Column aliases accept the headers produced by common annotation exports
/// (`PROBEID`, `SYMBOL`, `ENTREZID`, `GENENAME`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    #[serde(alias = "PROBEID", alias = "probe_id", alias = "ID")]
    pub feature_id: String,
    #[serde(default, alias = "SYMBOL", alias = "symbol")]
    pub gene_symbol: Option<String>,
    #[serde(default, alias = "ENTREZID", alias = "entrez")]
    pub entrez_id: Option<String>,
    #[serde(default, alias = "GENENAME", alias = "gene_name")]
    pub description: Option<String>,
}

impl AnnotationRecord {
    pub fn new(
        feature_id: &str,
        gene_symbol: Option<&str>,
        entrez_id: Option<&str>,
        description: Option<&str>,
    ) -> Self {
        Self {
            feature_id: feature_id.to_string(),
            gene_symbol: gene_symbol.map(str::to_string),
            entrez_id: entrez_id.map(str::to_string),
            description: description.map(str::to_string),
        }
    }
}

/// Annotation rows indexed by feature identifier, keeping file order per key
#[derive(Debug, Clone, Default)]
pub struct AnnotationTable {
    records: Vec<AnnotationRecord>,
    index: HashMap<String, Vec<usize>>,
}

impl AnnotationTable {
    pub fn new(records: Vec<AnnotationRecord>) -> Self {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            index.entry(record.feature_id.clone()).or_default().push(i);
        }
        Self { records, index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All rows for a feature, in file order
    pub fn lookup(&self, feature_id: &str) -> Vec<&AnnotationRecord> {
        self.index
            .get(feature_id)
            .map(|rows| rows.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// Feature identifiers that appear on more than one row, sorted
    pub fn duplicated_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .index
            .iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(k, _)| k.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }
}
