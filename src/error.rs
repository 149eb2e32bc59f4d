//! Error types for rust_limma

use thiserror::Error;

/// Main error type for the differential expression pipeline
#[derive(Error, Debug)]
pub enum LimmaError {
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Invalid group label '{label}' at position {position} (recognized: {allowed})")]
    InvalidGroupLabel {
        label: String,
        position: usize,
        allowed: String,
    },

    #[error("Cardinality mismatch: expected {expected} group labels, got {got}")]
    CardinalityMismatch { expected: usize, got: usize },

    #[error("Rank deficient design: {reason}")]
    RankDeficientDesign { reason: String },

    #[error("No annotation entry for feature '{feature_id}'")]
    JoinKeyMismatch { feature_id: String },

    #[error("Duplicate annotation entries for feature '{feature_id}' ({count} rows)")]
    DuplicateAnnotationKey { feature_id: String, count: usize },

    #[error("Invalid contrast specification: {reason}")]
    InvalidContrast { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl LimmaError {
    /// Pipeline stage the error belongs to, used in user-facing diagnostics
    pub fn stage(&self) -> &'static str {
        match self {
            LimmaError::MalformedInput { .. }
            | LimmaError::DimensionMismatch { .. }
            | LimmaError::EmptyData { .. } => "input",
            LimmaError::InvalidGroupLabel { .. } | LimmaError::CardinalityMismatch { .. } => {
                "design"
            }
            LimmaError::RankDeficientDesign { .. } => "model fit",
            LimmaError::InvalidContrast { .. } => "contrast",
            LimmaError::JoinKeyMismatch { .. } | LimmaError::DuplicateAnnotationKey { .. } => {
                "annotation"
            }
            LimmaError::InvalidConfig { .. } | LimmaError::JsonError(_) => "configuration",
            LimmaError::IoError(_) | LimmaError::CsvError(_) => "io",
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, LimmaError>;
