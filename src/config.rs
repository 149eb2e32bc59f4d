//! Analysis configuration
//!
//! Every stage takes its parameters from one [`AnalysisConfig`], loaded from
//! JSON and optionally overridden from the command line. Missing JSON keys
//! fall back to the defaults.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotate::JoinPolicy;
use crate::data::GroupLevels;
use crate::ebayes::EbayesParams;
use crate::error::{LimmaError, Result};
use crate::filter::DegThresholds;
use crate::lm::Contrast;
use crate::normalization::NormalizeParams;
use crate::testing::AdjustMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Group codes and names, reference group first
    pub groups: GroupLevels,
    pub contrast: Contrast,
    pub normalization: NormalizeParams,
    pub ebayes: EbayesParams,
    pub adjust_method: AdjustMethod,
    pub selection: DegThresholds,
    pub join_policy: JoinPolicy,
    /// Sample ids removed before normalization
    pub exclude_samples: Vec<String>,
    /// Worker threads, 0 = one per core
    pub threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            groups: GroupLevels::default(),
            contrast: Contrast::default(),
            normalization: NormalizeParams::default(),
            ebayes: EbayesParams::default(),
            adjust_method: AdjustMethod::default(),
            selection: DegThresholds::default(),
            join_policy: JoinPolicy::default(),
            exclude_samples: Vec::new(),
            threads: 0,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let config: AnalysisConfig = serde_json::from_reader(reader)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every parameter lies in its domain and the contrast names
    /// the configured groups
    pub fn validate(&self) -> Result<()> {
        self.ebayes.validate()?;
        self.selection.validate()?;

        let n = &self.normalization;
        if !n.offset.is_finite() || n.offset <= 0.0 {
            return Err(LimmaError::InvalidConfig {
                reason: format!("normalization offset must be positive, got {}", n.offset),
            });
        }
        if n.max_iter == 0 || !(n.epsilon > 0.0) {
            return Err(LimmaError::InvalidConfig {
                reason: "median polish needs max_iter >= 1 and epsilon > 0".to_string(),
            });
        }

        for level in [&self.contrast.numerator, &self.contrast.denominator] {
            if self.groups.index_of(level).is_none() {
                return Err(LimmaError::InvalidContrast {
                    reason: format!(
                        "'{}' is not one of the groups ({})",
                        level,
                        self.groups.describe()
                    ),
                });
            }
        }
        if self.contrast.numerator == self.contrast.denominator {
            return Err(LimmaError::InvalidContrast {
                reason: format!("numerator and denominator are both '{}'", self.contrast.numerator),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.groups.reference().name, "control");
        assert_eq!(config.contrast, Contrast::new("case", "control"));
        assert_eq!(config.ebayes.proportion, 0.01);
        assert_eq!(config.selection.adj_p_threshold, 0.05);
        assert_eq!(config.selection.fold_change_threshold, 2.0);
        assert_eq!(config.join_policy, JoinPolicy::FanOut);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "groups": [{{"code": "N", "name": "normal"}}, {{"code": "T", "name": "tumor"}}],
                "contrast": {{"numerator": "tumor", "denominator": "normal"}},
                "selection": {{"fold_change_threshold": 1.0}},
                "join_policy": "concatenate",
                "adjust_method": "bonferroni"
            }}"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = AnalysisConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.groups.comparison().name, "tumor");
        assert_eq!(config.selection.fold_change_threshold, 1.0);
        assert_eq!(config.selection.adj_p_threshold, 0.05);
        assert_eq!(config.join_policy, JoinPolicy::Concatenate);
        assert_eq!(config.adjust_method, AdjustMethod::Bonferroni);
        assert_eq!(config.normalization, NormalizeParams::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_round_trip_json() {
        let config = AnalysisConfig::default();
        let json = config.to_json().unwrap();
        let parsed: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AnalysisConfig::default();
        config.contrast = Contrast::new("treated", "control");
        assert!(matches!(config.validate().unwrap_err(), LimmaError::InvalidContrast { .. }));

        let mut config = AnalysisConfig::default();
        config.ebayes.proportion = 0.0;
        assert!(matches!(config.validate().unwrap_err(), LimmaError::InvalidConfig { .. }));

        let mut config = AnalysisConfig::default();
        config.normalization.offset = 0.0;
        assert!(config.validate().is_err());

        let groups: std::result::Result<AnalysisConfig, _> = serde_json::from_str(
            r#"{"groups": [{"code": "0", "name": "a"}, {"code": "0", "name": "b"}]}"#,
        );
        assert!(groups.is_err());
    }
}
