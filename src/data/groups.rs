//! Sample group levels and group-membership strings

use serde::{Deserialize, Serialize};

use crate::error::{LimmaError, Result};

/// One recognized group: the character used in group strings and its name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupLevel {
    pub code: char,
    pub name: String,
}

impl GroupLevel {
    pub fn new(code: char, name: &str) -> Self {
        Self {
            code,
            name: name.to_string(),
        }
    }
}

/// The two recognized groups in canonical order: reference first, comparison second.
///
/// Column order of the design matrix follows this order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GroupLevel>", into = "Vec<GroupLevel>")]
pub struct GroupLevels {
    levels: Vec<GroupLevel>,
}

impl GroupLevels {
    pub fn new(reference: GroupLevel, comparison: GroupLevel) -> Result<Self> {
        if reference.code == comparison.code {
            return Err(LimmaError::InvalidConfig {
                reason: format!("Groups share the code '{}'", reference.code),
            });
        }
        if reference.name == comparison.name {
            return Err(LimmaError::InvalidConfig {
                reason: format!("Groups share the name '{}'", reference.name),
            });
        }
        Ok(Self {
            levels: vec![reference, comparison],
        })
    }

    /// All levels in canonical order
    pub fn levels(&self) -> &[GroupLevel] {
        &self.levels
    }

    pub fn names(&self) -> Vec<&str> {
        self.levels.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn reference(&self) -> &GroupLevel {
        &self.levels[0]
    }

    pub fn comparison(&self) -> &GroupLevel {
        &self.levels[1]
    }

    /// Column index of a group name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.levels.iter().position(|l| l.name == name)
    }

    pub fn name_for_code(&self, code: char) -> Option<&str> {
        self.levels
            .iter()
            .find(|l| l.code == code)
            .map(|l| l.name.as_str())
    }

    /// Decode a group string such as "100111000" into per-sample group names
    pub fn decode(&self, group_string: &str) -> Result<Vec<String>> {
        group_string
            .trim()
            .chars()
            .enumerate()
            .map(|(position, c)| {
                self.name_for_code(c)
                    .map(|name| name.to_string())
                    .ok_or_else(|| LimmaError::InvalidGroupLabel {
                        label: c.to_string(),
                        position,
                        allowed: self.describe(),
                    })
            })
            .collect()
    }

    /// Human-readable "0=control, 1=case"
    pub fn describe(&self) -> String {
        self.levels
            .iter()
            .map(|l| format!("{}={}", l.code, l.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for GroupLevels {
    fn default() -> Self {
        Self {
            levels: vec![GroupLevel::new('0', "control"), GroupLevel::new('1', "case")],
        }
    }
}

impl TryFrom<Vec<GroupLevel>> for GroupLevels {
    type Error = LimmaError;

    fn try_from(mut levels: Vec<GroupLevel>) -> Result<Self> {
        if levels.len() != 2 {
            return Err(LimmaError::InvalidConfig {
                reason: format!("Exactly two groups are required, got {}", levels.len()),
            });
        }
        let comparison = levels.remove(1);
        let reference = levels.remove(0);
        Self::new(reference, comparison)
    }
}

impl From<GroupLevels> for Vec<GroupLevel> {
    fn from(groups: GroupLevels) -> Self {
        groups.levels
    }
}

/// A sample with its (immutable) group assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub group: String,
}
