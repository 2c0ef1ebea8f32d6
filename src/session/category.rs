// SPDX-License-Identifier: GPL-3.0-only

//! Categories for grouping captured frames

use crate::constants::categories::DEFAULT_COLOR;
use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable category identity, survives renames and session resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(Uuid);

impl CategoryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CategoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CategoryId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SessionError::InvalidInput(format!("not a category id: {}", s)))
    }
}

/// Named, colored bucket for frame records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Fresh when missing, so hand-written lists can omit it
    #[serde(default)]
    pub id: CategoryId,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Category {
    /// Validated category with a fresh id
    pub fn new(name: &str, color: Option<&str>) -> Result<Self, SessionError> {
        Ok(Self {
            id: CategoryId::new(),
            name: normalize_name(name)?,
            color: normalize_color(color)?,
        })
    }
}

/// Trim a category name, rejecting blank names
pub fn normalize_name(name: &str) -> Result<String, SessionError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SessionError::InvalidInput(
            "category name must not be empty".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Lowercase `#rrggbb`, default color when absent
pub fn normalize_color(color: Option<&str>) -> Result<String, SessionError> {
    let Some(color) = color.map(str::trim) else {
        return Ok(default_color());
    };
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(SessionError::InvalidInput(format!(
            "color must be #rrggbb, got {:?}",
            color
        )));
    }
    Ok(color.to_ascii_lowercase())
}

/// How an imported category list combines with the current one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// The imported list becomes the whole category set
    #[default]
    Replace,
    /// Imported names not already present are added
    Merge,
}

/// Outcome of a category import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryImportReport {
    /// Categories added to the set
    pub imported: usize,
    /// Names skipped because they were duplicates
    pub skipped: Vec<String>,
    /// Categories dropped by a replace
    pub removed: usize,
    /// Records whose category was dropped and are now uncategorized
    pub records_uncategorized: usize,
}
