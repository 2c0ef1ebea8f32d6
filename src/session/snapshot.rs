// SPDX-License-Identifier: GPL-3.0-only

//! Gallery snapshots
//!
//! A snapshot stores what a user did to a video, not the pixels: for each
//! record the timestamp, category name, annotation and pipeline. Importing
//! re-extracts every frame from the loaded video.

use crate::pipelines::FilterPipeline;
use serde::{Deserialize, Serialize};

/// Current snapshot layout version
pub const SNAPSHOT_VERSION: u32 = 1;

fn snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Serializable gallery state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySnapshot {
    #[serde(default = "snapshot_version")]
    pub version: u32,
    /// Source the snapshot was taken from, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    pub entries: Vec<SnapshotEntry>,
}

/// One record in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Seconds from stream start
    pub timestamp: f64,
    /// Category name, `None` for uncategorized
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub pipeline: FilterPipeline,
}

/// Outcome of a snapshot import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotImportReport {
    /// Records created
    pub imported: usize,
    /// Category names with no match, those records are uncategorized
    pub unknown_categories: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_entry_parses() {
        let snapshot: GallerySnapshot =
            serde_json::from_str(r#"{"entries": [{"timestamp": 1.5}]}"#).unwrap();
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.entries[0].category, None);
        assert!(snapshot.entries[0].pipeline.is_empty());
    }

    #[test]
    fn test_invalid_pipeline_is_rejected() {
        let json = r#"{"entries": [{"timestamp": 0.0,
            "pipeline": [{"kind": "brightness_contrast", "contrast": -1}]}]}"#;
        assert!(serde_json::from_str::<GallerySnapshot>(json).is_err());
    }
}
