// SPDX-License-Identifier: GPL-3.0-only

//! Captured frame records

use super::category::CategoryId;
use crate::pipelines::FilterPipeline;
use chrono::{DateTime, Local};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Session-unique, increasing record identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One captured frame with its annotation and filter pipeline
///
/// The original pixels are shared read-only; every render starts from them.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    pub(super) id: RecordId,
    pub(super) timestamp: Duration,
    pub(super) requested_timestamp: Duration,
    pub(super) frame_number: u64,
    pub(super) original: Arc<RgbImage>,
    pub(super) category_id: Option<CategoryId>,
    pub(super) annotation: String,
    pub(super) pipeline: FilterPipeline,
    pub(super) captured_at: DateTime<Local>,
}

impl FrameRecord {
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Presentation time of the captured frame
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Timestamp the capture asked for, after clamping
    pub fn requested_timestamp(&self) -> Duration {
        self.requested_timestamp
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn original(&self) -> &Arc<RgbImage> {
        &self.original
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    /// Current pipeline applied to the original pixels
    pub fn render(&self) -> RgbImage {
        self.pipeline.render(&self.original)
    }
}

/// Annotation given to a new record
pub fn default_annotation(position: usize, timestamp: Duration) -> String {
    format!("Frame {}, time {:.3}s", position, timestamp.as_secs_f64())
}

/// `sss_mmm` form of a timestamp used in export file names
pub fn timestamp_slug(timestamp: Duration) -> String {
    format!("{:.3}", timestamp.as_secs_f64()).replace('.', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_annotation() {
        assert_eq!(
            default_annotation(2, Duration::from_millis(2520)),
            "Frame 2, time 2.520s"
        );
    }

    #[test]
    fn test_timestamp_slug() {
        assert_eq!(timestamp_slug(Duration::from_millis(2520)), "2_520");
        assert_eq!(timestamp_slug(Duration::ZERO), "0_000");
        assert_eq!(timestamp_slug(Duration::from_nanos(33_366_666)), "0_033");
    }
}
