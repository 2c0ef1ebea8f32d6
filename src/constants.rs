// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Resolution width thresholds used for display labels
pub mod resolution_thresholds {
    /// 4K resolution threshold (3840px width)
    pub const THRESHOLD_4K: u32 = 3840;

    /// Full HD resolution threshold (1920px width)
    pub const THRESHOLD_HD: u32 = 1920;

    /// 720p resolution threshold (1280px width)
    pub const THRESHOLD_720P: u32 = 1280;
}

/// Short label for a frame width ("4K", "HD", "720p", "SD")
pub fn get_resolution_label(width: u32) -> Option<&'static str> {
    use resolution_thresholds::*;

    match width {
        w if w >= THRESHOLD_4K => Some("4K"),
        w if w >= THRESHOLD_HD => Some("HD"),
        w if w >= THRESHOLD_720P => Some("720p"),
        w if w >= 640 => Some("SD"),
        _ => None,
    }
}

/// GStreamer decode pipeline settings
pub mod pipeline {
    /// Buffers queued in the appsink; upstream blocks instead of dropping
    pub const MAX_BUFFERS: u32 = 2;

    /// Raw format requested from videoconvert
    pub const OUTPUT_FORMAT: &str = "RGBA";

    /// Frame rate assumed when caps advertise a variable rate (0/1)
    pub const FALLBACK_FPS: u32 = 30;

    /// Snapshot entries decoded at the same time
    pub const MAX_PARALLEL_DECODES: usize = 4;
}

/// Decode timing limits
pub mod timing {
    use super::Duration;

    /// Bus polling granularity while waiting for state changes
    pub const BUS_POLL_INTERVAL_MS: u64 = 100;

    /// Time allowed for a pipeline to preroll or finish a flushing seek
    pub const PREROLL_TIMEOUT_SECS: u64 = 5;

    /// Time allowed for a single decoded sample to arrive
    pub const SAMPLE_TIMEOUT_SECS: u64 = 3;

    /// Default upper bound for one whole locate operation
    pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(20);

    /// Default upper bound for probing a newly loaded source
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Supported input files
pub mod file_formats {
    /// Video file extensions accepted by the file backend
    pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov", "m4v", "ts"];

    /// Check if a file extension is a supported video format
    pub fn is_video_extension(ext: &str) -> bool {
        VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Filter parameter ranges and defaults
pub mod filters {
    pub const BRIGHTNESS_MIN: f64 = -255.0;
    pub const BRIGHTNESS_MAX: f64 = 255.0;
    pub const BRIGHTNESS_DEFAULT: f64 = 0.0;

    pub const CONTRAST_MIN: f64 = 0.0;
    pub const CONTRAST_MAX: f64 = 3.0;
    pub const CONTRAST_DEFAULT: f64 = 1.0;

    pub const CLIP_LIMIT_MIN: f64 = 1.0;
    pub const CLIP_LIMIT_MAX: f64 = 40.0;
    pub const CLIP_LIMIT_DEFAULT: f64 = 2.0;

    pub const GRID_SIZE_MIN: u32 = 1;
    pub const GRID_SIZE_MAX: u32 = 64;
    pub const GRID_SIZE_DEFAULT: u32 = 8;

    /// Midpoint contrast scales around
    pub const CONTRAST_PIVOT: f64 = 127.5;
}

/// Category defaults
pub mod categories {
    /// Color given to categories created without one
    pub const DEFAULT_COLOR: &str = "#4f46e5";

    /// Export folder for records without a category
    pub const UNCATEGORIZED_FOLDER: &str = "uncategorized";

    /// File the category store writes inside the data directory
    pub const STORE_FILE_NAME: &str = "categories.json";
}

/// Application information utilities
pub mod app_info {
    /// Binary / directory name
    pub const APP_NAME: &str = "frame-annotator";

    /// Environment variable overriding the data directory
    pub const DATA_DIR_ENV: &str = "FRAME_ANNOTATOR_DATA_DIR";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_labels() {
        assert_eq!(get_resolution_label(3840), Some("4K"));
        assert_eq!(get_resolution_label(1920), Some("HD"));
        assert_eq!(get_resolution_label(1280), Some("720p"));
        assert_eq!(get_resolution_label(640), Some("SD"));
        assert_eq!(get_resolution_label(320), None);
    }

    #[test]
    fn test_video_extension_check_ignores_case() {
        assert!(file_formats::is_video_extension("MP4"));
        assert!(file_formats::is_video_extension("mkv"));
        assert!(!file_formats::is_video_extension("png"));
    }
}
