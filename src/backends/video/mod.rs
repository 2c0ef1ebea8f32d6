// SPDX-License-Identifier: GPL-3.0-only

//! Video source abstraction
//!
//! A [`VideoSource`] names something decodable. Probing it yields a
//! [`VideoInfo`]; opening it yields a [`FrameSource`], a forward-only decoder
//! that can be repositioned to the nearest keyframe before a target time.
//! The frame locator builds exact seeking on top of that two-call contract,
//! so every backend only has to be honest about where keyframes are.
//!
//! ```text
//! VideoSource::File    → GStreamer (filesrc ! decodebin ! videoconvert ! appsink)
//! VideoSource::Pattern → in-process synthetic decoder
//! ```

pub mod file;
pub mod pattern;

pub use pattern::PatternSpec;

use crate::errors::VideoError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub type VideoResult<T> = Result<T, VideoError>;

/// Something the session can load and capture frames from
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    /// Compressed video file decoded through GStreamer
    File(PathBuf),
    /// Synthetic stream generated in-process
    Pattern(PatternSpec),
}

impl VideoSource {
    /// Inspect the source without keeping a decoder around
    pub fn probe(&self) -> VideoResult<VideoInfo> {
        debug!(source = %self, "Probing video source");
        match self {
            VideoSource::File(path) => file::probe_file(path),
            VideoSource::Pattern(spec) => spec.probe(),
        }
    }

    /// Open a fresh decoder positioned at the start of the stream
    pub fn open(&self) -> VideoResult<Box<dyn FrameSource>> {
        match self {
            VideoSource::File(path) => Ok(Box::new(file::FileDecoder::open(path)?)),
            VideoSource::Pattern(spec) => Ok(Box::new(spec.decoder()?)),
        }
    }

    /// File path handed to metadata tools, if the source is a file
    pub fn path(&self) -> Option<&Path> {
        match self {
            VideoSource::File(path) => Some(path),
            VideoSource::Pattern(_) => None,
        }
    }

    /// Name used for export file prefixes
    pub fn display_stem(&self) -> String {
        match self {
            VideoSource::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "video".to_string()),
            VideoSource::Pattern(_) => "pattern".to_string(),
        }
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::File(path) => write!(f, "{}", path.display()),
            VideoSource::Pattern(spec) => write!(
                f,
                "pattern:{}x{}@{}/{}",
                spec.width, spec.height, spec.fps_num, spec.fps_den
            ),
        }
    }
}

/// Stream properties discovered when a source is loaded
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VideoInfo {
    /// Total stream duration
    pub duration: Duration,
    /// Average distance between frames (1 / average frame rate)
    pub frame_interval: Duration,
    pub width: u32,
    pub height: u32,
    /// Container format tag, e.g. "ISO MP4/M4A"
    pub container: Option<String>,
    /// Video codec tag, e.g. "H.264 / AVC"
    pub codec: Option<String>,
}

impl VideoInfo {
    /// Average frames per second
    pub fn fps(&self) -> f64 {
        if self.frame_interval.is_zero() {
            0.0
        } else {
            1.0 / self.frame_interval.as_secs_f64()
        }
    }

    /// 0-based index of the frame presented at `pts`
    pub fn frame_number_at(&self, pts: Duration) -> u64 {
        if self.frame_interval.is_zero() {
            return 0;
        }
        // Half an interval of slack absorbs container timestamp jitter
        let interval = self.frame_interval.as_nanos();
        ((pts.as_nanos() + interval / 2) / interval) as u64
    }
}

/// One decoded picture in RGBA layout
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Presentation timestamp relative to stream start
    pub pts: Duration,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA rows (stride = width * 4)
    pub data: Vec<u8>,
}

/// Forward-only decoder over one opened stream
pub trait FrameSource: Send {
    /// Reposition to the closest keyframe at or before `target`
    ///
    /// After this call [`FrameSource::next_frame`] yields frames starting from
    /// that keyframe, in presentation order.
    fn seek_keyframe(&mut self, target: Duration) -> VideoResult<()>;

    /// Decode the next frame, `None` at end of stream
    fn next_frame(&mut self) -> VideoResult<Option<DecodedFrame>>;
}

/// Reject streams a timestamp cannot be resolved against
///
/// Without a known duration every target would clamp to zero.
fn check_playable(source: &VideoSource, info: &VideoInfo) -> VideoResult<()> {
    if info.frame_interval.is_zero() {
        return Err(VideoError::UnsupportedSource(format!(
            "{} has no decodable video frames",
            source
        )));
    }
    if info.duration.is_zero() {
        return Err(VideoError::UnsupportedSource(format!(
            "{} has an unknown duration",
            source
        )));
    }
    Ok(())
}

/// Opened, decodable source owned by the capture session
///
/// Holds no decoder state; every locate opens its own decoder so that
/// results never depend on what was decoded before.
#[derive(Debug)]
pub struct VideoHandle {
    source: VideoSource,
    info: VideoInfo,
}

impl VideoHandle {
    /// Probe `source` and wrap it in a handle
    pub fn open(source: VideoSource) -> VideoResult<Self> {
        let info = source.probe()?;
        check_playable(&source, &info)?;
        Ok(Self { source, info })
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// New decoder for a single locate
    pub fn decoder(&self) -> VideoResult<Box<dyn FrameSource>> {
        self.source.open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(interval_ms: u64) -> VideoInfo {
        VideoInfo {
            duration: Duration::from_secs(10),
            frame_interval: Duration::from_millis(interval_ms),
            width: 64,
            height: 48,
            container: None,
            codec: None,
        }
    }

    #[test]
    fn test_frame_number_rounds_to_nearest_frame() {
        let info = info(40);
        assert_eq!(info.frame_number_at(Duration::ZERO), 0);
        assert_eq!(info.frame_number_at(Duration::from_millis(79)), 2);
        assert_eq!(info.frame_number_at(Duration::from_millis(2500)), 63);
        assert_eq!(info.frame_number_at(Duration::from_millis(2519)), 63);
        assert_eq!(info.frame_number_at(Duration::from_millis(2521)), 63);
        assert!((info.fps() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_duration_is_unsupported() {
        let source = VideoSource::File(PathBuf::from("/tmp/live.webm"));
        let mut unknown = info(40);
        unknown.duration = Duration::ZERO;
        assert!(matches!(
            check_playable(&source, &unknown),
            Err(VideoError::UnsupportedSource(msg)) if msg.contains("unknown duration")
        ));

        let mut no_frames = info(0);
        no_frames.duration = Duration::ZERO;
        assert!(matches!(
            check_playable(&source, &no_frames),
            Err(VideoError::UnsupportedSource(_))
        ));
        assert!(check_playable(&source, &info(40)).is_ok());
    }

    #[test]
    fn test_zero_interval_is_frame_zero() {
        assert_eq!(info(0).frame_number_at(Duration::from_secs(3)), 0);
        assert_eq!(info(0).fps(), 0.0);
    }

    #[test]
    fn test_display_stem() {
        let file = VideoSource::File(PathBuf::from("/tmp/site visit.mp4"));
        assert_eq!(file.display_stem(), "site visit");
        assert_eq!(file.path(), Some(Path::new("/tmp/site visit.mp4")));

        let pattern = VideoSource::Pattern(PatternSpec::default());
        assert_eq!(pattern.display_stem(), "pattern");
        assert!(pattern.path().is_none());
    }
}
