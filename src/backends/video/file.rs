// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer file decoder
//!
//! Each decoder owns a private pipeline:
//!
//! ```text
//! filesrc ! decodebin ! videoconvert ! video/x-raw,format=RGBA ! appsink
//! ```
//!
//! The appsink runs unsynchronised with a short blocking queue, so frames are
//! produced as fast as they decode and none are dropped between a keyframe
//! and the target.

use super::{DecodedFrame, FrameSource, VideoInfo, VideoResult};
use crate::constants::{file_formats, pipeline as pipeline_consts, timing};
use crate::errors::VideoError;
use gstreamer::prelude::*;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Check the path before handing it to GStreamer
///
/// Missing files and directories are unsupported; interrupted or busy
/// handles are worth a second attempt.
fn check_file(path: &Path) -> VideoResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(VideoError::UnsupportedSource(format!(
            "{} is not a regular file",
            path.display()
        ))),
        Err(e) => match e.kind() {
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => Err(
                VideoError::Transient(format!("{}: {}", path.display(), e)),
            ),
            _ => Err(VideoError::UnsupportedSource(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        },
    }
}

/// Build the decode pipeline for `path`
fn create_decode_pipeline(
    path: &Path,
) -> VideoResult<(gstreamer::Pipeline, gstreamer_app::AppSink)> {
    gstreamer::init()
        .map_err(|e| VideoError::UnsupportedSource(format!("GStreamer init failed: {}", e)))?;

    let path_str = path.to_string_lossy();
    let pipeline_str = format!(
        "filesrc location=\"{}\" ! decodebin ! \
         videoconvert ! video/x-raw,format={} ! \
         appsink name=sink max-buffers={} drop=false sync=false",
        path_str.replace('"', "\\\""),
        pipeline_consts::OUTPUT_FORMAT,
        pipeline_consts::MAX_BUFFERS
    );

    let pipeline = gstreamer::parse::launch(&pipeline_str)
        .map_err(|e| VideoError::UnsupportedSource(format!("Failed to create pipeline: {}", e)))?
        .downcast::<gstreamer::Pipeline>()
        .map_err(|_| VideoError::UnsupportedSource("Failed to downcast to Pipeline".into()))?;

    let appsink = pipeline
        .by_name("sink")
        .ok_or_else(|| VideoError::UnsupportedSource("Failed to find appsink".into()))?
        .downcast::<gstreamer_app::AppSink>()
        .map_err(|_| VideoError::UnsupportedSource("Failed to downcast to AppSink".into()))?;

    Ok((pipeline, appsink))
}

/// Stream tags seen on the bus while waiting
#[derive(Debug, Default)]
struct StreamTags {
    container: Option<String>,
    codec: Option<String>,
}

impl StreamTags {
    fn absorb(&mut self, tags: &gstreamer::TagListRef) {
        if self.container.is_none() {
            self.container = tags
                .get::<gstreamer::tags::ContainerFormat>()
                .map(|v| v.get().to_string());
        }
        if self.codec.is_none() {
            self.codec = tags
                .get::<gstreamer::tags::VideoCodec>()
                .map(|v| v.get().to_string());
        }
    }
}

/// Wait for the pipeline to finish a preroll or flushing seek
///
/// Returns the error message posted on the bus, if any, so the caller can
/// decide which error kind it maps to.
fn wait_for_async_done(
    pipeline: &gstreamer::Pipeline,
    timeout: Duration,
    tags: &mut StreamTags,
) -> Result<(), String> {
    let bus = pipeline.bus().ok_or_else(|| "No bus on pipeline".to_string())?;
    let deadline = Instant::now() + timeout;

    while Instant::now() < deadline {
        if let Some(msg) = bus.timed_pop(gstreamer::ClockTime::from_mseconds(
            timing::BUS_POLL_INTERVAL_MS,
        )) {
            use gstreamer::MessageView;
            match msg.view() {
                MessageView::Error(err) => {
                    return Err(format!("Pipeline error: {}", err.error()));
                }
                MessageView::Tag(tag) => tags.absorb(&tag.tags()),
                MessageView::AsyncDone(_) => return Ok(()),
                _ => {}
            }
        }
    }
    Err(format!(
        "pipeline did not settle within {}s",
        timeout.as_secs()
    ))
}

/// First error message waiting on the bus, if any
fn pending_bus_error(pipeline: &gstreamer::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop() {
        if let gstreamer::MessageView::Error(err) = msg.view() {
            return Some(err.error().to_string());
        }
    }
    None
}

/// Read stream properties without decoding more than the preroll frame
pub fn probe_file(path: &Path) -> VideoResult<VideoInfo> {
    info!(path = %path.display(), "Probing video file");
    check_file(path)?;
    let known = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(file_formats::is_video_extension);
    if !known {
        // Still worth a try; decodebin sniffs content, not names
        debug!(path = %path.display(), "Unfamiliar video file extension");
    }

    let (pipeline, appsink) = create_decode_pipeline(path)?;
    let result = probe_pipeline(&pipeline, &appsink);
    let _ = pipeline.set_state(gstreamer::State::Null);

    let info = result?;
    info!(
        width = info.width,
        height = info.height,
        fps = format!("{:.3}", info.fps()),
        duration_secs = info.duration.as_secs_f64(),
        codec = info.codec.as_deref().unwrap_or("unknown"),
        "Video file probed"
    );
    Ok(info)
}

fn probe_pipeline(
    pipeline: &gstreamer::Pipeline,
    appsink: &gstreamer_app::AppSink,
) -> VideoResult<VideoInfo> {
    pipeline
        .set_state(gstreamer::State::Paused)
        .map_err(|e| VideoError::UnsupportedSource(format!("Failed to pause pipeline: {:?}", e)))?;

    let mut tags = StreamTags::default();
    wait_for_async_done(
        pipeline,
        Duration::from_secs(timing::PREROLL_TIMEOUT_SECS),
        &mut tags,
    )
    .map_err(VideoError::UnsupportedSource)?;

    // Tags can trail the preroll; collect whatever is already queued
    if let Some(bus) = pipeline.bus() {
        while let Some(msg) = bus.pop_filtered(&[gstreamer::MessageType::Tag]) {
            if let gstreamer::MessageView::Tag(tag) = msg.view() {
                tags.absorb(&tag.tags());
            }
        }
    }

    let caps = appsink
        .static_pad("sink")
        .and_then(|pad| pad.current_caps())
        .ok_or_else(|| VideoError::UnsupportedSource("No video stream negotiated".into()))?;
    let video_info = gstreamer_video::VideoInfo::from_caps(&caps)
        .map_err(|e| VideoError::UnsupportedSource(format!("Unreadable video caps: {}", e)))?;

    let fps = video_info.fps();
    let frame_interval = if fps.numer() > 0 && fps.denom() > 0 {
        Duration::from_nanos(
            (fps.denom() as u128 * 1_000_000_000 / fps.numer() as u128) as u64,
        )
    } else {
        warn!(
            fallback_fps = pipeline_consts::FALLBACK_FPS,
            "Variable frame rate stream, assuming fixed rate for frame numbers"
        );
        Duration::from_nanos(1_000_000_000 / pipeline_consts::FALLBACK_FPS as u64)
    };

    let duration = pipeline
        .query_duration::<gstreamer::ClockTime>()
        .map(|d| Duration::from_nanos(d.nseconds()))
        .filter(|d| !d.is_zero())
        .ok_or_else(|| VideoError::UnsupportedSource("Stream has an unknown duration".into()))?;

    Ok(VideoInfo {
        duration,
        frame_interval,
        width: video_info.width(),
        height: video_info.height(),
        container: tags.container,
        codec: tags.codec,
    })
}

/// Copy a possibly padded RGBA buffer into tightly packed rows
fn extract_frame_from_sample(sample: &gstreamer::Sample) -> VideoResult<DecodedFrame> {
    let buffer = sample
        .buffer()
        .ok_or_else(|| VideoError::Decode("No buffer in sample".into()))?;
    let pts = buffer
        .pts()
        .ok_or_else(|| VideoError::Decode("Decoded frame has no timestamp".into()))?;
    let caps = sample
        .caps()
        .ok_or_else(|| VideoError::Decode("No caps on sample".into()))?;
    let video_info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| VideoError::Decode(format!("Failed to get video info: {}", e)))?;
    let map = buffer
        .map_readable()
        .map_err(|_| VideoError::Decode("Failed to map buffer".into()))?;

    let width = video_info.width();
    let height = video_info.height();
    let stride = video_info.stride()[0] as usize;
    let offset = video_info.offset()[0];
    let row_bytes = width as usize * 4;
    let src = map.as_slice();

    let needed = offset + stride * (height as usize).saturating_sub(1) + row_bytes;
    if src.len() < needed {
        return Err(VideoError::Decode(format!(
            "Short frame buffer: {} bytes, expected {}",
            src.len(),
            needed
        )));
    }

    let data = if stride == row_bytes && offset == 0 {
        src[..row_bytes * height as usize].to_vec()
    } else {
        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = offset + row * stride;
            packed.extend_from_slice(&src[start..start + row_bytes]);
        }
        packed
    };

    Ok(DecodedFrame {
        pts: Duration::from_nanos(pts.nseconds()),
        width,
        height,
        data,
    })
}

/// Forward decoder over one video file
pub struct FileDecoder {
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    playing: bool,
}

impl FileDecoder {
    /// Build and preroll a pipeline for `path`
    pub fn open(path: &Path) -> VideoResult<Self> {
        debug!(path = %path.display(), "Opening file decoder");
        check_file(path)?;

        let (pipeline, appsink) = create_decode_pipeline(path)?;
        let decoder = Self {
            pipeline,
            appsink,
            playing: false,
        };

        decoder
            .pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|e| VideoError::Decode(format!("Failed to pause pipeline: {:?}", e)))?;
        wait_for_async_done(
            &decoder.pipeline,
            Duration::from_secs(timing::PREROLL_TIMEOUT_SECS),
            &mut StreamTags::default(),
        )
        .map_err(VideoError::Decode)?;

        Ok(decoder)
    }

    fn ensure_playing(&mut self) -> VideoResult<()> {
        if !self.playing {
            self.pipeline
                .set_state(gstreamer::State::Playing)
                .map_err(|e| VideoError::Decode(format!("Failed to start pipeline: {:?}", e)))?;
            self.playing = true;
        }
        Ok(())
    }
}

impl FrameSource for FileDecoder {
    fn seek_keyframe(&mut self, target: Duration) -> VideoResult<()> {
        if self.playing {
            self.pipeline
                .set_state(gstreamer::State::Paused)
                .map_err(|e| VideoError::Decode(format!("Failed to pause pipeline: {:?}", e)))?;
            self.playing = false;
            if let Some(err) = pending_bus_error(&self.pipeline) {
                return Err(VideoError::Decode(err));
            }
        }

        let position = gstreamer::ClockTime::from_nseconds(target.as_nanos() as u64);
        self.pipeline
            .seek_simple(
                gstreamer::SeekFlags::FLUSH
                    | gstreamer::SeekFlags::KEY_UNIT
                    | gstreamer::SeekFlags::SNAP_BEFORE,
                position,
            )
            .map_err(|e| VideoError::Decode(format!("Seek to {} failed: {}", position, e)))?;

        wait_for_async_done(
            &self.pipeline,
            Duration::from_secs(timing::PREROLL_TIMEOUT_SECS),
            &mut StreamTags::default(),
        )
        .map_err(VideoError::Decode)?;

        debug!(target_ns = target.as_nanos() as u64, "Seeked to keyframe");
        Ok(())
    }

    fn next_frame(&mut self) -> VideoResult<Option<DecodedFrame>> {
        self.ensure_playing()?;

        match self
            .appsink
            .try_pull_sample(gstreamer::ClockTime::from_seconds(timing::SAMPLE_TIMEOUT_SECS))
        {
            Some(sample) => extract_frame_from_sample(&sample).map(Some),
            None if self.appsink.is_eos() => Ok(None),
            None => match pending_bus_error(&self.pipeline) {
                Some(err) => Err(VideoError::Decode(err)),
                None => Err(VideoError::Decode(format!(
                    "No frame within {}s",
                    timing::SAMPLE_TIMEOUT_SECS
                ))),
            },
        }
    }
}

impl Drop for FileDecoder {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_unsupported() {
        let err = probe_file(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, VideoError::UnsupportedSource(_)));
    }

    #[test]
    fn test_directory_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_file(dir.path()).unwrap_err();
        assert!(matches!(err, VideoError::UnsupportedSource(_)));
    }
}
