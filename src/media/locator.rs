// SPDX-License-Identifier: GPL-3.0-only

//! Frame Locator
//!
//! Finds the decoded frame at or nearest to a timestamp in two phases:
//!
//! 1. Seek the decoder to the keyframe at or before the target.
//! 2. Decode forward, discarding frames, until the [`SeekPolicy`] decides.
//!
//! All comparisons happen on integer nanoseconds. The target is rounded to
//! the nearest nanosecond once, then clamped to the stream duration.

use crate::backends::video::{DecodedFrame, FrameSource, VideoHandle, VideoInfo, VideoResult};
use crate::errors::VideoError;
use crate::media::conversions;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Which decoded frame answers a timestamp request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekPolicy {
    /// First frame whose presentation time is at or after the target
    #[default]
    FirstAtOrAfter,
    /// Frame closest to the target; on a tie the earlier frame wins
    Nearest,
}

impl std::fmt::Display for SeekPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeekPolicy::FirstAtOrAfter => write!(f, "first-at-or-after"),
            SeekPolicy::Nearest => write!(f, "nearest"),
        }
    }
}

/// Result of a successful locate
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedFrame {
    /// Actual presentation time of the returned frame
    pub timestamp: Duration,
    /// Target after clamping, i.e. what was searched for
    pub requested: Duration,
    /// 0-based index estimated from the average frame interval
    pub frame_number: u64,
    pub image: RgbImage,
}

/// Validate a timestamp in seconds and clamp it into `[0, duration]`
pub fn resolve_target(t_secs: f64, duration: Duration) -> VideoResult<Duration> {
    if !t_secs.is_finite() {
        return Err(VideoError::Decode(format!("invalid timestamp {}", t_secs)));
    }
    let nanos = (t_secs * 1_000_000_000.0).round().max(0.0);
    let max = duration.as_nanos().min(u64::MAX as u128) as u64;
    // `as` saturates, so huge targets land on `max`
    Ok(Duration::from_nanos((nanos as u64).min(max)))
}

/// Locate the frame for `t_secs` in a fresh decoder of `handle`
///
/// Each call opens its own decoder, so repeated calls with the same input
/// return bit-identical pixels.
pub fn locate(handle: &VideoHandle, t_secs: f64, policy: SeekPolicy) -> VideoResult<LocatedFrame> {
    let info = handle.info();
    let target = resolve_target(t_secs, info.duration)?;

    let mut decoder = handle.decoder().map_err(|e| match e {
        // The handle opened once already, so this is a broken stream now
        VideoError::UnsupportedSource(msg) => VideoError::Decode(msg),
        other => other,
    })?;

    locate_in(decoder.as_mut(), info, target, policy)
}

/// Run both locate phases against an already opened decoder
pub fn locate_in(
    source: &mut dyn FrameSource,
    info: &VideoInfo,
    target: Duration,
    policy: SeekPolicy,
) -> VideoResult<LocatedFrame> {
    source.seek_keyframe(target)?;

    let mut previous: Option<DecodedFrame> = None;
    let mut discarded = 0u64;

    let chosen = loop {
        let Some(frame) = source.next_frame()? else {
            // Ran off the end: the last decoded frame answers (t = duration)
            match previous {
                Some(last) => break last,
                None => {
                    return Err(VideoError::Decode(format!(
                        "no frames decoded at or after {:.3}s",
                        target.as_secs_f64()
                    )));
                }
            }
        };

        if frame.pts >= target {
            break match (policy, previous) {
                (SeekPolicy::Nearest, Some(prev)) if target - prev.pts <= frame.pts - target => {
                    prev
                }
                _ => frame,
            };
        }

        if previous.is_some() {
            discarded += 1;
        }
        previous = Some(frame);
    };

    if chosen.pts < target && policy == SeekPolicy::FirstAtOrAfter {
        warn!(
            target_ns = target.as_nanos() as u64,
            pts_ns = chosen.pts.as_nanos() as u64,
            "Stream ended before target, using last frame"
        );
    }

    debug!(
        target_ns = target.as_nanos() as u64,
        pts_ns = chosen.pts.as_nanos() as u64,
        discarded,
        %policy,
        "Located frame"
    );

    let image = conversions::frame_to_rgb(&chosen)?;
    Ok(LocatedFrame {
        timestamp: chosen.pts,
        requested: target,
        frame_number: info.frame_number_at(chosen.pts),
        image,
    })
}
