// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic test-pattern stream
//!
//! Behaves like a compressed stream with a fixed group-of-pictures length:
//! seeking lands on the keyframe at or before the target and decoding
//! proceeds frame by frame from there. Frame content is a pure function of
//! the frame index, so any two decoders agree bit for bit.

use super::{DecodedFrame, FrameSource, VideoInfo, VideoResult};
use crate::errors::VideoError;
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parameters of a synthetic stream
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSpec {
    pub width: u32,
    pub height: u32,
    /// Frame rate numerator
    pub fps_num: u32,
    /// Frame rate denominator
    pub fps_den: u32,
    pub duration: Duration,
    /// Frames per group of pictures (distance between keyframes)
    pub keyframe_interval: u32,
    /// Frames from this index on fail to decode, like a truncated file
    pub truncated_at: Option<u64>,
}

impl Default for PatternSpec {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            fps_num: 25,
            fps_den: 1,
            duration: Duration::from_secs(10),
            keyframe_interval: 12,
            truncated_at: None,
        }
    }
}

impl PatternSpec {
    /// Stream of `duration` at `fps` frames per second, other fields default
    pub fn new(duration: Duration, fps: u32) -> Self {
        Self {
            duration,
            fps_num: fps,
            ..Self::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = frames;
        self
    }

    pub fn truncated_at(mut self, frame: u64) -> Self {
        self.truncated_at = Some(frame);
        self
    }

    fn validate(&self) -> VideoResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VideoError::UnsupportedSource(format!(
                "pattern has empty frame size {}x{}",
                self.width, self.height
            )));
        }
        if self.fps_num == 0 || self.fps_den == 0 {
            return Err(VideoError::UnsupportedSource(format!(
                "pattern has invalid frame rate {}/{}",
                self.fps_num, self.fps_den
            )));
        }
        if self.duration.is_zero() {
            return Err(VideoError::UnsupportedSource(
                "pattern has zero duration".into(),
            ));
        }
        if self.keyframe_interval == 0 {
            return Err(VideoError::UnsupportedSource(
                "pattern keyframe interval must be at least one frame".into(),
            ));
        }
        Ok(())
    }

    pub(super) fn probe(&self) -> VideoResult<VideoInfo> {
        self.validate()?;
        Ok(VideoInfo {
            duration: self.duration,
            frame_interval: Duration::from_nanos(
                (self.fps_den as u128 * NANOS_PER_SEC / self.fps_num as u128) as u64,
            ),
            width: self.width,
            height: self.height,
            container: Some("synthetic".into()),
            codec: Some("raw".into()),
        })
    }

    pub(super) fn decoder(&self) -> VideoResult<PatternDecoder> {
        self.validate()?;
        Ok(PatternDecoder {
            spec: self.clone(),
            frame_count: self.frame_count(),
            position: 0,
        })
    }

    /// Number of frames whose presentation time falls before `duration`
    pub fn frame_count(&self) -> u64 {
        let num = self.duration.as_nanos() * self.fps_num as u128;
        let den = self.fps_den as u128 * NANOS_PER_SEC;
        num.div_ceil(den) as u64
    }

    /// Presentation timestamp of frame `index`
    pub fn pts_of(&self, index: u64) -> Duration {
        let nanos = index as u128 * self.fps_den as u128 * NANOS_PER_SEC / self.fps_num as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Index of the frame on screen at `t`
    fn index_at(&self, t: Duration) -> u64 {
        let index = t.as_nanos() * self.fps_num as u128 / (self.fps_den as u128 * NANOS_PER_SEC);
        (index as u64).min(self.frame_count().saturating_sub(1))
    }

    /// RGBA pixels of frame `index`
    pub fn render_frame(&self, index: u64) -> Vec<u8> {
        let (w, h) = (self.width as u64, self.height as u64);
        let mut data = Vec::with_capacity((w * h * 4) as usize);
        // A bar sweeps across the frame so neighbouring frames differ
        let bar = (index * 3) % w.max(1);

        for y in 0..h {
            for x in 0..w {
                let r = (x * 255 / w.saturating_sub(1).max(1)) as u8;
                let g = (y * 255 / h.saturating_sub(1).max(1)) as u8;
                let b = ((index * 7 + (x ^ y)) % 256) as u8;
                if x == bar {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                } else {
                    // Keep a warm cast so colour correction has work to do
                    data.extend_from_slice(&[r.saturating_add(40), g, b / 2, 255]);
                }
            }
        }
        data
    }
}

/// Decoder over a [`PatternSpec`]
#[derive(Debug)]
pub struct PatternDecoder {
    spec: PatternSpec,
    frame_count: u64,
    position: u64,
}

impl FrameSource for PatternDecoder {
    fn seek_keyframe(&mut self, target: Duration) -> VideoResult<()> {
        let index = self.spec.index_at(target);
        let interval = self.spec.keyframe_interval as u64;
        self.position = index - index % interval;
        Ok(())
    }

    fn next_frame(&mut self) -> VideoResult<Option<DecodedFrame>> {
        if self.position >= self.frame_count {
            return Ok(None);
        }
        if let Some(limit) = self.spec.truncated_at
            && self.position >= limit
        {
            return Err(VideoError::Decode(format!(
                "stream truncated at frame {}",
                limit
            )));
        }

        let index = self.position;
        self.position += 1;
        Ok(Some(DecodedFrame {
            pts: self.spec.pts_of(index),
            width: self.spec.width,
            height: self.spec.height,
            data: self.spec.render_frame(index),
        }))
    }
}
