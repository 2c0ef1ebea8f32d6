// SPDX-License-Identifier: GPL-3.0-only

//! Frame location and pixel conversion
//!
//! # Frame Location
//!
//! Compressed streams can only be entered at keyframes. The [`locator`]
//! seeks to the keyframe preceding a target time and decodes forward until
//! the [`SeekPolicy`] picks a frame, so captures are exact rather than
//! snapped to the nearest keyframe.
//!
//! # Modules
//!
//! - [`conversions`]: RGBA to RGB and BT.601 YCbCr helpers
//! - [`locator`]: Exact frame lookup by timestamp

pub mod conversions;
pub mod locator;

// Re-export commonly used types
pub use locator::{LocatedFrame, SeekPolicy, locate};
