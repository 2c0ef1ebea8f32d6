// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for video decoding
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        Session / Frame Locator              │
//! └────────────────────┬────────────────────────┘
//!                      │ FrameSource
//! ┌────────────────────┴────────────────────────┐
//! │              Video Backend                  │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │    File     │    │     Pattern      │    │
//! │  │ (GStreamer) │    │  (in-process)    │    │
//! │  └─────────────┘    └──────────────────┘    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`video`]: Video sources, stream probing and forward decoders

pub mod video;
