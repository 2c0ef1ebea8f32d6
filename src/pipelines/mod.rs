// SPDX-License-Identifier: GPL-3.0-only

//! Non-destructive image processing for captured frames
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │   Original   │ ──▶ │  Filter Pipeline  │ ──▶ │   Rendered   │
//! │  RGB pixels  │     │  - Brightness     │     │    image     │
//! │ (immutable)  │     │  - CLAHE          │     │  PNG / JPEG  │
//! │              │     │  - White balance  │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! The original is never written to. Every render reruns the enabled stages
//! from scratch, so editing or reordering stages cannot accumulate error.
//!
//! # Modules
//!
//! - [`filters`]: Stage kinds, parameter validation and transforms
//! - [`render`]: Ordered stage list, edits and rendering
//! - [`encoding`]: PNG and JPEG output

pub mod encoding;
pub mod filters;
pub mod render;

pub use encoding::{EncodingFormat, EncodingQuality, ImageEncoder};
pub use filters::{FilterKind, FilterParams, FilterStageConfig};
pub use render::{FilterPipeline, PipelineEdit};
