// SPDX-License-Identifier: GPL-3.0-only

//! Frame Annotator - frame-accurate capture and annotation of video stills
//!
//! Load a video, pull exact frames out of it at chosen timestamps, group them
//! into categories, annotate them and tune each one with a non-destructive
//! filter pipeline before exporting the gallery.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Video sources (GStreamer files, synthetic patterns)
//! - [`media`]: Frame location and color conversion
//! - [`pipelines`]: Filter stages, filter pipelines and image encoding
//! - [`session`]: Capture session, frame records and categories
//! - [`export`]: Gallery export layout and report
//! - [`config`]: User configuration handling
//! - [`storage`]: Category store and snapshot files
//!
//! # Example
//!
//! ```ignore
//! use frame_annotator::{Config, SessionService, VideoSource};
//! use frame_annotator::storage::JsonCategoryStore;
//! use std::sync::Arc;
//!
//! let config = Config::load();
//! let store = Arc::new(JsonCategoryStore::in_dir(&config.data_dir()));
//! let service = SessionService::open(store, &config).await?;
//! service.load_video(VideoSource::File("weld.mp4".into())).await?;
//! let id = service.capture(2.5, None).await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod export;
pub mod media;
pub mod pipelines;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use backends::video::{PatternSpec, VideoInfo, VideoSource};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use media::SeekPolicy;
pub use pipelines::{FilterKind, FilterParams, FilterPipeline, FilterStageConfig, PipelineEdit};
pub use session::{CaptureSession, CategoryId, RecordId, SessionService};
