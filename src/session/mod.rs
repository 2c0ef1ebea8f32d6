// SPDX-License-Identifier: GPL-3.0-only

//! Capture session
//!
//! The session owns the loaded video, the captured frame records and the
//! category set. It has two states:
//!
//! ```text
//!            load_video                      load_video / clear
//!   Empty ───────────────▶ VideoLoaded ◀──────────────────────┐
//!     ▲                        │ │                            │
//!     └──────── clear ─────────┘ └────────────────────────────┘
//! ```
//!
//! Loading a video or clearing drops every record but never the categories.
//! Every mutating operation is all-or-nothing: it either fully applies or
//! returns an error and leaves the session as it was.
//!
//! [`CaptureSession`] is a plain single-owner value. [`service::SessionService`]
//! wraps it for concurrent async callers.

pub mod category;
pub mod record;
pub mod service;
pub mod snapshot;

pub use category::{Category, CategoryId, CategoryImportReport, ImportMode};
pub use record::{FrameRecord, RecordId};
pub use service::SessionService;
pub use snapshot::{GallerySnapshot, SnapshotEntry, SnapshotImportReport};

use crate::backends::video::{VideoHandle, VideoInfo, VideoResult, VideoSource};
use crate::errors::{AppResult, SessionError};
use crate::media::{LocatedFrame, SeekPolicy, locate};
use crate::pipelines::PipelineEdit;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Empty,
    VideoLoaded,
}

/// Which records [`CaptureSession::list_records`] yields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordFilter {
    #[default]
    All,
    Uncategorized,
    Category(CategoryId),
}

impl RecordFilter {
    pub fn matches(&self, record: &FrameRecord) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::Uncategorized => record.category_id.is_none(),
            RecordFilter::Category(id) => record.category_id == Some(*id),
        }
    }
}

/// Partial update of a record; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    /// `Some(None)` clears the category
    pub category_id: Option<Option<CategoryId>>,
    pub annotation: Option<String>,
    pub pipeline_edit: Option<PipelineEdit>,
}

/// Inputs for a capture decoded outside the session
///
/// Produced by [`CaptureSession::begin_capture`]; the session rejects the
/// result if the video changed in the meantime.
#[derive(Debug, Clone)]
pub struct CaptureTicket {
    handle: Arc<VideoHandle>,
    generation: u64,
    policy: SeekPolicy,
    category_id: Option<CategoryId>,
}

impl CaptureTicket {
    pub fn handle(&self) -> &Arc<VideoHandle> {
        &self.handle
    }

    pub fn policy(&self) -> SeekPolicy {
        self.policy
    }

    /// Run the locate this ticket was issued for
    pub fn locate(&self, t_secs: f64) -> VideoResult<LocatedFrame> {
        locate(&self.handle, t_secs, self.policy)
    }
}

#[derive(Debug, Clone)]
struct PlannedEntry {
    timestamp: f64,
    category_id: Option<CategoryId>,
    annotation: String,
    pipeline: crate::pipelines::FilterPipeline,
}

/// A snapshot import resolved against the current categories
#[derive(Debug, Clone)]
pub struct SnapshotPlan {
    ticket: CaptureTicket,
    entries: Vec<PlannedEntry>,
    unknown_categories: Vec<String>,
}

impl SnapshotPlan {
    /// Locate every entry; fails on the first frame that cannot be decoded
    pub fn locate_all(&self) -> VideoResult<Vec<LocatedFrame>> {
        self.entries
            .iter()
            .map(|entry| self.ticket.locate(entry.timestamp))
            .collect()
    }

    pub fn ticket(&self) -> &CaptureTicket {
        &self.ticket
    }

    /// Requested timestamps in snapshot order
    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|entry| entry.timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// In-memory capture session
///
/// Cloning is cheap: frame pixels are shared.
#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    video: Option<Arc<VideoHandle>>,
    records: BTreeMap<RecordId, FrameRecord>,
    categories: HashMap<CategoryId, Category>,
    next_id: u64,
    generation: u64,
    policy: SeekPolicy,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session starting with previously stored categories
    ///
    /// Entries with an invalid name or color, or a name already taken, are
    /// skipped with a warning.
    pub fn with_categories(categories: Vec<Category>) -> Self {
        let mut session = Self::new();
        let mut names = HashSet::new();
        for category in categories {
            let normalized = category::normalize_name(&category.name).and_then(|name| {
                Ok(Category {
                    id: category.id,
                    name,
                    color: category::normalize_color(Some(&category.color))?,
                })
            });
            match normalized {
                Ok(c) if names.insert(c.name.clone()) && !session.categories.contains_key(&c.id) => {
                    session.categories.insert(c.id, c);
                }
                Ok(c) => warn!(name = %c.name, "Skipping duplicate stored category"),
                Err(e) => warn!(error = %e, "Skipping invalid stored category"),
            }
        }
        session
    }

    pub fn state(&self) -> SessionState {
        if self.video.is_some() {
            SessionState::VideoLoaded
        } else {
            SessionState::Empty
        }
    }

    /// Counter bumped whenever the record set is reset
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn seek_policy(&self) -> SeekPolicy {
        self.policy
    }

    pub fn set_seek_policy(&mut self, policy: SeekPolicy) {
        self.policy = policy;
    }

    pub fn video(&self) -> Option<&Arc<VideoHandle>> {
        self.video.as_ref()
    }

    pub fn video_info(&self) -> Option<&VideoInfo> {
        self.video.as_deref().map(VideoHandle::info)
    }

    fn loaded_video(&self) -> Result<&Arc<VideoHandle>, SessionError> {
        self.video
            .as_ref()
            .ok_or_else(|| SessionError::InvalidState("no video loaded".into()))
    }

    fn reset_records(&mut self) {
        self.records.clear();
        self.generation += 1;
    }

    // ----- lifecycle -----

    /// Probe and load `source`, replacing any previous video
    ///
    /// On failure the current video and records are kept.
    pub fn load_video(&mut self, source: VideoSource) -> AppResult<VideoInfo> {
        let handle = VideoHandle::open(source)?;
        Ok(self.install_video(handle))
    }

    /// Make an already probed handle the active video
    pub fn install_video(&mut self, handle: VideoHandle) -> VideoInfo {
        let info = handle.info().clone();
        info!(
            source = %handle.source(),
            width = info.width,
            height = info.height,
            duration_secs = info.duration.as_secs_f64(),
            dropped_records = self.records.len(),
            "Video loaded"
        );
        self.video = Some(Arc::new(handle));
        self.reset_records();
        info
    }

    /// Release the video and drop all records; categories stay
    pub fn clear(&mut self) {
        info!(dropped_records = self.records.len(), "Session cleared");
        self.video = None;
        self.reset_records();
    }

    // ----- records -----

    fn ensure_category(&self, id: CategoryId) -> Result<(), SessionError> {
        if self.categories.contains_key(&id) {
            Ok(())
        } else {
            Err(SessionError::category_not_found(id))
        }
    }

    /// Check preconditions of a capture and snapshot what it needs
    pub fn begin_capture(&self, category_id: Option<CategoryId>) -> AppResult<CaptureTicket> {
        let handle = self.loaded_video()?.clone();
        if let Some(id) = category_id {
            self.ensure_category(id)?;
        }
        Ok(CaptureTicket {
            handle,
            generation: self.generation,
            policy: self.policy,
            category_id,
        })
    }

    fn insert_record(
        &mut self,
        located: LocatedFrame,
        category_id: Option<CategoryId>,
        annotation: Option<String>,
        pipeline: crate::pipelines::FilterPipeline,
    ) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        let annotation = annotation
            .unwrap_or_else(|| record::default_annotation(self.records.len() + 1, located.timestamp));

        self.records.insert(
            id,
            FrameRecord {
                id,
                timestamp: located.timestamp,
                requested_timestamp: located.requested,
                frame_number: located.frame_number,
                original: Arc::new(located.image),
                category_id,
                annotation,
                pipeline,
                captured_at: chrono::Local::now(),
            },
        );
        id
    }

    /// Store a frame located for `ticket`
    pub fn finish_capture(
        &mut self,
        ticket: CaptureTicket,
        located: LocatedFrame,
    ) -> AppResult<RecordId> {
        if ticket.generation != self.generation {
            return Err(SessionError::InvalidState(
                "video was replaced while the frame was being decoded".into(),
            )
            .into());
        }
        if let Some(id) = ticket.category_id {
            self.ensure_category(id)?;
        }

        let timestamp = located.timestamp;
        let frame_number = located.frame_number;
        let id = self.insert_record(
            located,
            ticket.category_id,
            None,
            crate::pipelines::FilterPipeline::new(),
        );
        info!(
            record = %id,
            timestamp_secs = timestamp.as_secs_f64(),
            frame_number,
            "Frame captured"
        );
        Ok(id)
    }

    /// Locate the frame at `t_secs` and add it as a new record
    pub fn capture(&mut self, t_secs: f64, category_id: Option<CategoryId>) -> AppResult<RecordId> {
        let ticket = self.begin_capture(category_id)?;
        let located = ticket.locate(t_secs)?;
        self.finish_capture(ticket, located)
    }

    pub fn record(&self, id: RecordId) -> AppResult<&FrameRecord> {
        self.records
            .get(&id)
            .ok_or_else(|| SessionError::record_not_found(id).into())
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Records in capture order
    ///
    /// The iterator is lazy and can be cloned to restart from the beginning.
    pub fn list_records(
        &self,
        filter: RecordFilter,
    ) -> impl Iterator<Item = &FrameRecord> + Clone + '_ {
        self.records.values().filter(move |r| filter.matches(r))
    }

    /// Apply a partial update, all fields or none
    pub fn update_record(&mut self, id: RecordId, update: RecordUpdate) -> AppResult<()> {
        let current = self.record(id)?;
        if let Some(Some(category_id)) = update.category_id {
            self.ensure_category(category_id)?;
        }
        let pipeline = match &update.pipeline_edit {
            Some(edit) => Some(current.pipeline.edited(edit)?),
            None => None,
        };

        let record = self
            .records
            .get_mut(&id)
            .ok_or_else(|| SessionError::record_not_found(id))?;
        if let Some(category_id) = update.category_id {
            record.category_id = category_id;
        }
        if let Some(annotation) = update.annotation {
            record.annotation = annotation;
        }
        if let Some(pipeline) = pipeline {
            record.pipeline = pipeline;
        }
        debug!(record = %id, "Record updated");
        Ok(())
    }

    pub fn delete_record(&mut self, id: RecordId) -> AppResult<FrameRecord> {
        let record = self
            .records
            .remove(&id)
            .ok_or_else(|| SessionError::record_not_found(id))?;
        debug!(record = %id, "Record deleted");
        Ok(record)
    }

    /// Render a record with its current pipeline
    pub fn render(&self, id: RecordId) -> AppResult<image::RgbImage> {
        Ok(self.record(id)?.render())
    }

    // ----- categories -----

    pub fn category(&self, id: CategoryId) -> AppResult<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| SessionError::category_not_found(id).into())
    }

    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        let name = name.trim();
        self.categories.values().find(|c| c.name == name)
    }

    /// Categories sorted by name
    pub fn list_categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self.categories.values().collect();
        categories.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        categories
    }

    fn ensure_name_free(&self, name: &str, except: Option<CategoryId>) -> Result<(), SessionError> {
        match self.category_by_name(name) {
            Some(existing) if Some(existing.id) != except => Err(SessionError::Conflict(format!(
                "category '{}' already exists",
                name
            ))),
            _ => Ok(()),
        }
    }

    pub fn create_category(&mut self, name: &str, color: Option<&str>) -> AppResult<CategoryId> {
        let category = Category::new(name, color)?;
        self.ensure_name_free(&category.name, None)?;
        let id = category.id;
        info!(category = %id, name = %category.name, "Category created");
        self.categories.insert(id, category);
        Ok(id)
    }

    pub fn rename_category(&mut self, id: CategoryId, name: &str) -> AppResult<()> {
        let name = category::normalize_name(name)?;
        self.category(id)?;
        self.ensure_name_free(&name, Some(id))?;
        if let Some(category) = self.categories.get_mut(&id) {
            category.name = name;
        }
        Ok(())
    }

    pub fn recolor_category(&mut self, id: CategoryId, color: &str) -> AppResult<()> {
        let color = category::normalize_color(Some(color))?;
        self.category(id)?;
        if let Some(category) = self.categories.get_mut(&id) {
            category.color = color;
        }
        Ok(())
    }

    /// Delete a category, moving its records to `reassign_to` or to
    /// uncategorized. Returns how many records were moved.
    pub fn delete_category(
        &mut self,
        id: CategoryId,
        reassign_to: Option<CategoryId>,
    ) -> AppResult<usize> {
        self.category(id)?;
        if let Some(target) = reassign_to {
            if target == id {
                return Err(SessionError::ReferentialIntegrity(
                    "records cannot be reassigned to the category being deleted".into(),
                )
                .into());
            }
            self.ensure_category(target)?;
        }

        let mut moved = 0;
        for record in self.records.values_mut() {
            if record.category_id == Some(id) {
                record.category_id = reassign_to;
                moved += 1;
            }
        }
        if let Some(removed) = self.categories.remove(&id) {
            info!(category = %id, name = %removed.name, moved, "Category deleted");
        }
        Ok(moved)
    }

    /// Remove every category and uncategorize every record
    ///
    /// Returns how many records lost their category.
    pub fn reset_categories(&mut self) -> usize {
        let mut uncategorized = 0;
        for record in self.records.values_mut() {
            if record.category_id.take().is_some() {
                uncategorized += 1;
            }
        }
        let removed = self.categories.len();
        self.categories.clear();
        info!(removed, uncategorized, "Categories reset");
        uncategorized
    }

    /// Current categories, sorted by name
    pub fn export_categories(&self) -> Vec<Category> {
        self.list_categories().into_iter().cloned().collect()
    }

    /// Import a category list
    ///
    /// Invalid names or colors fail the whole import. Duplicate names are
    /// skipped and reported. In [`ImportMode::Replace`] an imported name that
    /// already exists keeps its current id, so records stay linked; records
    /// of categories not in the list become uncategorized.
    pub fn import_categories(
        &mut self,
        list: Vec<Category>,
        mode: ImportMode,
    ) -> AppResult<CategoryImportReport> {
        let mut incoming = Vec::with_capacity(list.len());
        for category in list {
            incoming.push(Category {
                id: category.id,
                name: category::normalize_name(&category.name)?,
                color: category::normalize_color(Some(&category.color))?,
            });
        }

        let mut report = CategoryImportReport::default();
        let mut result: HashMap<CategoryId, Category> = match mode {
            ImportMode::Replace => HashMap::new(),
            ImportMode::Merge => self.categories.clone(),
        };
        let mut names: HashSet<String> = result.values().map(|c| c.name.clone()).collect();

        for mut category in incoming {
            if !names.insert(category.name.clone()) {
                report.skipped.push(category.name);
                continue;
            }
            if let (ImportMode::Replace, Some(existing)) = (mode, self.category_by_name(&category.name)) {
                category.id = existing.id;
            }
            if result.contains_key(&category.id) {
                category.id = CategoryId::new();
            }
            result.insert(category.id, category);
            report.imported += 1;
        }

        report.removed = self
            .categories
            .keys()
            .filter(|id| !result.contains_key(id))
            .count();
        for record in self.records.values_mut() {
            if let Some(id) = record.category_id
                && !result.contains_key(&id)
            {
                record.category_id = None;
                report.records_uncategorized += 1;
            }
        }
        self.categories = result;

        info!(
            ?mode,
            imported = report.imported,
            skipped = report.skipped.len(),
            removed = report.removed,
            "Categories imported"
        );
        Ok(report)
    }

    // ----- snapshots -----

    /// Gallery state without pixels
    pub fn export_snapshot(&self) -> GallerySnapshot {
        let entries = self
            .records
            .values()
            .map(|record| SnapshotEntry {
                timestamp: record.timestamp.as_secs_f64(),
                category: record
                    .category_id
                    .and_then(|id| self.categories.get(&id))
                    .map(|c| c.name.clone()),
                annotation: record.annotation.clone(),
                pipeline: record.pipeline.clone(),
            })
            .collect();

        GallerySnapshot {
            version: snapshot::SNAPSHOT_VERSION,
            video: self.video.as_ref().map(|v| v.source().to_string()),
            entries,
        }
    }

    /// Resolve snapshot category names against the current set
    pub fn plan_snapshot_import(&self, snapshot: &GallerySnapshot) -> AppResult<SnapshotPlan> {
        let ticket = self.begin_capture(None)?;
        let mut unknown_categories = Vec::new();

        let entries = snapshot
            .entries
            .iter()
            .map(|entry| {
                let category_id = match entry.category.as_deref() {
                    None => None,
                    Some(name) => match self.category_by_name(name) {
                        Some(category) => Some(category.id),
                        None => {
                            if !unknown_categories.iter().any(|n| n == name) {
                                unknown_categories.push(name.to_string());
                            }
                            None
                        }
                    },
                };
                PlannedEntry {
                    timestamp: entry.timestamp,
                    category_id,
                    annotation: entry.annotation.clone(),
                    pipeline: entry.pipeline.clone(),
                }
            })
            .collect();

        Ok(SnapshotPlan {
            ticket,
            entries,
            unknown_categories,
        })
    }

    /// Replace all records with the located snapshot entries
    pub fn finish_snapshot_import(
        &mut self,
        plan: SnapshotPlan,
        located: Vec<LocatedFrame>,
    ) -> AppResult<SnapshotImportReport> {
        if plan.ticket.generation != self.generation {
            return Err(SessionError::InvalidState(
                "video was replaced while the snapshot was being imported".into(),
            )
            .into());
        }
        if located.len() != plan.entries.len() {
            return Err(SessionError::InvalidInput(format!(
                "expected {} located frames, got {}",
                plan.entries.len(),
                located.len()
            ))
            .into());
        }

        self.reset_records();
        for (entry, frame) in plan.entries.into_iter().zip(located) {
            // A category deleted since planning leaves the record uncategorized
            let category_id = entry
                .category_id
                .filter(|id| self.categories.contains_key(id));
            self.insert_record(frame, category_id, Some(entry.annotation), entry.pipeline);
        }

        let report = SnapshotImportReport {
            imported: self.records.len(),
            unknown_categories: plan.unknown_categories,
        };
        info!(
            imported = report.imported,
            unknown_categories = report.unknown_categories.len(),
            "Gallery snapshot imported"
        );
        Ok(report)
    }

    /// Re-extract every snapshot entry into a fresh record set
    pub fn import_snapshot(&mut self, snapshot: &GallerySnapshot) -> AppResult<SnapshotImportReport> {
        let plan = self.plan_snapshot_import(snapshot)?;
        let located = plan.locate_all()?;
        self.finish_snapshot_import(plan, located)
    }
}
