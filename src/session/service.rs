// SPDX-License-Identifier: GPL-3.0-only

//! Async front end for a [`CaptureSession`]
//!
//! Decoding and rendering run on the blocking thread pool, bounded by the
//! configured timeouts. The session lock is never held while a frame is
//! being decoded, so listing or editing records stays responsive during a
//! slow capture. A capture whose video was replaced while it was decoding
//! is rejected instead of landing in the new gallery.
//!
//! Category changes are written to the [`CategoryStore`] before they become
//! visible; a failed write leaves the session untouched.

use super::{
    CaptureSession, Category, CategoryId, CategoryImportReport, FrameRecord, GallerySnapshot,
    ImportMode, RecordFilter, RecordId, RecordUpdate, SessionState, SnapshotImportReport,
};
use crate::backends::video::{VideoHandle, VideoInfo, VideoResult, VideoSource};
use crate::config::Config;
use crate::constants::{pipeline, timing};
use crate::errors::{AppResult, SessionError, StorageError, VideoError};
use crate::export::ExportJob;
use crate::media::SeekPolicy;
use crate::pipelines::ImageEncoder;
use crate::storage::CategoryStore;
use futures::{StreamExt, TryStreamExt};
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Run a blocking video operation with a deadline, retrying once if it
/// fails transiently
async fn run_video_task<T, F>(limit: Duration, op: F) -> VideoResult<T>
where
    T: Send + 'static,
    F: Fn() -> VideoResult<T> + Clone + Send + 'static,
{
    let mut retried = false;
    loop {
        let task = tokio::task::spawn_blocking(op.clone());
        let result = match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(VideoError::Decode(format!("decode worker failed: {}", e))),
            // The worker keeps running until its own bus timeouts fire;
            // dropping its handle is all that can be done from here.
            Err(_) => Err(VideoError::timed_out(limit)),
        };

        match result {
            Err(e) if e.is_transient() && !retried => {
                warn!(error = %e, "Transient video failure, retrying once");
                retried = true;
            }
            other => return other,
        }
    }
}

/// Probe and open `source`; every failure is an unsupported source
async fn open_video(limit: Duration, source: VideoSource) -> VideoResult<VideoHandle> {
    run_video_task(limit, move || VideoHandle::open(source.clone()))
        .await
        .map_err(VideoError::into_unsupported)
}

/// Shareable handle to one capture session
#[derive(Clone)]
pub struct SessionService {
    session: Arc<Mutex<CaptureSession>>,
    store: Arc<dyn CategoryStore>,
    decode_timeout: Duration,
    probe_timeout: Duration,
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("decode_timeout", &self.decode_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl SessionService {
    /// Start a session with the categories found in `store`
    pub async fn open(store: Arc<dyn CategoryStore>, config: &Config) -> AppResult<Self> {
        let loader = store.clone();
        let categories = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| StorageError::Io {
                path: "<category store>".into(),
                message: format!("load task failed: {}", e),
            })??;
        info!(categories = categories.len(), "Session opened");

        let mut session = CaptureSession::with_categories(categories);
        session.set_seek_policy(config.seek_policy);
        Ok(Self::with_session(session, store)
            .with_timeouts(config.decode_timeout(), config.probe_timeout()))
    }

    /// Wrap an existing session; timeouts start at their defaults
    pub fn with_session(session: CaptureSession, store: Arc<dyn CategoryStore>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            store,
            decode_timeout: timing::DEFAULT_DECODE_TIMEOUT,
            probe_timeout: timing::DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, decode: Duration, probe: Duration) -> Self {
        self.decode_timeout = decode;
        self.probe_timeout = probe;
        self
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state()
    }

    pub async fn video_info(&self) -> Option<VideoInfo> {
        self.session.lock().await.video_info().cloned()
    }

    pub async fn seek_policy(&self) -> SeekPolicy {
        self.session.lock().await.seek_policy()
    }

    pub async fn set_seek_policy(&self, policy: SeekPolicy) {
        self.session.lock().await.set_seek_policy(policy);
    }

    // ----- lifecycle -----

    /// Probe `source` and make it the active video
    ///
    /// Existing records are dropped only once the probe succeeded.
    pub async fn load_video(&self, source: VideoSource) -> AppResult<VideoInfo> {
        debug!(source = %source, "Probing video");
        let handle = open_video(self.probe_timeout, source).await?;
        Ok(self.session.lock().await.install_video(handle))
    }

    pub async fn clear(&self) {
        self.session.lock().await.clear();
    }

    // ----- records -----

    /// Capture the frame at `t_secs` into a new record
    pub async fn capture(&self, t_secs: f64, category_id: Option<CategoryId>) -> AppResult<RecordId> {
        let ticket = self.session.lock().await.begin_capture(category_id)?;

        let worker = ticket.clone();
        let located =
            run_video_task(self.decode_timeout, move || worker.locate(t_secs)).await?;

        self.session.lock().await.finish_capture(ticket, located)
    }

    pub async fn record(&self, id: RecordId) -> AppResult<FrameRecord> {
        Ok(self.session.lock().await.record(id)?.clone())
    }

    pub async fn record_count(&self) -> usize {
        self.session.lock().await.record_count()
    }

    /// Matching records in capture order
    pub async fn list_records(&self, filter: RecordFilter) -> Vec<FrameRecord> {
        self.session
            .lock()
            .await
            .list_records(filter)
            .cloned()
            .collect()
    }

    pub async fn update_record(&self, id: RecordId, update: RecordUpdate) -> AppResult<()> {
        self.session.lock().await.update_record(id, update)
    }

    pub async fn delete_record(&self, id: RecordId) -> AppResult<FrameRecord> {
        self.session.lock().await.delete_record(id)
    }

    /// Render a record through its current pipeline off the async runtime
    pub async fn render(&self, id: RecordId) -> AppResult<RgbImage> {
        let record = self.record(id).await?;
        let image = tokio::task::spawn_blocking(move || record.render())
            .await
            .map_err(|e| SessionError::InvalidState(format!("render task failed: {}", e)))?;
        Ok(image)
    }

    // ----- categories -----

    /// Apply a category change to a copy, persist it, then publish it
    async fn mutate_categories<T, F>(&self, op: F) -> AppResult<T>
    where
        T: Send,
        F: FnOnce(&mut CaptureSession) -> AppResult<T> + Send,
    {
        let mut session = self.session.lock().await;
        let mut next = session.clone();
        let value = op(&mut next)?;

        let store = self.store.clone();
        let categories = next.export_categories();
        tokio::task::spawn_blocking(move || store.save(&categories))
            .await
            .map_err(|e| StorageError::Io {
                path: "<category store>".into(),
                message: format!("save task failed: {}", e),
            })??;

        *session = next;
        Ok(value)
    }

    pub async fn category(&self, id: CategoryId) -> AppResult<Category> {
        Ok(self.session.lock().await.category(id)?.clone())
    }

    pub async fn category_by_name(&self, name: &str) -> Option<Category> {
        self.session.lock().await.category_by_name(name).cloned()
    }

    /// Categories sorted by name
    pub async fn list_categories(&self) -> Vec<Category> {
        self.session.lock().await.export_categories()
    }

    pub async fn create_category(&self, name: &str, color: Option<&str>) -> AppResult<CategoryId> {
        self.mutate_categories(|s| s.create_category(name, color)).await
    }

    pub async fn rename_category(&self, id: CategoryId, name: &str) -> AppResult<()> {
        self.mutate_categories(|s| s.rename_category(id, name)).await
    }

    pub async fn recolor_category(&self, id: CategoryId, color: &str) -> AppResult<()> {
        self.mutate_categories(|s| s.recolor_category(id, color)).await
    }

    /// Delete a category; returns how many records were moved
    pub async fn delete_category(
        &self,
        id: CategoryId,
        reassign_to: Option<CategoryId>,
    ) -> AppResult<usize> {
        self.mutate_categories(|s| s.delete_category(id, reassign_to))
            .await
    }

    /// Drop every category; returns how many records were uncategorized
    pub async fn reset_categories(&self) -> AppResult<usize> {
        self.mutate_categories(|s| Ok(s.reset_categories())).await
    }

    pub async fn import_categories(
        &self,
        list: Vec<Category>,
        mode: ImportMode,
    ) -> AppResult<CategoryImportReport> {
        self.mutate_categories(|s| s.import_categories(list, mode))
            .await
    }

    pub async fn export_categories(&self) -> Vec<Category> {
        self.list_categories().await
    }

    // ----- snapshots and export -----

    pub async fn export_snapshot(&self) -> GallerySnapshot {
        self.session.lock().await.export_snapshot()
    }

    /// Re-extract every snapshot entry from the loaded video
    ///
    /// Entries are decoded a few at a time; the first failure aborts the
    /// import and the current records are kept.
    pub async fn import_snapshot(&self, snapshot: &GallerySnapshot) -> AppResult<SnapshotImportReport> {
        let plan = self.session.lock().await.plan_snapshot_import(snapshot)?;
        debug!(entries = plan.len(), "Importing gallery snapshot");

        let limit = self.decode_timeout;
        let jobs: Vec<_> = plan
            .timestamps()
            .map(|t_secs| {
                let ticket = plan.ticket().clone();
                run_video_task(limit, move || ticket.locate(t_secs))
            })
            .collect();
        let located = futures::stream::iter(jobs)
            .buffered(pipeline::MAX_PARALLEL_DECODES)
            .try_collect::<Vec<_>>()
            .await?;

        self.session
            .lock()
            .await
            .finish_snapshot_import(plan, located)
    }

    /// Render every record into `dir`; returns the written files
    pub async fn export_to_dir(&self, dir: &Path, encoder: ImageEncoder) -> AppResult<Vec<PathBuf>> {
        let job = ExportJob::prepare(&*self.session.lock().await, encoder);
        let dir = dir.to_path_buf();
        let written = tokio::task::spawn_blocking(move || job.write_to(&dir))
            .await
            .map_err(|e| StorageError::Io {
                path: "<export>".into(),
                message: format!("export task failed: {}", e),
            })??;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::video::PatternSpec;
    use crate::errors::AppError;
    use crate::storage::MemoryCategoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingStore;

    impl CategoryStore for FailingStore {
        fn load(&self) -> Result<Vec<Category>, StorageError> {
            Ok(Vec::new())
        }

        fn save(&self, _: &[Category]) -> Result<(), StorageError> {
            Err(StorageError::Io {
                path: "/read-only".into(),
                message: "permission denied".into(),
            })
        }
    }

    fn pattern() -> VideoSource {
        VideoSource::Pattern(PatternSpec::new(Duration::from_secs(10), 25))
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result = run_video_task(Duration::from_secs(5), move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(VideoError::Transient("EAGAIN".into()))
            } else {
                Ok(42)
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_decode_failure_is_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let result: VideoResult<()> = run_video_task(Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(VideoError::Decode("corrupt".into()))
        })
        .await;
        assert!(matches!(result, Err(VideoError::Decode(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_decode_times_out() {
        let result: VideoResult<()> = run_video_task(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })
        .await;
        assert_eq!(result, Err(VideoError::timed_out(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn test_open_failures_are_unsupported_sources() {
        let missing = VideoSource::File(PathBuf::from("/nonexistent/clip.mp4"));
        let err = open_video(Duration::from_secs(5), missing).await.unwrap_err();
        assert!(matches!(err, VideoError::UnsupportedSource(_)));

        let bad = VideoSource::Pattern(PatternSpec::default().with_size(0, 0));
        let err = open_video(Duration::from_secs(5), bad).await.unwrap_err();
        assert!(matches!(err, VideoError::UnsupportedSource(_)));

        let handle = open_video(Duration::from_secs(5), pattern()).await.unwrap();
        assert_eq!(handle.info().width, 64);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_categories_unchanged() {
        let service = SessionService::with_session(CaptureSession::new(), Arc::new(FailingStore));
        let err = service.create_category("Rust", None).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert!(service.list_categories().await.is_empty());
    }

    #[tokio::test]
    async fn test_category_changes_are_persisted() {
        let store = Arc::new(MemoryCategoryStore::default());
        let service = SessionService::open(store.clone(), &Config::default())
            .await
            .unwrap();
        let id = service.create_category("Rust", Some("#aa0000")).await.unwrap();
        service.rename_category(id, "Corrosion").await.unwrap();

        let stored = store.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].name, "Corrosion");
    }

    #[tokio::test]
    async fn test_reset_categories_empties_the_store() {
        let store = Arc::new(MemoryCategoryStore::default());
        let service = SessionService::with_session(CaptureSession::new(), store.clone());
        service.load_video(pattern()).await.unwrap();
        let cat = service.create_category("Rust", None).await.unwrap();
        service.create_category("Paint", None).await.unwrap();
        let id = service.capture(1.0, Some(cat)).await.unwrap();
        assert_eq!(store.load().unwrap().len(), 2);

        assert_eq!(service.reset_categories().await.unwrap(), 1);
        assert!(store.load().unwrap().is_empty());
        assert!(service.list_categories().await.is_empty());
        assert_eq!(service.record(id).await.unwrap().category_id(), None);
    }

    #[tokio::test]
    async fn test_failed_reset_keeps_categories() {
        let mut session = CaptureSession::new();
        session.create_category("Rust", None).unwrap();
        let service = SessionService::with_session(session, Arc::new(FailingStore));
        assert!(service.reset_categories().await.is_err());
        assert_eq!(service.list_categories().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_drops_records() {
        let service =
            SessionService::with_session(CaptureSession::new(), Arc::new(MemoryCategoryStore::default()));
        service.load_video(pattern()).await.unwrap();
        service.capture(1.0, None).await.unwrap();
        assert_eq!(service.record_count().await, 1);

        service.load_video(pattern()).await.unwrap();
        assert_eq!(service.record_count().await, 0);
        assert_eq!(service.state().await, SessionState::VideoLoaded);
    }
}
