// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end tests through the async session service

use frame_annotator::errors::{AppError, SessionError, VideoError};
use frame_annotator::media::conversions::mean_luminance;
use frame_annotator::pipelines::{EncodingFormat, EncodingQuality, ImageEncoder};
use frame_annotator::session::{RecordFilter, RecordUpdate, SessionState};
use frame_annotator::storage::{CategoryStore, MemoryCategoryStore};
use frame_annotator::{
    Config, FilterStageConfig, PatternSpec, PipelineEdit, SeekPolicy, SessionService, VideoSource,
};
use std::sync::Arc;
use std::time::Duration;

fn pattern() -> VideoSource {
    VideoSource::Pattern(PatternSpec::new(Duration::from_secs(10), 25))
}

async fn loaded_service() -> (SessionService, Arc<MemoryCategoryStore>) {
    let store = Arc::new(MemoryCategoryStore::default());
    let service = SessionService::open(store.clone(), &Config::default())
        .await
        .unwrap();
    service.load_video(pattern()).await.unwrap();
    (service, store)
}

#[tokio::test]
async fn test_repeated_capture_is_deterministic() {
    let (service, _) = loaded_service().await;

    let first = service.capture(2.5, None).await.unwrap();
    let second = service.capture(2.5, None).await.unwrap();
    assert_ne!(first, second);

    let a = service.record(first).await.unwrap();
    let b = service.record(second).await.unwrap();
    assert_eq!(a.timestamp(), b.timestamp());
    assert_eq!(a.frame_number(), b.frame_number());
    assert_eq!(a.original().as_raw(), b.original().as_raw());
    assert_eq!(b.annotation(), "Frame 2, time 2.520s");
}

#[tokio::test]
async fn test_nearest_policy_picks_closest_frame() {
    let (service, _) = loaded_service().await;
    service.set_seek_policy(SeekPolicy::Nearest).await;

    let id = service.capture(2.5, None).await.unwrap();
    let record = service.record(id).await.unwrap();
    assert_eq!(record.timestamp(), Duration::from_millis(2480));
    assert_eq!(record.frame_number(), 62);
}

#[tokio::test]
async fn test_timestamp_past_end_yields_last_frame() {
    let (service, _) = loaded_service().await;
    let id = service.capture(25.0, None).await.unwrap();
    let record = service.record(id).await.unwrap();
    assert_eq!(record.frame_number(), 249);
    assert_eq!(record.requested_timestamp(), Duration::from_secs(10));
}

#[tokio::test]
async fn test_non_finite_timestamp_is_rejected() {
    let (service, _) = loaded_service().await;
    let err = service.capture(f64::NAN, None).await.unwrap_err();
    assert!(matches!(err, AppError::Video(VideoError::Decode(_))));
    assert_eq!(service.record_count().await, 0);
}

#[tokio::test]
async fn test_brightness_and_contrast_raise_luminance() {
    let (service, _) = loaded_service().await;
    let id = service.capture(2.5, None).await.unwrap();
    let before = mean_luminance(&service.render(id).await.unwrap());

    service
        .update_record(
            id,
            RecordUpdate {
                pipeline_edit: Some(PipelineEdit::Insert {
                    index: 0,
                    stage: FilterStageConfig::brightness_contrast(20.0, 1.2),
                }),
                ..RecordUpdate::default()
            },
        )
        .await
        .unwrap();
    let after = mean_luminance(&service.render(id).await.unwrap());
    assert!(after > before, "{} should exceed {}", after, before);
}

#[tokio::test]
async fn test_filters_never_touch_the_original() {
    let (service, _) = loaded_service().await;
    let id = service.capture(4.0, None).await.unwrap();
    let original = service.record(id).await.unwrap().original().clone();

    for stage in [
        FilterStageConfig::white_balance(),
        FilterStageConfig::clahe(3.0, 4),
        FilterStageConfig::brightness_contrast(-40.0, 0.5),
    ] {
        service
            .update_record(
                id,
                RecordUpdate {
                    pipeline_edit: Some(PipelineEdit::Insert { index: 0, stage }),
                    ..RecordUpdate::default()
                },
            )
            .await
            .unwrap();
    }

    let record = service.record(id).await.unwrap();
    assert_eq!(record.pipeline().len(), 3);
    assert_eq!(record.original().as_raw(), original.as_raw());
    assert_ne!(service.render(id).await.unwrap().as_raw(), original.as_raw());

    service
        .update_record(
            id,
            RecordUpdate {
                pipeline_edit: Some(PipelineEdit::ReplaceAll { stages: Vec::new() }),
                ..RecordUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(service.render(id).await.unwrap().as_raw(), original.as_raw());
}

#[tokio::test]
async fn test_reset_keeps_categories() {
    let (service, store) = loaded_service().await;
    let cat = service.create_category("Cracks", None).await.unwrap();
    service.capture(1.0, Some(cat)).await.unwrap();
    service.capture(2.0, None).await.unwrap();

    service.clear().await;
    assert_eq!(service.state().await, SessionState::Empty);
    assert_eq!(service.record_count().await, 0);
    assert_eq!(service.category(cat).await.unwrap().name, "Cracks");
    assert_eq!(store.load().unwrap().len(), 1);

    let err = service.capture(1.0, Some(cat)).await.unwrap_err();
    assert!(matches!(err, AppError::Session(SessionError::InvalidState(_))));
}

#[tokio::test]
async fn test_deleting_category_uncategorizes_its_records() {
    let (service, store) = loaded_service().await;
    let cat = service.create_category("Dents", Some("#FF8800")).await.unwrap();
    let id = service.capture(3.0, Some(cat)).await.unwrap();
    assert_eq!(
        service.list_records(RecordFilter::Category(cat)).await.len(),
        1
    );

    let moved = service.delete_category(cat, None).await.unwrap();
    assert_eq!(moved, 1);
    assert_eq!(service.record(id).await.unwrap().category_id(), None);
    assert!(store.load().unwrap().is_empty());

    let err = service
        .update_record(
            id,
            RecordUpdate {
                category_id: Some(Some(cat)),
                ..RecordUpdate::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Session(SessionError::NotFound { .. })));
}

#[tokio::test]
async fn test_categories_survive_a_new_session() {
    let store = Arc::new(MemoryCategoryStore::default());
    let first = SessionService::open(store.clone(), &Config::default())
        .await
        .unwrap();
    let id = first.create_category("Paint", Some("#00AA00")).await.unwrap();

    let second = SessionService::open(store, &Config::default())
        .await
        .unwrap();
    let category = second.category(id).await.unwrap();
    assert_eq!(category.name, "Paint");
    assert_eq!(category.color, "#00aa00");
}

#[tokio::test]
async fn test_snapshot_reimport_recreates_gallery() {
    let (service, _) = loaded_service().await;
    let cat = service.create_category("Rust", None).await.unwrap();
    let id = service.capture(2.5, Some(cat)).await.unwrap();
    service
        .update_record(
            id,
            RecordUpdate {
                annotation: Some("pitting".into()),
                pipeline_edit: Some(PipelineEdit::Insert {
                    index: 0,
                    stage: FilterStageConfig::clahe(2.0, 8),
                }),
                ..RecordUpdate::default()
            },
        )
        .await
        .unwrap();
    service.capture(7.25, None).await.unwrap();
    let rendered = service.render(id).await.unwrap();
    let snapshot = service.export_snapshot().await;

    service.load_video(pattern()).await.unwrap();
    assert_eq!(service.record_count().await, 0);

    let report = service.import_snapshot(&snapshot).await.unwrap();
    assert_eq!(report.imported, 2);
    assert!(report.unknown_categories.is_empty());

    let records = service.list_records(RecordFilter::All).await;
    assert_eq!(records[0].annotation(), "pitting");
    assert_eq!(records[0].category_id(), Some(cat));
    assert_eq!(records[0].render().as_raw(), rendered.as_raw());
    assert_eq!(records[1].timestamp(), Duration::from_millis(7280));
}

#[tokio::test]
async fn test_failed_snapshot_import_keeps_records() {
    let store = Arc::new(MemoryCategoryStore::default());
    let service = SessionService::open(store, &Config::default())
        .await
        .unwrap();
    let truncated = PatternSpec::new(Duration::from_secs(10), 25).truncated_at(100);
    service
        .load_video(VideoSource::Pattern(truncated))
        .await
        .unwrap();
    let kept = service.capture(1.0, None).await.unwrap();

    let mut snapshot = service.export_snapshot().await;
    snapshot.entries[0].timestamp = 9.0;
    assert!(service.import_snapshot(&snapshot).await.is_err());

    let records = service.list_records(RecordFilter::All).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), kept);
}

#[tokio::test]
async fn test_export_writes_category_folders_and_report() {
    let (service, _) = loaded_service().await;
    let cat = service.create_category("Weld / Seam", None).await.unwrap();
    let a = service.capture(2.5, Some(cat)).await.unwrap();
    let b = service.capture(5.0, None).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let encoder = ImageEncoder::new(EncodingFormat::Png, EncodingQuality::default());
    let written = service.export_to_dir(dir.path(), encoder).await.unwrap();
    assert_eq!(written.len(), 3);

    let categorized = dir
        .path()
        .join("Weld _ Seam")
        .join(format!("pattern_frame{}_ts2_520.png", a));
    let uncategorized = dir
        .path()
        .join("uncategorized")
        .join(format!("pattern_frame{}_ts5_000.png", b));
    assert!(categorized.is_file());
    assert!(uncategorized.is_file());

    let decoded = image::open(&categorized).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (64, 48));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap())
            .unwrap();
    assert_eq!(report[0]["category"], "Weld / Seam");
    assert_eq!(report[1]["category"], "uncategorized");
    let timestamp = report[0]["timestamp"].as_f64().unwrap();
    assert!((timestamp - 2.52).abs() < 1e-9);
}
