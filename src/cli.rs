// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for frame extraction
//!
//! This module provides command-line functionality for:
//! - Probing video files
//! - Extracting single filtered frames
//! - Exporting galleries of captured frames
//! - Managing the stored category list

use frame_annotator::constants::{filters, get_resolution_label};
use frame_annotator::pipelines::{EncodingFormat, ImageEncoder};
use frame_annotator::session::record::timestamp_slug;
use frame_annotator::session::{Category, ImportMode, RecordUpdate};
use frame_annotator::storage::{self, JsonCategoryStore};
use frame_annotator::{
    Config, FilterPipeline, FilterStageConfig, PipelineEdit, SeekPolicy, SessionService,
    VideoSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Options of the `extract` command
pub struct ExtractArgs {
    pub video: PathBuf,
    pub at: f64,
    pub policy: Option<SeekPolicy>,
    pub brightness: Option<f64>,
    pub contrast: Option<f64>,
    /// Clip limit and grid size
    pub clahe: Option<(f64, u32)>,
    pub white_balance: bool,
    pub output: Option<PathBuf>,
}

impl ExtractArgs {
    /// Stages in a fixed order: white balance, brightness/contrast, CLAHE
    fn pipeline(&self) -> CliResult<FilterPipeline> {
        let mut stages = Vec::new();
        if self.white_balance {
            stages.push(FilterStageConfig::white_balance());
        }
        if self.brightness.is_some() || self.contrast.is_some() {
            stages.push(FilterStageConfig::brightness_contrast(
                self.brightness.unwrap_or(filters::BRIGHTNESS_DEFAULT),
                self.contrast.unwrap_or(filters::CONTRAST_DEFAULT),
            ));
        }
        if let Some((clip_limit, grid_size)) = self.clahe {
            stages.push(FilterStageConfig::clahe(clip_limit, grid_size));
        }
        Ok(FilterPipeline::from_stages(stages)?)
    }
}

async fn open_service(config: &Config) -> CliResult<SessionService> {
    let store = JsonCategoryStore::in_dir(&config.data_dir());
    tracing::debug!(path = %store.path().display(), "Using category store");
    Ok(SessionService::open(Arc::new(store), config).await?)
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

/// Print stream properties of a video file
pub fn probe(video: PathBuf) -> CliResult<()> {
    let info = VideoSource::File(video.clone()).probe()?;

    println!("{}", video.display());
    println!(
        "  Resolution: {}x{}{}",
        info.width,
        info.height,
        get_resolution_label(info.width)
            .map(|label| format!(" ({})", label))
            .unwrap_or_default()
    );
    println!("  Duration:   {:.3}s", info.duration.as_secs_f64());
    println!("  Frame rate: {:.3} fps", info.fps());
    if let Some(container) = &info.container {
        println!("  Container:  {}", container);
    }
    if let Some(codec) = &info.codec {
        println!("  Codec:      {}", codec);
    }
    Ok(())
}

/// Extract the frame at `args.at`, filter it and save it
pub fn extract(args: ExtractArgs) -> CliResult<()> {
    let config = Config::load();
    let pipeline = args.pipeline()?;
    runtime()?.block_on(run_extract(&config, args, pipeline))
}

async fn run_extract(config: &Config, args: ExtractArgs, pipeline: FilterPipeline) -> CliResult<()> {
    let service = open_service(config).await?;
    if let Some(policy) = args.policy {
        service.set_seek_policy(policy).await;
    }
    service
        .load_video(VideoSource::File(args.video.clone()))
        .await?;

    let id = service.capture(args.at, None).await?;
    service
        .update_record(
            id,
            RecordUpdate {
                pipeline_edit: Some(PipelineEdit::ReplaceAll {
                    stages: pipeline.stages().to_vec(),
                }),
                ..RecordUpdate::default()
            },
        )
        .await?;
    let record = service.record(id).await?;
    let image = service.render(id).await?;

    let output = args.output.clone().unwrap_or_else(|| {
        let stem = VideoSource::File(args.video.clone()).display_stem();
        PathBuf::from(format!(
            "{}_{}.{}",
            stem,
            timestamp_slug(record.timestamp()),
            config.export_format.extension()
        ))
    });
    let format = output
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(EncodingFormat::from_extension)
        .unwrap_or(config.export_format);
    ImageEncoder::new(format, config.export_quality).save(&image, &output)?;

    println!(
        "Frame {} at {:.3}s (requested {:.3}s)",
        record.frame_number(),
        record.timestamp().as_secs_f64(),
        record.requested_timestamp().as_secs_f64()
    );
    if !pipeline.is_empty() {
        let names: Vec<&str> = pipeline.stages().iter().map(|s| s.kind().name()).collect();
        println!("Filters: {}", names.join(" -> "));
    }
    println!("Frame saved: {}", output.display());
    Ok(())
}

/// Capture every timestamp in `at` and export the gallery to `output`
pub fn gallery(
    video: PathBuf,
    at: Vec<f64>,
    category: Option<String>,
    output: PathBuf,
    snapshot: Option<PathBuf>,
) -> CliResult<()> {
    let config = Config::load();
    runtime()?.block_on(run_gallery(&config, video, &at, category.as_deref(), &output, snapshot))
}

async fn run_gallery(
    config: &Config,
    video: PathBuf,
    at: &[f64],
    category: Option<&str>,
    output: &Path,
    snapshot: Option<PathBuf>,
) -> CliResult<()> {
    let service = open_service(config).await?;
    service.load_video(VideoSource::File(video)).await?;

    let category_id = match category {
        None => None,
        Some(name) => match service.category_by_name(name).await {
            Some(existing) => Some(existing.id),
            None => {
                println!("Creating category: {}", name.trim());
                Some(service.create_category(name, None).await?)
            }
        },
    };

    for t_secs in at {
        let id = service.capture(*t_secs, category_id).await?;
        let record = service.record(id).await?;
        println!(
            "  [{}] {:.3}s -> frame {}",
            id,
            record.timestamp().as_secs_f64(),
            record.frame_number()
        );
    }

    let written = service.export_to_dir(output, config.encoder()).await?;
    if let Some(path) = snapshot {
        storage::write_snapshot(&path, &service.export_snapshot().await)?;
        println!("Snapshot saved: {}", path.display());
    }
    println!("Exported {} files to {}", written.len(), output.display());
    Ok(())
}

/// Run one category command against the stored list
fn with_service<F, Fut>(command: F) -> CliResult<()>
where
    F: FnOnce(SessionService) -> Fut,
    Fut: Future<Output = CliResult<()>>,
{
    let config = Config::load();
    runtime()?.block_on(async move {
        let service = open_service(&config).await?;
        command(service).await
    })
}

pub fn list_categories() -> CliResult<()> {
    with_service(run_list_categories)
}

async fn run_list_categories(service: SessionService) -> CliResult<()> {
    let categories = service.list_categories().await;
    if categories.is_empty() {
        println!("No categories.");
        return Ok(());
    }
    for category in categories {
        println!("  {}  {}  {}", category.color, category.name, category.id);
    }
    Ok(())
}

pub fn add_category(name: &str, color: Option<&str>) -> CliResult<()> {
    with_service(|service| run_add_category(service, name, color))
}

async fn run_add_category(service: SessionService, name: &str, color: Option<&str>) -> CliResult<()> {
    let id = service.create_category(name, color).await?;
    println!("Category added: {} ({})", name.trim(), id);
    Ok(())
}

pub fn remove_category(name: &str) -> CliResult<()> {
    with_service(|service| run_remove_category(service, name))
}

async fn run_remove_category(service: SessionService, name: &str) -> CliResult<()> {
    let Some(category) = service.category_by_name(name).await else {
        return Err(format!("No category named '{}'", name.trim()).into());
    };
    let moved = service.delete_category(category.id, None).await?;
    println!("Category removed: {} ({} frames uncategorized)", category.name, moved);
    Ok(())
}

pub fn reset_categories() -> CliResult<()> {
    with_service(run_reset_categories)
}

async fn run_reset_categories(service: SessionService) -> CliResult<()> {
    let removed = service.list_categories().await.len();
    service.reset_categories().await?;
    println!("Removed {} categories", removed);
    Ok(())
}

pub fn export_categories(path: &Path) -> CliResult<()> {
    with_service(|service| run_export_categories(service, path))
}

async fn run_export_categories(service: SessionService, path: &Path) -> CliResult<()> {
    let categories = service.export_categories().await;
    storage::write_categories(path, &categories)?;
    println!("Exported {} categories to {}", categories.len(), path.display());
    Ok(())
}

pub fn import_categories(path: &Path, merge: bool) -> CliResult<()> {
    let list = storage::read_categories(path)?;
    let mode = if merge {
        ImportMode::Merge
    } else {
        ImportMode::Replace
    };
    with_service(|service| run_import_categories(service, list, mode))
}

async fn run_import_categories(
    service: SessionService,
    list: Vec<Category>,
    mode: ImportMode,
) -> CliResult<()> {
    let report = service.import_categories(list, mode).await?;
    println!(
        "Imported {} categories ({} skipped, {} removed)",
        report.imported,
        report.skipped.len(),
        report.removed
    );
    for name in &report.skipped {
        println!("  skipped duplicate: {}", name);
    }
    Ok(())
}
