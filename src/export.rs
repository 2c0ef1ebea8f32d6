// SPDX-License-Identifier: GPL-3.0-only

//! Gallery export
//!
//! An [`ExportManifest`] decides where every record goes: one folder per
//! category (uncategorized records share a folder) and a file name built
//! from the video name, record id and timestamp:
//!
//! ```text
//! <dir>/<category>/<video>_frame<id>_ts<sss_mmm>.<ext>
//! <dir>/report.json
//! ```
//!
//! Images are rendered through each record's current pipeline at export
//! time. Packaging the directory (zip) or writing CSV is left to callers;
//! [`ExportManifest::report_rows`] has everything a report needs.

use crate::constants::categories::UNCATEGORIZED_FOLDER;
use crate::errors::{AppResult, StorageError};
use crate::pipelines::{FilterPipeline, ImageEncoder};
use crate::session::record::timestamp_slug;
use crate::session::{CaptureSession, RecordFilter, RecordId};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// File name of the JSON report written next to the images
pub const REPORT_FILE_NAME: &str = "report.json";

/// Folder-safe version of a category name
///
/// Path separators and control characters become `_`; names that would be
/// empty or special (`.`, `..`) map to `_`.
pub fn sanitize_folder_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').trim().to_string();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Where one record is exported to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub record_id: RecordId,
    pub folder: String,
    pub filename: String,
    pub timestamp: Duration,
    /// Category name, `None` for uncategorized
    pub category: Option<String>,
    pub annotation: String,
}

impl ExportEntry {
    /// Path relative to the export root
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.folder).join(&self.filename)
    }
}

/// One line of the export report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Seconds from stream start
    pub timestamp: f64,
    pub category: String,
    /// Path relative to the export root
    pub filename: String,
    pub annotation: String,
}

/// Export layout for every record of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportManifest {
    pub entries: Vec<ExportEntry>,
}

impl ExportManifest {
    /// Lay out all records in capture order
    pub fn build(session: &CaptureSession, extension: &str) -> Self {
        let stem = session
            .video()
            .map(|v| v.source().display_stem())
            .unwrap_or_else(|| "frames".to_string());

        let entries = session
            .list_records(RecordFilter::All)
            .map(|record| {
                let category = record
                    .category_id()
                    .and_then(|id| session.category(id).ok())
                    .map(|c| c.name.clone());
                let folder = category
                    .as_deref()
                    .map(sanitize_folder_name)
                    .unwrap_or_else(|| UNCATEGORIZED_FOLDER.to_string());
                ExportEntry {
                    record_id: record.id(),
                    folder,
                    filename: format!(
                        "{}_frame{}_ts{}.{}",
                        stem,
                        record.id(),
                        timestamp_slug(record.timestamp()),
                        extension
                    ),
                    timestamp: record.timestamp(),
                    category,
                    annotation: record.annotation().to_string(),
                }
            })
            .collect();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Report rows in manifest order
    pub fn report_rows(&self) -> Vec<ReportRow> {
        self.entries
            .iter()
            .map(|entry| ReportRow {
                timestamp: entry.timestamp.as_secs_f64(),
                category: entry
                    .category
                    .clone()
                    .unwrap_or_else(|| UNCATEGORIZED_FOLDER.to_string()),
                filename: entry.relative_path().to_string_lossy().into_owned(),
                annotation: entry.annotation.clone(),
            })
            .collect()
    }
}

/// Everything needed to write an export without the session
///
/// Holds shared originals and pipeline copies, so it can be moved to a
/// worker thread while the session keeps serving requests.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub manifest: ExportManifest,
    sources: Vec<(Arc<RgbImage>, FilterPipeline)>,
    encoder: ImageEncoder,
}

impl ExportJob {
    pub fn prepare(session: &CaptureSession, encoder: ImageEncoder) -> Self {
        let manifest = ExportManifest::build(session, encoder.format.extension());
        let sources = session
            .list_records(RecordFilter::All)
            .map(|record| (record.original().clone(), record.pipeline().clone()))
            .collect();
        Self {
            manifest,
            sources,
            encoder,
        }
    }

    /// Render and write every image plus the report; returns written paths
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
        info!(dir = %dir.display(), records = self.manifest.len(), "Exporting gallery");
        let mut written = Vec::with_capacity(self.manifest.len() + 1);

        for (entry, (original, pipeline)) in self.manifest.entries.iter().zip(&self.sources) {
            let path = dir.join(entry.relative_path());
            let rendered = pipeline.render(original);
            self.encoder.save(&rendered, &path)?;
            debug!(record = %entry.record_id, path = %path.display(), "Frame exported");
            written.push(path);
        }

        let report_path = dir.join(REPORT_FILE_NAME);
        let json = serde_json::to_string_pretty(&self.manifest.report_rows())?;
        std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&report_path, json))
            .map_err(|e| StorageError::Io {
                path: report_path.display().to_string(),
                message: e.to_string(),
            })?;
        written.push(report_path);

        info!(dir = %dir.display(), files = written.len(), "Gallery exported");
        Ok(written)
    }
}

/// Render all records of `session` into `dir`
pub fn export_to_dir(
    session: &CaptureSession,
    dir: &Path,
    encoder: ImageEncoder,
) -> AppResult<Vec<PathBuf>> {
    Ok(ExportJob::prepare(session, encoder).write_to(dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_folder_name() {
        assert_eq!(sanitize_folder_name("Rust / Corrosion"), "Rust _ Corrosion");
        assert_eq!(sanitize_folder_name(".."), "_");
        assert_eq!(sanitize_folder_name("  "), "_");
        assert_eq!(sanitize_folder_name("Trincas"), "Trincas");
        assert_eq!(sanitize_folder_name("a:b"), "a_b");
    }

    #[test]
    fn test_relative_path() {
        let entry = ExportEntry {
            record_id: RecordId(3),
            folder: "uncategorized".into(),
            filename: "clip_frame3_ts2_520.png".into(),
            timestamp: Duration::from_millis(2520),
            category: None,
            annotation: String::new(),
        };
        assert_eq!(
            entry.relative_path(),
            PathBuf::from("uncategorized/clip_frame3_ts2_520.png")
        );
    }
}
