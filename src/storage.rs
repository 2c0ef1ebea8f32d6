// SPDX-License-Identifier: GPL-3.0-only

//! Persistence for categories and gallery snapshots
//!
//! Only categories outlive the process. They are kept in a flat,
//! pretty-printed JSON list of `{id, name, color}` objects. Snapshots are
//! written and read on request.

use crate::constants::categories::STORE_FILE_NAME;
use crate::errors::StorageError;
use crate::session::{Category, GallerySnapshot};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Where categories are loaded from and saved to
pub trait CategoryStore: Send + Sync {
    /// Stored categories; an absent store yields an empty list
    fn load(&self) -> Result<Vec<Category>, StorageError>;

    /// Replace the stored list
    fn save(&self, categories: &[Category]) -> Result<(), StorageError>;
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

/// Write via a sibling temp file so readers never see a partial file
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data).map_err(|e| io_error(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}

/// Category list in a JSON file
#[derive(Debug, Clone)]
pub struct JsonCategoryStore {
    path: PathBuf,
}

impl JsonCategoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default file name inside `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CategoryStore for JsonCategoryStore {
    /// Missing or unreadable files load as empty; the next save rewrites them
    fn load(&self) -> Result<Vec<Category>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No category store yet");
                return Ok(Vec::new());
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Category store unreadable, starting empty");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_str::<Vec<Category>>(&content) {
            Ok(categories) => {
                debug!(path = %self.path.display(), count = categories.len(), "Categories loaded");
                Ok(categories)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Category store malformed, starting empty");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, categories: &[Category]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(categories)?;
        write_atomic(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), count = categories.len(), "Categories saved");
        Ok(())
    }
}

/// In-process store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryCategoryStore {
    categories: Mutex<Vec<Category>>,
}

impl MemoryCategoryStore {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            categories: Mutex::new(categories),
        }
    }
}

impl CategoryStore for MemoryCategoryStore {
    fn load(&self) -> Result<Vec<Category>, StorageError> {
        Ok(self
            .categories
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    fn save(&self, categories: &[Category]) -> Result<(), StorageError> {
        match self.categories.lock() {
            Ok(mut stored) => {
                *stored = categories.to_vec();
                Ok(())
            }
            Err(_) => Err(StorageError::Io {
                path: "<memory>".into(),
                message: "category store lock poisoned".into(),
            }),
        }
    }
}

/// Parse a category list exported by [`write_categories`] or by hand
pub fn read_categories(path: &Path) -> Result<Vec<Category>, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_categories(path: &Path, categories: &[Category]) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(categories)?;
    write_atomic(path, json.as_bytes())?;
    info!(path = %path.display(), count = categories.len(), "Categories exported");
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<GallerySnapshot, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_snapshot(path: &Path, snapshot: &GallerySnapshot) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    write_atomic(path, json.as_bytes())?;
    info!(path = %path.display(), entries = snapshot.entries.len(), "Gallery snapshot saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_empty_then_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCategoryStore::in_dir(&dir.path().join("nested"));
        assert!(store.load().unwrap().is_empty());

        let categories = vec![Category::new("Rust", None).unwrap()];
        store.save(&categories).unwrap();
        assert_eq!(store.load().unwrap(), categories);
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_hand_written_list_without_ids_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.json");
        std::fs::write(&path, r##"[{"name":"Rust","color":"#112233"}]"##).unwrap();

        let list = read_categories(&path).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "Rust");
        assert_eq!(list[0].color, "#112233");
    }

    #[test]
    fn test_malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCategoryStore::in_dir(dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_is_flat_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCategoryStore::in_dir(dir.path());
        let category = Category::new("Paint", Some("#112233")).unwrap();
        store.save(std::slice::from_ref(&category)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(value[0]["name"], "Paint");
        assert_eq!(value[0]["color"], "#112233");
        assert_eq!(value[0]["id"], serde_json::to_value(category.id).unwrap());
    }

    #[test]
    fn test_read_snapshot_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(read_snapshot(&path), Err(StorageError::Format(_))));
        assert!(matches!(
            read_snapshot(&dir.path().join("absent.json")),
            Err(StorageError::Io { .. })
        ));
    }
}
