use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::images::StoredImage;

pub const TABLE_FILE_NAME: &str = "gallery.json";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Local storage is unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Local storage operation failed: {0}")]
    StorageOperationFailed(String),
}

impl StorageError {
    fn failed(context: &str, err: impl std::fmt::Display) -> Self {
        Self::StorageOperationFailed(format!("{context}: {err}"))
    }
}

/// Single-table persistence for gallery records keyed by id.
pub trait ImageStore: Send + Sync {
    /// Inserts the record, replacing any record with the same id.
    fn put(&self, image: &StoredImage) -> Result<(), StorageError>;

    /// Every record, newest id first.
    fn list_all(&self) -> Result<Vec<StoredImage>, StorageError>;

    /// Removing an id that is not stored succeeds.
    fn delete_by_id(&self, id: i64) -> Result<(), StorageError>;
}

/// JSON table file inside a data directory.
///
/// The directory and table are created on first use. The outcome of that
/// first initialisation is kept for the lifetime of the store, so a failed
/// init keeps reporting `StorageUnavailable` and concurrent first callers
/// wait on the same attempt.
#[derive(Debug)]
pub struct FileImageStore {
    root: Option<PathBuf>,
    table: OnceLock<Result<PathBuf, String>>,
    lock: Mutex<()>,
}

impl FileImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            table: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    /// A store for environments without a usable data directory.
    pub fn unavailable() -> Self {
        Self {
            root: None,
            table: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    fn table_path(&self) -> Result<&Path, StorageError> {
        let outcome = self.table.get_or_init(|| match self.root.as_deref() {
            Some(root) => open_table(root),
            None => Err("no data directory is available".to_string()),
        });
        match outcome {
            Ok(path) => Ok(path.as_path()),
            Err(reason) => Err(StorageError::StorageUnavailable(reason.clone())),
        }
    }

    fn with_table<T>(
        &self,
        op: impl FnOnce(&Path) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let path = self.table_path()?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::StorageOperationFailed("table lock poisoned".to_string()))?;
        op(path)
    }
}

impl ImageStore for FileImageStore {
    fn put(&self, image: &StoredImage) -> Result<(), StorageError> {
        self.with_table(|path| {
            let mut rows = read_table(path)?;
            rows.insert(image.id, image.clone());
            write_table(path, &rows)
        })
    }

    fn list_all(&self) -> Result<Vec<StoredImage>, StorageError> {
        self.with_table(|path| Ok(sorted_newest_first(read_table(path)?)))
    }

    fn delete_by_id(&self, id: i64) -> Result<(), StorageError> {
        self.with_table(|path| {
            let mut rows = read_table(path)?;
            if rows.remove(&id).is_none() {
                return Ok(());
            }
            write_table(path, &rows)
        })
    }
}

/// In-process table with the same contract as [`FileImageStore`].
#[derive(Debug, Default)]
pub struct MemoryImageStore {
    rows: Mutex<BTreeMap<i64, StoredImage>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<i64, StoredImage>>, StorageError> {
        self.rows
            .lock()
            .map_err(|_| StorageError::StorageOperationFailed("table lock poisoned".to_string()))
    }
}

impl ImageStore for MemoryImageStore {
    fn put(&self, image: &StoredImage) -> Result<(), StorageError> {
        self.rows()?.insert(image.id, image.clone());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<StoredImage>, StorageError> {
        Ok(sorted_newest_first(self.rows()?.clone()))
    }

    fn delete_by_id(&self, id: i64) -> Result<(), StorageError> {
        self.rows()?.remove(&id);
        Ok(())
    }
}

fn sorted_newest_first(rows: BTreeMap<i64, StoredImage>) -> Vec<StoredImage> {
    rows.into_values().rev().collect()
}

fn open_table(root: &Path) -> Result<PathBuf, String> {
    std::fs::create_dir_all(root)
        .map_err(|err| format!("cannot create {}: {err}", root.display()))?;
    let path = root.join(TABLE_FILE_NAME);
    if !path.exists() {
        std::fs::write(&path, "{}")
            .map_err(|err| format!("cannot create {}: {err}", path.display()))?;
        tracing::debug!(table = %path.display(), "created gallery table");
    }
    Ok(path)
}

fn read_table(path: &Path) -> Result<BTreeMap<i64, StoredImage>, StorageError> {
    let raw = std::fs::read_to_string(path).map_err(|err| StorageError::failed("read", err))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let parsed: Map<String, Value> =
        serde_json::from_str(&raw).map_err(|err| StorageError::failed("parse", err))?;
    let mut rows = BTreeMap::new();
    for (key, value) in parsed {
        let record: StoredImage = serde_json::from_value(value)
            .map_err(|err| StorageError::failed(&format!("record {key}"), err))?;
        rows.insert(record.id, record);
    }
    Ok(rows)
}

fn write_table(path: &Path, rows: &BTreeMap<i64, StoredImage>) -> Result<(), StorageError> {
    let mut payload = Map::new();
    for (id, record) in rows {
        let value = serde_json::to_value(record).map_err(|err| StorageError::failed("encode", err))?;
        payload.insert(id.to_string(), value);
    }
    let text = serde_json::to_string_pretty(&Value::Object(payload))
        .map_err(|err| StorageError::failed("encode", err))?;
    std::fs::write(path, text).map_err(|err| StorageError::failed("write", err))
}
