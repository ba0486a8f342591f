use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::store::{ImageStore, StorageError};
use crate::images::StoredImage;

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Gallery semantics over an [`ImageStore`].
///
/// Every mutation answers with a fresh read of the store, so callers never
/// patch their own copy of the list. Ids are never handed out twice by one
/// manager, even after the newest record is deleted.
pub struct GalleryManager {
    store: Arc<dyn ImageStore>,
    clock: Clock,
    last_issued: AtomicI64,
}

impl GalleryManager {
    pub fn new(store: Arc<dyn ImageStore>) -> Self {
        Self {
            store,
            clock: Box::new(|| chrono::Utc::now().timestamp_millis()),
            last_issued: AtomicI64::new(i64::MIN),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn list(&self) -> Result<Vec<StoredImage>, StorageError> {
        self.store.list_all()
    }

    pub fn contains(&self, payload: &str) -> Result<bool, StorageError> {
        Ok(self.list()?.iter().any(|image| image.payload == payload))
    }

    pub fn save(&self, payload: &str) -> Result<Vec<StoredImage>, StorageError> {
        let current = self.list()?;
        if current.iter().any(|image| image.payload == payload) {
            tracing::debug!("payload already in gallery; skipping insert");
            return Ok(current);
        }

        let newest = current.first().map(|image| image.id);
        let last_issued =
            Some(self.last_issued.load(Ordering::SeqCst)).filter(|id| *id != i64::MIN);
        let id = next_id((self.clock)(), newest.max(last_issued));
        self.last_issued.fetch_max(id, Ordering::SeqCst);
        self.store.put(&StoredImage::new(id, payload))?;
        tracing::info!(id, "saved image to gallery");
        self.list()
    }

    pub fn delete(&self, id: i64) -> Result<Vec<StoredImage>, StorageError> {
        self.store.delete_by_id(id)?;
        tracing::info!(id, "deleted image from gallery");
        self.list()
    }
}

fn next_id(now: i64, newest: Option<i64>) -> i64 {
    match newest {
        Some(newest) if newest >= now => newest + 1,
        _ => now,
    }
}
