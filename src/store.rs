//! Record store façade: the async CRUD seam every component above it
//! consumes, plus the two in-repo implementations.
//!
//! The store is the only state shared across workers; it must tolerate
//! concurrent independent calls from several processes without the server
//! imposing its own locking. `MemoryStore` is the per-process dev/test
//! default; `FileStore` keeps a collection as a JSON array on disk and is
//! the in-repo option for sharing state between sibling workers.

use crate::error::{Error, Result};
use crate::protocol::{Record, RecordId};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Async CRUD over one ordered collection of records.
///
/// Insertion order is the canonical display order. Identifiers are assigned
/// on create and never reused within a process lifetime, even after the
/// record is deleted.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record, assigning the next identifier.
    async fn create(&self, fields: Map<String, Value>) -> Result<Record>;

    /// Fetch one record.
    async fn get(&self, id: RecordId) -> Result<Option<Record>>;

    /// Full ordered snapshot.
    async fn all(&self) -> Result<Vec<Record>>;

    /// Replace the fields of an existing record, keeping its position.
    /// Fails with [`Error::NotFound`] if the id does not exist.
    async fn update(&self, id: RecordId, fields: Map<String, Value>) -> Result<Record>;

    /// Remove a record. Fails with [`Error::NotFound`] if the id does not
    /// exist.
    async fn delete(&self, id: RecordId) -> Result<()>;

    /// Remove every record. The id counter is not reset.
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    next_id: RecordId,
    records: Vec<Record>,
}

/// In-process store backed by an ordered `Vec`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, fields: Map<String, Value>) -> Result<Record> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let record = Record { id: inner.next_id, fields };
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        Ok(self.inner.lock().records.iter().find(|r| r.id == id).cloned())
    }

    async fn all(&self) -> Result<Vec<Record>> {
        Ok(self.inner.lock().records.clone())
    }

    async fn update(&self, id: RecordId, fields: Map<String, Value>) -> Result<Record> {
        let mut inner = self.inner.lock();
        let record = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::NotFound(id))?;
        record.fields = fields;
        Ok(record.clone())
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        let mut inner = self.inner.lock();
        let len = inner.records.len();
        inner.records.retain(|r| r.id != id);
        if inner.records.len() == len {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.inner.lock().records.clear();
        Ok(())
    }
}

// ============================================================================
// FileStore
// ============================================================================

/// Store backed by a JSON array file.
///
/// A missing file reads as an empty collection. The id high-water mark is
/// tracked in-process so identifiers are not reused after deleting the
/// newest record.
pub struct FileStore {
    path: PathBuf,
    /// Guards read-modify-write cycles; holds the highest id seen.
    high_water: tokio::sync::Mutex<RecordId>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), high_water: tokio::sync::Mutex::new(0) }
    }

    async fn load(&self) -> Result<Vec<Record>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::StoreUnavailable(format!("{}: {e}", self.path.display()))),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn persist(&self, records: &[Record]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| Error::StoreUnavailable(format!("{}: {e}", self.path.display())))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn create(&self, fields: Map<String, Value>) -> Result<Record> {
        let mut high = self.high_water.lock().await;
        let mut records = self.load().await?;
        let file_max = records.iter().map(|r| r.id).max().unwrap_or(0);
        *high = (*high).max(file_max) + 1;
        let record = Record { id: *high, fields };
        records.push(record.clone());
        self.persist(&records).await?;
        Ok(record)
    }

    async fn get(&self, id: RecordId) -> Result<Option<Record>> {
        let _guard = self.high_water.lock().await;
        Ok(self.load().await?.into_iter().find(|r| r.id == id))
    }

    async fn all(&self) -> Result<Vec<Record>> {
        let _guard = self.high_water.lock().await;
        self.load().await
    }

    async fn update(&self, id: RecordId, fields: Map<String, Value>) -> Result<Record> {
        let _guard = self.high_water.lock().await;
        let mut records = self.load().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::NotFound(id))?;
        record.fields = fields;
        let updated = record.clone();
        self.persist(&records).await?;
        Ok(updated)
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        let _guard = self.high_water.lock().await;
        let mut records = self.load().await?;
        let len = records.len();
        records.retain(|r| r.id != id);
        if records.len() == len {
            return Err(Error::NotFound(id));
        }
        self.persist(&records).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.high_water.lock().await;
        self.persist(&[]).await
    }
}
