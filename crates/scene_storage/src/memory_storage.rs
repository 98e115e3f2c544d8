//! In-memory scene storage

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use scene_core::{SceneRecord, SceneRecordPatch, SceneStorage, StorageError, UserId};

/// Keeps records in a map. Counts writes so callers can observe persistence.
#[derive(Debug, Default)]
pub struct MemorySceneStorage {
    records: DashMap<UserId, SceneRecord>,
    inserts: AtomicUsize,
    updates: AtomicUsize,
}

impl MemorySceneStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with `records`, as if saved by an earlier process.
    pub fn with_records(records: impl IntoIterator<Item = SceneRecord>) -> Self {
        let storage = Self::new();
        for record in records {
            storage.records.insert(record.user_id, record);
        }
        storage
    }

    pub fn get(&self, user_id: UserId) -> Option<SceneRecord> {
        self.records.get(&user_id).map(|entry| entry.value().clone())
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SceneStorage for MemorySceneStorage {
    async fn insert(&self, user_id: UserId, record: &SceneRecord) -> Result<(), StorageError> {
        if self.records.contains_key(&user_id) {
            return Err(StorageError::AlreadyExists(user_id));
        }
        self.records.insert(user_id, record.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, user_id: UserId) -> Result<Option<SceneRecord>, StorageError> {
        Ok(self.get(user_id))
    }

    async fn update(&self, user_id: UserId, patch: SceneRecordPatch) -> Result<(), StorageError> {
        let mut entry = self
            .records
            .get_mut(&user_id)
            .ok_or(StorageError::NotFound(user_id))?;
        patch.apply(entry.value_mut());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StorageError> {
        self.records.remove(&user_id);
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<SceneRecord>, StorageError> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.user_id);
        Ok(records)
    }
}
