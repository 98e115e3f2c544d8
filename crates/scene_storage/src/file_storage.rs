//! File-based scene storage

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use scene_core::{SceneRecord, SceneRecordPatch, SceneStorage, StorageError, UserId};
use tokio::fs;
use tracing::warn;

/// Stores each scene record as `<base_path>/<user_id>.json`.
#[derive(Debug, Clone)]
pub struct FileSceneStorage {
    base_path: PathBuf,
}

impl FileSceneStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn record_path(&self, user_id: UserId) -> PathBuf {
        self.base_path.join(format!("{}.json", user_id))
    }

    async fn read(&self, path: &Path) -> Result<SceneRecord, StorageError> {
        let contents = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&contents)?)
    }

    async fn write(&self, record: &SceneRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_path).await?;
        let contents = serde_json::to_string_pretty(record)?;
        fs::write(self.record_path(record.user_id), contents).await?;
        Ok(())
    }
}

#[async_trait]
impl SceneStorage for FileSceneStorage {
    async fn insert(&self, user_id: UserId, record: &SceneRecord) -> Result<(), StorageError> {
        if self.record_path(user_id).exists() {
            return Err(StorageError::AlreadyExists(user_id));
        }
        self.write(record).await
    }

    async fn load(&self, user_id: UserId) -> Result<Option<SceneRecord>, StorageError> {
        let path = self.record_path(user_id);
        if !path.exists() {
            return Ok(None);
        }
        self.read(&path).await.map(Some)
    }

    async fn update(&self, user_id: UserId, patch: SceneRecordPatch) -> Result<(), StorageError> {
        let path = self.record_path(user_id);
        if !path.exists() {
            return Err(StorageError::NotFound(user_id));
        }
        let mut record = self.read(&path).await?;
        patch.apply(&mut record);
        self.write(&record).await
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StorageError> {
        match fs::remove_file(self.record_path(user_id)).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn load_all(&self) -> Result<Vec<SceneRecord>, StorageError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping unreadable scene record {:?}: {}", path, e),
            }
        }
        records.sort_by_key(|record| record.user_id);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn record(user_id: UserId) -> SceneRecord {
        SceneRecord {
            user_id,
            scene_type: "demo".to_string(),
            page: Some("main-page".to_string()),
            message_id: Some(1),
            data: r#"{"main-page":{"visits":1}}"#.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_load() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path());

        storage.insert(1, &record(1)).await.unwrap();
        let loaded = storage.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.page.as_deref(), Some("main-page"));
        assert_eq!(loaded.data, r#"{"main-page":{"visits":1}}"#);
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path().join("not-created-yet"));
        assert!(storage.load(42).await.unwrap().is_none());
        assert!(storage.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_twice_fails() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path());
        storage.insert(1, &record(1)).await.unwrap();
        assert!(matches!(
            storage.insert(1, &record(1)).await,
            Err(StorageError::AlreadyExists(1))
        ));
    }

    #[tokio::test]
    async fn update_merges_patch() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path());
        storage.insert(1, &record(1)).await.unwrap();

        storage
            .update(
                1,
                SceneRecordPatch {
                    message_id: Some(Some(9)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = storage.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.message_id, Some(9));
        assert_eq!(loaded.page.as_deref(), Some("main-page"));
    }

    #[tokio::test]
    async fn update_can_clear_page_and_message() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path());
        storage.insert(1, &record(1)).await.unwrap();

        storage
            .update(
                1,
                SceneRecordPatch {
                    page: Some(None),
                    message_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = storage.load(1).await.unwrap().unwrap();
        assert_eq!(loaded.page, None);
        assert_eq!(loaded.message_id, None);
        assert_eq!(loaded.scene_type, record(1).scene_type);
    }

    #[tokio::test]
    async fn update_missing_fails() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path());
        let result = storage.update(5, SceneRecordPatch::default()).await;
        assert!(matches!(result, Err(StorageError::NotFound(5))));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path());
        storage.insert(1, &record(1)).await.unwrap();

        storage.delete(1).await.unwrap();
        storage.delete(1).await.unwrap();
        assert!(storage.load(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_all_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let storage = FileSceneStorage::new(dir.path());
        storage.insert(2, &record(2)).await.unwrap();
        storage.insert(1, &record(1)).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("broken.json"), "{").unwrap();

        let records = storage.load_all().await.unwrap();
        let users: Vec<_> = records.iter().map(|r| r.user_id).collect();
        assert_eq!(users, vec![1, 2]);
    }
}
