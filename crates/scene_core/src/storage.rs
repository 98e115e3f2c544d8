//! Scene persistence seam and the stored record

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{MessageId, UserId};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Scene record not found for user {0}")]
    NotFound(UserId),

    #[error("Scene record already exists for user {0}")]
    AlreadyExists(UserId),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// One persisted scene, keyed by user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub user_id: UserId,
    /// Registered name of the scene type, used to rebuild the scene on restore.
    pub scene_type: String,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub message_id: Option<MessageId>,
    /// JSON blob: page name -> key -> value.
    #[serde(default = "empty_blob")]
    pub data: String,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn empty_blob() -> String {
    "{}".to_string()
}

/// Partial update of a stored record. `None` leaves a field unchanged;
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneRecordPatch {
    pub scene_type: Option<String>,
    pub page: Option<Option<String>>,
    pub message_id: Option<Option<MessageId>>,
    pub data: Option<String>,
}

impl SceneRecordPatch {
    pub fn apply(self, record: &mut SceneRecord) {
        if let Some(scene_type) = self.scene_type {
            record.scene_type = scene_type;
        }
        if let Some(page) = self.page {
            record.page = page;
        }
        if let Some(message_id) = self.message_id {
            record.message_id = message_id;
        }
        if let Some(data) = self.data {
            record.data = data;
        }
        record.updated_at = Utc::now();
    }
}

impl From<SceneRecord> for SceneRecordPatch {
    fn from(record: SceneRecord) -> Self {
        Self {
            scene_type: Some(record.scene_type),
            page: Some(record.page),
            message_id: Some(record.message_id),
            data: Some(record.data),
        }
    }
}

/// Storage callbacks a scene type persists through.
#[async_trait]
pub trait SceneStorage: Send + Sync {
    /// Store a record for a user seen for the first time.
    async fn insert(&self, user_id: UserId, record: &SceneRecord) -> Result<(), StorageError>;

    /// Load the record of a user, if any.
    async fn load(&self, user_id: UserId) -> Result<Option<SceneRecord>, StorageError>;

    /// Apply a partial update to an existing record.
    async fn update(&self, user_id: UserId, patch: SceneRecordPatch) -> Result<(), StorageError>;

    /// Delete the record of a user. Missing records are not an error.
    async fn delete(&self, user_id: UserId) -> Result<(), StorageError>;

    /// Every stored record, used to resume scenes at startup.
    async fn load_all(&self) -> Result<Vec<SceneRecord>, StorageError>;
}
