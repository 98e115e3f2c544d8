//! SceneManager - the process-wide user -> scene registry
//!
//! Constructed once at startup and handed to the router and to whatever else
//! needs to reach other users' scenes. Cloning is cheap; clones share state.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use scene_core::{MessageId, SceneRecord, Transport, UserId};
use tracing::{debug, info, warn};

use crate::definition::SceneRegistry;
use crate::error::{Result, SceneError};
use crate::scene::Scene;

pub(crate) struct ManagerInner {
    registry: SceneRegistry,
    scenes: DashMap<UserId, Arc<Scene>>,
}

impl ManagerInner {
    /// Drop `scene` from the map unless it was already replaced.
    pub(crate) fn unregister(&self, scene: &Scene) {
        self.scenes
            .remove_if(&scene.user_id(), |_, current| std::ptr::eq(Arc::as_ptr(current), scene));
    }
}

#[derive(Clone)]
pub struct SceneManager {
    inner: Arc<ManagerInner>,
}

impl SceneManager {
    pub fn new(registry: SceneRegistry) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry,
                scenes: DashMap::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.inner.registry
    }

    /// Create a fresh scene for `user_id`, replacing any registered one.
    ///
    /// The replaced scene is not ended; call `Scene::end` first when its
    /// message and record should go away.
    pub fn create_scene(
        &self,
        user_id: UserId,
        scene_type: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Scene>> {
        let definition = self
            .inner
            .registry
            .get(scene_type)
            .ok_or_else(|| SceneError::UnknownSceneType(scene_type.to_string()))?;

        let scene = Arc::new(Scene::new(
            user_id,
            definition,
            transport,
            Arc::downgrade(&self.inner),
        ));
        if self.inner.scenes.insert(user_id, Arc::clone(&scene)).is_some() {
            debug!(user_id, scene_type, "replaced existing scene");
        }
        info!(user_id, scene_type, "scene created");
        Ok(scene)
    }

    /// Restore a stored scene as it was, without running any entry hook.
    pub fn load_scene_from_db(
        &self,
        user_id: UserId,
        scene_type: &str,
        page: Option<String>,
        message_id: Option<MessageId>,
        data: &str,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Scene>> {
        let definition = self
            .inner
            .registry
            .get(scene_type)
            .ok_or_else(|| SceneError::UnknownSceneType(scene_type.to_string()))?;

        if let Some(page) = &page {
            if !definition.declares(page) {
                return Err(SceneError::UnknownPage {
                    scene: scene_type.to_string(),
                    page: page.clone(),
                });
            }
        }

        let data = parse_blob(data)?;
        let scene = Arc::new(Scene::restored(
            user_id,
            definition,
            transport,
            Arc::downgrade(&self.inner),
            page,
            message_id,
            data,
        ));
        self.inner.scenes.insert(user_id, Arc::clone(&scene));
        debug!(user_id, scene_type, "scene restored");
        Ok(scene)
    }

    pub fn load_scene_from_record(
        &self,
        record: SceneRecord,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Scene>> {
        self.load_scene_from_db(
            record.user_id,
            &record.scene_type,
            record.page,
            record.message_id,
            &record.data,
            transport,
        )
    }

    /// Restore every stored scene of every registered type.
    ///
    /// Records that cannot be restored are logged and skipped.
    pub async fn restore_all(&self, transport: Arc<dyn Transport>) -> Result<usize> {
        let mut restored = 0;
        for definition in self.inner.registry.definitions() {
            let records = definition.storage().load_all().await?;
            for record in records {
                if record.scene_type != definition.name() {
                    continue;
                }
                let user_id = record.user_id;
                match self.load_scene_from_record(record, Arc::clone(&transport)) {
                    Ok(_) => restored += 1,
                    Err(e) => warn!(user_id, "skipping stored scene: {}", e),
                }
            }
        }
        info!(restored, "scenes restored from storage");
        Ok(restored)
    }

    pub fn get_scene(&self, user_id: UserId) -> Option<Arc<Scene>> {
        self.inner.scenes.get(&user_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn has_scene(&self, user_id: UserId) -> bool {
        self.inner.scenes.contains_key(&user_id)
    }

    /// Unregister without touching the message or the stored record.
    pub fn remove_scene(&self, user_id: UserId) -> Option<Arc<Scene>> {
        self.inner.scenes.remove(&user_id).map(|(_, scene)| scene)
    }

    pub fn len(&self) -> usize {
        self.inner.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.scenes.is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<Scene>> {
        self.inner
            .scenes
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Every scene of `scene_type` currently on `page`.
    pub async fn get_for_params(&self, scene_type: &str, page: &str) -> Vec<Arc<Scene>> {
        let mut found = Vec::new();
        for scene in self.snapshot() {
            if scene.scene_type() != scene_type {
                continue;
            }
            if scene.page().await.as_deref() == Some(page) {
                found.push(scene);
            }
        }
        found
    }

    /// Like `get_for_params`, without `user_id`'s own scene.
    pub async fn get_for_params_except(
        &self,
        user_id: UserId,
        scene_type: &str,
        page: &str,
    ) -> Vec<Arc<Scene>> {
        let mut found = self.get_for_params(scene_type, page).await;
        found.retain(|scene| scene.user_id() != user_id);
        found
    }

    /// Re-render every scene on `(scene_type, page)`. Returns how many refreshed.
    pub async fn refresh_page(&self, scene_type: &str, page: &str) -> Result<usize> {
        let scenes = self.get_for_params(scene_type, page).await;
        let mut refreshed = 0;
        for scene in scenes {
            match scene.update_message().await {
                Ok(()) => refreshed += 1,
                Err(e) => warn!(user_id = scene.user_id(), page, "bulk refresh failed: {}", e),
            }
        }
        Ok(refreshed)
    }

    /// Move every scene on `(scene_type, from)` to `to`. Returns how many entered.
    pub async fn move_page(&self, scene_type: &str, from: &str, to: &str) -> Result<usize> {
        let scenes = self.get_for_params(scene_type, from).await;
        let mut moved = 0;
        for scene in scenes {
            match scene.update_page(to).await {
                Ok(crate::scene::PageChange::Entered) => moved += 1,
                Ok(crate::scene::PageChange::Denied) => {}
                Err(e @ SceneError::UnknownPage { .. }) => return Err(e),
                Err(e) => warn!(user_id = scene.user_id(), to, "bulk move failed: {}", e),
            }
        }
        Ok(moved)
    }
}

fn parse_blob(data: &str) -> Result<Map<String, Value>> {
    if data.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(data)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(SceneError::InvalidData(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_and_object_blobs() {
        assert!(parse_blob("").unwrap().is_empty());
        assert!(parse_blob("null").unwrap().is_empty());
        let map = parse_blob(r#"{"main-page": {"visits": 2}}"#).unwrap();
        assert_eq!(map["main-page"]["visits"], 2);
    }

    #[test]
    fn rejects_non_object_blobs() {
        assert!(parse_blob("[1, 2]").is_err());
        assert!(parse_blob("{not json").is_err());
    }
}
