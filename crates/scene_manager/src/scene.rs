//! Scene - one user's conversation
//!
//! A scene owns every page of its type, the name of the current page, the id
//! of the single transport message it renders into, and a JSON data store
//! scoped by page name. State lives behind a `RwLock` that is only held for
//! short synchronous sections, never across transport or storage calls.
//!
//! ```text
//! {no page} --start()--> {page P} --update_page(P')--> {page P'}
//!                          |  ^
//!                          +--+ update_message() (re-render only)
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use scene_core::{
    ButtonSpec, MessageId, RenderPayload, SceneRecord, SceneRecordPatch, Transport, TransportError,
    UserId,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::blocking::{check_access, Access};
use crate::definition::SceneDefinition;
use crate::error::{Result, SceneError};
use crate::manager::{ManagerInner, SceneManager};
use crate::page::PageInstance;
use crate::router::NAVIGATE_HANDLER;

/// Outcome of `update_page`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageChange {
    Entered,
    /// Page blocking refused the transition; the denial text was rendered.
    Denied,
}

#[derive(Debug, Default)]
struct SceneState {
    page: Option<String>,
    message_id: Option<MessageId>,
    /// Whether the owned message is a photo. Unknown after a restore.
    message_has_image: Option<bool>,
    data: Map<String, Value>,
    /// A record for this user exists in storage.
    persisted: bool,
}

pub struct Scene {
    user_id: UserId,
    definition: Arc<SceneDefinition>,
    pages: Vec<PageInstance>,
    transport: Arc<dyn Transport>,
    manager: Weak<ManagerInner>,
    state: RwLock<SceneState>,
}

impl Scene {
    pub(crate) fn new(
        user_id: UserId,
        definition: Arc<SceneDefinition>,
        transport: Arc<dyn Transport>,
        manager: Weak<ManagerInner>,
    ) -> Self {
        let pages = definition.instantiate_pages();
        Self {
            user_id,
            definition,
            pages,
            transport,
            manager,
            state: RwLock::new(SceneState::default()),
        }
    }

    pub(crate) fn restored(
        user_id: UserId,
        definition: Arc<SceneDefinition>,
        transport: Arc<dyn Transport>,
        manager: Weak<ManagerInner>,
        page: Option<String>,
        message_id: Option<MessageId>,
        data: Map<String, Value>,
    ) -> Self {
        let mut scene = Self::new(user_id, definition, transport, manager);
        scene.state = RwLock::new(SceneState {
            page,
            message_id,
            message_has_image: None,
            data,
            persisted: true,
        });
        scene
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn scene_type(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &Arc<SceneDefinition> {
        &self.definition
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Handle to the manager this scene is registered with.
    pub fn manager(&self) -> Option<SceneManager> {
        self.manager.upgrade().map(SceneManager::from_inner)
    }

    pub fn pages(&self) -> &[PageInstance] {
        &self.pages
    }

    pub fn page_instance(&self, name: &str) -> Option<&PageInstance> {
        self.pages.iter().find(|page| page.name() == name)
    }

    /// Name of the current page.
    pub async fn page(&self) -> Option<String> {
        self.state.read().await.page.clone()
    }

    pub async fn current_page(&self) -> Option<&PageInstance> {
        let name = self.page().await?;
        self.page_instance(&name)
    }

    pub async fn message_id(&self) -> Option<MessageId> {
        self.state.read().await.message_id
    }

    // ========== Data ==========

    /// All data of a page. Empty when the page has none yet.
    pub async fn get_data(&self, page: &str) -> Map<String, Value> {
        let state = self.state.read().await;
        match state.data.get(page) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Replace all data of a page and persist.
    pub async fn set_data(&self, page: &str, data: Map<String, Value>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.data.insert(page.to_string(), Value::Object(data));
        }
        self.save().await
    }

    pub async fn get_key(&self, page: &str, key: &str) -> Option<Value> {
        let state = self.state.read().await;
        state.data.get(page)?.get(key).cloned()
    }

    /// Typed read; `None` when missing or of another shape.
    pub async fn get_key_as<T: DeserializeOwned>(&self, page: &str, key: &str) -> Option<T> {
        let value = self.get_key(page, key).await?;
        serde_json::from_value(value).ok()
    }

    /// Set one key of a page, creating the page's map on first write, and persist.
    pub async fn update_key<T: Serialize>(&self, page: &str, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        {
            let mut state = self.state.write().await;
            let entry = state
                .data
                .entry(page.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(map) = entry {
                map.insert(key.to_string(), value);
            }
        }
        self.save().await
    }

    /// Whole data blob, as persisted.
    pub async fn data_snapshot(&self) -> Value {
        Value::Object(self.state.read().await.data.clone())
    }

    // ========== Callbacks ==========

    /// Encode a callback addressed to this scene type.
    pub fn callback<A: fmt::Display>(&self, handler: &str, args: &[A]) -> Result<String> {
        Ok(self.definition.codec().encode(self.scene_type(), handler, args)?)
    }

    /// Button that navigates to `page` through the router's reserved handler.
    pub fn navigate_button(&self, label: impl Into<String>, page: &str) -> Result<ButtonSpec> {
        Ok(ButtonSpec::new(label, self.callback(NAVIGATE_HANDLER, &[page])?))
    }

    // ========== Lifecycle ==========

    /// Enter `initial`, or the first declared page.
    pub async fn start(&self, initial: Option<&str>) -> Result<PageChange> {
        let target = initial.unwrap_or_else(|| self.definition.first_page());
        info!(user_id = self.user_id, scene = self.scene_type(), page = target, "starting scene");
        self.update_page(target).await
    }

    /// Transition to `name`, re-running its entry hook even when it is the
    /// current page.
    pub async fn update_page(&self, name: &str) -> Result<PageChange> {
        let page = self
            .page_instance(name)
            .ok_or_else(|| SceneError::UnknownPage {
                scene: self.scene_type().to_string(),
                page: name.to_string(),
            })?;

        if let Some(guard) = page.guard() {
            let access = match self.manager() {
                Some(manager) => check_access(&manager, self, name, &guard).await,
                None => Access::Granted,
            };
            if let Access::Denied { holder, .. } = access {
                info!(user_id = self.user_id, holder, page = name, "page entry denied");
                self.render_denial(&guard.denial).await?;
                self.save().await?;
                return Ok(PageChange::Denied);
            }
        }

        {
            let mut state = self.state.write().await;
            debug!(user_id = self.user_id, from = ?state.page, to = name, "page transition");
            state.page = Some(name.to_string());
        }

        page.prepare_data(self).await?;
        let payload = self.render(page).await?;
        self.reconcile(&payload).await?;
        self.save().await?;
        Ok(PageChange::Entered)
    }

    /// Re-render the current page without running its entry hook.
    pub async fn update_message(&self) -> Result<()> {
        let page = self.current_page().await.ok_or(SceneError::NotStarted)?;
        let payload = self.render(page).await?;
        self.reconcile(&payload).await?;
        self.save().await
    }

    /// Remove the owned message and the stored record, and unregister.
    pub async fn end(&self) -> Result<()> {
        let message_id = {
            let mut state = self.state.write().await;
            state.page = None;
            state.persisted = false;
            state.message_has_image = None;
            state.message_id.take()
        };

        if let Some(message_id) = message_id {
            if let Err(e) = self.transport.delete_message(self.user_id, message_id).await {
                debug!(user_id = self.user_id, message_id, "delete on end failed: {}", e);
            }
        }

        self.definition.storage().delete(self.user_id).await?;

        if let Some(inner) = self.manager.upgrade() {
            inner.unregister(self);
        }
        info!(user_id = self.user_id, scene = self.scene_type(), "scene ended");
        Ok(())
    }

    // ========== Rendering ==========

    /// Compute the payload of `page` without touching the transport.
    pub async fn render(&self, page: &PageInstance) -> Result<RenderPayload> {
        let content = page.content(self).await?;
        let mut buttons = page.buttons(self).await?;
        if let Some(decorator) = self.definition.decorator() {
            decorator.decorate(self, page.name(), &mut buttons).await?;
        }
        Ok(RenderPayload {
            content,
            buttons,
            image: page.image(),
            row_width: page.row_width(),
        })
    }

    async fn render_denial(&self, denial: &str) -> Result<()> {
        let payload = match self.current_page().await {
            Some(page) => {
                let mut payload = self.render(page).await?;
                payload.content = format!("{}\n\n{}", denial, payload.content);
                payload
            }
            None => RenderPayload {
                content: denial.to_string(),
                buttons: Vec::new(),
                image: None,
                row_width: crate::page::DEFAULT_ROW_WIDTH,
            },
        };
        self.reconcile(&payload).await?;
        Ok(())
    }

    /// Make the owned message show `payload`: edit in place when possible,
    /// otherwise delete it and send a new one.
    async fn reconcile(&self, payload: &RenderPayload) -> Result<MessageId> {
        let keyboard = payload.keyboard();
        let keyboard = (!keyboard.is_empty()).then_some(&keyboard);
        let (existing, had_image) = {
            let state = self.state.read().await;
            (state.message_id, state.message_has_image)
        };

        if let Some(message_id) = existing {
            let edited = match (&payload.image, had_image) {
                (None, Some(true)) | (Some(_), Some(false)) => {
                    Err(TransportError::KindMismatch(message_id))
                }
                (None, _) => {
                    self.transport
                        .edit_text(self.user_id, message_id, &payload.content, keyboard)
                        .await
                }
                (Some(image), _) => {
                    self.transport
                        .edit_photo(self.user_id, message_id, image, &payload.content, keyboard)
                        .await
                }
            };

            match edited {
                Ok(()) => {
                    self.state.write().await.message_has_image = Some(payload.has_image());
                    return Ok(message_id);
                }
                Err(e) => {
                    warn!(user_id = self.user_id, message_id, "edit failed, resending: {}", e);
                    if let Err(e) = self.transport.delete_message(self.user_id, message_id).await {
                        debug!(user_id = self.user_id, message_id, "delete failed: {}", e);
                    }
                }
            }
        }

        let message_id = match &payload.image {
            None => {
                self.transport
                    .send_text(self.user_id, &payload.content, keyboard)
                    .await?
            }
            Some(image) => {
                self.transport
                    .send_photo(self.user_id, image, &payload.content, keyboard)
                    .await?
            }
        };

        let mut state = self.state.write().await;
        state.message_id = Some(message_id);
        state.message_has_image = Some(payload.has_image());
        Ok(message_id)
    }

    // ========== Persistence ==========

    /// Record of the current state.
    pub async fn to_record(&self) -> Result<SceneRecord> {
        let state = self.state.read().await;
        Ok(SceneRecord {
            user_id: self.user_id,
            scene_type: self.scene_type().to_string(),
            page: state.page.clone(),
            message_id: state.message_id,
            data: serde_json::to_string(&state.data)?,
            updated_at: Utc::now(),
        })
    }

    /// Insert on the first save, update afterwards.
    pub async fn save(&self) -> Result<()> {
        let record = self.to_record().await?;
        let persisted = self.state.read().await.persisted;
        let storage = self.definition.storage();

        let exists = persisted || storage.load(self.user_id).await?.is_some();
        if exists {
            storage
                .update(self.user_id, SceneRecordPatch::from(record))
                .await?;
        } else {
            storage.insert(self.user_id, &record).await?;
        }

        self.state.write().await.persisted = true;
        Ok(())
    }
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("user_id", &self.user_id)
            .field("scene_type", &self.scene_type())
            .finish()
    }
}
