//! Shared fixtures: a recording transport and a small game scene

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scene_manager::scene_core::{
    ButtonSpec, CallbackEvent, Keyboard, MessageId, SceneStorage, TextEvent, Transport,
    TransportError, UserId,
};
use scene_manager::{
    CorrelationKey, HandlerTable, Page, PageGuard, Result, Scene, SceneDefinition, SceneManager,
    SceneRegistry, TextInput, TextKind,
};
use scene_storage::MemorySceneStorage;

pub const GAME: &str = "game";
pub const LOBBY: &str = "lobby";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SendText { user: UserId, id: MessageId, text: String },
    SendPhoto { user: UserId, id: MessageId, image: String, caption: String },
    EditText { id: MessageId, text: String },
    EditPhoto { id: MessageId, image: String },
    Delete { id: MessageId },
    Answer { callback: String, text: Option<String> },
}

#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
    pub image: Option<String>,
    pub keyboard: Option<Keyboard>,
}

#[derive(Default)]
struct TransportState {
    next_id: MessageId,
    messages: HashMap<MessageId, Message>,
    calls: Vec<Call>,
}

/// Transport that keeps messages in memory and records every call.
#[derive(Default)]
pub struct RecordingTransport {
    state: Mutex<TransportState>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.state.lock().unwrap().messages.get(&id).cloned()
    }

    pub fn live_messages(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    /// Simulate the user deleting a message on their side.
    pub fn forget(&self, id: MessageId) {
        self.state.lock().unwrap().messages.remove(&id);
    }

    fn store(&self, message: Message) -> MessageId {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        state.messages.insert(id, message);
        id
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(
        &self,
        user_id: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> std::result::Result<MessageId, TransportError> {
        let id = self.store(Message {
            text: text.to_string(),
            image: None,
            keyboard: keyboard.cloned(),
        });
        self.state.lock().unwrap().calls.push(Call::SendText {
            user: user_id,
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn edit_text(
        &self,
        _chat_id: UserId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(&message_id)
            .ok_or(TransportError::MessageNotFound(message_id))?;
        if message.image.is_some() {
            return Err(TransportError::KindMismatch(message_id));
        }
        message.text = text.to_string();
        message.keyboard = keyboard.cloned();
        state.calls.push(Call::EditText {
            id: message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        user_id: UserId,
        image: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> std::result::Result<MessageId, TransportError> {
        let id = self.store(Message {
            text: caption.to_string(),
            image: Some(image.to_string()),
            keyboard: keyboard.cloned(),
        });
        self.state.lock().unwrap().calls.push(Call::SendPhoto {
            user: user_id,
            id,
            image: image.to_string(),
            caption: caption.to_string(),
        });
        Ok(id)
    }

    async fn edit_photo(
        &self,
        _chat_id: UserId,
        message_id: MessageId,
        image: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(&message_id)
            .ok_or(TransportError::MessageNotFound(message_id))?;
        if message.image.is_none() {
            return Err(TransportError::KindMismatch(message_id));
        }
        message.image = Some(image.to_string());
        message.text = caption.to_string();
        message.keyboard = keyboard.cloned();
        state.calls.push(Call::EditPhoto {
            id: message_id,
            image: image.to_string(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        _chat_id: UserId,
        message_id: MessageId,
    ) -> std::result::Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Delete { id: message_id });
        state
            .messages
            .remove(&message_id)
            .map(|_| ())
            .ok_or(TransportError::MessageNotFound(message_id))
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> std::result::Result<(), TransportError> {
        self.state.lock().unwrap().calls.push(Call::Answer {
            callback: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

// ========== Pages ==========

pub struct HomePage;

#[async_trait]
impl Page for HomePage {
    const NAME: &'static str = "home";

    fn template(&self) -> &str {
        "Home"
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(vec![
            scene.navigate_button("Profile", ProfilePage::NAME)?,
            scene.navigate_button("Map", MapPage::NAME)?,
        ])
    }
}

/// Counts entries and keeps a name with a default.
pub struct ProfilePage;

impl ProfilePage {
    async fn rename(&self, scene: &Scene, _event: &CallbackEvent, args: &[String]) -> Result<()> {
        let Some(name) = args.first() else {
            return Ok(());
        };
        scene.update_key(Self::NAME, "name", name).await?;
        scene.update_message().await
    }

    async fn on_name(&self, scene: &Scene, _event: &TextEvent, input: TextInput) -> Result<()> {
        scene.update_key(Self::NAME, "name", input.as_text()).await?;
        scene.update_message().await
    }

    async fn on_age(&self, scene: &Scene, _event: &TextEvent, input: TextInput) -> Result<()> {
        scene.update_key(Self::NAME, "age", input.as_int()).await?;
        scene.update_message().await
    }
}

#[async_trait]
impl Page for ProfilePage {
    const NAME: &'static str = "profile";

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers
            .on_callback("rename", |page, scene, event, args| {
                Box::pin(page.rename(scene, event, args))
            })?
            .on_text(TextKind::Str, |page, scene, event, input| {
                Box::pin(page.on_name(scene, event, input))
            })?
            .on_text(TextKind::Int, |page, scene, event, input| {
                Box::pin(page.on_age(scene, event, input))
            })?;
        Ok(())
    }

    async fn prepare_data(&self, scene: &Scene) -> Result<()> {
        if scene.get_key(Self::NAME, "name").await.is_none() {
            scene.update_key(Self::NAME, "name", "anon").await?;
        }
        let entries: i64 = scene.get_key_as(Self::NAME, "entries").await.unwrap_or(0);
        scene.update_key(Self::NAME, "entries", entries + 1).await
    }

    async fn content(&self, scene: &Scene) -> Result<String> {
        let name: String = scene
            .get_key_as(Self::NAME, "name")
            .await
            .unwrap_or_default();
        Ok(format!("Profile of {}", name))
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(vec![
            ButtonSpec::new("Bob", scene.callback("rename", &["bob"])?),
            scene.navigate_button("Back", HomePage::NAME)?.alone(),
        ])
    }
}

/// Guarded page: one member per team, shared with the market.
pub struct MapPage;

#[async_trait]
impl Page for MapPage {
    const NAME: &'static str = "map";

    fn template(&self) -> &str {
        "Map"
    }

    fn guard(&self) -> Option<PageGuard> {
        Some(
            PageGuard::new(CorrelationKey::new(HomePage::NAME, "team"))
                .blocked_with([MarketPage::NAME])
                .with_denial("Busy"),
        )
    }
}

pub struct MarketPage;

#[async_trait]
impl Page for MarketPage {
    const NAME: &'static str = "market";

    fn template(&self) -> &str {
        "Market"
    }
}

pub struct PhotoPage;

#[async_trait]
impl Page for PhotoPage {
    const NAME: &'static str = "photo";

    fn template(&self) -> &str {
        "A cat"
    }

    fn image(&self) -> Option<String> {
        Some("cat.png".to_string())
    }
}

/// Only a wildcard text handler.
pub struct WildPage;

impl WildPage {
    async fn on_any(&self, scene: &Scene, _event: &TextEvent, input: TextInput) -> Result<()> {
        scene.update_key(Self::NAME, "last", input.as_text()).await
    }
}

#[async_trait]
impl Page for WildPage {
    const NAME: &'static str = "wild";

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers.on_text(TextKind::All, |page, scene, event, input| {
            Box::pin(page.on_any(scene, event, input))
        })?;
        Ok(())
    }
}

/// Read-modify-write across a yield point.
pub struct CounterPage;

impl CounterPage {
    async fn bump(&self, scene: &Scene, _event: &CallbackEvent, _args: &[String]) -> Result<()> {
        let n: i64 = scene.get_key_as(Self::NAME, "n").await.unwrap_or(0);
        tokio::task::yield_now().await;
        scene.update_key(Self::NAME, "n", n + 1).await
    }
}

#[async_trait]
impl Page for CounterPage {
    const NAME: &'static str = "counter";

    fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
        handlers.on_callback("bump", |page, scene, event, args| {
            Box::pin(page.bump(scene, event, args))
        })?;
        Ok(())
    }
}

pub struct LobbyPage;

#[async_trait]
impl Page for LobbyPage {
    const NAME: &'static str = "lobby-main";

    fn template(&self) -> &str {
        "Lobby"
    }
}

pub struct Fixture {
    pub manager: SceneManager,
    pub transport: Arc<RecordingTransport>,
    pub storage: Arc<MemorySceneStorage>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_storage(MemorySceneStorage::new())
    }

    pub fn with_storage(storage: MemorySceneStorage) -> Self {
        let storage = Arc::new(storage);
        let shared: Arc<dyn SceneStorage> = storage.clone();

        let game = SceneDefinition::builder(GAME, Arc::clone(&shared))
            .page(|| HomePage)
            .page(|| ProfilePage)
            .page(|| MapPage)
            .page(|| MarketPage)
            .page(|| PhotoPage)
            .page(|| WildPage)
            .page(|| CounterPage)
            .build()
            .unwrap();
        let lobby = SceneDefinition::builder(LOBBY, shared)
            .page(|| LobbyPage)
            .build()
            .unwrap();

        let mut registry = SceneRegistry::new();
        registry.register(game).unwrap();
        registry.register(lobby).unwrap();

        Self {
            manager: SceneManager::new(registry),
            transport: RecordingTransport::new(),
            storage,
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub fn create(&self, user_id: UserId) -> Arc<Scene> {
        self.manager
            .create_scene(user_id, GAME, self.transport())
            .unwrap()
    }

    /// Create a scene and put it in `team`.
    pub async fn member(&self, user_id: UserId, team: &str) -> Arc<Scene> {
        let scene = self.create(user_id);
        scene.start(None).await.unwrap();
        scene.update_key(HomePage::NAME, "team", team).await.unwrap();
        scene
    }
}

pub fn callback(user_id: UserId, data: &str) -> CallbackEvent {
    CallbackEvent {
        id: format!("cb-{}", user_id),
        user_id,
        message_id: None,
        data: data.to_string(),
    }
}

pub fn text(user_id: UserId, body: &str) -> TextEvent {
    TextEvent {
        user_id,
        message_id: 100,
        text: body.to_string(),
    }
}
