//! Pages and their handler tables
//!
//! A page is a declarative UI unit: it computes its text and buttons from the
//! scene's data and reacts to two kinds of input, button callbacks (by
//! handler subtype) and free text (by `TextKind`). Handlers are plain
//! function pointers collected into a `HandlerTable` once per page type when
//! the scene definition is built; every page instance shares that table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use scene_core::{ButtonSpec, CallbackEvent, TextEvent};

use crate::blocking::PageGuard;
use crate::error::{Result, SceneError};
use crate::scene::Scene;

pub const DEFAULT_ROW_WIDTH: usize = 3;

/// Handler for a button callback. Receives the decoded arguments, which never
/// include the handler name; handlers must check the length before indexing.
pub type CallbackFn<P> =
    for<'a> fn(&'a P, &'a Scene, &'a CallbackEvent, &'a [String]) -> BoxFuture<'a, Result<()>>;

/// Handler for a free-text message.
pub type TextFn<P> = for<'a> fn(&'a P, &'a Scene, &'a TextEvent, TextInput) -> BoxFuture<'a, Result<()>>;

/// Kinds of text handler a page can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextKind {
    Int,
    Str,
    /// Wildcard, used when no exact handler matches.
    All,
}

impl TextKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextKind::Int => "int",
            TextKind::Str => "str",
            TextKind::All => "all",
        }
    }
}

impl fmt::Display for TextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed free-text input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInput {
    Int(i64),
    Str(String),
}

impl TextInput {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TextInput::Int(value) => Some(*value),
            TextInput::Str(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            TextInput::Int(value) => value.to_string(),
            TextInput::Str(value) => value.clone(),
        }
    }
}

/// Immutable per-type dispatch table.
pub struct HandlerTable<P> {
    page: &'static str,
    callbacks: HashMap<&'static str, CallbackFn<P>>,
    texts: HashMap<TextKind, TextFn<P>>,
}

impl<P: Page> HandlerTable<P> {
    fn new() -> Self {
        Self {
            page: P::NAME,
            callbacks: HashMap::new(),
            texts: HashMap::new(),
        }
    }

    /// Build the table of `P` by running its registration.
    pub fn build() -> Result<Self> {
        let mut table = Self::new();
        P::register(&mut table)?;
        Ok(table)
    }

    /// Register the handler for a callback subtype.
    pub fn on_callback(&mut self, subtype: &'static str, handler: CallbackFn<P>) -> Result<&mut Self> {
        if self.callbacks.insert(subtype, handler).is_some() {
            return Err(SceneError::DuplicateHandler {
                page: self.page,
                subtype: subtype.to_string(),
            });
        }
        Ok(self)
    }

    /// Register the handler for a text kind.
    pub fn on_text(&mut self, kind: TextKind, handler: TextFn<P>) -> Result<&mut Self> {
        if self.texts.insert(kind, handler).is_some() {
            return Err(SceneError::DuplicateHandler {
                page: self.page,
                subtype: kind.to_string(),
            });
        }
        Ok(self)
    }

    pub fn has_callback(&self, subtype: &str) -> bool {
        self.callbacks.contains_key(subtype)
    }

    pub fn has_text(&self, kind: TextKind) -> bool {
        self.texts.contains_key(&kind)
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }
}

/// A page type.
///
/// # Example
///
/// ```rust,ignore
/// struct BetPage;
///
/// impl BetPage {
///     async fn on_amount(&self, scene: &Scene, _event: &TextEvent, input: TextInput) -> Result<()> {
///         scene.update_key(Self::NAME, "bet", input.as_int()).await?;
///         scene.update_message().await
///     }
/// }
///
/// #[async_trait]
/// impl Page for BetPage {
///     const NAME: &'static str = "bet-page";
///
///     fn template(&self) -> &str {
///         "Send your bet"
///     }
///
///     fn register(handlers: &mut HandlerTable<Self>) -> Result<()> {
///         handlers.on_text(TextKind::Int, |page, scene, event, input| {
///             Box::pin(page.on_amount(scene, event, input))
///         })?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Page: Send + Sync + Sized + 'static {
    /// Unique name of the page within its scene.
    const NAME: &'static str;

    /// Static content, rendered by the default `content`.
    fn template(&self) -> &str {
        ""
    }

    fn row_width(&self) -> usize {
        DEFAULT_ROW_WIDTH
    }

    fn image(&self) -> Option<String> {
        None
    }

    /// Exclusive access rule for this page, if it is a shared resource.
    fn guard(&self) -> Option<PageGuard> {
        None
    }

    fn register(_handlers: &mut HandlerTable<Self>) -> Result<()> {
        Ok(())
    }

    /// Runs once per entry into the page, never on refresh. Must only write
    /// defaults for keys that are still missing.
    async fn prepare_data(&self, _scene: &Scene) -> Result<()> {
        Ok(())
    }

    /// Recoverable failures should come back as user-facing text, not errors.
    async fn content(&self, _scene: &Scene) -> Result<String> {
        Ok(self.template().to_string())
    }

    async fn buttons(&self, _scene: &Scene) -> Result<Vec<ButtonSpec>> {
        Ok(Vec::new())
    }
}

#[async_trait]
trait ErasedPage: Send + Sync {
    fn name(&self) -> &'static str;
    fn row_width(&self) -> usize;
    fn image(&self) -> Option<String>;
    fn guard(&self) -> Option<PageGuard>;
    fn has_callback_handler(&self, subtype: &str) -> bool;
    fn has_text_handler(&self, kind: TextKind) -> bool;
    async fn prepare_data(&self, scene: &Scene) -> Result<()>;
    async fn content(&self, scene: &Scene) -> Result<String>;
    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>>;
    async fn handle_callback(
        &self,
        scene: &Scene,
        event: &CallbackEvent,
        subtype: &str,
        args: &[String],
    ) -> Result<bool>;
    async fn handle_text(
        &self,
        scene: &Scene,
        event: &TextEvent,
        kind: TextKind,
        input: TextInput,
    ) -> Result<bool>;
}

struct BoundPage<P: Page> {
    page: P,
    handlers: Arc<HandlerTable<P>>,
}

#[async_trait]
impl<P: Page> ErasedPage for BoundPage<P> {
    fn name(&self) -> &'static str {
        P::NAME
    }

    fn row_width(&self) -> usize {
        self.page.row_width()
    }

    fn image(&self) -> Option<String> {
        self.page.image()
    }

    fn guard(&self) -> Option<PageGuard> {
        self.page.guard()
    }

    fn has_callback_handler(&self, subtype: &str) -> bool {
        self.handlers.has_callback(subtype)
    }

    fn has_text_handler(&self, kind: TextKind) -> bool {
        self.handlers.has_text(kind)
    }

    async fn prepare_data(&self, scene: &Scene) -> Result<()> {
        self.page.prepare_data(scene).await
    }

    async fn content(&self, scene: &Scene) -> Result<String> {
        self.page.content(scene).await
    }

    async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        self.page.buttons(scene).await
    }

    async fn handle_callback(
        &self,
        scene: &Scene,
        event: &CallbackEvent,
        subtype: &str,
        args: &[String],
    ) -> Result<bool> {
        match self.handlers.callbacks.get(subtype) {
            Some(handler) => {
                handler(&self.page, scene, event, args).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn handle_text(
        &self,
        scene: &Scene,
        event: &TextEvent,
        kind: TextKind,
        input: TextInput,
    ) -> Result<bool> {
        let handler = self
            .handlers
            .texts
            .get(&kind)
            .or_else(|| self.handlers.texts.get(&TextKind::All));

        match handler {
            Some(handler) => {
                handler(&self.page, scene, event, input).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// One page of one scene.
pub struct PageInstance {
    inner: Box<dyn ErasedPage>,
}

impl PageInstance {
    pub(crate) fn new<P: Page>(page: P, handlers: Arc<HandlerTable<P>>) -> Self {
        Self {
            inner: Box::new(BoundPage { page, handlers }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    pub fn row_width(&self) -> usize {
        self.inner.row_width()
    }

    pub fn image(&self) -> Option<String> {
        self.inner.image()
    }

    pub fn guard(&self) -> Option<PageGuard> {
        self.inner.guard()
    }

    pub fn has_callback_handler(&self, subtype: &str) -> bool {
        self.inner.has_callback_handler(subtype)
    }

    pub fn has_text_handler(&self, kind: TextKind) -> bool {
        self.inner.has_text_handler(kind)
    }

    pub async fn prepare_data(&self, scene: &Scene) -> Result<()> {
        self.inner.prepare_data(scene).await
    }

    pub async fn content(&self, scene: &Scene) -> Result<String> {
        self.inner.content(scene).await
    }

    pub async fn buttons(&self, scene: &Scene) -> Result<Vec<ButtonSpec>> {
        self.inner.buttons(scene).await
    }

    /// Dispatch a callback. Returns `false` when no handler matches.
    pub async fn handle_callback(
        &self,
        scene: &Scene,
        event: &CallbackEvent,
        subtype: &str,
        args: &[String],
    ) -> Result<bool> {
        self.inner.handle_callback(scene, event, subtype, args).await
    }

    /// Dispatch text to the exact handler, else the wildcard, else nothing.
    pub async fn handle_text(
        &self,
        scene: &Scene,
        event: &TextEvent,
        kind: TextKind,
        input: TextInput,
    ) -> Result<bool> {
        self.inner.handle_text(scene, event, kind, input).await
    }
}

impl fmt::Debug for PageInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageInstance")
            .field("name", &self.name())
            .finish()
    }
}
