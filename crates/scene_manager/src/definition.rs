//! Scene types and the startup registry
//!
//! A `SceneDefinition` is immutable: its name, the ordered page declarations,
//! the storage callbacks and the callback codec. Handler tables are built
//! here, once per page type, and shared by every scene of that type.
//! `SceneRegistry` maps scene type names to definitions so that stored scenes
//! can be rebuilt by name at startup.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use scene_core::{ButtonSpec, CallbackCodec, SceneStorage};

use crate::error::{Result, SceneError};
use crate::page::{HandlerTable, Page, PageInstance};
use crate::scene::Scene;

/// Adds buttons to every page of a scene type at render time.
#[async_trait]
pub trait ButtonDecorator: Send + Sync {
    async fn decorate(&self, scene: &Scene, page: &str, buttons: &mut Vec<ButtonSpec>) -> Result<()>;
}

type PageFactory = Box<dyn Fn() -> PageInstance + Send + Sync>;

struct PageTemplate {
    name: &'static str,
    factory: PageFactory,
}

pub struct SceneDefinition {
    name: String,
    pages: Vec<PageTemplate>,
    storage: Arc<dyn SceneStorage>,
    codec: CallbackCodec,
    decorator: Option<Arc<dyn ButtonDecorator>>,
}

impl SceneDefinition {
    pub fn builder(name: impl Into<String>, storage: Arc<dyn SceneStorage>) -> SceneDefinitionBuilder {
        SceneDefinitionBuilder {
            name: name.into(),
            pages: Vec::new(),
            storage,
            codec: CallbackCodec::new(),
            decorator: None,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared page names, in declaration order.
    pub fn page_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pages.iter().map(|template| template.name)
    }

    pub fn first_page(&self) -> &'static str {
        // build() guarantees at least one page
        self.pages[0].name
    }

    pub fn declares(&self, page: &str) -> bool {
        self.pages.iter().any(|template| template.name == page)
    }

    pub fn storage(&self) -> &Arc<dyn SceneStorage> {
        &self.storage
    }

    pub fn codec(&self) -> &CallbackCodec {
        &self.codec
    }

    pub fn decorator(&self) -> Option<&Arc<dyn ButtonDecorator>> {
        self.decorator.as_ref()
    }

    pub(crate) fn instantiate_pages(&self) -> Vec<PageInstance> {
        self.pages.iter().map(|template| (template.factory)()).collect()
    }
}

impl fmt::Debug for SceneDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneDefinition")
            .field("name", &self.name)
            .field("pages", &self.page_names().collect::<Vec<_>>())
            .finish()
    }
}

pub struct SceneDefinitionBuilder {
    name: String,
    pages: Vec<PageTemplate>,
    storage: Arc<dyn SceneStorage>,
    codec: CallbackCodec,
    decorator: Option<Arc<dyn ButtonDecorator>>,
    error: Option<SceneError>,
}

impl SceneDefinitionBuilder {
    /// Declare a page. `factory` runs once per scene to create its instance.
    pub fn page<P, F>(mut self, factory: F) -> Self
    where
        P: Page,
        F: Fn() -> P + Send + Sync + 'static,
    {
        if self.error.is_some() {
            return self;
        }
        if self.pages.iter().any(|template| template.name == P::NAME) {
            self.error = Some(SceneError::DuplicatePage {
                scene: self.name.clone(),
                page: P::NAME.to_string(),
            });
            return self;
        }

        match HandlerTable::<P>::build() {
            Ok(table) => {
                let table = Arc::new(table);
                self.pages.push(PageTemplate {
                    name: P::NAME,
                    factory: Box::new(move || PageInstance::new(factory(), Arc::clone(&table))),
                });
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn callback_limit(mut self, limit: usize) -> Self {
        self.codec = CallbackCodec::with_limit(limit);
        self
    }

    pub fn decorator(mut self, decorator: Arc<dyn ButtonDecorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    pub fn build(self) -> Result<Arc<SceneDefinition>> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.pages.is_empty() {
            return Err(SceneError::EmptyScene(self.name));
        }
        Ok(Arc::new(SceneDefinition {
            name: self.name,
            pages: self.pages,
            storage: self.storage,
            codec: self.codec,
            decorator: self.decorator,
        }))
    }
}

/// Scene type name -> definition, populated once at startup.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    definitions: HashMap<String, Arc<SceneDefinition>>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: Arc<SceneDefinition>) -> Result<()> {
        let name = definition.name().to_string();
        if self.definitions.contains_key(&name) {
            return Err(SceneError::DuplicateSceneType(name));
        }
        self.definitions.insert(name, definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<SceneDefinition>> {
        self.definitions.get(name).cloned()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<SceneDefinition>> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
