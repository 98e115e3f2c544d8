//! # Scene Manager
//!
//! Stateful multi-page conversations for chat interfaces. Every end user owns
//! one `Scene`; a scene shows exactly one `Page` at a time inside one transport
//! message and keeps a per-page key-value store that survives restarts through
//! the scene type's storage callbacks.
//!
//! - `page` - the `Page` trait, per-type handler tables and `PageInstance`
//! - `definition` - immutable scene types and the startup registry
//! - `scene` - transitions, render reconciliation and persistence
//! - `blocking` - exclusive access to guarded pages within a group
//! - `manager` - the user -> scene registry
//! - `router` - inbound event dispatch

pub mod blocking;
pub mod definition;
pub mod error;
pub mod manager;
pub mod page;
pub mod router;
pub mod scene;

// Re-exports
pub use blocking::{check_access, Access, CorrelationKey, PageGuard, DEFAULT_DENIAL_TEXT};
pub use definition::{ButtonDecorator, SceneDefinition, SceneDefinitionBuilder, SceneRegistry};
pub use error::{Result, SceneError};
pub use manager::SceneManager;
pub use page::{
    CallbackFn, HandlerTable, Page, PageInstance, TextFn, TextInput, TextKind, DEFAULT_ROW_WIDTH,
};
pub use router::{DispatchOutcome, Router, NAVIGATE_HANDLER, SESSION_EXPIRED_TEXT};
pub use scene::{PageChange, Scene};

pub use scene_core;
