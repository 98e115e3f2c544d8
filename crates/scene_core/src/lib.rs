//! scene_core - Core types and traits for the scene engine
//!
//! This crate provides the leaf types shared by every other scene crate:
//! - `callback` - the compact `scene:handler:args` wire codec
//! - `keyboard` - button specs and inline keyboard layout
//! - `event` - inbound callback and text events
//! - `transport` - the chat transport seam consumed by scenes
//! - `storage` - the persistence seam and the stored scene record

pub mod callback;
pub mod event;
pub mod keyboard;
pub mod storage;
pub mod transport;

/// Identity of an end user. Private chats share the user's id as chat id.
pub type UserId = i64;

/// Identity of a message owned by the transport.
pub type MessageId = i64;

// Re-export commonly used types
pub use callback::{CallbackCodec, CallbackPayload, CodecError, CALLBACK_DATA_LIMIT, SEPARATOR};
pub use event::{CallbackEvent, InboundEvent, TextEvent};
pub use keyboard::{layout, ButtonSpec, InlineButton, Keyboard, RenderPayload};
pub use storage::{SceneRecord, SceneRecordPatch, SceneStorage, StorageError};
pub use transport::{Transport, TransportError};
