//! Chat transport seam

use async_trait::async_trait;
use thiserror::Error;

use crate::keyboard::Keyboard;
use crate::{MessageId, UserId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Message {0} not found")]
    MessageNotFound(MessageId),

    #[error("Message {0} cannot be edited into the requested kind")]
    KindMismatch(MessageId),

    #[error("Operation not supported by this transport: {0}")]
    Unsupported(&'static str),

    #[error("Transport request failed: {0}")]
    Request(String),
}

/// Outgoing side of the chat platform.
///
/// Edits are allowed to fail; scenes recover by deleting and resending.
/// Deletes are best effort.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        user_id: UserId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    async fn edit_text(
        &self,
        chat_id: UserId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    async fn send_photo(
        &self,
        user_id: UserId,
        image: &str,
        caption: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Replace the photo and caption of an existing photo message.
    async fn edit_photo(
        &self,
        _chat_id: UserId,
        _message_id: MessageId,
        _image: &str,
        _caption: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("edit_photo"))
    }

    async fn delete_message(
        &self,
        chat_id: UserId,
        message_id: MessageId,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button tap, optionally with a short notice.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}
