//! Inbound events delivered by the chat transport

use serde::{Deserialize, Serialize};

use crate::{MessageId, UserId};

/// A tap on an inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackEvent {
    /// Transport id used to acknowledge the tap.
    pub id: String,
    pub user_id: UserId,
    /// Message the tapped keyboard belongs to, when known.
    pub message_id: Option<MessageId>,
    pub data: String,
}

/// A free-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEvent {
    pub user_id: UserId,
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Callback(CallbackEvent),
    Text(TextEvent),
}

impl InboundEvent {
    pub fn user_id(&self) -> UserId {
        match self {
            InboundEvent::Callback(event) => event.user_id,
            InboundEvent::Text(event) => event.user_id,
        }
    }
}
