//! Callback payload codec
//!
//! Inline buttons carry an opaque string back to the bot when tapped. Scenes
//! encode `[scene_name, handler_name, arg1, arg2, ...]` joined with `:` so the
//! router can find the owning scene and the page handler without any server
//! side lookup table. The platform caps the string at a small byte budget, so
//! oversized payloads are rejected instead of being truncated.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte ceiling the chat platform puts on callback data.
pub const CALLBACK_DATA_LIMIT: usize = 64;

/// Token separator of the wire format.
pub const SEPARATOR: char = ':';

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Callback payload is {len} bytes, limit is {limit}")]
    TooLong { len: usize, limit: usize },

    #[error("Callback component {0:?} contains the separator")]
    Separator(String),

    #[error("Callback component `{0}` must not be empty")]
    EmptyComponent(&'static str),

    #[error("Malformed callback payload: {0:?}")]
    Malformed(String),
}

/// Decoded callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub scene: String,
    pub handler: String,
    pub args: Vec<String>,
}

impl CallbackPayload {
    /// Checked access to a positional argument.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Encoder/decoder bound to a byte limit.
#[derive(Debug, Clone, Copy)]
pub struct CallbackCodec {
    limit: usize,
}

impl Default for CallbackCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackCodec {
    pub fn new() -> Self {
        Self {
            limit: CALLBACK_DATA_LIMIT,
        }
    }

    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Encode a scene/handler pair and its arguments.
    pub fn encode<A: Display>(
        &self,
        scene: &str,
        handler: &str,
        args: &[A],
    ) -> Result<String, CodecError> {
        if scene.is_empty() {
            return Err(CodecError::EmptyComponent("scene"));
        }
        if handler.is_empty() {
            return Err(CodecError::EmptyComponent("handler"));
        }

        let mut parts = Vec::with_capacity(args.len() + 2);
        parts.push(scene.to_string());
        parts.push(handler.to_string());
        parts.extend(args.iter().map(ToString::to_string));

        if let Some(bad) = parts.iter().find(|part| part.contains(SEPARATOR)) {
            return Err(CodecError::Separator(bad.clone()));
        }

        let wire = parts.join(":");
        if wire.len() > self.limit {
            return Err(CodecError::TooLong {
                len: wire.len(),
                limit: self.limit,
            });
        }
        Ok(wire)
    }

    /// Decode a wire string. Arguments never include the handler name.
    pub fn decode(&self, wire: &str) -> Result<CallbackPayload, CodecError> {
        let mut parts = wire.split(SEPARATOR);
        let scene = parts.next().filter(|s| !s.is_empty());
        let handler = parts.next().filter(|s| !s.is_empty());

        match (scene, handler) {
            (Some(scene), Some(handler)) => Ok(CallbackPayload {
                scene: scene.to_string(),
                handler: handler.to_string(),
                args: parts.map(str::to_string).collect(),
            }),
            _ => Err(CodecError::Malformed(wire.to_string())),
        }
    }
}

/// Encode with the default platform limit.
pub fn encode<A: Display>(scene: &str, handler: &str, args: &[A]) -> Result<String, CodecError> {
    CallbackCodec::new().encode(scene, handler, args)
}

/// Decode with the default platform limit.
pub fn decode(wire: &str) -> Result<CallbackPayload, CodecError> {
    CallbackCodec::new().decode(wire)
}
