//! Scene engine error types

use scene_core::{CodecError, StorageError, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Page `{page}` is not declared in scene `{scene}`")]
    UnknownPage { scene: String, page: String },

    #[error("Scene type `{0}` is not registered")]
    UnknownSceneType(String),

    #[error("Scene type `{0}` is already registered")]
    DuplicateSceneType(String),

    #[error("Scene `{0}` declares no pages")]
    EmptyScene(String),

    #[error("Page `{page}` is declared twice in scene `{scene}`")]
    DuplicatePage { scene: String, page: String },

    #[error("Page `{page}` registers handler `{subtype}` more than once")]
    DuplicateHandler { page: &'static str, subtype: String },

    #[error("Scene has not been started")]
    NotStarted,

    #[error("Invalid scene data: {0}")]
    InvalidData(String),

    #[error("Page error: {0}")]
    Page(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SceneError>;
