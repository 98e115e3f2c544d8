//! # Scene Storage
//!
//! Backends for the scene persistence callbacks:
//! - `FileSceneStorage` - one JSON file per user under a base directory
//! - `MemorySceneStorage` - process-local map, for tests and ephemeral bots

pub mod file_storage;
pub mod memory_storage;

pub use file_storage::FileSceneStorage;
pub use memory_storage::MemorySceneStorage;
