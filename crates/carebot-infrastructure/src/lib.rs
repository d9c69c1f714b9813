//! Storage backends for the Carebot chat client.

pub mod json_file_storage;
pub mod memory_storage;

pub use json_file_storage::JsonFileStorage;
pub use memory_storage::MemoryStorage;
