//! # Storage Module
//!
//! Persistence for the Mirror collections.
//!
//! The domain never touches files directly: it talks to a [`MirrorRepository`],
//! which encodes each collection as one JSON blob and hands it to a
//! [`KeyValueStorage`] implementation.
//!
//! - **FileKeyValueStore**: one JSON file per key in the data directory
//! - **InMemoryKeyValueStore**: tests and throwaway sessions

pub mod file_store;
pub mod memory_store;
pub mod repository;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

pub use file_store::FileKeyValueStore;
pub use memory_store::InMemoryKeyValueStore;
pub use repository::{MirrorRepository, SCHEMA_VERSION};
pub use traits::{KeyValueStorage, StorageKey};
