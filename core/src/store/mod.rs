//! Persistent storage: named, versioned, merkle-committing key-value
//! stores over a single embedded sled database.

pub mod kv;
pub mod registry;

pub use kv::{KvStore, StoreError, StoreIter, StoreResult};
pub use registry::StoreRegistry;
