//! Shardmeta State - node-local metadata persistence
//!
//! This crate durably saves and reloads the global cluster metadata and the
//! per-index metadata of one node, and reconciles the index folders found on
//! disk with the identities stored inside them.

pub mod env;
pub mod format;
pub mod global;
pub mod ingest;
pub mod metadata;
pub mod observer;
pub mod service;

// Re-exports
pub use env::{FsNodeEnvironment, NodeEnvironment, StateLocation};
pub use format::{StateCodec, StateFormat, StateHeader};
pub use global::{
    GlobalStateSource, LocalGlobalStateSource, MemoryGlobalStateSource, PersistedState,
};
pub use ingest::MetaDataDocument;
pub use metadata::{
    GlobalState, IndexMetaData, IndexMetaDataBuilder, IndexState, IndexTemplate, MetaData,
    MetaDataBuilder,
};
pub use observer::{StateObserver, TracingObserver};
pub use service::MetaStateService;
