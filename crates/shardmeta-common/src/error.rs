//! Error types for Shardmeta
//!
//! This module defines the common error types used throughout the system.
//! "State not found" is deliberately absent: a missing state is reported as
//! `Ok(None)` or `PersistedState::NotPersisted`, never as an error.

use crate::types::Index;
use thiserror::Error;

/// Common result type for Shardmeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for Shardmeta
#[derive(Debug, Error)]
pub enum Error {
    // Storage errors
    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt state at {path}: {reason}")]
    CorruptState { path: String, reason: String },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    // Reconciliation errors
    #[error("[{folder}] invalid index folder name, rename to [{expected}]")]
    IndexFolderMismatch { folder: String, expected: String },

    #[error("duplicate index [{name}] found in folders [{first}] and [{second}]")]
    DuplicateIndex {
        name: String,
        first: String,
        second: String,
    },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    // Write errors
    #[error("failed to write state for {index}")]
    IndexWrite {
        index: Index,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to write global state")]
    GlobalWrite {
        #[source]
        source: Box<Error>,
    },

    // Internal errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a corrupt state error for the given path
    pub fn corrupt_state(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid metadata error
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Wrap a failure that happened while persisting index state
    #[must_use]
    pub fn index_write(index: Index, source: Self) -> Self {
        Self::IndexWrite {
            index,
            source: Box::new(source),
        }
    }

    /// Wrap a failure that happened while persisting global state
    #[must_use]
    pub fn global_write(source: Self) -> Self {
        Self::GlobalWrite {
            source: Box::new(source),
        }
    }

    /// Check if this error means stored bytes exist but cannot be decoded
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptState { .. } | Self::ChecksumMismatch { .. } | Self::Deserialization(_)
        )
    }

    /// Check if this error means the on-disk layout disagrees with the
    /// identities stored inside it
    #[must_use]
    pub fn is_inconsistency(&self) -> bool {
        matches!(
            self,
            Self::IndexFolderMismatch { .. } | Self::DuplicateIndex { .. }
        )
    }

    /// Check if this is a wrapped write failure
    #[must_use]
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::IndexWrite { .. } | Self::GlobalWrite { .. })
    }
}
