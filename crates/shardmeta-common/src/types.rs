//! Core type definitions for Shardmeta
//!
//! This module defines the index identity used to address per-index state
//! on disk, plus the settings map shared by global and index metadata.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Flat string settings, ordered by key for stable encoding
pub type Settings = BTreeMap<String, String>;

/// Placeholder UUID for state that has not been assigned one yet
pub const UNKNOWN_UUID: &str = "_na_";

/// Maximum length in bytes of an index name or UUID
const MAX_IDENTITY_LEN: usize = 255;

/// Identity of one index: its name plus the UUID its state folder is named after
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(try_from = "RawIndex")]
#[display("[{name}/{uuid}]")]
pub struct Index {
    name: String,
    uuid: String,
}

#[derive(Deserialize)]
struct RawIndex {
    name: String,
    uuid: String,
}

impl TryFrom<RawIndex> for Index {
    type Error = IndexIdentityError;

    fn try_from(raw: RawIndex) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.uuid)
    }
}

impl Index {
    /// Create an index identity (validates name and UUID)
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Result<Self, IndexIdentityError> {
        let name = name.into();
        let uuid = uuid.into();
        Self::validate_name(&name)?;
        Self::validate_uuid(&uuid)?;
        Ok(Self { name, uuid })
    }

    /// Create an identity with a freshly generated UUID
    pub fn generate(name: impl Into<String>) -> Result<Self, IndexIdentityError> {
        Self::new(name, Uuid::new_v4().simple().to_string())
    }

    /// Index name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index UUID, also the name of its state folder
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    fn validate_name(name: &str) -> Result<(), IndexIdentityError> {
        if name.is_empty() {
            return Err(IndexIdentityError::EmptyName);
        }
        if name.len() > MAX_IDENTITY_LEN {
            return Err(IndexIdentityError::NameTooLong);
        }
        if name == "." || name == ".." {
            return Err(IndexIdentityError::ReservedName(name.to_string()));
        }
        if let Some(c) = name.chars().find(|c| matches!(c, '/' | '\\' | '\0')) {
            return Err(IndexIdentityError::InvalidNameChar(c));
        }
        Ok(())
    }

    // The UUID doubles as a directory name, so it is restricted to a
    // path-safe alphabet.
    fn validate_uuid(uuid: &str) -> Result<(), IndexIdentityError> {
        if uuid.is_empty() {
            return Err(IndexIdentityError::EmptyUuid);
        }
        if uuid.len() > MAX_IDENTITY_LEN {
            return Err(IndexIdentityError::UuidTooLong);
        }
        if let Some(c) = uuid
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(IndexIdentityError::InvalidUuidChar(c));
        }
        Ok(())
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({}/{})", self.name, self.uuid)
    }
}

/// Errors that can occur when creating an index identity
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexIdentityError {
    #[error("index name cannot be empty")]
    EmptyName,
    #[error("index name must be at most 255 bytes")]
    NameTooLong,
    #[error("index name is reserved: {0}")]
    ReservedName(String),
    #[error("index name contains invalid character: {0:?}")]
    InvalidNameChar(char),
    #[error("index uuid cannot be empty")]
    EmptyUuid,
    #[error("index uuid must be at most 255 bytes")]
    UuidTooLong,
    #[error("index uuid contains invalid character: {0:?}")]
    InvalidUuidChar(char),
}
