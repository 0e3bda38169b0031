//! Global state payloads arriving outside the local state files.
//!
//! A payload is a [`MetaDataDocument`] encoded either as JSON text or as
//! bincode bytes. Both decoders share the same schema and the same
//! conversion into [`MetaData`]; neither touches the filesystem.

use crate::metadata::{GlobalState, IndexMetaData, IndexTemplate, MetaData, MetaDataBuilder};
use serde::{Deserialize, Serialize};
use shardmeta_common::{Error, Result, Settings, UNKNOWN_UUID};
use std::collections::BTreeMap;

/// Transfer schema for a full metadata snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaDataDocument {
    pub cluster_uuid: String,
    pub version: u64,
    #[serde(default)]
    pub persistent_settings: Settings,
    #[serde(default)]
    pub templates: BTreeMap<String, IndexTemplate>,
    #[serde(default)]
    pub indices: Vec<IndexMetaData>,
}

impl Default for MetaDataDocument {
    fn default() -> Self {
        Self {
            cluster_uuid: UNKNOWN_UUID.to_string(),
            version: 0,
            persistent_settings: Settings::new(),
            templates: BTreeMap::new(),
            indices: Vec::new(),
        }
    }
}

impl From<&MetaData> for MetaDataDocument {
    fn from(metadata: &MetaData) -> Self {
        let global = metadata.global_state();
        Self {
            cluster_uuid: global.cluster_uuid.clone(),
            version: global.version,
            persistent_settings: global.persistent_settings.clone(),
            templates: global.templates.clone(),
            indices: metadata.indices().cloned().collect(),
        }
    }
}

impl MetaDataDocument {
    /// Freeze the document into a snapshot, rejecting duplicate index names
    pub fn into_metadata(self) -> Result<MetaData> {
        let mut builder = MetaDataBuilder::from_global(GlobalState {
            cluster_uuid: self.cluster_uuid,
            version: self.version,
            persistent_settings: self.persistent_settings,
            templates: self.templates,
        });
        for index in self.indices {
            builder.try_put(index)?;
        }
        Ok(builder.build())
    }
}

/// Decode a JSON text payload
pub fn decode_json(payload: &str) -> Result<MetaData> {
    let document: MetaDataDocument = serde_json::from_str(payload)
        .map_err(|e| Error::Deserialization(format!("invalid global state text payload: {e}")))?;
    document.into_metadata()
}

/// Decode a binary payload
pub fn decode_binary(payload: &[u8]) -> Result<MetaData> {
    let document: MetaDataDocument = bincode::deserialize(payload)
        .map_err(|e| Error::Deserialization(format!("invalid global state binary payload: {e}")))?;
    document.into_metadata()
}

/// Encode a snapshot as a JSON text payload
pub fn encode_json(metadata: &MetaData) -> Result<String> {
    serde_json::to_string(&MetaDataDocument::from(metadata))
        .map_err(|e| Error::Serialization(format!("failed to encode global state: {e}")))
}

/// Encode a snapshot as a binary payload
pub fn encode_binary(metadata: &MetaData) -> Result<Vec<u8>> {
    bincode::serialize(&MetaDataDocument::from(metadata))
        .map_err(|e| Error::Serialization(format!("failed to encode global state: {e}")))
}
