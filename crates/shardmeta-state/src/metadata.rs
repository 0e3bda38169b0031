//! Global and per-index metadata types.
//!
//! [`MetaData`] is the node's snapshot of cluster-wide state. It is only ever
//! produced by [`MetaDataBuilder::build`]; once built it is never mutated and
//! a changed view is a new snapshot. [`GlobalState`] is the slice of a
//! snapshot persisted at the node's global location: everything except the
//! index bodies, which live in their own per-index locations.

use serde::{Deserialize, Serialize};
use shardmeta_common::{Error, Index, Result, Settings, UNKNOWN_UUID};
use std::collections::{BTreeMap, BTreeSet};

/// Open/close state of an index
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    #[default]
    Open,
    Close,
}

/// Configuration and state of one index (shard group)
///
/// Decoding goes through [`IndexMetaDataBuilder::build`], so state read from
/// disk or from a payload is held to the same rules as state built in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIndexMetaData")]
pub struct IndexMetaData {
    index: Index,
    version: u64,
    mapping_version: u64,
    settings_version: u64,
    state: IndexState,
    number_of_shards: u32,
    number_of_replicas: u32,
    settings: Settings,
    /// Mapping type -> JSON mapping source
    mappings: BTreeMap<String, String>,
    aliases: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawIndexMetaData {
    index: Index,
    version: u64,
    mapping_version: u64,
    settings_version: u64,
    state: IndexState,
    number_of_shards: u32,
    number_of_replicas: u32,
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    mappings: BTreeMap<String, String>,
    #[serde(default)]
    aliases: BTreeSet<String>,
}

impl TryFrom<RawIndexMetaData> for IndexMetaData {
    type Error = Error;

    fn try_from(raw: RawIndexMetaData) -> Result<Self> {
        IndexMetaDataBuilder {
            inner: Self {
                index: raw.index,
                version: raw.version,
                mapping_version: raw.mapping_version,
                settings_version: raw.settings_version,
                state: raw.state,
                number_of_shards: raw.number_of_shards,
                number_of_replicas: raw.number_of_replicas,
                settings: raw.settings,
                mappings: raw.mappings,
                aliases: raw.aliases,
            },
        }
        .build()
    }
}

impl IndexMetaData {
    /// Start building metadata for a new index
    #[must_use]
    pub fn builder(index: Index) -> IndexMetaDataBuilder {
        IndexMetaDataBuilder::new(index)
    }

    /// Start a builder seeded from this metadata
    #[must_use]
    pub fn to_builder(&self) -> IndexMetaDataBuilder {
        IndexMetaDataBuilder { inner: self.clone() }
    }

    #[must_use]
    pub const fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.index.name()
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        self.index.uuid()
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub const fn mapping_version(&self) -> u64 {
        self.mapping_version
    }

    #[must_use]
    pub const fn settings_version(&self) -> u64 {
        self.settings_version
    }

    #[must_use]
    pub const fn state(&self) -> IndexState {
        self.state
    }

    #[must_use]
    pub const fn number_of_shards(&self) -> u32 {
        self.number_of_shards
    }

    #[must_use]
    pub const fn number_of_replicas(&self) -> u32 {
        self.number_of_replicas
    }

    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// JSON mapping source for a mapping type
    #[must_use]
    pub fn mapping(&self, mapping_type: &str) -> Option<&str> {
        self.mappings.get(mapping_type).map(String::as_str)
    }

    #[must_use]
    pub const fn mappings(&self) -> &BTreeMap<String, String> {
        &self.mappings
    }

    #[must_use]
    pub const fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }
}

/// Builder for [`IndexMetaData`]
#[derive(Clone, Debug)]
pub struct IndexMetaDataBuilder {
    inner: IndexMetaData,
}

impl IndexMetaDataBuilder {
    /// New index at version 1 with one shard and one replica
    #[must_use]
    pub fn new(index: Index) -> Self {
        Self {
            inner: IndexMetaData {
                index,
                version: 1,
                mapping_version: 1,
                settings_version: 1,
                state: IndexState::Open,
                number_of_shards: 1,
                number_of_replicas: 1,
                settings: Settings::new(),
                mappings: BTreeMap::new(),
                aliases: BTreeSet::new(),
            },
        }
    }

    #[must_use]
    pub fn version(mut self, version: u64) -> Self {
        self.inner.version = version;
        self
    }

    #[must_use]
    pub fn mapping_version(mut self, version: u64) -> Self {
        self.inner.mapping_version = version;
        self
    }

    #[must_use]
    pub fn settings_version(mut self, version: u64) -> Self {
        self.inner.settings_version = version;
        self
    }

    #[must_use]
    pub fn state(mut self, state: IndexState) -> Self {
        self.inner.state = state;
        self
    }

    #[must_use]
    pub fn number_of_shards(mut self, shards: u32) -> Self {
        self.inner.number_of_shards = shards;
        self
    }

    #[must_use]
    pub fn number_of_replicas(mut self, replicas: u32) -> Self {
        self.inner.number_of_replicas = replicas;
        self
    }

    #[must_use]
    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.settings.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn put_mapping(mut self, mapping_type: impl Into<String>, source: impl Into<String>) -> Self {
        self.inner.mappings.insert(mapping_type.into(), source.into());
        self
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.inner.aliases.insert(alias.into());
        self
    }

    /// Validate and freeze the metadata
    pub fn build(self) -> Result<IndexMetaData> {
        let inner = self.inner;
        if inner.number_of_shards == 0 {
            return Err(Error::invalid_metadata(format!(
                "{} must have at least one shard",
                inner.index
            )));
        }
        for (mapping_type, source) in &inner.mappings {
            let parsed: serde_json::Value = serde_json::from_str(source).map_err(|e| {
                Error::invalid_metadata(format!(
                    "{} mapping [{}] is not valid JSON: {}",
                    inner.index, mapping_type, e
                ))
            })?;
            if !parsed.is_object() {
                return Err(Error::invalid_metadata(format!(
                    "{} mapping [{}] must be a JSON object",
                    inner.index, mapping_type
                )));
            }
        }
        Ok(inner)
    }
}

/// Index template applied to newly created indices
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTemplate {
    /// Index name patterns this template applies to
    pub patterns: Vec<String>,
    /// Higher orders are applied later
    pub order: i32,
    #[serde(default)]
    pub settings: Settings,
}

/// Cluster-wide state persisted at the node's global location
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    pub cluster_uuid: String,
    pub version: u64,
    #[serde(default)]
    pub persistent_settings: Settings,
    #[serde(default)]
    pub templates: BTreeMap<String, IndexTemplate>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            cluster_uuid: UNKNOWN_UUID.to_string(),
            version: 0,
            persistent_settings: Settings::new(),
            templates: BTreeMap::new(),
        }
    }
}

/// Immutable snapshot of global settings plus every known index
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetaData {
    global: GlobalState,
    indices: BTreeMap<String, IndexMetaData>,
}

impl MetaData {
    /// The snapshot of a node that has never persisted anything
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> MetaDataBuilder {
        MetaDataBuilder::new()
    }

    /// Start a builder seeded from this snapshot
    #[must_use]
    pub fn to_builder(&self) -> MetaDataBuilder {
        MetaDataBuilder {
            global: self.global.clone(),
            indices: self.indices.clone(),
        }
    }

    #[must_use]
    pub fn cluster_uuid(&self) -> &str {
        &self.global.cluster_uuid
    }

    #[must_use]
    pub const fn version(&self) -> u64 {
        self.global.version
    }

    #[must_use]
    pub const fn persistent_settings(&self) -> &Settings {
        &self.global.persistent_settings
    }

    #[must_use]
    pub const fn templates(&self) -> &BTreeMap<String, IndexTemplate> {
        &self.global.templates
    }

    /// The part of this snapshot written to the global location
    #[must_use]
    pub const fn global_state(&self) -> &GlobalState {
        &self.global
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexMetaData> {
        self.indices.get(name)
    }

    #[must_use]
    pub fn has_index(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    /// Indices ordered by name
    pub fn indices(&self) -> impl Iterator<Item = &IndexMetaData> {
        self.indices.values()
    }

    #[must_use]
    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    /// True when there are no global settings and no indices
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global == GlobalState::default() && self.indices.is_empty()
    }
}

/// Mutable accumulator that freezes into a [`MetaData`] snapshot
#[derive(Clone, Debug, Default)]
pub struct MetaDataBuilder {
    global: GlobalState,
    indices: BTreeMap<String, IndexMetaData>,
}

impl MetaDataBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a builder from persisted global state (no indices)
    #[must_use]
    pub fn from_global(global: GlobalState) -> Self {
        Self {
            global,
            indices: BTreeMap::new(),
        }
    }

    pub fn cluster_uuid(&mut self, uuid: impl Into<String>) -> &mut Self {
        self.global.cluster_uuid = uuid.into();
        self
    }

    pub fn version(&mut self, version: u64) -> &mut Self {
        self.global.version = version;
        self
    }

    pub fn persistent_setting(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.global.persistent_settings.insert(key.into(), value.into());
        self
    }

    pub fn put_template(&mut self, name: impl Into<String>, template: IndexTemplate) -> &mut Self {
        self.global.templates.insert(name.into(), template);
        self
    }

    /// Insert an index, replacing any index of the same name.
    /// Returns the replaced entry.
    pub fn put(&mut self, index: IndexMetaData) -> Option<IndexMetaData> {
        self.indices.insert(index.name().to_string(), index)
    }

    /// Insert an index, failing if one of the same name is already present
    pub fn try_put(&mut self, index: IndexMetaData) -> Result<&mut Self> {
        if let Some(existing) = self.indices.get(index.name()) {
            return Err(Error::DuplicateIndex {
                name: index.name().to_string(),
                first: existing.uuid().to_string(),
                second: index.uuid().to_string(),
            });
        }
        self.indices.insert(index.name().to_string(), index);
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> Option<IndexMetaData> {
        self.indices.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexMetaData> {
        self.indices.get(name)
    }

    #[must_use]
    pub fn build(self) -> MetaData {
        MetaData {
            global: self.global,
            indices: self.indices,
        }
    }
}
