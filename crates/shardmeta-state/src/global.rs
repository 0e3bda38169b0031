//! Sources of authoritative global metadata.

use crate::env::NodeEnvironment;
use crate::format::StateCodec;
use crate::metadata::{GlobalState, MetaData, MetaDataBuilder};
use parking_lot::RwLock;
use shardmeta_common::Result;
use std::sync::Arc;

/// Outcome of loading state that may never have been persisted.
///
/// `NotPersisted` (first boot) is distinct from a persisted state that
/// happens to be empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistedState<T> {
    NotPersisted,
    Persisted(T),
}

impl<T> PersistedState<T> {
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PersistedState<U> {
        match self {
            Self::NotPersisted => PersistedState::NotPersisted,
            Self::Persisted(value) => PersistedState::Persisted(f(value)),
        }
    }

    pub fn unwrap_or_else(self, f: impl FnOnce() -> T) -> T {
        match self {
            Self::NotPersisted => f(),
            Self::Persisted(value) => value,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::NotPersisted => None,
            Self::Persisted(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for PersistedState<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::NotPersisted, Self::Persisted)
    }
}

/// Supplies global metadata independently of per-index state files
pub trait GlobalStateSource: Send + Sync {
    fn load_global_state(&self) -> Result<PersistedState<MetaData>>;
}

/// Reads the global state persisted at the node's global location
pub struct LocalGlobalStateSource {
    env: Arc<dyn NodeEnvironment>,
    codec: Arc<dyn StateCodec<GlobalState>>,
}

impl LocalGlobalStateSource {
    pub fn new(env: Arc<dyn NodeEnvironment>, codec: Arc<dyn StateCodec<GlobalState>>) -> Self {
        Self { env, codec }
    }
}

impl GlobalStateSource for LocalGlobalStateSource {
    fn load_global_state(&self) -> Result<PersistedState<MetaData>> {
        let state = self.codec.load_latest_state(&self.env.node_data_path())?;
        Ok(PersistedState::from(state).map(|global| MetaDataBuilder::from_global(global).build()))
    }
}

/// Global state handed over from another channel, e.g. a payload copied
/// from a peer and decoded by [`crate::ingest`]
#[derive(Debug, Default)]
pub struct MemoryGlobalStateSource {
    state: RwLock<Option<MetaData>>,
}

impl MemoryGlobalStateSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: MetaData) -> Self {
        Self {
            state: RwLock::new(Some(state)),
        }
    }

    /// Replace the held snapshot
    pub fn set(&self, state: MetaData) {
        *self.state.write() = Some(state);
    }

    /// Forget the held snapshot
    pub fn clear(&self) {
        *self.state.write() = None;
    }
}

impl GlobalStateSource for MemoryGlobalStateSource {
    fn load_global_state(&self) -> Result<PersistedState<MetaData>> {
        Ok(self.state.read().clone().into())
    }
}
