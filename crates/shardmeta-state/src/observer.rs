//! Diagnostics hooks for state loading and writing.

use shardmeta_common::{Error, Index};
use tracing::{debug, trace, warn};

/// Receives diagnostics from [`crate::MetaStateService`]
pub trait StateObserver: Send + Sync {
    /// An index folder exists but holds no state generation
    fn missing_index_state(&self, folder: &str);

    fn writing_index_state(&self, index: &Index, reason: &str);

    fn index_state_write_failed(&self, index: &Index, error: &Error);

    fn writing_global_state(&self, reason: &str);

    fn global_state_write_failed(&self, error: &Error);
}

/// Default observer emitting `tracing` events
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingObserver;

impl StateObserver for TracingObserver {
    fn missing_index_state(&self, folder: &str) {
        debug!("[{}] failed to find metadata for existing index location", folder);
    }

    fn writing_index_state(&self, index: &Index, reason: &str) {
        trace!("{} writing state, reason [{}]", index, reason);
    }

    fn index_state_write_failed(&self, index: &Index, error: &Error) {
        warn!("{}: failed to write index state: {}", index, error);
    }

    fn writing_global_state(&self, reason: &str) {
        trace!("[_global] writing state, reason [{}]", reason);
    }

    fn global_state_write_failed(&self, error: &Error) {
        warn!("[_global]: failed to write global state: {}", error);
    }
}
