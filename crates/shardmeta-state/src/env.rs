//! Node directory catalog.
//!
//! On-disk layout under the node data directory:
//!
//! ```text
//! <data_dir>/
//! ├── _state/global-<gen>.st            global state generations
//! └── indices/
//!     └── <index uuid>/
//!         └── _state/state-<gen>.st     index state generations
//! ```
//!
//! The folder under `indices/` is the index's folder identifier and must
//! equal the UUID stored in the state it contains.

use shardmeta_common::{Error, GatewayConfig, Index, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directory holding state generations inside a location
pub const STATE_DIR_NAME: &str = "_state";

/// Directory under the data dir holding one folder per index
pub const INDICES_DIR_NAME: &str = "indices";

/// Addressable place where one state object is persisted
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateLocation {
    /// The node's single global-state location
    Global { path: PathBuf },
    /// One index's location, keyed by its folder identifier
    Index { folder: String, path: PathBuf },
}

impl StateLocation {
    /// Root path of the location
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Global { path } | Self::Index { path, .. } => path,
        }
    }

    /// Directory the state generations are written to
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.path().join(STATE_DIR_NAME)
    }

    /// Folder identifier, for index locations
    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        match self {
            Self::Global { .. } => None,
            Self::Index { folder, .. } => Some(folder),
        }
    }
}

impl fmt::Display for StateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global { .. } => write!(f, "[_global]"),
            Self::Index { folder, .. } => write!(f, "[{folder}]"),
        }
    }
}

/// Enumerates and resolves the node's state locations
pub trait NodeEnvironment: Send + Sync {
    /// Folder identifiers of every index location present on the node
    fn available_index_folders(&self) -> Result<Vec<String>>;

    /// Location for an index folder identifier
    fn resolve_index_folder(&self, folder: &str) -> StateLocation;

    /// Canonical location for an index identity
    fn index_path(&self, index: &Index) -> StateLocation {
        self.resolve_index_folder(index.uuid())
    }

    /// The node's global-state location
    fn node_data_path(&self) -> StateLocation;
}

/// [`NodeEnvironment`] over a local data directory
#[derive(Clone, Debug)]
pub struct FsNodeEnvironment {
    data_dir: PathBuf,
}

impl FsNodeEnvironment {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.data_dir.clone())
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn indices_dir(&self) -> PathBuf {
        self.data_dir.join(INDICES_DIR_NAME)
    }
}

impl NodeEnvironment for FsNodeEnvironment {
    /// Directories under `indices/`, sorted by name. A missing `indices/`
    /// directory means no index has been written yet.
    fn available_index_folders(&self) -> Result<Vec<String>> {
        let indices_dir = self.indices_dir();
        let entries = match std::fs::read_dir(&indices_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::storage(format!(
                    "failed to list index folders in {}: {}",
                    indices_dir.display(),
                    e
                )));
            }
        };

        let mut folders = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::storage(format!(
                    "failed to read entry in {}: {}",
                    indices_dir.display(),
                    e
                ))
            })?;
            let file_type = entry.file_type().map_err(|e| {
                Error::storage(format!(
                    "failed to stat {}: {}",
                    entry.path().display(),
                    e
                ))
            })?;
            if !file_type.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => folders.push(name),
                Err(name) => warn!("Ignoring non UTF-8 index folder {:?}", name),
            }
        }
        folders.sort();
        Ok(folders)
    }

    fn resolve_index_folder(&self, folder: &str) -> StateLocation {
        StateLocation::Index {
            folder: folder.to_string(),
            path: self.indices_dir().join(folder),
        }
    }

    fn node_data_path(&self) -> StateLocation {
        StateLocation::Global {
            path: self.data_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_indices_dir_is_empty() {
        let dir = tempdir().unwrap();
        let env = FsNodeEnvironment::new(dir.path());
        assert!(env.available_index_folders().unwrap().is_empty());
    }

    #[test]
    fn test_available_index_folders_sorted_dirs_only() {
        let dir = tempdir().unwrap();
        let env = FsNodeEnvironment::new(dir.path());
        for folder in ["c", "a", "b"] {
            std::fs::create_dir_all(env.indices_dir().join(folder)).unwrap();
        }
        std::fs::write(env.indices_dir().join("stray.txt"), b"x").unwrap();

        assert_eq!(env.available_index_folders().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_locations() {
        let env = FsNodeEnvironment::new("/data/node");
        let index = Index::new("logs", "u1").unwrap();

        let location = env.index_path(&index);
        assert_eq!(location, env.resolve_index_folder("u1"));
        assert_eq!(location.folder(), Some("u1"));
        assert_eq!(location.state_dir(), PathBuf::from("/data/node/indices/u1/_state"));
        assert_eq!(location.to_string(), "[u1]");

        let global = env.node_data_path();
        assert_eq!(global.folder(), None);
        assert_eq!(global.state_dir(), PathBuf::from("/data/node/_state"));
        assert_eq!(global.to_string(), "[_global]");
    }
}
