//! Generational state files.
//!
//! Every write produces a new generation `<prefix><gen>.st` in the
//! location's `_state` directory. Loading picks the highest generation that
//! validates, so a torn or corrupted newest file falls back to the previous
//! one.
//!
//! File format:
//! ```text
//! +--------+---------+------------+----------+--------+----------+------+
//! | Magic  | Version | Generation | Body len | CRC32C | Reserved | Body |
//! | 4B     | 4B      | 8B         | 8B       | 4B     | 4B       | JSON |
//! +--------+---------+------------+----------+--------+----------+------+
//! ```

use crate::env::StateLocation;
use crate::metadata::{GlobalState, IndexMetaData};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shardmeta_common::{Error, Result, StateFormatConfig};
use std::cmp::Reverse;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name prefix for global state generations
pub const GLOBAL_STATE_PREFIX: &str = "global-";

/// File name prefix for index state generations
pub const INDEX_STATE_PREFIX: &str = "state-";

/// File name suffix shared by all state generations
pub const STATE_FILE_SUFFIX: &str = ".st";

const TEMP_SUFFIX: &str = ".tmp";

/// Persists and retrieves the newest valid version of a typed state object
pub trait StateCodec<T>: Send + Sync {
    /// Newest valid state at the location, `None` if nothing was ever written
    fn load_latest_state(&self, location: &StateLocation) -> Result<Option<T>>;

    /// Persist a new version of the state at the location
    fn write(&self, state: &T, location: &StateLocation) -> Result<()>;
}

/// Fixed header in front of every state generation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateHeader {
    /// Magic number for validation
    pub magic: u32,
    /// Format version
    pub version: u32,
    /// Generation, must match the file name
    pub generation: u64,
    /// Length of the body following the header
    pub body_len: u64,
    /// CRC32C of the body
    pub checksum: u32,
}

impl StateHeader {
    pub const MAGIC: u32 = 0x5354_4154; // "STAT"
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 32;

    #[must_use]
    pub fn new(generation: u64, body: &[u8]) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            generation,
            body_len: body.len() as u64,
            checksum: crc32c::crc32c(body),
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.generation.to_le_bytes());
        buf[16..24].copy_from_slice(&self.body_len.to_le_bytes());
        buf[24..28].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let magic = u32::from_le_bytes(data[0..4].try_into().ok()?);
        if magic != Self::MAGIC {
            return None;
        }
        Some(Self {
            magic,
            version: u32::from_le_bytes(data[4..8].try_into().ok()?),
            generation: u64::from_le_bytes(data[8..16].try_into().ok()?),
            body_len: u64::from_le_bytes(data[16..24].try_into().ok()?),
            checksum: u32::from_le_bytes(data[24..28].try_into().ok()?),
        })
    }
}

/// File-backed [`StateCodec`] keeping several generations per location
pub struct StateFormat<T> {
    prefix: &'static str,
    config: StateFormatConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for StateFormat<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateFormat")
            .field("prefix", &self.prefix)
            .field("config", &self.config)
            .finish()
    }
}

impl StateFormat<IndexMetaData> {
    /// Format for per-index state files
    #[must_use]
    pub const fn index(config: StateFormatConfig) -> Self {
        Self::new(INDEX_STATE_PREFIX, config)
    }
}

impl StateFormat<GlobalState> {
    /// Format for the node's global state files
    #[must_use]
    pub const fn global(config: StateFormatConfig) -> Self {
        Self::new(GLOBAL_STATE_PREFIX, config)
    }
}

impl<T> StateFormat<T> {
    #[must_use]
    pub const fn new(prefix: &'static str, config: StateFormatConfig) -> Self {
        Self {
            prefix,
            config,
            _marker: PhantomData,
        }
    }

    /// File name of a generation
    #[must_use]
    pub fn file_name(&self, generation: u64) -> String {
        format!("{}{}{}", self.prefix, generation, STATE_FILE_SUFFIX)
    }

    /// Generations present in a state directory, newest first
    pub fn list_generations(&self, state_dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
        let entries = match std::fs::read_dir(state_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::storage(format!(
                    "failed to read state dir {}: {}",
                    state_dir.display(),
                    e
                )));
            }
        };

        let mut generations: Vec<(u64, PathBuf)> = entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                // Extract generation from filename: <prefix><gen>.st
                let name = entry.file_name();
                let name_str = name.to_string_lossy();
                name_str
                    .strip_prefix(self.prefix)
                    .and_then(|s| s.strip_suffix(STATE_FILE_SUFFIX))
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|generation| (generation, entry.path()))
            })
            .collect();

        generations.sort_by_key(|(generation, _)| Reverse(*generation));
        Ok(generations)
    }

    /// Remove generations beyond retention and leftover temp files
    fn cleanup_old_generations(&self, state_dir: &Path) -> Result<()> {
        let generations = self.list_generations(state_dir)?;
        for (generation, path) in generations.into_iter().skip(self.config.retained_generations) {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!("Failed to remove old state generation {}: {}", generation, e);
            }
        }

        let entries = std::fs::read_dir(state_dir).map_err(|e| {
            Error::storage(format!(
                "failed to read state dir {}: {}",
                state_dir.display(),
                e
            ))
        })?;
        for entry in entries.filter_map(std::result::Result::ok) {
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if name_str.starts_with(self.prefix) && name_str.ends_with(TEMP_SUFFIX) {
                let _ = std::fs::remove_file(entry.path());
            }
        }
        Ok(())
    }
}

impl<T: DeserializeOwned> StateFormat<T> {
    /// Read and validate a single generation
    pub fn read_generation(&self, path: &Path, generation: u64) -> Result<T> {
        let display = path.display().to_string();
        let data = std::fs::read(path)
            .map_err(|e| Error::storage(format!("failed to read state file {display}: {e}")))?;

        let header = StateHeader::from_bytes(&data)
            .ok_or_else(|| Error::corrupt_state(&display, "invalid state header"))?;
        if header.version != StateHeader::VERSION {
            return Err(Error::corrupt_state(
                &display,
                format!("unsupported format version {}", header.version),
            ));
        }
        if header.generation != generation {
            return Err(Error::corrupt_state(
                &display,
                format!("header generation {} does not match file name", header.generation),
            ));
        }

        let body = &data[StateHeader::SIZE..];
        if body.len() as u64 != header.body_len {
            return Err(Error::corrupt_state(
                &display,
                format!("expected {} body bytes, found {}", header.body_len, body.len()),
            ));
        }

        let computed = crc32c::crc32c(body);
        if computed != header.checksum {
            return Err(Error::ChecksumMismatch {
                expected: header.checksum,
                actual: computed,
            });
        }

        serde_json::from_slice(body).map_err(|e| {
            Error::Deserialization(format!("failed to decode state file {display}: {e}"))
        })
    }
}

impl<T: Serialize + DeserializeOwned> StateCodec<T> for StateFormat<T> {
    fn load_latest_state(&self, location: &StateLocation) -> Result<Option<T>> {
        let state_dir = location.state_dir();
        let generations = self.list_generations(&state_dir)?;
        if generations.is_empty() {
            return Ok(None);
        }

        let mut last_error = None;
        for (generation, path) in &generations {
            match self.read_generation(path, *generation) {
                Ok(state) => {
                    debug!("{} loaded state generation {}", location, generation);
                    return Ok(Some(state));
                }
                Err(e) => {
                    warn!(
                        "{} skipping unreadable state generation {}: {}",
                        location, generation, e
                    );
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error.map_or_else(String::new, |e| e.to_string());
        Err(Error::corrupt_state(
            state_dir.display().to_string(),
            format!(
                "none of {} state generation(s) is readable, last error: {}",
                generations.len(),
                reason
            ),
        ))
    }

    fn write(&self, state: &T, location: &StateLocation) -> Result<()> {
        let state_dir = location.state_dir();
        std::fs::create_dir_all(&state_dir).map_err(|e| {
            Error::storage(format!(
                "failed to create state dir {}: {}",
                state_dir.display(),
                e
            ))
        })?;

        let generation = match self.list_generations(&state_dir)?.first() {
            None => 0,
            Some((newest, path)) => newest.checked_add(1).ok_or_else(|| {
                Error::corrupt_state(
                    path.display().to_string(),
                    "state generation counter is exhausted",
                )
            })?,
        };

        let body = serde_json::to_vec(state)
            .map_err(|e| Error::Serialization(format!("failed to encode state: {e}")))?;
        let header = StateHeader::new(generation, &body);

        // Write to temporary file first
        let file_name = self.file_name(generation);
        let state_path = state_dir.join(&file_name);
        let temp_path = state_dir.join(format!("{file_name}{TEMP_SUFFIX}"));

        if let Err(e) = self.write_file(&temp_path, &header, &body) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }

        // Atomic rename
        std::fs::rename(&temp_path, &state_path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            Error::storage(format!("failed to rename state file: {e}"))
        })?;

        if self.config.fsync {
            sync_dir(&state_dir)?;
        }

        debug!("{} wrote state generation {}", location, generation);
        if let Err(e) = self.cleanup_old_generations(&state_dir) {
            debug!("{} failed to clean up old state generations: {}", location, e);
        }
        Ok(())
    }
}

impl<T> StateFormat<T> {
    fn write_file(&self, path: &Path, header: &StateHeader, body: &[u8]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::storage(format!("failed to create state file: {e}")))?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(&header.to_bytes())
            .map_err(|e| Error::storage(format!("failed to write state header: {e}")))?;
        writer
            .write_all(body)
            .map_err(|e| Error::storage(format!("failed to write state body: {e}")))?;
        writer
            .flush()
            .map_err(|e| Error::storage(format!("failed to flush state file: {e}")))?;

        if self.config.fsync {
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| Error::storage(format!("failed to sync state file: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::storage(format!("failed to sync state dir {}: {}", dir.display(), e)))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
