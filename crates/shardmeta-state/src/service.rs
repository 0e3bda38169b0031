//! Metadata persistence coordinator.
//!
//! Loads and writes global and per-index state through a
//! [`NodeEnvironment`], one [`StateCodec`] per state type and a
//! [`GlobalStateSource`]. The service keeps no state of its own between
//! calls and takes no locks: concurrent writes to the same location must be
//! serialized by the caller.

use crate::env::{FsNodeEnvironment, NodeEnvironment};
use crate::format::{StateCodec, StateFormat};
use crate::global::{GlobalStateSource, LocalGlobalStateSource};
use crate::ingest;
use crate::metadata::{GlobalState, IndexMetaData, MetaData};
use crate::observer::{StateObserver, TracingObserver};
use shardmeta_common::{Error, GatewayConfig, Index, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Handles writing and loading both global and per-index metadata
pub struct MetaStateService {
    env: Arc<dyn NodeEnvironment>,
    index_codec: Arc<dyn StateCodec<IndexMetaData>>,
    global_codec: Arc<dyn StateCodec<GlobalState>>,
    global_source: Arc<dyn GlobalStateSource>,
    observer: Arc<dyn StateObserver>,
}

impl MetaStateService {
    pub fn new(
        env: Arc<dyn NodeEnvironment>,
        index_codec: Arc<dyn StateCodec<IndexMetaData>>,
        global_codec: Arc<dyn StateCodec<GlobalState>>,
        global_source: Arc<dyn GlobalStateSource>,
    ) -> Self {
        Self {
            env,
            index_codec,
            global_codec,
            global_source,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the diagnostics observer
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StateObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Service over the local data directory, reading global state from
    /// the node's own global location
    pub fn open(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        let env: Arc<dyn NodeEnvironment> = Arc::new(FsNodeEnvironment::from_config(config));
        let index_codec: Arc<dyn StateCodec<IndexMetaData>> =
            Arc::new(StateFormat::index(config.state.clone()));
        let global_codec: Arc<dyn StateCodec<GlobalState>> =
            Arc::new(StateFormat::global(config.state.clone()));
        let global_source = Arc::new(LocalGlobalStateSource::new(
            Arc::clone(&env),
            Arc::clone(&global_codec),
        ));

        info!("Opened metadata state service at {:?}", config.data_dir);
        Ok(Self::new(env, index_codec, global_codec, global_source))
    }

    /// Loads the full state: the global state plus every index state found
    /// on disk. Index folders without state are skipped.
    pub fn load_full_state(&self) -> Result<MetaData> {
        let mut builder = self.load_global_state()?.to_builder();
        let mut seen: HashMap<String, String> = HashMap::new();

        for folder in self.env.available_index_folders()? {
            let Some(index_metadata) = self.load_index_folder(&folder)? else {
                continue;
            };
            Self::check_duplicate(&mut seen, &folder, &index_metadata)?;
            builder.put(index_metadata);
        }

        let metadata = builder.build();
        debug!("Loaded full state with {} indices", metadata.num_indices());
        Ok(metadata)
    }

    /// Loads the state of one index, `None` if it was never written on this
    /// node
    pub fn load_index_state(&self, index: &Index) -> Result<Option<IndexMetaData>> {
        let location = self.env.index_path(index);
        let Some(index_metadata) = self.index_codec.load_latest_state(&location)? else {
            return Ok(None);
        };
        if index_metadata.uuid() != index.uuid() {
            return Err(Error::IndexFolderMismatch {
                folder: index.uuid().to_string(),
                expected: index_metadata.uuid().to_string(),
            });
        }
        Ok(Some(index_metadata))
    }

    /// Loads every index state available on disk, skipping folders for
    /// which `exclude` returns true. Fails without partial results if any
    /// folder name differs from the UUID stored inside it.
    pub fn load_indices_states<F>(&self, exclude: F) -> Result<Vec<IndexMetaData>>
    where
        F: Fn(&str) -> bool,
    {
        let mut indices = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();

        for folder in self.env.available_index_folders()? {
            if exclude(&folder) {
                continue;
            }
            let Some(index_metadata) = self.load_index_folder(&folder)? else {
                continue;
            };
            Self::check_duplicate(&mut seen, &folder, &index_metadata)?;
            indices.push(index_metadata);
        }
        Ok(indices)
    }

    /// Loads the global state, *without* index state files. A node that
    /// never persisted global state gets [`MetaData::empty`].
    pub fn load_global_state(&self) -> Result<MetaData> {
        Ok(self
            .global_source
            .load_global_state()?
            .unwrap_or_else(MetaData::empty))
    }

    /// Decode global state from a JSON text payload
    pub fn load_global_state_from_str(&self, payload: &str) -> Result<MetaData> {
        ingest::decode_json(payload)
    }

    /// Decode global state from a binary payload
    pub fn load_global_state_from_bytes(&self, payload: &[u8]) -> Result<MetaData> {
        ingest::decode_binary(payload)
    }

    /// Writes the state of one index to its canonical location
    pub fn write_index(&self, reason: &str, index_metadata: &IndexMetaData) -> Result<()> {
        let index = index_metadata.index();
        self.observer.writing_index_state(index, reason);
        self.index_codec
            .write(index_metadata, &self.env.index_path(index))
            .map_err(|e| {
                self.observer.index_state_write_failed(index, &e);
                Error::index_write(index.clone(), e)
            })
    }

    /// Writes the global state, *without* the index states
    pub fn write_global_state(&self, reason: &str, metadata: &MetaData) -> Result<()> {
        self.observer.writing_global_state(reason);
        self.global_codec
            .write(metadata.global_state(), &self.env.node_data_path())
            .map_err(|e| {
                self.observer.global_state_write_failed(&e);
                Error::global_write(e)
            })
    }

    fn load_index_folder(&self, folder: &str) -> Result<Option<IndexMetaData>> {
        let location = self.env.resolve_index_folder(folder);
        match self.index_codec.load_latest_state(&location)? {
            Some(index_metadata) => {
                if index_metadata.uuid() != folder {
                    return Err(Error::IndexFolderMismatch {
                        folder: folder.to_string(),
                        expected: index_metadata.uuid().to_string(),
                    });
                }
                Ok(Some(index_metadata))
            }
            None => {
                self.observer.missing_index_state(folder);
                Ok(None)
            }
        }
    }

    fn check_duplicate(
        seen: &mut HashMap<String, String>,
        folder: &str,
        index_metadata: &IndexMetaData,
    ) -> Result<()> {
        if let Some(first) = seen.insert(index_metadata.name().to_string(), folder.to_string()) {
            return Err(Error::DuplicateIndex {
                name: index_metadata.name().to_string(),
                first,
                second: folder.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StateLocation;
    use crate::global::{MemoryGlobalStateSource, PersistedState};
    use parking_lot::Mutex;
    use shardmeta_common::StateFormatConfig;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::tempdir;

    // ---- In-memory collaborators ----

    #[derive(Default)]
    struct MemoryEnv {
        folders: Vec<String>,
    }

    impl MemoryEnv {
        fn with_folders(folders: &[&str]) -> Self {
            Self {
                folders: folders.iter().map(|f| (*f).to_string()).collect(),
            }
        }
    }

    impl NodeEnvironment for MemoryEnv {
        fn available_index_folders(&self) -> Result<Vec<String>> {
            Ok(self.folders.clone())
        }

        fn resolve_index_folder(&self, folder: &str) -> StateLocation {
            StateLocation::Index {
                folder: folder.to_string(),
                path: PathBuf::from("/mem/indices").join(folder),
            }
        }

        fn node_data_path(&self) -> StateLocation {
            StateLocation::Global {
                path: PathBuf::from("/mem"),
            }
        }
    }

    /// Codec keyed by the location path, optionally failing on write
    struct MemoryCodec<T> {
        states: Mutex<BTreeMap<PathBuf, T>>,
        corrupt: Vec<PathBuf>,
        fail_writes: bool,
    }

    impl<T> Default for MemoryCodec<T> {
        fn default() -> Self {
            Self {
                states: Mutex::new(BTreeMap::new()),
                corrupt: Vec::new(),
                fail_writes: false,
            }
        }
    }

    impl<T: Clone + Send> StateCodec<T> for MemoryCodec<T> {
        fn load_latest_state(&self, location: &StateLocation) -> Result<Option<T>> {
            if self.corrupt.iter().any(|p| p == location.path()) {
                return Err(Error::corrupt_state(
                    location.path().display().to_string(),
                    "bad checksum",
                ));
            }
            Ok(self.states.lock().get(location.path()).cloned())
        }

        fn write(&self, state: &T, location: &StateLocation) -> Result<()> {
            if self.fail_writes {
                return Err(Error::storage("disk full"));
            }
            self.states
                .lock()
                .insert(location.path().to_path_buf(), state.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
    }

    impl StateObserver for RecordingObserver {
        fn missing_index_state(&self, folder: &str) {
            self.events.lock().push(format!("missing {folder}"));
        }

        fn writing_index_state(&self, index: &Index, reason: &str) {
            self.events.lock().push(format!("writing {index} {reason}"));
        }

        fn index_state_write_failed(&self, index: &Index, _error: &Error) {
            self.events.lock().push(format!("failed {index}"));
        }

        fn writing_global_state(&self, reason: &str) {
            self.events.lock().push(format!("writing _global {reason}"));
        }

        fn global_state_write_failed(&self, _error: &Error) {
            self.events.lock().push("failed _global".to_string());
        }
    }

    struct FailingGlobalSource;

    impl GlobalStateSource for FailingGlobalSource {
        fn load_global_state(&self) -> Result<PersistedState<MetaData>> {
            Err(Error::storage("global store unreachable"))
        }
    }

    // ---- Fixtures ----

    fn index_meta(name: &str, uuid: &str) -> IndexMetaData {
        IndexMetaData::builder(Index::new(name, uuid).unwrap())
            .build()
            .unwrap()
    }

    struct Fixture {
        env: Arc<MemoryEnv>,
        index_codec: Arc<MemoryCodec<IndexMetaData>>,
        global_codec: Arc<MemoryCodec<GlobalState>>,
        global_source: Arc<dyn GlobalStateSource>,
        observer: Arc<RecordingObserver>,
    }

    impl Fixture {
        fn new(folders: &[&str]) -> Self {
            Self {
                env: Arc::new(MemoryEnv::with_folders(folders)),
                index_codec: Arc::new(MemoryCodec::default()),
                global_codec: Arc::new(MemoryCodec::default()),
                global_source: Arc::new(MemoryGlobalStateSource::new()),
                observer: Arc::new(RecordingObserver::default()),
            }
        }

        fn store(&self, folder: &str, index_metadata: IndexMetaData) {
            let location = self.env.resolve_index_folder(folder);
            self.index_codec.write(&index_metadata, &location).unwrap();
        }

        /// Make the state stored under `folder` fail to decode
        fn corrupt(&mut self, folder: &str) {
            let mut codec: MemoryCodec<IndexMetaData> = MemoryCodec::default();
            codec.corrupt.push(self.env.resolve_index_folder(folder).path().to_path_buf());
            codec.states = Mutex::new(self.index_codec.states.lock().clone());
            self.index_codec = Arc::new(codec);
        }

        fn service(&self) -> MetaStateService {
            MetaStateService::new(
                self.env.clone(),
                self.index_codec.clone(),
                self.global_codec.clone(),
                Arc::clone(&self.global_source),
            )
            .with_observer(self.observer.clone())
        }

        fn events(&self) -> Vec<String> {
            self.observer.events.lock().clone()
        }
    }

    fn global_with_settings() -> MetaData {
        let mut builder = MetaData::builder();
        builder
            .cluster_uuid("cluster-1")
            .version(3)
            .persistent_setting("cluster.name", "prod");
        builder.build()
    }

    // ---- Full-state load ----

    #[test]
    fn test_full_state_unions_global_and_indices() {
        let mut fixture = Fixture::new(&["A", "B", "C"]);
        fixture.global_source = Arc::new(MemoryGlobalStateSource::with_state(global_with_settings()));
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("B", index_meta("beta", "B"));
        fixture.store("C", index_meta("gamma", "C"));

        let metadata = fixture.service().load_full_state().unwrap();
        assert_eq!(metadata.num_indices(), 3);
        assert_eq!(metadata.cluster_uuid(), "cluster-1");
        assert_eq!(metadata.persistent_settings().get("cluster.name").unwrap(), "prod");
        for name in ["alpha", "beta", "gamma"] {
            assert!(metadata.has_index(name));
        }
    }

    #[test]
    fn test_full_state_first_boot_is_empty() {
        let fixture = Fixture::new(&[]);
        let metadata = fixture.service().load_full_state().unwrap();
        assert!(metadata.is_empty());
        assert_eq!(metadata, MetaData::empty());
    }

    #[test]
    fn test_full_state_skips_folder_without_state() {
        let fixture = Fixture::new(&["A", "B", "C"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("C", index_meta("gamma", "C"));

        let metadata = fixture.service().load_full_state().unwrap();
        assert_eq!(metadata.num_indices(), 2);
        assert!(!metadata.has_index("beta"));
        assert_eq!(fixture.events(), vec!["missing B"]);
    }

    #[test]
    fn test_full_state_disk_index_replaces_global_entry() {
        let mut fixture = Fixture::new(&["A"]);
        let mut builder = global_with_settings().to_builder();
        builder.put(index_meta("alpha", "A"));
        fixture.global_source = Arc::new(MemoryGlobalStateSource::with_state(builder.build()));

        let on_disk = index_meta("alpha", "A").to_builder().version(9).build().unwrap();
        fixture.store("A", on_disk.clone());

        let metadata = fixture.service().load_full_state().unwrap();
        assert_eq!(metadata.index("alpha"), Some(&on_disk));
    }

    #[test]
    fn test_full_state_propagates_global_failure() {
        let mut fixture = Fixture::new(&["A"]);
        fixture.global_source = Arc::new(FailingGlobalSource);
        assert!(matches!(
            fixture.service().load_full_state(),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn test_full_state_propagates_corruption() {
        let mut fixture = Fixture::new(&["A", "B"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.corrupt("B");

        let err = fixture.service().load_full_state().unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_full_state_rejects_duplicate_names() {
        let fixture = Fixture::new(&["A", "B"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("B", index_meta("alpha", "B"));

        let err = fixture.service().load_full_state().unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateIndex { ref name, ref first, ref second }
                if name == "alpha" && first == "A" && second == "B"
        ));
    }

    // ---- Single-index load ----

    #[test]
    fn test_load_index_state_absent() {
        let fixture = Fixture::new(&[]);
        let index = Index::new("never", "N").unwrap();
        assert!(fixture.service().load_index_state(&index).unwrap().is_none());
    }

    #[test]
    fn test_load_index_state_found() {
        let fixture = Fixture::new(&["A"]);
        fixture.store("A", index_meta("alpha", "A"));
        let index = Index::new("alpha", "A").unwrap();
        let loaded = fixture.service().load_index_state(&index).unwrap().unwrap();
        assert_eq!(loaded, index_meta("alpha", "A"));
    }

    #[test]
    fn test_load_index_state_uuid_mismatch() {
        let fixture = Fixture::new(&["A"]);
        fixture.store("A", index_meta("alpha", "Z"));
        let index = Index::new("alpha", "A").unwrap();
        let err = fixture.service().load_index_state(&index).unwrap_err();
        assert!(err.is_inconsistency());
    }

    #[test]
    fn test_load_index_state_corruption_is_error() {
        let mut fixture = Fixture::new(&["A"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.corrupt("A");

        let index = Index::new("alpha", "A").unwrap();
        let err = fixture.service().load_index_state(&index).unwrap_err();
        assert!(err.is_corruption());
        assert!(fixture.events().is_empty());
    }

    // ---- Indices enumeration ----

    #[test]
    fn test_load_indices_states_in_catalog_order() {
        let fixture = Fixture::new(&["B", "A"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("B", index_meta("beta", "B"));

        let indices = fixture.service().load_indices_states(|_| false).unwrap();
        let uuids: Vec<&str> = indices.iter().map(IndexMetaData::uuid).collect();
        assert_eq!(uuids, vec!["B", "A"]);
    }

    #[test]
    fn test_load_indices_states_exclusion() {
        let fixture = Fixture::new(&["A", "B"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("B", index_meta("beta", "B"));

        let indices = fixture.service().load_indices_states(|f| f == "A").unwrap();
        assert_eq!(indices.len(), 1);
        assert_eq!(indices[0].name(), "beta");
    }

    #[test]
    fn test_load_indices_states_folder_mismatch_is_fatal() {
        let fixture = Fixture::new(&["A", "B", "C"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("B", index_meta("beta", "B"));
        fixture.store("C", index_meta("gamma", "D"));

        let err = fixture.service().load_indices_states(|_| false).unwrap_err();
        match &err {
            Error::IndexFolderMismatch { folder, expected } => {
                assert_eq!(folder, "C");
                assert_eq!(expected, "D");
            }
            other => panic!("unexpected error: {other}"),
        }
        let message = err.to_string();
        assert!(message.contains("[C]") && message.contains("[D]"));
    }

    #[test]
    fn test_load_indices_states_mismatch_can_be_excluded() {
        let fixture = Fixture::new(&["A", "C"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("C", index_meta("gamma", "D"));

        let indices = fixture.service().load_indices_states(|f| f == "C").unwrap();
        assert_eq!(indices.len(), 1);
    }

    #[test]
    fn test_load_indices_states_skips_missing() {
        let fixture = Fixture::new(&["A", "B"]);
        fixture.store("B", index_meta("beta", "B"));

        let indices = fixture.service().load_indices_states(|_| false).unwrap();
        assert_eq!(indices.len(), 1);
        assert_eq!(fixture.events(), vec!["missing A"]);
    }

    #[test]
    fn test_load_indices_states_propagates_corruption() {
        let mut fixture = Fixture::new(&["A", "B"]);
        fixture.store("A", index_meta("alpha", "A"));
        fixture.store("B", index_meta("beta", "B"));
        fixture.corrupt("B");

        let err = fixture.service().load_indices_states(|_| false).unwrap_err();
        assert!(err.is_corruption());
        assert!(fixture.events().is_empty());

        // Excluding the corrupt folder skips it entirely
        let indices = fixture.service().load_indices_states(|f| f == "B").unwrap();
        assert_eq!(indices.len(), 1);
        assert_eq!(indices[0].name(), "alpha");
    }

    // ---- Global state ----

    #[test]
    fn test_load_global_state_not_persisted_is_empty() {
        let fixture = Fixture::new(&["A"]);
        fixture.store("A", index_meta("alpha", "A"));
        let metadata = fixture.service().load_global_state().unwrap();
        assert_eq!(metadata, MetaData::empty());
    }

    #[test]
    fn test_load_global_state_propagates_failure() {
        let mut fixture = Fixture::new(&[]);
        fixture.global_source = Arc::new(FailingGlobalSource);
        assert!(fixture.service().load_global_state().is_err());
    }

    #[test]
    fn test_load_global_state_payloads() {
        let fixture = Fixture::new(&[]);
        let service = fixture.service();
        let metadata = global_with_settings();

        let text = ingest::encode_json(&metadata).unwrap();
        let bytes = ingest::encode_binary(&metadata).unwrap();
        assert_eq!(service.load_global_state_from_str(&text).unwrap(), metadata);
        assert_eq!(service.load_global_state_from_bytes(&bytes).unwrap(), metadata);
        assert!(service.load_global_state_from_str("{").is_err());
    }

    // ---- Writes ----

    #[test]
    fn test_write_index_then_load() {
        let fixture = Fixture::new(&[]);
        let service = fixture.service();
        let written = index_meta("alpha", "A").to_builder().version(5).build().unwrap();

        service.write_index("created", &written).unwrap();
        let loaded = service.load_index_state(written.index()).unwrap();
        assert_eq!(loaded, Some(written));
        assert_eq!(fixture.events(), vec!["writing [alpha/A] created"]);
    }

    #[test]
    fn test_write_index_failure_is_wrapped() {
        let mut fixture = Fixture::new(&[]);
        fixture.index_codec = Arc::new(MemoryCodec {
            fail_writes: true,
            ..MemoryCodec::default()
        });
        let written = index_meta("alpha", "A");

        let err = fixture.service().write_index("created", &written).unwrap_err();
        match &err {
            Error::IndexWrite { index, source } => {
                assert_eq!(index, written.index());
                assert!(matches!(**source, Error::Storage(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            fixture.events(),
            vec!["writing [alpha/A] created", "failed [alpha/A]"]
        );
    }

    #[test]
    fn test_write_global_state_excludes_indices() {
        let fixture = Fixture::new(&[]);
        let mut builder = global_with_settings().to_builder();
        builder.put(index_meta("alpha", "A"));
        let metadata = builder.build();

        fixture.service().write_global_state("restore", &metadata).unwrap();
        let stored = fixture
            .global_codec
            .load_latest_state(&fixture.env.node_data_path())
            .unwrap()
            .unwrap();
        assert_eq!(&stored, metadata.global_state());
        assert_eq!(fixture.events(), vec!["writing _global restore"]);
    }

    #[test]
    fn test_write_global_state_failure_is_wrapped() {
        let mut fixture = Fixture::new(&[]);
        fixture.global_codec = Arc::new(MemoryCodec {
            fail_writes: true,
            ..MemoryCodec::default()
        });

        let err = fixture
            .service()
            .write_global_state("restore", &MetaData::empty())
            .unwrap_err();
        assert!(matches!(err, Error::GlobalWrite { .. }));
        assert_eq!(fixture.events(), vec!["writing _global restore", "failed _global"]);
    }

    // ---- Filesystem stack ----

    fn fs_config(dir: &std::path::Path) -> GatewayConfig {
        GatewayConfig {
            data_dir: dir.to_path_buf(),
            state: StateFormatConfig {
                retained_generations: 2,
                fsync: false,
            },
        }
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let mut config = fs_config(dir.path());
        config.state.retained_generations = 0;
        assert!(matches!(
            MetaStateService::open(&config),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_fs_first_boot() {
        let dir = tempdir().unwrap();
        let service = MetaStateService::open(&fs_config(dir.path())).unwrap();
        assert_eq!(service.load_full_state().unwrap(), MetaData::empty());
        assert!(service.load_indices_states(|_| false).unwrap().is_empty());
    }

    #[test]
    fn test_fs_write_and_reload_full_state() {
        let dir = tempdir().unwrap();
        let config = fs_config(dir.path());
        let service = MetaStateService::open(&config).unwrap();

        let mut builder = global_with_settings().to_builder();
        let alpha = index_meta("alpha", "A");
        let beta = index_meta("beta", "B")
            .to_builder()
            .number_of_shards(4)
            .alias("b")
            .build()
            .unwrap();
        builder.put(alpha.clone());
        builder.put(beta.clone());
        let metadata = builder.build();

        service.write_global_state("bootstrap", &metadata).unwrap();
        service.write_index("created", &alpha).unwrap();
        service.write_index("created", &beta).unwrap();

        // A fresh service over the same directory sees the same snapshot
        let reopened = MetaStateService::open(&config).unwrap();
        assert_eq!(reopened.load_full_state().unwrap(), metadata);
        assert_eq!(reopened.load_index_state(beta.index()).unwrap(), Some(beta));
    }

    #[test]
    fn test_fs_renamed_folder_detected() {
        let dir = tempdir().unwrap();
        let service = MetaStateService::open(&fs_config(dir.path())).unwrap();
        service.write_index("created", &index_meta("alpha", "A")).unwrap();
        service.write_index("created", &index_meta("beta", "B")).unwrap();
        service.write_index("created", &index_meta("gamma", "D")).unwrap();

        let indices_dir = dir.path().join("indices");
        std::fs::rename(indices_dir.join("D"), indices_dir.join("C")).unwrap();

        let err = service.load_indices_states(|_| false).unwrap_err();
        assert_eq!(err.to_string(), "[C] invalid index folder name, rename to [D]");
    }

    #[test]
    fn test_fs_empty_index_folder_skipped() {
        let dir = tempdir().unwrap();
        let service = MetaStateService::open(&fs_config(dir.path())).unwrap();
        service.write_index("created", &index_meta("alpha", "A")).unwrap();
        std::fs::create_dir_all(dir.path().join("indices").join("stale")).unwrap();

        let metadata = service.load_full_state().unwrap();
        assert_eq!(metadata.num_indices(), 1);
        assert_eq!(service.load_indices_states(|_| false).unwrap().len(), 1);
    }

    #[test]
    fn test_fs_write_failure_is_wrapped() {
        let dir = tempdir().unwrap();
        // A regular file where the indices directory should be
        std::fs::write(dir.path().join("indices"), b"not a dir").unwrap();
        let service = MetaStateService::open(&fs_config(dir.path())).unwrap();

        let err = service
            .write_index("created", &index_meta("alpha", "A"))
            .unwrap_err();
        assert!(err.is_write_failure());
    }
}
