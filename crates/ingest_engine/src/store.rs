use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use engine_logging::{engine_debug, engine_info, engine_warn};
use ingest_core::{PersistedSnapshot, SnapshotKey};

use crate::persist::{ensure_state_dir, AtomicFileWriter, PersistError};

pub const STATE_FILENAME: &str = "ingest_state.ron";

/// String key/value storage that survives restarts.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// Applies a batch of changes in one write; `None` removes the key.
    fn apply(&self, changes: Vec<(String, Option<String>)>) -> Result<(), PersistError>;

    fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.apply(vec![(key.to_string(), Some(value.to_string()))])
    }

    fn remove(&self, key: &str) -> Result<(), PersistError> {
        self.apply(vec![(key.to_string(), None)])
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn apply(&self, changes: Vec<(String, Option<String>)>) -> Result<(), PersistError> {
        let mut entries = lock(&self.entries);
        apply_changes(&mut entries, changes);
        Ok(())
    }
}

/// RON-backed store in a state directory. The whole map is rewritten
/// atomically on every change.
pub struct FileStore {
    writer: AtomicFileWriter,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<Self, PersistError> {
        ensure_state_dir(dir)?;
        let entries = read_entries(&dir.join(STATE_FILENAME));
        Ok(Self {
            writer: AtomicFileWriter::new(PathBuf::from(dir)),
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.writer.dir().join(STATE_FILENAME)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn apply(&self, changes: Vec<(String, Option<String>)>) -> Result<(), PersistError> {
        let mut entries = lock(&self.entries);
        let mut next = entries.clone();
        apply_changes(&mut next, changes);
        if next == *entries {
            return Ok(());
        }

        let pretty = ron::ser::PrettyConfig::new();
        let content = ron::ser::to_string_pretty(&next, pretty)
            .map_err(|err| PersistError::Serialize(err.to_string()))?;
        self.writer.write(STATE_FILENAME, &content)?;
        *entries = next;
        Ok(())
    }
}

fn read_entries(path: &Path) -> BTreeMap<String, String> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return BTreeMap::new();
        }
        Err(err) => {
            engine_warn!("Failed to read persisted state from {:?}: {}", path, err);
            return BTreeMap::new();
        }
    };

    match ron::from_str(&content) {
        Ok(entries) => {
            engine_info!("Loaded persisted state from {:?}", path);
            entries
        }
        Err(err) => {
            engine_warn!("Failed to parse persisted state from {:?}: {}", path, err);
            BTreeMap::new()
        }
    }
}

fn apply_changes(entries: &mut BTreeMap<String, String>, changes: Vec<(String, Option<String>)>) {
    for (key, value) in changes {
        match value {
            Some(value) => {
                entries.insert(key, value);
            }
            None => {
                entries.remove(&key);
            }
        }
    }
}

/// Typed access to the job snapshot keys.
#[derive(Clone)]
pub struct SnapshotRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> PersistedSnapshot {
        PersistedSnapshot::from_lookup(|key| self.store.get(key.as_str()))
    }

    pub fn save(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistError> {
        let changes = snapshot
            .entries()
            .into_iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect();
        self.store.apply(changes)
    }

    pub fn clear(&self) -> Result<(), PersistError> {
        engine_debug!("Clearing persisted job snapshot");
        let changes = SnapshotKey::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), None))
            .collect();
        self.store.apply(changes)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
