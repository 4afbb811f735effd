// ── Persistent key/value storage ──
//
// The plugin persists a handful of strings between page loads: the license
// key, the last successful validation time, the session token and the id of
// the NIP custom field. `KeyValueStore` abstracts over where they live.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dashmap::DashMap;
use tracing::warn;

use crate::error::CoreError;

/// Well-known storage keys.
pub mod keys {
    pub const LICENSE_KEY: &str = "nipGusLicenseKey";
    pub const LAST_VALIDATION: &str = "nipGusLastValidation";
    pub const SESSION: &str = "nip_gus_session_id";
    pub const NIP_FIELD_ID: &str = "nipFieldId";
}

/// String key/value storage surviving between plugin runs.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;
    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

// ── In-memory ────────────────────────────────────────────────────────

/// Volatile store, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

// ── JSON file ────────────────────────────────────────────────────────

/// Store backed by a single JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`. A corrupt file is
    /// treated as empty and overwritten on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "storage file unreadable, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(CoreError::storage(e)),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, mutate: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), CoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CoreError::storage("storage lock poisoned"))?;
        mutate(&mut entries);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(CoreError::storage)?;
        }
        let json = serde_json::to_string_pretty(&*entries).map_err(CoreError::storage)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(CoreError::storage)?;
        std::fs::rename(&tmp, &self.path).map_err(CoreError::storage)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError> {
        self.update(|entries| {
            entries.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
