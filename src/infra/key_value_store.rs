use crate::domain::errors::StoreError;
use log::{debug, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const SELECTED_FILES_KEY: &str = "selectedFiles";
pub const PROMPT_HEADER_KEY: &str = "promptHeader";
pub const PROMPT_FORMAT_KEY: &str = "promptFormat";
pub const THINKING_TAGS_KEY: &str = "thinkingTags";

/// Persistent string-keyed store owned by the host.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()>;
}

/// Reads `key` as `T`, falling back to `default` when it is absent or has the
/// wrong shape.
pub fn get_or<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str, default: T) -> T {
    match store.get(key) {
        Some(value) => match serde_json::from_value(value) {
            Ok(typed) => typed,
            Err(e) => {
                warn!("Ignoring stored value for {}: {}", key, e);
                default
            }
        },
        None => default,
    }
}

pub fn set_typed<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let value = serde_json::to_value(value).map_err(StoreError::from)?;
    store.set(key, value)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A JSON object on disk, rewritten in full on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let values = if path.exists() {
            debug!("Loading state from {}", path.display());
            let raw = fs::read_to_string(path)?;
            if raw.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&raw).map_err(|source| StoreError::Malformed {
                    path: path.display().to_string(),
                    source,
                })?
            }
        } else {
            debug!("No state file at {}, starting empty", path.display());
            Map::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let serialized = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, serialized)?;
        debug!("State written to {}", self.path.display());
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut values = lock(&self.values);
        values.insert(key.to_string(), value);
        self.flush(&values)?;
        info!("Persisted {}", key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        lock(&self.values).get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        lock(&self.values).insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
pub struct FailingStore;

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, key: &str, _value: Value) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("Disk full while writing {}", key))
    }
}
