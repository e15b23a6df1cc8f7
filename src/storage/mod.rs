pub mod json_backend;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;

pub use json_backend::JsonStore;

/// Error type for persistence gateway failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Callback invoked with the affected key after every successful `set`.
pub type ChangeListener = Box<dyn Fn(&str) + Send + Sync>;

/// Generic key/value persistence gateway. The engine is agnostic to the
/// backing medium; it only requires JSON-serializable values and
/// last-write-wins semantics per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    /// Registers a change listener fired after each successful `set`.
    fn subscribe(&self, listener: ChangeListener);
}

/// Shared listener registry used by the bundled backends.
#[derive(Clone, Default)]
pub(crate) struct ChangeFeed {
    listeners: Arc<Mutex<Vec<ChangeListener>>>,
}

impl ChangeFeed {
    pub fn subscribe(&self, listener: ChangeListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    pub fn notify(&self, key: &str) {
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(key);
            }
        }
    }
}

/// In-memory backend for tests and embedding.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, Value>>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| StoreError::Backend("memory store poisoned".into()))?;
            entries.insert(key.to_string(), value);
        }
        self.feed.notify(key);
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) {
        self.feed.subscribe(listener);
    }
}
