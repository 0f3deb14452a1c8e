//! Session storage
//!
//! The cart reads and writes a single JSON value under its session key. Web frameworks adapt
//! their own per-user session to [`Session`]; [`MemorySession`] is a plain in-process store.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-user key/value session storage.
pub trait Session {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Option<&Value>;

    /// Stores `value` under `key`, replacing any previous value.
    fn insert(&mut self, key: &str, value: Value);

    /// Flags the session as changed so the owner persists it.
    fn mark_modified(&mut self);
}

/// In-memory session.
///
/// Serializes as the bare key/value map; the modified flag is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemorySession {
    values: FxHashMap<String, Value>,

    #[serde(skip)]
    modified: bool,
}

impl MemorySession {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything was written since the session was created.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Whether a value is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.values.remove(key);

        if removed.is_some() {
            self.modified = true;
        }

        removed
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn insert(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn mark_modified(&mut self) {
        self.modified = true;
    }
}
