//! Session-scoped key-value storage.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Key-value capability with the lifetime of one browsing session.
///
/// Production embeds the host page's session storage; tests and headless
/// runs use [`MemoryStore`]. `set_if_absent` is the atomic claim primitive
/// the impression registry relies on.
pub trait SessionStore: Send + Sync {
  fn get(&self, key: &str) -> Option<String>;

  fn set(&self, key: &str, value: &str);

  fn has(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  /// Store `value` under `key` unless the key is already present.
  /// Returns true when this call claimed the key.
  fn set_if_absent(&self, key: &str, value: &str) -> bool;

  /// Drop every key, ending the session.
  fn reset(&self);
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl SessionStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    self.lock().get(key).cloned()
  }

  fn set(&self, key: &str, value: &str) {
    self.lock().insert(key.to_string(), value.to_string());
  }

  fn has(&self, key: &str) -> bool {
    self.lock().contains_key(key)
  }

  fn set_if_absent(&self, key: &str, value: &str) -> bool {
    let mut entries = self.lock();
    if entries.contains_key(key) {
      return false;
    }
    entries.insert(key.to_string(), value.to_string());
    true
  }

  fn reset(&self) {
    self.lock().clear();
  }
}
