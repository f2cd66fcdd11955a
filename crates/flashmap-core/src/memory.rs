//! [`MemoryStore`] — an in-process [`KeyValueStore`].
//!
//! Used by tests and for running the server without any external storage.
//! The store can be switched into an "unavailable" state in which every call
//! fails, to exercise the degraded paths of the registries.

use std::{
  collections::{BTreeSet, HashMap},
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;

use crate::kv::KeyValueStore;

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("memory store is unavailable")]
  Unavailable,
}

#[derive(Default)]
struct Inner {
  values:      HashMap<String, String>,
  sets:        HashMap<String, BTreeSet<String>>,
  unavailable: bool,
}

/// Cloning is cheap — clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
  inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Simulate an outage: while `true`, every operation fails.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.lock().unavailable = unavailable;
  }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn available(&self) -> Result<MutexGuard<'_, Inner>, MemoryError> {
    let guard = self.lock();
    if guard.unavailable {
      return Err(MemoryError::Unavailable);
    }
    Ok(guard)
  }
}

impl KeyValueStore for MemoryStore {
  type Error = MemoryError;

  async fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
    Ok(self.available()?.values.get(key).cloned())
  }

  async fn set(&self, key: &str, value: String) -> Result<(), MemoryError> {
    self.available()?.values.insert(key.to_owned(), value);
    Ok(())
  }

  async fn set_add(&self, key: &str, member: &str) -> Result<bool, MemoryError> {
    Ok(
      self
        .available()?
        .sets
        .entry(key.to_owned())
        .or_default()
        .insert(member.to_owned()),
    )
  }

  async fn set_remove(
    &self,
    key: &str,
    member: &str,
  ) -> Result<bool, MemoryError> {
    let mut inner = self.available()?;
    let removed = inner
      .sets
      .get_mut(key)
      .is_some_and(|set| set.remove(member));
    Ok(removed)
  }

  async fn set_contains(
    &self,
    key: &str,
    member: &str,
  ) -> Result<bool, MemoryError> {
    Ok(
      self
        .available()?
        .sets
        .get(key)
        .is_some_and(|set| set.contains(member)),
    )
  }

  async fn set_members(&self, key: &str) -> Result<Vec<String>, MemoryError> {
    Ok(
      self
        .available()?
        .sets
        .get(key)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default(),
    )
  }
}
