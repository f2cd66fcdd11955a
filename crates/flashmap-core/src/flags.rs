//! Experimental-feature allow-list: a flat set of user ids.

use std::sync::Arc;

use crate::{Error, Result, kv::KeyValueStore, registry::RegistryOptions};

pub struct FeatureFlags<S> {
  store: Arc<S>,
  key:   String,
}

impl<S> Clone for FeatureFlags<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), key: self.key.clone() }
  }
}

impl<S: KeyValueStore> FeatureFlags<S> {
  pub fn new(store: Arc<S>, options: &RegistryOptions) -> Self {
    Self { store, key: format!("{}experimental_users", options.key_prefix) }
  }

  pub async fn is_enabled(&self, fid: u64) -> Result<bool> {
    self
      .store
      .set_contains(&self.key, &fid.to_string())
      .await
      .map_err(Error::store)
  }

  /// Add or remove `fid`. Returns `true` if membership changed.
  pub async fn set_enabled(&self, fid: u64, enabled: bool) -> Result<bool> {
    let member = fid.to_string();
    let changed = if enabled {
      self.store.set_add(&self.key, &member).await
    } else {
      self.store.set_remove(&self.key, &member).await
    }
    .map_err(Error::store)?;
    if changed {
      tracing::info!(fid, enabled, "experimental features toggled");
    }
    Ok(changed)
  }

  /// All allow-listed users, ascending. Members that are not numeric ids are
  /// skipped.
  pub async fn enabled_users(&self) -> Result<Vec<u64>> {
    let members = self.store.set_members(&self.key).await.map_err(Error::store)?;
    let mut fids: Vec<u64> = members
      .iter()
      .filter_map(|m| match m.parse() {
        Ok(fid) => Some(fid),
        Err(_) => {
          tracing::warn!(member = %m, "ignoring non-numeric experimental user");
          None
        }
      })
      .collect();
    fids.sort_unstable();
    Ok(fids)
  }
}
