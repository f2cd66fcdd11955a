//! [`StatusRegistry`] — per-user collections of tracked targets.
//!
//! One registry type serves the hunt, saved and wishlist lists; each
//! [`RegistryKind`] keeps its collections under its own key namespace.
//!
//! # Failure policy
//!
//! Reads ([`StatusRegistry::get_collection`], [`StatusRegistry::get_status`],
//! [`StatusRegistry::get_stats`]) never fail: if the store is unreachable or
//! holds an undecodable document they log a warning and answer as if the
//! collection were empty, without persisting anything. Writes load the
//! current collection strictly and propagate every storage error, so a
//! degraded read is never written back over real data. Callers that must
//! tell a degraded answer from a real one use
//! [`StatusRegistry::read_collection`]; the HTTP API marks such answers with
//! [`DEGRADED_HEADER`].
//!
//! Every write stores the whole collection. Concurrent writers for the same
//! user race and the last `set` wins.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{
  Error, Result,
  collection::{RegistrySummary, UserStatusCollection},
  kv::KeyValueStore,
  target::{Target, TargetRef, TargetStatus},
};

/// Response header set on a status read answered with a degraded empty
/// collection.
pub const DEGRADED_HEADER: &str = "x-flashmap-degraded";

// ─── Options ─────────────────────────────────────────────────────────────────

/// Settings shared by every registry built over one store.
#[derive(Debug, Clone)]
pub struct RegistryOptions {
  /// Prepended to every key, e.g. `"flashmap:"`.
  pub key_prefix:     String,
  /// Base URL used to derive [`Target::photo_url`].
  pub photo_base_url: String,
}

impl Default for RegistryOptions {
  fn default() -> Self {
    Self { key_prefix: String::new(), photo_base_url: "/invaders".into() }
  }
}

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Which of the user's status lists a registry manages.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RegistryKind {
  /// Targets the user wants to find.
  Hunt,
  /// Targets the user has found, alive or dead.
  Saved,
  /// The older want/found list.
  Wishlist,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Answer of [`StatusRegistry::read_collection`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRead {
  pub collection: UserStatusCollection,
  pub degraded:   bool,
}

pub struct StatusRegistry<S> {
  store:          Arc<S>,
  kind:           RegistryKind,
  key_prefix:     String,
  photo_base_url: String,
}

impl<S> Clone for StatusRegistry<S> {
  fn clone(&self) -> Self {
    Self {
      store:          Arc::clone(&self.store),
      kind:           self.kind,
      key_prefix:     self.key_prefix.clone(),
      photo_base_url: self.photo_base_url.clone(),
    }
  }
}

impl<S: KeyValueStore> StatusRegistry<S> {
  pub fn new(store: Arc<S>, kind: RegistryKind, options: &RegistryOptions) -> Self {
    Self {
      store,
      kind,
      key_prefix: options.key_prefix.clone(),
      photo_base_url: options.photo_base_url.clone(),
    }
  }

  pub fn kind(&self) -> RegistryKind { self.kind }

  /// Storage key of `fid`'s collection, e.g. `"hunt:42"`.
  pub fn key(&self, fid: u64) -> String {
    format!("{}{}:{fid}", self.key_prefix, self.kind)
  }

  // ── Storage ───────────────────────────────────────────────────────────

  /// Load `fid`'s collection, failing on any storage or decoding error.
  /// Repeated ids keep their latest entry, and the stored stats block is
  /// never trusted; it is recomputed from `items`.
  async fn load(&self, fid: u64) -> Result<UserStatusCollection> {
    let key = self.key(fid);
    let raw = self.store.get(&key).await.map_err(Error::store)?;
    let mut collection = match raw {
      Some(json) => serde_json::from_str::<UserStatusCollection>(&json)?,
      None => UserStatusCollection::empty(fid),
    };
    collection.fid = fid;
    let dropped = collection.dedupe();
    if dropped > 0 {
      tracing::warn!(key = %key, dropped, "dropped duplicate targets from stored collection");
    }
    collection.recompute_stats();
    Ok(collection)
  }

  async fn save(&self, collection: &mut UserStatusCollection) -> Result<()> {
    collection.stamp(Utc::now());
    let key = self.key(collection.fid);
    let json = serde_json::to_string(collection)?;
    self.store.set(&key, json).await.map_err(Error::store)?;
    tracing::debug!(
      key = %key,
      items = collection.items.len(),
      "saved status collection"
    );
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// `fid`'s collection, flagged as degraded when the store failed and an
  /// empty collection stands in for it.
  pub async fn read_collection(&self, fid: u64) -> CollectionRead {
    match self.load(fid).await {
      Ok(collection) => CollectionRead { collection, degraded: false },
      Err(e) => {
        tracing::warn!(
          kind = %self.kind,
          fid,
          error = %e,
          "status collection unavailable, serving empty collection"
        );
        CollectionRead { collection: UserStatusCollection::empty(fid), degraded: true }
      }
    }
  }

  /// `fid`'s collection; empty if the user has none or the store fails.
  pub async fn get_collection(&self, fid: u64) -> UserStatusCollection {
    self.read_collection(fid).await.collection
  }

  pub async fn get_status(&self, fid: u64, target_id: &str) -> Option<TargetStatus> {
    self.get_collection(fid).await.status_of(target_id)
  }

  pub async fn get_stats(&self, fid: u64) -> RegistrySummary {
    self.get_collection(fid).await.summary()
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Start tracking `target` as wanted. Re-adding a tracked target resets its
  /// status to [`TargetStatus::WantToFind`] and refreshes `added_date`.
  pub async fn add_target(
    &self,
    fid: u64,
    target: &TargetRef,
  ) -> Result<UserStatusCollection> {
    self.record_target(fid, target, TargetStatus::WantToFind).await
  }

  /// Insert or replace `target` with the given status.
  pub async fn record_target(
    &self,
    fid: u64,
    target: &TargetRef,
    status: TargetStatus,
  ) -> Result<UserStatusCollection> {
    target.validate()?;
    let mut collection = self.load(fid).await?;
    collection.upsert(Target::from_ref(
      target,
      status,
      &self.photo_base_url,
      Utc::now(),
    ));
    self.save(&mut collection).await?;
    Ok(collection)
  }

  /// Stop tracking `target_id`. Removing an untracked id is a no-op success
  /// and writes nothing.
  pub async fn remove_target(
    &self,
    fid: u64,
    target_id: &str,
  ) -> Result<UserStatusCollection> {
    let mut collection = self.load(fid).await?;
    if collection.remove(target_id) {
      self.save(&mut collection).await?;
    }
    Ok(collection)
  }

  /// Change the status of a tracked target. An untracked id is a silent
  /// no-op: the target is *not* added.
  pub async fn set_status(
    &self,
    fid: u64,
    target_id: &str,
    status: TargetStatus,
  ) -> Result<UserStatusCollection> {
    let mut collection = self.load(fid).await?;
    if collection.set_status(target_id, status) {
      self.save(&mut collection).await?;
    }
    Ok(collection)
  }

  /// Legacy "found" — recorded as alive.
  pub async fn mark_as_found(
    &self,
    fid: u64,
    target_id: &str,
  ) -> Result<UserStatusCollection> {
    self.set_status(fid, target_id, TargetStatus::Alive).await
  }

  pub async fn mark_as_alive(
    &self,
    fid: u64,
    target_id: &str,
  ) -> Result<UserStatusCollection> {
    self.set_status(fid, target_id, TargetStatus::Alive).await
  }

  pub async fn mark_as_dead(
    &self,
    fid: u64,
    target_id: &str,
  ) -> Result<UserStatusCollection> {
    self.set_status(fid, target_id, TargetStatus::Dead).await
  }
}
