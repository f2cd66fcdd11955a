//! [`Fallback`] — keeps the status lists usable while the API is unreachable.
//!
//! Wraps any [`StatusApi`] together with a local [`KeyValueStore`]:
//!
//! - every successful remote answer is cached locally under
//!   `local:{kind}:{fid}`;
//! - a failed or [`Degraded`] remote read is answered from that snapshot and
//!   never cached;
//! - a failed remote write is applied to the snapshot with the same
//!   collection rules the server uses, and journaled under
//!   `local:{kind}:{fid}:pending`. A [`Rejected`] write is returned as an
//!   error and not journaled.
//!
//! Journaled writes are replayed in order before the next remote call (or on
//! [`Fallback::sync`]). A replayed write the remote rejects is dropped with a
//! warning; any other failure stops replay and keeps the rest of the
//! journal. While anything is still pending, reads and writes stay local so
//! the snapshot is never overwritten by a remote answer that does not yet
//! include them. Replayed writes overwrite whatever the server holds for the
//! same target.

use std::sync::Arc;

use anyhow::{Context, Result};
use flashmap_core::{
  collection::UserStatusCollection,
  kv::KeyValueStore,
  registry::{RegistryKind, RegistryOptions, StatusRegistry},
};

use crate::api::{Rejected, StatusApi, StatusOp};

/// Key prefix of everything the fallback stores.
pub const LOCAL_PREFIX: &str = "local:";

/// Result of replaying a pending journal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Replay {
  pub replayed:  usize,
  /// Writes the remote rejected; they are gone from the journal.
  pub dropped:   usize,
  pub remaining: usize,
}

pub struct Fallback<A, L> {
  remote:  A,
  store:   Arc<L>,
  options: RegistryOptions,
}

impl<A, L> Fallback<A, L>
where
  A: StatusApi,
  L: KeyValueStore,
{
  /// `photo_base_url` should match the server's so locally recorded targets
  /// get the same photo URLs.
  pub fn new(remote: A, store: Arc<L>, photo_base_url: impl Into<String>) -> Self {
    let options = RegistryOptions {
      key_prefix:     LOCAL_PREFIX.into(),
      photo_base_url: photo_base_url.into(),
    };
    Self { remote, store, options }
  }

  pub fn remote(&self) -> &A { &self.remote }

  fn local(&self, kind: RegistryKind) -> StatusRegistry<L> {
    StatusRegistry::new(Arc::clone(&self.store), kind, &self.options)
  }

  /// Key of the cached snapshot, e.g. `"local:hunt:42"`.
  pub fn snapshot_key(&self, kind: RegistryKind, fid: u64) -> String {
    self.local(kind).key(fid)
  }

  /// Key of the pending journal, e.g. `"local:hunt:42:pending"`.
  pub fn pending_key(&self, kind: RegistryKind, fid: u64) -> String {
    format!("{}:pending", self.snapshot_key(kind, fid))
  }

  // ── Journal ───────────────────────────────────────────────────────────────

  /// Writes not yet accepted by the remote, oldest first.
  pub async fn pending(&self, kind: RegistryKind, fid: u64) -> Result<Vec<StatusOp>> {
    let key = self.pending_key(kind, fid);
    let raw = self
      .store
      .get(&key)
      .await
      .with_context(|| format!("reading {key}"))?;
    match raw {
      Some(json) => serde_json::from_str(&json).with_context(|| format!("decoding {key}")),
      None => Ok(Vec::new()),
    }
  }

  async fn save_pending(&self, kind: RegistryKind, fid: u64, ops: &[StatusOp]) -> Result<()> {
    let key = self.pending_key(kind, fid);
    let json = serde_json::to_string(ops)?;
    self
      .store
      .set(&key, json)
      .await
      .with_context(|| format!("writing {key}"))
  }

  /// Replay the pending journal against the remote, in order.
  pub async fn replay(&self, kind: RegistryKind, fid: u64) -> Result<Replay> {
    let pending = self.pending(kind, fid).await?;
    if pending.is_empty() {
      return Ok(Replay::default());
    }

    let mut replay = Replay::default();
    let mut latest = None;
    for op in &pending {
      match self.remote.apply(kind, fid, op.clone()).await {
        Ok(collection) => {
          latest = Some(collection);
          replay.replayed += 1;
        }
        Err(e) if e.is::<Rejected>() => {
          tracing::warn!(
            %kind,
            fid,
            target = op.target_id(),
            error = %e,
            "remote rejected pending write, dropping it"
          );
          replay.dropped += 1;
        }
        Err(e) => {
          tracing::warn!(%kind, fid, error = %e, "replay stopped, remote still unavailable");
          break;
        }
      }
    }

    let rest = &pending[replay.replayed + replay.dropped..];
    replay.remaining = rest.len();
    if rest.len() < pending.len() {
      self.save_pending(kind, fid, rest).await?;
      tracing::info!(
        %kind,
        fid,
        replayed = replay.replayed,
        dropped = replay.dropped,
        remaining = replay.remaining,
        "replayed pending writes"
      );
    }
    // The local snapshot already reflects every journaled write; only a fully
    // drained journal makes the remote answer at least as fresh.
    if let (true, Some(collection)) = (rest.is_empty(), latest) {
      self.cache(kind, &collection).await;
    }
    Ok(replay)
  }

  /// Replay pending writes and, once the journal is empty, refresh the local
  /// snapshot from the remote.
  pub async fn sync(&self, kind: RegistryKind, fid: u64) -> Result<Replay> {
    let replay = self.replay(kind, fid).await?;
    if replay.remaining == 0 {
      let collection = self.remote.collection(kind, fid).await?;
      self.cache(kind, &collection).await;
    }
    Ok(replay)
  }

  // ── Snapshot ──────────────────────────────────────────────────────────────

  /// Best effort: a failure to cache only costs freshness of the fallback.
  async fn cache(&self, kind: RegistryKind, collection: &UserStatusCollection) {
    let key = self.snapshot_key(kind, collection.fid);
    let result = match serde_json::to_string(collection) {
      Ok(json) => self.store.set(&key, json).await.map_err(anyhow::Error::new),
      Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
      tracing::warn!(%key, error = %e, "failed to cache collection locally");
    }
  }

  async fn apply_locally(
    &self,
    kind: RegistryKind,
    fid: u64,
    op: StatusOp,
  ) -> Result<UserStatusCollection> {
    let collection = op
      .clone()
      .apply_to(&self.local(kind), fid)
      .await
      .context("applying write to the local cache")?;
    let mut pending = self.pending(kind, fid).await?;
    pending.push(op);
    self.save_pending(kind, fid, &pending).await?;
    tracing::debug!(%kind, fid, pending = pending.len(), "write journaled locally");
    Ok(collection)
  }
}

impl<A, L> StatusApi for Fallback<A, L>
where
  A: StatusApi,
  L: KeyValueStore,
{
  async fn collection(&self, kind: RegistryKind, fid: u64) -> Result<UserStatusCollection> {
    let replay = self.replay(kind, fid).await?;
    if replay.remaining == 0 {
      match self.remote.collection(kind, fid).await {
        Ok(collection) => {
          self.cache(kind, &collection).await;
          return Ok(collection);
        }
        Err(e) => {
          tracing::warn!(%kind, fid, error = %e, "remote read failed, using local cache");
        }
      }
    }
    Ok(self.local(kind).get_collection(fid).await)
  }

  async fn apply(
    &self,
    kind: RegistryKind,
    fid: u64,
    op: StatusOp,
  ) -> Result<UserStatusCollection> {
    let replay = self.replay(kind, fid).await?;
    if replay.remaining == 0 {
      match self.remote.apply(kind, fid, op.clone()).await {
        Ok(collection) => {
          self.cache(kind, &collection).await;
          return Ok(collection);
        }
        Err(e) if e.is::<Rejected>() => return Err(e),
        Err(e) => {
          tracing::warn!(%kind, fid, error = %e, "remote write failed, applying locally");
        }
      }
    }
    self.apply_locally(kind, fid, op).await
  }
}
