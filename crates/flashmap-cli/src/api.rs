//! Client-side view of the Flashmap API.
//!
//! The aggregators and the local fallback talk to the server only through
//! [`StatusApi`] and [`LinkApi`], so they can be driven by the HTTP client,
//! by the fallback wrapper, or by an in-process implementation in tests.
//!
//! Implementations report two failures with typed errors the fallback looks
//! for: [`Rejected`] for a call the remote refused outright, and [`Degraded`]
//! for a read answered without access to the remote's store. Anything else
//! is treated as the remote being unreachable.

use std::future::Future;

use anyhow::Result;
use flashmap_core::{
  collection::UserStatusCollection,
  flash::{FlashWithLinkInfo, UserFlashLinks},
  kv::KeyValueStore,
  registry::{RegistryKind, StatusRegistry},
  target::{TargetRef, TargetStatus},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// The remote refused the call (a 4xx answer); repeating it cannot succeed.
#[derive(Debug, Error)]
#[error("{what} rejected: {status} {message}")]
pub struct Rejected {
  pub what:    String,
  pub status:  u16,
  pub message: String,
}

/// The remote answered a read with a stand-in, because its store failed.
#[derive(Debug, Error)]
#[error("{what} answered from a degraded store")]
pub struct Degraded {
  pub what: String,
}

// ─── Status operations ───────────────────────────────────────────────────────

/// A write against one status list. Serialisable so failed writes can be
/// journaled and replayed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StatusOp {
  /// Insert or replace a target with the given status.
  Record { target: TargetRef, status: TargetStatus },
  Remove { target_id: String },
  /// Change the status of an already tracked target.
  SetStatus { target_id: String, status: TargetStatus },
}

impl StatusOp {
  pub fn add(target: TargetRef) -> Self {
    Self::Record { target, status: TargetStatus::WantToFind }
  }

  pub fn target_id(&self) -> &str {
    match self {
      Self::Record { target, .. } => &target.id,
      Self::Remove { target_id } | Self::SetStatus { target_id, .. } => target_id,
    }
  }

  /// Run this operation against a registry.
  pub async fn apply_to<S: KeyValueStore>(
    self,
    registry: &StatusRegistry<S>,
    fid: u64,
  ) -> flashmap_core::Result<UserStatusCollection> {
    match self {
      Self::Record { target, status } => registry.record_target(fid, &target, status).await,
      Self::Remove { target_id } => registry.remove_target(fid, &target_id).await,
      Self::SetStatus { target_id, status } => {
        registry.set_status(fid, &target_id, status).await
      }
    }
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// The status lists (`/hunt`, `/saved`, `/wishlist`).
pub trait StatusApi: Send + Sync {
  fn collection(
    &self,
    kind: RegistryKind,
    fid: u64,
  ) -> impl Future<Output = Result<UserStatusCollection>> + Send + '_;

  /// Perform `op` and return the collection it produced.
  fn apply(
    &self,
    kind: RegistryKind,
    fid: u64,
    op: StatusOp,
  ) -> impl Future<Output = Result<UserStatusCollection>> + Send + '_;
}

/// The flash links (`/flash-links`).
pub trait LinkApi: Send + Sync {
  fn links(&self, fid: u64) -> impl Future<Output = Result<UserFlashLinks>> + Send + '_;

  fn link<'a>(
    &'a self,
    fid: u64,
    flash_id: u64,
    target: &'a TargetRef,
    city: &'a str,
  ) -> impl Future<Output = Result<UserFlashLinks>> + Send + 'a;

  fn unlink(
    &self,
    fid: u64,
    flash_id: u64,
  ) -> impl Future<Output = Result<UserFlashLinks>> + Send + '_;

  fn linkable<'a>(
    &'a self,
    fid: u64,
    city: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<FlashWithLinkInfo>>> + Send + 'a;
}
