//! [`MapData`] — one `target id → status` table for the map, built from the
//! hunt and saved lists.
//!
//! A target on the saved list shows its saved status; since the saved list
//! is the found list, a saved target still marked `want_to_find` shows as
//! `alive`. A target only on the hunt list shows as `want_to_find`.
//!
//! Mutations go through the API first and patch the table only once the call
//! succeeded; a failed call leaves the table as it was. The table is not
//! reconciled with the server after a mutation, so callers bound staleness
//! with [`MapData::refresh_if_stale`].

use std::{
  collections::{HashMap, HashSet},
  time::{Duration, Instant},
};

use anyhow::Result;
use flashmap_core::{
  collection::UserStatusCollection,
  registry::RegistryKind,
  target::{TargetRef, TargetStatus},
};

use crate::api::{StatusApi, StatusOp};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Marker counts per map category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapCounts {
  pub hunt:  usize,
  pub alive: usize,
  pub dead:  usize,
}

pub struct MapData<A> {
  api:       A,
  fid:       u64,
  max_age:   Duration,
  hunt:      HashSet<String>,
  saved:     HashMap<String, TargetStatus>,
  statuses:  HashMap<String, TargetStatus>,
  loaded_at: Option<Instant>,
  /// `true` while a load or mutation is in flight.
  pub loading: bool,
  /// Message of the last failed call, cleared by the next successful one.
  pub error:   Option<String>,
}

impl<A: StatusApi> MapData<A> {
  pub fn new(api: A, fid: u64) -> Self {
    Self {
      api,
      fid,
      max_age: DEFAULT_MAX_AGE,
      hunt: HashSet::new(),
      saved: HashMap::new(),
      statuses: HashMap::new(),
      loaded_at: None,
      loading: false,
      error: None,
    }
  }

  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = max_age;
    self
  }

  pub fn api(&self) -> &A { &self.api }

  pub fn fid(&self) -> u64 { self.fid }

  // ── Loading ───────────────────────────────────────────────────────────────

  /// Fetch both lists concurrently and rebuild the table.
  pub async fn load(&mut self) -> Result<()> {
    self.loading = true;
    let (hunt, saved) = tokio::join!(
      self.api.collection(RegistryKind::Hunt, self.fid),
      self.api.collection(RegistryKind::Saved, self.fid),
    );
    self.loading = false;

    let (hunt, saved) = match (hunt, saved) {
      (Ok(hunt), Ok(saved)) => (hunt, saved),
      (Err(e), _) | (_, Err(e)) => return Err(self.fail(e)),
    };
    self.rebuild(&hunt, &saved);
    self.loaded_at = Some(Instant::now());
    self.error = None;
    tracing::debug!(fid = self.fid, targets = self.statuses.len(), "map data loaded");
    Ok(())
  }

  pub fn is_stale(&self) -> bool {
    self
      .loaded_at
      .is_none_or(|at| at.elapsed() >= self.max_age)
  }

  /// Reload if never loaded or older than the configured max age. Returns
  /// whether a reload happened.
  pub async fn refresh_if_stale(&mut self) -> Result<bool> {
    if !self.is_stale() {
      return Ok(false);
    }
    self.load().await?;
    Ok(true)
  }

  fn rebuild(&mut self, hunt: &UserStatusCollection, saved: &UserStatusCollection) {
    self.hunt = hunt.items.iter().map(|t| t.id.clone()).collect();
    self.saved = saved
      .items
      .iter()
      .map(|t| (t.id.clone(), t.status))
      .collect();
    self.statuses.clear();
    let ids: Vec<String> = self.hunt.iter().chain(self.saved.keys()).cloned().collect();
    for id in ids {
      self.resolve(&id);
    }
  }

  /// Recompute the table entry of `id` from the two lists.
  fn resolve(&mut self, id: &str) {
    let status = match self.saved.get(id) {
      Some(TargetStatus::WantToFind) => Some(TargetStatus::Alive),
      Some(status) => Some(*status),
      None => self.hunt.contains(id).then_some(TargetStatus::WantToFind),
    };
    match status {
      Some(status) => self.statuses.insert(id.to_owned(), status),
      None => self.statuses.remove(id),
    };
  }

  fn fail(&mut self, e: anyhow::Error) -> anyhow::Error {
    tracing::warn!(fid = self.fid, error = %e, "map data call failed");
    self.error = Some(e.to_string());
    e
  }

  async fn call(&mut self, kind: RegistryKind, op: StatusOp) -> Result<()> {
    self.loading = true;
    let result = self.api.apply(kind, self.fid, op).await;
    self.loading = false;
    match result {
      Ok(_) => {
        self.error = None;
        Ok(())
      }
      Err(e) => Err(self.fail(e)),
    }
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  pub async fn add_to_hunt_list(&mut self, target: &TargetRef) -> Result<()> {
    self.call(RegistryKind::Hunt, StatusOp::add(target.clone())).await?;
    self.hunt.insert(target.id.clone());
    self.resolve(&target.id);
    Ok(())
  }

  pub async fn remove_from_hunt_list(&mut self, target_id: &str) -> Result<()> {
    let op = StatusOp::Remove { target_id: target_id.to_owned() };
    self.call(RegistryKind::Hunt, op).await?;
    self.hunt.remove(target_id);
    self.resolve(target_id);
    Ok(())
  }

  /// Save `target` as found and alive, whether or not it was saved before.
  pub async fn mark_alive(&mut self, target: &TargetRef) -> Result<()> {
    self.save(target, TargetStatus::Alive).await
  }

  pub async fn mark_dead(&mut self, target: &TargetRef) -> Result<()> {
    self.save(target, TargetStatus::Dead).await
  }

  async fn save(&mut self, target: &TargetRef, status: TargetStatus) -> Result<()> {
    let op = StatusOp::Record { target: target.clone(), status };
    self.call(RegistryKind::Saved, op).await?;
    self.saved.insert(target.id.clone(), status);
    self.resolve(&target.id);
    Ok(())
  }

  pub async fn remove_from_saved(&mut self, target_id: &str) -> Result<()> {
    let op = StatusOp::Remove { target_id: target_id.to_owned() };
    self.call(RegistryKind::Saved, op).await?;
    self.saved.remove(target_id);
    self.resolve(target_id);
    Ok(())
  }

  // ── Views ─────────────────────────────────────────────────────────────────

  pub fn statuses(&self) -> &HashMap<String, TargetStatus> { &self.statuses }

  pub fn status_of(&self, target_id: &str) -> Option<TargetStatus> {
    self.statuses.get(target_id).copied()
  }

  pub fn counts(&self) -> MapCounts {
    let mut counts = MapCounts::default();
    for status in self.statuses.values() {
      match status {
        TargetStatus::WantToFind => counts.hunt += 1,
        TargetStatus::Alive => counts.alive += 1,
        TargetStatus::Dead => counts.dead += 1,
      }
    }
    counts
  }

  /// Ids of the targets shown with one of `shown`, sorted.
  pub fn filter(&self, shown: &[TargetStatus]) -> Vec<&str> {
    let mut ids: Vec<&str> = self
      .statuses
      .iter()
      .filter(|(_, status)| shown.contains(status))
      .map(|(id, _)| id.as_str())
      .collect();
    ids.sort_unstable();
    ids
  }
}
