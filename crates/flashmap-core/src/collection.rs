//! Per-user status collections and their derived statistics.
//!
//! Everything here is pure: the server-side registry and the client-side
//! fallback cache both apply the same mutations to a [`UserStatusCollection`]
//! and differ only in where the result is persisted.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::target::{Target, TargetStatus};

// ─── Stats ───────────────────────────────────────────────────────────────────

/// Counts derived from a collection's items. Never mutated independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionStats {
  pub total_wanted: usize,
  /// Alive plus dead.
  pub total_found:  usize,
  pub total_alive:  usize,
  pub total_dead:   usize,
  /// Time of the last write; `None` until the collection is first persisted.
  pub last_updated: Option<DateTime<Utc>>,
}

/// Summary answered by `get_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySummary {
  pub total_wanted:    usize,
  pub total_found:     usize,
  pub total_items:     usize,
  /// Percentage of tracked targets that have been found, rounded.
  pub completion_rate: u32,
}

// ─── Collection ──────────────────────────────────────────────────────────────

/// The targets a user tracks in one registry, unique by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusCollection {
  pub fid:   u64,
  #[serde(default)]
  pub items: Vec<Target>,
  #[serde(default)]
  pub stats: CollectionStats,
}

impl UserStatusCollection {
  /// The implicit collection of a user with no prior activity.
  pub fn empty(fid: u64) -> Self {
    Self { fid, items: Vec::new(), stats: CollectionStats::default() }
  }

  pub fn get(&self, id: &str) -> Option<&Target> {
    self.items.iter().find(|t| t.id == id)
  }

  pub fn contains(&self, id: &str) -> bool { self.get(id).is_some() }

  pub fn status_of(&self, id: &str) -> Option<TargetStatus> {
    self.get(id).map(|t| t.status)
  }

  /// Insert `target`, or replace the existing item with the same id in place.
  pub fn upsert(&mut self, target: Target) {
    match self.items.iter_mut().find(|t| t.id == target.id) {
      Some(existing) => *existing = target,
      None => self.items.push(target),
    }
  }

  /// Remove the item with `id`. Returns `false` if it was absent.
  pub fn remove(&mut self, id: &str) -> bool {
    let before = self.items.len();
    self.items.retain(|t| t.id != id);
    self.items.len() != before
  }

  /// Change the status of an existing item. Returns `false` (and changes
  /// nothing) if the item is absent.
  pub fn set_status(&mut self, id: &str, status: TargetStatus) -> bool {
    match self.items.iter_mut().find(|t| t.id == id) {
      Some(t) => {
        t.status = status;
        true
      }
      None => false,
    }
  }

  /// Collapse items sharing an id into one, kept at the position of the
  /// first and holding the data of the last. Returns how many were dropped.
  pub fn dedupe(&mut self) -> usize {
    let before = self.items.len();
    let mut position: HashMap<String, usize> = HashMap::with_capacity(before);
    let mut items: Vec<Target> = Vec::with_capacity(before);
    for target in self.items.drain(..) {
      match position.get(&target.id) {
        Some(&i) => items[i] = target,
        None => {
          position.insert(target.id.clone(), items.len());
          items.push(target);
        }
      }
    }
    self.items = items;
    before - self.items.len()
  }

  /// Recompute the counts from `items`. `last_updated` is left alone.
  pub fn recompute_stats(&mut self) {
    let mut stats = CollectionStats {
      last_updated: self.stats.last_updated,
      ..CollectionStats::default()
    };
    for t in &self.items {
      match t.status {
        TargetStatus::WantToFind => stats.total_wanted += 1,
        TargetStatus::Alive => stats.total_alive += 1,
        TargetStatus::Dead => stats.total_dead += 1,
      }
    }
    stats.total_found = stats.total_alive + stats.total_dead;
    self.stats = stats;
  }

  /// Recompute stats and advance `last_updated` for a write at `now`.
  pub fn stamp(&mut self, now: DateTime<Utc>) {
    self.recompute_stats();
    self.stats.last_updated = Some(next_timestamp(self.stats.last_updated, now));
  }

  pub fn summary(&self) -> RegistrySummary {
    let mut c = self.clone();
    c.recompute_stats();
    let wanted = c.stats.total_wanted;
    let found = c.stats.total_found;
    RegistrySummary {
      total_wanted:    wanted,
      total_found:     found,
      total_items:     c.items.len(),
      completion_rate: completion_rate(wanted, found),
    }
  }
}

/// `round(found / (wanted + found) * 100)`, or 0 for an empty denominator.
pub fn completion_rate(wanted: usize, found: usize) -> u32 {
  let denominator = wanted + found;
  if denominator == 0 {
    return 0;
  }
  (found as f64 / denominator as f64 * 100.0).round() as u32
}

/// `now`, unless the clock has not moved past `previous`, in which case one
/// millisecond after it. Keeps `last_updated` strictly increasing.
pub(crate) fn next_timestamp(
  previous: Option<DateTime<Utc>>,
  now: DateTime<Utc>,
) -> DateTime<Utc> {
  match previous {
    Some(p) if now <= p => p + Duration::milliseconds(1),
    _ => now,
  }
}
