//! Flashes and flash → target links.
//!
//! A flash is a photo the user captured in the game; its metadata is owned by
//! the external game-stats service. A link records which target a flash
//! depicts. A flash links to at most one target, while a target can collect
//! any number of flashes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{collection::next_timestamp, target::TargetRef};

// ─── Flash ───────────────────────────────────────────────────────────────────

/// A captured photo, as reported by the flash catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flash {
  pub flash_id:  u64,
  pub city:      String,
  pub image_url: String,
  pub taken_at:  DateTime<Utc>,
  #[serde(default)]
  pub text:      Option<String>,
}

/// A flash annotated with its current link, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashWithLinkInfo {
  #[serde(flatten)]
  pub flash: Flash,
  pub link:  Option<FlashLink>,
}

// ─── Link ────────────────────────────────────────────────────────────────────

/// A flash linked to the target it depicts. The target fields are a snapshot
/// taken at link time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashLink {
  pub flash_id:    u64,
  pub target_id:   String,
  pub target_name: String,
  pub lat:         f64,
  pub lng:         f64,
  pub city:        String,
  pub linked_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkStats {
  pub total_links:  usize,
  pub last_updated: Option<DateTime<Utc>>,
}

/// All links of one user. `flash_id` is unique within `links`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFlashLinks {
  pub fid:   u64,
  #[serde(default)]
  pub links: Vec<FlashLink>,
  #[serde(default)]
  pub stats: LinkStats,
}

impl UserFlashLinks {
  pub fn empty(fid: u64) -> Self {
    Self { fid, links: Vec::new(), stats: LinkStats::default() }
  }

  /// Link `flash_id` to `target`, replacing any link the flash already had.
  pub fn link(
    &mut self,
    flash_id: u64,
    target: &TargetRef,
    city: &str,
    now: DateTime<Utc>,
  ) {
    self.links.retain(|l| l.flash_id != flash_id);
    self.links.push(FlashLink {
      flash_id,
      target_id: target.id.clone(),
      target_name: target.display_name().to_owned(),
      lat: target.lat,
      lng: target.lng,
      city: city.to_owned(),
      linked_date: now,
    });
  }

  /// Remove the link of `flash_id`. Returns `false` if there was none.
  pub fn unlink(&mut self, flash_id: u64) -> bool {
    let before = self.links.len();
    self.links.retain(|l| l.flash_id != flash_id);
    self.links.len() != before
  }

  pub fn link_for_flash(&self, flash_id: u64) -> Option<&FlashLink> {
    self.links.iter().find(|l| l.flash_id == flash_id)
  }

  pub fn links_for_target<'a>(
    &'a self,
    target_id: &'a str,
  ) -> impl Iterator<Item = &'a FlashLink> + 'a {
    self.links.iter().filter(move |l| l.target_id == target_id)
  }

  pub fn count_for_target(&self, target_id: &str) -> usize {
    self.links_for_target(target_id).count()
  }

  /// Link counts keyed by target id.
  pub fn counts_by_target(&self) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for l in &self.links {
      *counts.entry(l.target_id.clone()).or_insert(0) += 1;
    }
    counts
  }

  pub fn recompute_stats(&mut self) { self.stats.total_links = self.links.len(); }

  /// Recompute stats and advance `last_updated` for a write at `now`.
  pub fn stamp(&mut self, now: DateTime<Utc>) {
    self.recompute_stats();
    self.stats.last_updated = Some(next_timestamp(self.stats.last_updated, now));
  }

  /// Annotate `flashes` with their current links, keeping only those taken in
  /// `city` (case-insensitive exact match) when given.
  pub fn annotate(
    &self,
    flashes: Vec<Flash>,
    city: Option<&str>,
  ) -> Vec<FlashWithLinkInfo> {
    let city = city
      .map(str::trim)
      .filter(|c| !c.is_empty())
      .map(str::to_lowercase);
    flashes
      .into_iter()
      .filter(|f| {
        city
          .as_deref()
          .is_none_or(|c| f.city.trim().to_lowercase() == c)
      })
      .map(|flash| {
        let link = self.link_for_flash(flash.flash_id).cloned();
        FlashWithLinkInfo { flash, link }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn flash(id: u64, city: &str) -> Flash {
    Flash {
      flash_id:  id,
      city:      city.into(),
      image_url: format!("https://img.example/{id}.jpg"),
      taken_at:  Utc::now(),
      text:      None,
    }
  }

  #[test]
  fn relink_replaces_existing_link() {
    let mut links = UserFlashLinks::empty(7);
    links.link(1001, &TargetRef::new("PA_05", 1.0, 2.0), "Paris", Utc::now());
    links.link(1001, &TargetRef::new("PA_06", 1.0, 2.0), "Paris", Utc::now());
    assert_eq!(links.links.len(), 1);
    assert_eq!(links.links[0].target_id, "PA_06");
    assert_eq!(links.count_for_target("PA_05"), 0);
  }

  #[test]
  fn many_flashes_per_target() {
    let mut links = UserFlashLinks::empty(7);
    let t = TargetRef::new("PA_05", 1.0, 2.0);
    links.link(1, &t, "Paris", Utc::now());
    links.link(2, &t, "Paris", Utc::now());
    links.link(3, &TargetRef::new("LDN_1", 0.0, 0.0), "London", Utc::now());
    assert_eq!(links.count_for_target("PA_05"), 2);
    let counts = links.counts_by_target();
    assert_eq!(counts.get("PA_05"), Some(&2));
    assert_eq!(counts.get("LDN_1"), Some(&1));
  }

  #[test]
  fn unlink_absent_is_noop() {
    let mut links = UserFlashLinks::empty(7);
    assert!(!links.unlink(42));
    assert!(links.links.is_empty());
  }

  #[test]
  fn annotate_filters_city_case_insensitively() {
    let mut links = UserFlashLinks::empty(7);
    links.link(1, &TargetRef::new("PA_05", 1.0, 2.0), "Paris", Utc::now());
    let annotated = links.annotate(
      vec![flash(1, "Paris"), flash(2, "PARIS"), flash(3, "Lyon")],
      Some("paris"),
    );
    assert_eq!(annotated.len(), 2);
    assert_eq!(
      annotated[0].link.as_ref().map(|l| l.target_id.as_str()),
      Some("PA_05")
    );
    assert!(annotated[1].link.is_none());
  }

  #[test]
  fn annotate_folds_non_ascii_city_names() {
    let links = UserFlashLinks::empty(7);
    let annotated = links.annotate(
      vec![flash(1, "Zürich"), flash(2, "Montréal"), flash(3, "Zurich")],
      Some(" ZÜRICH "),
    );
    assert_eq!(annotated.len(), 1);
    assert_eq!(annotated[0].flash.flash_id, 1);

    let annotated = links.annotate(vec![flash(2, "Montréal")], Some("MONTRÉAL"));
    assert_eq!(annotated.len(), 1);
  }

  #[test]
  fn annotate_without_city_keeps_everything() {
    let links = UserFlashLinks::empty(7);
    let annotated = links.annotate(vec![flash(1, "Paris"), flash(2, "Lyon")], None);
    assert_eq!(annotated.len(), 2);
  }
}
