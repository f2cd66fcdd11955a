//! Targets — the map-pinned collectibles users hunt for.
//!
//! A target is identified by the game-assigned id (e.g. `"TK_132"`); the token
//! before the first underscore is the city code. Targets are owned by an
//! external catalog, so this crate only ever stores a snapshot taken when the
//! user starts tracking one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Canonical status of a tracked target.
///
/// The legacy two-state lists stored `"found"`; it is read back as
/// [`TargetStatus::Alive`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetStatus {
  /// On the user's hunt list; not yet flashed.
  #[default]
  WantToFind,
  /// Found, and the mosaic was still on the wall.
  #[serde(alias = "found")]
  #[strum(to_string = "alive", serialize = "found")]
  Alive,
  /// Found destroyed or removed.
  Dead,
}

impl TargetStatus {
  /// Project onto the legacy two-state view.
  pub fn as_hunt_status(self) -> HuntStatus {
    match self {
      Self::WantToFind => HuntStatus::WantToFind,
      Self::Alive | Self::Dead => HuntStatus::Found,
    }
  }
}

/// Two-state projection used by the wishlist-style views.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HuntStatus {
  WantToFind,
  Found,
}

impl From<HuntStatus> for TargetStatus {
  fn from(s: HuntStatus) -> Self {
    match s {
      HuntStatus::WantToFind => Self::WantToFind,
      HuntStatus::Found => Self::Alive,
    }
  }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// Reference to an external target, as supplied by a client when it starts
/// tracking or linking one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
  pub id:        String,
  /// Display name; the id is used when absent.
  #[serde(default)]
  pub name:      Option<String>,
  pub lat:       f64,
  pub lng:       f64,
  /// URL of the catalog image; only its file extension is kept.
  #[serde(default)]
  pub image_url: Option<String>,
}

impl TargetRef {
  pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
    Self { id: id.into(), name: None, lat, lng, image_url: None }
  }

  pub fn validate(&self) -> Result<()> {
    if self.id.trim().is_empty() {
      return Err(Error::InvalidTarget("target id is empty".into()));
    }
    if !self.lat.is_finite() || !self.lng.is_finite() {
      return Err(Error::InvalidTarget(format!(
        "target {} has non-finite coordinates",
        self.id
      )));
    }
    Ok(())
  }

  pub fn display_name(&self) -> &str {
    self
      .name
      .as_deref()
      .filter(|n| !n.trim().is_empty())
      .unwrap_or(&self.id)
  }

  /// City code: the token of the id before the first `_`.
  pub fn city_code(&self) -> &str { city_code(&self.id) }
}

// ─── Stored record ───────────────────────────────────────────────────────────

/// A target as stored in a user's collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
  pub id:         String,
  pub name:       String,
  pub photo_url:  String,
  pub lat:        f64,
  pub lng:        f64,
  /// When the target (re-)entered the collection.
  pub added_date: DateTime<Utc>,
  #[serde(default)]
  pub status:     TargetStatus,
}

impl Target {
  /// Snapshot `target` with the given status, stamped `now`.
  pub fn from_ref(
    target: &TargetRef,
    status: TargetStatus,
    photo_base_url: &str,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      id: target.id.clone(),
      name: target.display_name().to_owned(),
      photo_url: photo_url(
        photo_base_url,
        &target.id,
        target.image_url.as_deref(),
      ),
      lat: target.lat,
      lng: target.lng,
      added_date: now,
      status,
    }
  }
}

// ─── Photo URLs ──────────────────────────────────────────────────────────────

/// The token of a target id before the first `_`, e.g. `"TK"` for `"TK_132"`.
pub fn city_code(id: &str) -> &str { id.split('_').next().unwrap_or(id) }

/// Build the canonical photo URL for a target:
/// `{base}/{city}/{id}.{ext}`, with `ext` taken from `image_ref`.
pub fn photo_url(base: &str, id: &str, image_ref: Option<&str>) -> String {
  let ext = image_ref.and_then(image_extension).unwrap_or_else(|| "jpg".into());
  format!("{}/{}/{id}.{ext}", base.trim_end_matches('/'), city_code(id))
}

/// Lowercased file extension of the path component of `url`.
fn image_extension(url: &str) -> Option<String> {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  let file = path.rsplit('/').next().unwrap_or(path);
  let (stem, ext) = file.rsplit_once('.')?;
  if stem.is_empty()
    || ext.is_empty()
    || !ext.chars().all(|c| c.is_ascii_alphanumeric())
  {
    return None;
  }
  Some(ext.to_ascii_lowercase())
}
