//! Async HTTP client wrapping the Flashmap JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use flashmap_core::{
  collection::UserStatusCollection,
  flash::{FlashWithLinkInfo, UserFlashLinks},
  registry::{DEGRADED_HEADER, RegistryKind},
  target::TargetRef,
};
use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::api::{Degraded, LinkApi, Rejected, StatusApi, StatusOp};

/// Connection settings for the Flashmap API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub timeout:  Duration,
}

impl ApiConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { base_url: base_url.into(), timeout: Duration::from_secs(30) }
  }
}

/// Async HTTP client for the Flashmap JSON REST API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

#[derive(Deserialize)]
struct FlagState {
  enabled: bool,
}

#[derive(Deserialize)]
struct FlagChange {
  changed: bool,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  /// Decode a response, turning non-2xx answers into errors carrying the
  /// server's `{"error": ...}` message when there is one. A 4xx answer is a
  /// [`Rejected`] error and a degraded read a [`Degraded`] one.
  async fn read<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
      let message = resp
        .json::<ErrorBody>()
        .await
        .map(|b| b.error)
        .unwrap_or_default();
      if status.is_client_error() {
        return Err(Rejected { what: what.to_owned(), status: status.as_u16(), message }.into());
      }
      return Err(anyhow!("{what} → {status} {message}"));
    }
    if resp.headers().contains_key(DEGRADED_HEADER) {
      return Err(Degraded { what: what.to_owned() }.into());
    }
    resp.json().await.with_context(|| format!("deserialising {what}"))
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    path: &str,
    query: &[(&str, String)],
  ) -> Result<T> {
    let what = format!("GET {path}");
    let resp = self
      .client
      .get(self.url(path))
      .query(query)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    Self::read(resp, &what).await
  }

  async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
    let what = format!("POST {path}");
    let resp = self
      .client
      .post(self.url(path))
      .json(body)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    Self::read(resp, &what).await
  }

  // ── Experimental flags ────────────────────────────────────────────────────

  /// `GET /api/experimental?fid=<fid>`
  pub async fn experimental(&self, fid: u64) -> Result<bool> {
    let state: FlagState = self
      .get_json("/experimental", &[("fid", fid.to_string())])
      .await?;
    Ok(state.enabled)
  }

  /// `POST /api/experimental`; returns whether membership changed.
  pub async fn set_experimental(&self, fid: u64, enabled: bool) -> Result<bool> {
    let change: FlagChange = self
      .post_json("/experimental", &json!({ "fid": fid, "enabled": enabled }))
      .await?;
    Ok(change.changed)
  }
}

// ── Status lists ──────────────────────────────────────────────────────────────

fn status_body(fid: u64, op: &StatusOp) -> Value {
  match op {
    StatusOp::Record { target, status } => {
      json!({ "fid": fid, "action": "add", "invader": target, "status": status })
    }
    StatusOp::Remove { target_id } => {
      json!({ "fid": fid, "action": "remove", "invaderId": target_id })
    }
    StatusOp::SetStatus { target_id, status } => json!({
      "fid": fid,
      "action": "set_status",
      "invaderId": target_id,
      "status": status,
    }),
  }
}

impl StatusApi for ApiClient {
  /// `GET /api/{kind}?fid=<fid>`
  async fn collection(&self, kind: RegistryKind, fid: u64) -> Result<UserStatusCollection> {
    self
      .get_json(&format!("/{kind}"), &[("fid", fid.to_string())])
      .await
  }

  /// `POST /api/{kind}`
  async fn apply(
    &self,
    kind: RegistryKind,
    fid: u64,
    op: StatusOp,
  ) -> Result<UserStatusCollection> {
    self.post_json(&format!("/{kind}"), &status_body(fid, &op)).await
  }
}

// ── Flash links ───────────────────────────────────────────────────────────────

impl LinkApi for ApiClient {
  /// `GET /api/flash-links?fid=<fid>`
  async fn links(&self, fid: u64) -> Result<UserFlashLinks> {
    self
      .get_json("/flash-links", &[("fid", fid.to_string())])
      .await
  }

  async fn link(
    &self,
    fid: u64,
    flash_id: u64,
    target: &TargetRef,
    city: &str,
  ) -> Result<UserFlashLinks> {
    let body = json!({
      "fid": fid,
      "action": "link",
      "flash_id": flash_id,
      "invader": target,
      "city": city,
    });
    self.post_json("/flash-links", &body).await
  }

  async fn unlink(&self, fid: u64, flash_id: u64) -> Result<UserFlashLinks> {
    let body = json!({ "fid": fid, "action": "unlink", "flash_id": flash_id });
    self.post_json("/flash-links", &body).await
  }

  async fn linkable(&self, fid: u64, city: Option<&str>) -> Result<Vec<FlashWithLinkInfo>> {
    let body = json!({ "fid": fid, "action": "get_linkable_flashes", "city": city });
    self.post_json("/flash-links", &body).await
  }
}
