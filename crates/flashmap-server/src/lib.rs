//! Flashmap HTTP server: configuration and application assembly.
//!
//! The binary in `main.rs` picks a store, builds the state with [`app`], and
//! serves it until Ctrl-C or SIGTERM.

pub mod catalog;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use flashmap_api::{ApiState, api_router};
use flashmap_core::{catalog::FlashCatalog, kv::KeyValueStore, registry::RegistryOptions};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use catalog::{Catalog, CatalogError, HttpFlashCatalog};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FLASHMAP_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  /// Remote store. When unset the server runs on the SQLite file at
  /// `store_path`.
  pub redis_url:             Option<String>,
  pub store_path:            PathBuf,
  pub key_prefix:            String,
  pub photo_base_url:        String,
  /// URL template with a `{fid}` placeholder; no catalog when unset.
  pub flash_catalog_url:     Option<String>,
  pub flash_catalog_timeout: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let registry = RegistryOptions::default();
    Self {
      host:                  "127.0.0.1".into(),
      port:                  8080,
      redis_url:             None,
      store_path:            PathBuf::from("flashmap.db"),
      key_prefix:            registry.key_prefix,
      photo_base_url:        registry.photo_base_url,
      flash_catalog_url:     None,
      flash_catalog_timeout: 10,
    }
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn registry_options(&self) -> RegistryOptions {
    RegistryOptions {
      key_prefix:     self.key_prefix.clone(),
      photo_base_url: self.photo_base_url.clone(),
    }
  }

  pub fn catalog(&self) -> Result<Catalog, CatalogError> {
    match &self.flash_catalog_url {
      Some(url) => Ok(Catalog::Http(HttpFlashCatalog::new(
        url.clone(),
        Duration::from_secs(self.flash_catalog_timeout),
      )?)),
      None => Ok(Catalog::Disabled),
    }
  }
}

// ─── Application ──────────────────────────────────────────────────────────────

/// The full application: the API under `/api`, with request tracing.
pub fn app<S, C>(store: Arc<S>, catalog: Arc<C>, config: &ServerConfig) -> Router
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  let state = ApiState::new(store, catalog, &config.registry_options());
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use flashmap_core::{catalog::EmptyCatalog, kv::KeyValueStore as _, memory::MemoryStore};
  use serde_json::Value;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn config_defaults_apply_to_missing_fields() {
    let settings = config::Config::builder()
      .set_override("port", 9000)
      .unwrap()
      .set_override("key_prefix", "flashmap:")
      .unwrap()
      .build()
      .unwrap();
    let cfg: ServerConfig = settings.try_deserialize().unwrap();

    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.address(), "127.0.0.1:9000");
    assert_eq!(cfg.redis_url, None);
    assert_eq!(cfg.registry_options().key_prefix, "flashmap:");
    assert_eq!(cfg.registry_options().photo_base_url, "/invaders");
    assert!(matches!(cfg.catalog().unwrap(), Catalog::Disabled));
  }

  #[test]
  fn catalog_url_enables_http_catalog() {
    let cfg = ServerConfig {
      flash_catalog_url: Some("http://stats.local/{fid}".into()),
      ..ServerConfig::default()
    };
    match cfg.catalog().unwrap() {
      Catalog::Http(http) => assert_eq!(http.url(3), "http://stats.local/3"),
      Catalog::Disabled => panic!("expected an http catalog"),
    }
  }

  #[tokio::test]
  async fn api_is_mounted_under_prefix() {
    let store = MemoryStore::new();
    let cfg = ServerConfig { key_prefix: "fm:".into(), ..ServerConfig::default() };
    let router = app(Arc::new(store.clone()), Arc::new(EmptyCatalog), &cfg);

    let req = Request::builder()
      .method("POST")
      .uri("/api/hunt")
      .header("content-type", "application/json")
      .body(Body::from(
        r#"{"fid":42,"action":"add","invader":{"id":"TK_132","lat":35.66,"lng":139.7}}"#,
      ))
      .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["items"][0]["photoUrl"], "/invaders/TK/TK_132.jpg");

    assert!(store.get("fm:hunt:42").await.unwrap().is_some());

    let req = Request::builder().uri("/hunt?fid=42").body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
