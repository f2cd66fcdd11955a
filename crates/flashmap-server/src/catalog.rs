//! Flash catalog backed by the external game-stats service.

use std::time::Duration;

use flashmap_core::{
  catalog::FlashCatalog,
  flash::Flash,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
  #[error("flash catalog request failed: {0}")]
  Http(#[from] reqwest::Error),
}

/// Fetches a user's flashes with `GET` on a URL template such as
/// `https://stats.example/users/{fid}/flashes`. The response must be a JSON
/// array of [`Flash`].
#[derive(Debug, Clone)]
pub struct HttpFlashCatalog {
  client:       reqwest::Client,
  url_template: String,
}

impl HttpFlashCatalog {
  pub fn new(url_template: impl Into<String>, timeout: Duration) -> Result<Self, CatalogError> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url_template: url_template.into() })
  }

  pub fn url(&self, fid: u64) -> String {
    self.url_template.replace("{fid}", &fid.to_string())
  }
}

impl FlashCatalog for HttpFlashCatalog {
  type Error = CatalogError;

  async fn flashes(&self, fid: u64) -> Result<Vec<Flash>, CatalogError> {
    let url = self.url(fid);
    tracing::debug!(%url, "fetching flashes");
    let flashes = self
      .client
      .get(&url)
      .send()
      .await?
      .error_for_status()?
      .json::<Vec<Flash>>()
      .await?;
    Ok(flashes)
  }
}

/// The catalog the server runs with: HTTP when a URL template is configured,
/// otherwise none at all (every user has zero flashes).
#[derive(Debug, Clone)]
pub enum Catalog {
  Http(HttpFlashCatalog),
  Disabled,
}

impl FlashCatalog for Catalog {
  type Error = CatalogError;

  async fn flashes(&self, fid: u64) -> Result<Vec<Flash>, CatalogError> {
    match self {
      Catalog::Http(http) => http.flashes(fid).await,
      Catalog::Disabled => Ok(Vec::new()),
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::{Json, Router, extract::Path, routing::get};
  use chrono::{TimeZone, Utc};
  use tokio::net::TcpListener;

  use super::*;

  async fn spawn_stats_service() -> String {
    async fn flashes(Path(fid): Path<u64>) -> Json<Vec<Flash>> {
      Json(vec![Flash {
        flash_id:  fid * 1000 + 1,
        city:      "Paris".into(),
        image_url: "https://img.example/1.jpg".into(),
        taken_at:  Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        text:      None,
      }])
    }

    let app = Router::new().route("/users/{fid}/flashes", get(flashes));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/users/{{fid}}/flashes")
  }

  #[test]
  fn url_substitutes_fid() {
    let catalog =
      HttpFlashCatalog::new("https://stats.example/u/{fid}/flashes", Duration::from_secs(1))
        .unwrap();
    assert_eq!(catalog.url(7), "https://stats.example/u/7/flashes");
  }

  #[tokio::test]
  async fn fetches_flashes_over_http() {
    let template = spawn_stats_service().await;
    let catalog = Catalog::Http(HttpFlashCatalog::new(template, Duration::from_secs(5)).unwrap());

    let flashes = catalog.flashes(7).await.unwrap();
    assert_eq!(flashes.len(), 1);
    assert_eq!(flashes[0].flash_id, 7001);
    assert_eq!(flashes[0].city, "Paris");
  }

  #[tokio::test]
  async fn http_errors_propagate() {
    let template = spawn_stats_service().await.replace("/users/", "/missing/");
    let catalog = HttpFlashCatalog::new(template, Duration::from_secs(5)).unwrap();
    assert!(catalog.flashes(7).await.is_err());
  }

  #[tokio::test]
  async fn disabled_catalog_is_empty() {
    assert!(Catalog::Disabled.flashes(7).await.unwrap().is_empty());
  }
}
