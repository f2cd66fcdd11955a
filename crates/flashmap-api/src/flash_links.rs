//! Handlers for `/flash-links`.
//!
//! | Method | Query / body | Returns |
//! |--------|--------------|---------|
//! | `GET`  | `?fid` | all links |
//! | `GET`  | `?fid&flash_id` | `{"flashId", "link"}` |
//! | `GET`  | `?fid&invader_id` | `{"invaderId", "links"}` |
//! | `GET`  | `?fid&invader_id&action=count` | `{"invaderId", "count"}` |
//! | `POST` | [`LinkBody`] | updated links, or linkable flashes |

use axum::{
  Json,
  extract::{Query, State, rejection::JsonRejection},
  response::{IntoResponse, Response},
};
use flashmap_core::{catalog::FlashCatalog, kv::KeyValueStore, target::TargetRef};
use serde::Deserialize;
use serde_json::json;

use crate::{
  ApiState,
  error::ApiError,
  params::{FidParam, body_fid, query_fid, query_u64, required},
};

// ─── GET ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct LinkQuery {
  pub fid:        Option<String>,
  #[serde(alias = "invaderId")]
  pub invader_id: Option<String>,
  #[serde(alias = "flashId")]
  pub flash_id:   Option<String>,
  /// `count` to answer only the number of links of `invader_id`.
  pub action:     Option<String>,
}

/// `GET /flash-links?fid=<fid>[&flash_id=<id>|&invader_id=<id>[&action=count]]`
pub async fn get<S, C>(
  State(state): State<ApiState<S, C>>,
  Query(query): Query<LinkQuery>,
) -> Result<Response, ApiError>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  let fid = query_fid(query.fid.as_deref())?;
  let links = &state.links;

  if let Some(flash_id) = query_u64("flash_id", query.flash_id.as_deref())? {
    let link = links.link_for_flash(fid, flash_id).await?;
    return Ok(Json(json!({ "flashId": flash_id, "link": link })).into_response());
  }

  if let Some(id) = query.invader_id.filter(|id| !id.trim().is_empty()) {
    if query.action.as_deref() == Some("count") {
      let count = links.link_count_for_target(fid, &id).await?;
      return Ok(Json(json!({ "invaderId": id, "count": count })).into_response());
    }
    let for_target = links.links_for_target(fid, &id).await?;
    return Ok(Json(json!({ "invaderId": id, "links": for_target })).into_response());
  }

  Ok(Json(links.get_links(fid).await?).into_response())
}

// ─── POST ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
  Link,
  Unlink,
  GetLinkableFlashes,
}

/// JSON body accepted by `POST /flash-links`.
#[derive(Debug, Deserialize)]
pub struct LinkBody {
  pub fid:      Option<FidParam>,
  pub action:   Option<LinkAction>,
  #[serde(alias = "flashId")]
  pub flash_id: Option<u64>,
  pub invader:  Option<TargetRef>,
  /// City of the flash for `link`; city filter for `get_linkable_flashes`.
  pub city:     Option<String>,
}

/// `POST /flash-links`
pub async fn post<S, C>(
  State(state): State<ApiState<S, C>>,
  body: Result<Json<LinkBody>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  let Json(body) = body?;
  let fid = body_fid(body.fid.as_ref())?;
  let action = required(body.action, "action")?;
  let links = &state.links;

  match action {
    LinkAction::Link => {
      let flash_id = required(body.flash_id, "flash_id")?;
      let invader = required(body.invader.as_ref(), "invader")?;
      let city = required(body.city.as_deref(), "city")?;
      let updated = links.link_flash(fid, flash_id, invader, city).await?;
      tracing::info!(fid, flash_id, target = %invader.id, "flash linked");
      Ok(Json(updated).into_response())
    }
    LinkAction::Unlink => {
      let flash_id = required(body.flash_id, "flash_id")?;
      let updated = links.unlink_flash(fid, flash_id).await?;
      tracing::info!(fid, flash_id, "flash unlinked");
      Ok(Json(updated).into_response())
    }
    LinkAction::GetLinkableFlashes => {
      let flashes = links.linkable_flashes(fid, body.city.as_deref()).await?;
      Ok(Json(flashes).into_response())
    }
  }
}
