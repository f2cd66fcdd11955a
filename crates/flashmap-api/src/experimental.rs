//! Handlers for `/experimental` — the experimental-feature allow-list.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/experimental` | `{"users": [...]}` |
//! | `GET`  | `/experimental?fid=<fid>` | `{"fid", "enabled"}` |
//! | `POST` | `/experimental` | Body: `{"fid": 42, "enabled": true}` |

use axum::{
  Json,
  extract::{Query, State, rejection::JsonRejection},
  response::{IntoResponse, Response},
};
use flashmap_core::{catalog::FlashCatalog, kv::KeyValueStore};
use serde::Deserialize;
use serde_json::json;

use crate::{
  ApiState,
  error::ApiError,
  params::{FidParam, body_fid, query_fid, required},
};

#[derive(Debug, Default, Deserialize)]
pub struct FlagQuery {
  pub fid: Option<String>,
}

/// `GET /experimental[?fid=<fid>]`
pub async fn get<S, C>(
  State(state): State<ApiState<S, C>>,
  Query(query): Query<FlagQuery>,
) -> Result<Response, ApiError>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  if query.fid.is_none() {
    let users = state.flags.enabled_users().await?;
    return Ok(Json(json!({ "users": users })).into_response());
  }
  let fid = query_fid(query.fid.as_deref())?;
  let enabled = state.flags.is_enabled(fid).await?;
  Ok(Json(json!({ "fid": fid, "enabled": enabled })).into_response())
}

#[derive(Debug, Deserialize)]
pub struct FlagBody {
  pub fid:     Option<FidParam>,
  pub enabled: Option<bool>,
}

/// `POST /experimental`
pub async fn post<S, C>(
  State(state): State<ApiState<S, C>>,
  body: Result<Json<FlagBody>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  let Json(body) = body?;
  let fid = body_fid(body.fid.as_ref())?;
  let enabled = required(body.enabled, "enabled")?;
  let changed = state.flags.set_enabled(fid, enabled).await?;
  Ok(Json(json!({ "fid": fid, "enabled": enabled, "changed": changed })).into_response())
}
