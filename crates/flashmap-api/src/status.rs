//! Handlers for the status-list endpoints.
//!
//! The same pair of handlers serves `/hunt`, `/saved` and `/wishlist`; the
//! router binds each path to its [`RegistryKind`].
//!
//! | Method | Query / body | Returns |
//! |--------|--------------|---------|
//! | `GET`  | `?fid` | the collection |
//! | `GET`  | `?fid&invaderId` | `{"invaderId", "status"}` (status may be null) |
//! | `GET`  | `?fid&stats=true` | the summary |
//! | `POST` | [`StatusBody`] | the updated collection |
//!
//! Reads never fail on storage errors; they answer with an empty collection
//! and set the [`DEGRADED_HEADER`] response header. A `/wishlist` status
//! lookup answers in the two-state `want_to_find | found` vocabulary.

use axum::{
  Json,
  extract::{Query, State, rejection::JsonRejection},
  http::HeaderValue,
  response::{IntoResponse, Response},
};
use flashmap_core::{
  catalog::FlashCatalog,
  kv::KeyValueStore,
  registry::{CollectionRead, DEGRADED_HEADER, RegistryKind},
  target::{TargetRef, TargetStatus},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  ApiState,
  error::ApiError,
  params::{FidParam, body_fid, query_fid, query_flag, required},
};

// ─── GET ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
  pub fid:        Option<String>,
  #[serde(alias = "invader_id")]
  pub invader_id: Option<String>,
  pub stats:      Option<String>,
}

/// `GET /{hunt|saved|wishlist}?fid=<fid>[&invaderId=<id>|&stats=true]`
pub async fn get<S, C>(
  kind: RegistryKind,
  State(state): State<ApiState<S, C>>,
  Query(query): Query<StatusQuery>,
) -> Result<Response, ApiError>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  let fid = query_fid(query.fid.as_deref())?;
  let CollectionRead { collection, degraded } = state.registry(kind).read_collection(fid).await;

  let mut response = if let Some(id) = query.invader_id.filter(|id| !id.trim().is_empty()) {
    let status = collection.status_of(&id);
    let body = match kind {
      RegistryKind::Wishlist => {
        json!({ "invaderId": id, "status": status.map(TargetStatus::as_hunt_status) })
      }
      RegistryKind::Hunt | RegistryKind::Saved => json!({ "invaderId": id, "status": status }),
    };
    Json(body).into_response()
  } else if query_flag(query.stats.as_deref()) {
    Json(collection.summary()).into_response()
  } else {
    Json(collection).into_response()
  };

  if degraded {
    response
      .headers_mut()
      .insert(DEGRADED_HEADER, HeaderValue::from_static("true"));
  }
  Ok(response)
}

// ─── POST ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusAction {
  /// Start tracking `invader` (as wanted, or with the given `status`).
  Add,
  Remove,
  /// Legacy two-state "found"; recorded as alive.
  MarkFound,
  MarkAlive,
  MarkDead,
  /// Any status transition, taken from `status`.
  SetStatus,
}

/// JSON body accepted by `POST /{hunt|saved|wishlist}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
  pub fid:        Option<FidParam>,
  pub action:     Option<StatusAction>,
  pub invader:    Option<TargetRef>,
  #[serde(alias = "invader_id")]
  pub invader_id: Option<String>,
  /// Resulting status for `add` (defaults to `want_to_find`) and
  /// `set_status` (required).
  pub status:     Option<TargetStatus>,
}

impl StatusBody {
  /// The target id named by the body, from `invaderId` or `invader.id`.
  fn target_id(&self) -> Result<String, ApiError> {
    self
      .invader_id
      .clone()
      .or_else(|| self.invader.as_ref().map(|i| i.id.clone()))
      .filter(|id| !id.trim().is_empty())
      .ok_or_else(|| ApiError::BadRequest("invaderId is required".into()))
  }
}

/// `POST /{hunt|saved|wishlist}`
pub async fn post<S, C>(
  kind: RegistryKind,
  State(state): State<ApiState<S, C>>,
  body: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  let Json(body) = body?;
  let fid = body_fid(body.fid.as_ref())?;
  let action = required(body.action, "action")?;
  let registry = state.registry(kind);

  let collection = match action {
    StatusAction::Add => {
      let invader = required(body.invader.as_ref(), "invader")?;
      match body.status {
        Some(status) => registry.record_target(fid, invader, status).await?,
        None => registry.add_target(fid, invader).await?,
      }
    }
    StatusAction::Remove => registry.remove_target(fid, &body.target_id()?).await?,
    StatusAction::MarkFound => registry.mark_as_found(fid, &body.target_id()?).await?,
    StatusAction::MarkAlive => registry.mark_as_alive(fid, &body.target_id()?).await?,
    StatusAction::MarkDead => registry.mark_as_dead(fid, &body.target_id()?).await?,
    StatusAction::SetStatus => {
      let status = required(body.status, "status")?;
      registry.set_status(fid, &body.target_id()?, status).await?
    }
  };

  tracing::info!(%kind, fid, ?action, items = collection.items.len(), "status list updated");
  Ok(Json(collection).into_response())
}
