//! Request parameter parsing shared by all handlers.

use serde::Deserialize;

use crate::error::ApiError;

/// A user id as it appears in a JSON body: clients send either a number or a
/// numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FidParam {
  Number(u64),
  Text(String),
}

/// Validate a query-string fid.
pub fn query_fid(raw: Option<&str>) -> Result<u64, ApiError> {
  raw
    .map(str::trim)
    .and_then(|s| s.parse().ok())
    .ok_or_else(|| ApiError::BadRequest("valid fid is required".into()))
}

/// Validate a body fid.
pub fn body_fid(raw: Option<&FidParam>) -> Result<u64, ApiError> {
  match raw {
    Some(FidParam::Number(n)) => Ok(*n),
    Some(FidParam::Text(s)) => query_fid(Some(s)),
    None => query_fid(None),
  }
}

/// Parse an optional numeric query parameter, rejecting malformed values.
pub fn query_u64(name: &str, raw: Option<&str>) -> Result<Option<u64>, ApiError> {
  raw
    .map(|s| {
      s.trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("{name} must be a number")))
    })
    .transpose()
}

/// `true` for `?flag=true` / `?flag=1` / bare `?flag`.
pub fn query_flag(raw: Option<&str>) -> bool {
  matches!(raw.map(str::trim), Some("" | "1" | "true"))
}

/// A required field of an action payload.
pub fn required<T>(value: Option<T>, what: &str) -> Result<T, ApiError> {
  value.ok_or_else(|| ApiError::BadRequest(format!("{what} is required")))
}
