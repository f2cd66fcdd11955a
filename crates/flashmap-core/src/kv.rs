//! The `KeyValueStore` trait — the persistence primitive under every registry.
//!
//! Implemented by storage backends (`flashmap-store-redis`,
//! `flashmap-store-sqlite`, and [`crate::memory::MemoryStore`]). Registries
//! store one JSON document per user under a string key and keep flat
//! allow-lists in sets.

use std::future::Future;

/// Abstraction over a key-value backend with string values and string sets.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait KeyValueStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Documents ─────────────────────────────────────────────────────────

  /// Read the value at `key`. Returns `None` if the key has never been set.
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  /// Overwrite the value at `key`.
  fn set<'a>(
    &'a self,
    key: &'a str,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Sets ──────────────────────────────────────────────────────────────

  /// Add `member` to the set at `key`. Returns `true` if it was not present.
  fn set_add<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Remove `member` from the set at `key`. Returns `true` if it was present.
  fn set_remove<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  fn set_contains<'a>(
    &'a self,
    key: &'a str,
    member: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// All members of the set at `key`, in no particular order.
  fn set_members<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;
}
