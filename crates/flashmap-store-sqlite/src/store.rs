//! [`SqliteStore`] — the SQLite implementation of [`KeyValueStore`].

use std::path::Path;

use flashmap_core::kv::KeyValueStore;
use rusqlite::OptionalExtension as _;

use crate::{Error, Result, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A key-value store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every key starting with `prefix`, ascending.
  pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
    let pattern = format!("{}%", escape_like(prefix));
    let keys = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT key FROM kv WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(keys)
  }

  /// Delete the document at `key`. Returns `true` if it existed.
  pub async fn delete(&self, key: &str) -> Result<bool> {
    let key = key.to_owned();
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?)
      })
      .await?;
    Ok(n > 0)
  }
}

fn escape_like(s: &str) -> String {
  s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

// ─── KeyValueStore impl ──────────────────────────────────────────────────────

impl KeyValueStore for SqliteStore {
  type Error = Error;

  async fn get(&self, key: &str) -> Result<Option<String>> {
    let key = key.to_owned();
    let value = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM kv WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(value)
  }

  async fn set(&self, key: &str, value: String) -> Result<()> {
    let key = key.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kv (key, value) VALUES (?1, ?2)
           ON CONFLICT (key) DO UPDATE SET
             value      = excluded.value,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
          rusqlite::params![key, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
    let (key, member) = (key.to_owned(), member.to_owned());
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO kv_sets (set_key, member) VALUES (?1, ?2)",
          rusqlite::params![key, member],
        )?)
      })
      .await?;
    Ok(n > 0)
  }

  async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
    let (key, member) = (key.to_owned(), member.to_owned());
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM kv_sets WHERE set_key = ?1 AND member = ?2",
          rusqlite::params![key, member],
        )?)
      })
      .await?;
    Ok(n > 0)
  }

  async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
    let (key, member) = (key.to_owned(), member.to_owned());
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM kv_sets WHERE set_key = ?1 AND member = ?2",
              rusqlite::params![key, member],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(found)
  }

  async fn set_members(&self, key: &str) -> Result<Vec<String>> {
    let key = key.to_owned();
    let members = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT member FROM kv_sets WHERE set_key = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![key], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(members)
  }
}
