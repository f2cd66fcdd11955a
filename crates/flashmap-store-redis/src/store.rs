//! [`RedisStore`] — the Redis implementation of [`KeyValueStore`].

use flashmap_core::kv::KeyValueStore;
use redis::{
  AsyncCommands as _, Client,
  aio::{ConnectionManager, ConnectionManagerConfig},
};

use crate::Result;

/// A key-value store backed by a Redis server.
///
/// Holds one multiplexed [`ConnectionManager`], which reconnects on its own
/// after a dropped connection. Cloning is cheap and clones share the
/// connection. The handle is created once at startup and passed to whoever
/// needs it; dropping the last clone closes the connection.
#[derive(Clone)]
pub struct RedisStore {
  conn: ConnectionManager,
}

impl RedisStore {
  /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
  pub async fn connect(url: &str) -> Result<Self> {
    let client = Client::open(url)?;
    let config = ConnectionManagerConfig::new().set_number_of_retries(2);
    let conn = client.get_connection_manager_with_config(config).await?;
    tracing::info!("connected to redis");
    Ok(Self { conn })
  }

  /// A connection handle for one command; `ConnectionManager` clones share
  /// the underlying multiplexed connection.
  fn conn(&self) -> ConnectionManager { self.conn.clone() }
}

impl KeyValueStore for RedisStore {
  type Error = crate::Error;

  async fn get(&self, key: &str) -> Result<Option<String>> {
    Ok(self.conn().get::<_, Option<String>>(key).await?)
  }

  async fn set(&self, key: &str, value: String) -> Result<()> {
    self.conn().set::<_, _, ()>(key, value).await?;
    Ok(())
  }

  async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
    let added: i64 = self.conn().sadd(key, member).await?;
    Ok(added > 0)
  }

  async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
    let removed: i64 = self.conn().srem(key, member).await?;
    Ok(removed > 0)
  }

  async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
    Ok(self.conn().sismember(key, member).await?)
  }

  async fn set_members(&self, key: &str) -> Result<Vec<String>> {
    Ok(self.conn().smembers(key).await?)
  }
}
