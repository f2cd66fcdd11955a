//! Client side of Flashmap: the HTTP API client, the offline fallback for the
//! status lists, and the aggregators that turn API answers into lookup
//! tables for the map.
//!
//! ```rust,ignore
//! let client = ApiClient::new(ApiConfig::new("http://localhost:8080"))?;
//! let cache = Arc::new(SqliteStore::open("cache.db").await?);
//! let mut map = MapData::new(Fallback::new(client, cache, "/invaders"), fid);
//! map.refresh_if_stale().await?;
//! ```

// Traits use native `async fn`; the `Send` bounds are spelled out on the
// trait signatures.
#![allow(async_fn_in_trait)]

pub mod api;
pub mod client;
pub mod fallback;
pub mod flash_links;
pub mod map_data;

pub use api::{Degraded, LinkApi, Rejected, StatusApi, StatusOp};
pub use client::{ApiClient, ApiConfig};
pub use fallback::Fallback;
pub use flash_links::FlashLinkIndex;
pub use map_data::MapData;

#[cfg(test)]
mod testing;
