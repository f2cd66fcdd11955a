//! [`FlashLinkRegistry`] — per-user flash → target links.
//!
//! Unlike the status registries, every storage or catalog failure here is
//! returned to the caller; there is no degraded read path.

use std::sync::Arc;

use chrono::Utc;

use crate::{
  Error, Result,
  catalog::FlashCatalog,
  flash::{FlashLink, FlashWithLinkInfo, UserFlashLinks},
  kv::KeyValueStore,
  registry::RegistryOptions,
  target::TargetRef,
};

pub struct FlashLinkRegistry<S, C> {
  store:      Arc<S>,
  catalog:    Arc<C>,
  key_prefix: String,
}

impl<S, C> Clone for FlashLinkRegistry<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:      Arc::clone(&self.store),
      catalog:    Arc::clone(&self.catalog),
      key_prefix: self.key_prefix.clone(),
    }
  }
}

impl<S, C> FlashLinkRegistry<S, C>
where
  S: KeyValueStore,
  C: FlashCatalog,
{
  pub fn new(store: Arc<S>, catalog: Arc<C>, options: &RegistryOptions) -> Self {
    Self { store, catalog, key_prefix: options.key_prefix.clone() }
  }

  /// Storage key of `fid`'s links, e.g. `"flash_links:7"`.
  pub fn key(&self, fid: u64) -> String {
    format!("{}flash_links:{fid}", self.key_prefix)
  }

  async fn save(&self, links: &mut UserFlashLinks) -> Result<()> {
    links.stamp(Utc::now());
    let key = self.key(links.fid);
    let json = serde_json::to_string(links)?;
    self.store.set(&key, json).await.map_err(Error::store)?;
    tracing::debug!(key = %key, links = links.links.len(), "saved flash links");
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn get_links(&self, fid: u64) -> Result<UserFlashLinks> {
    let key = self.key(fid);
    let raw = self.store.get(&key).await.map_err(Error::store)?;
    let mut links = match raw {
      Some(json) => serde_json::from_str::<UserFlashLinks>(&json)?,
      None => UserFlashLinks::empty(fid),
    };
    links.fid = fid;
    links.recompute_stats();
    Ok(links)
  }

  pub async fn link_for_flash(
    &self,
    fid: u64,
    flash_id: u64,
  ) -> Result<Option<FlashLink>> {
    Ok(self.get_links(fid).await?.link_for_flash(flash_id).cloned())
  }

  pub async fn links_for_target(
    &self,
    fid: u64,
    target_id: &str,
  ) -> Result<Vec<FlashLink>> {
    let links = self.get_links(fid).await?;
    Ok(links.links_for_target(target_id).cloned().collect())
  }

  pub async fn link_count_for_target(&self, fid: u64, target_id: &str) -> Result<usize> {
    Ok(self.get_links(fid).await?.count_for_target(target_id))
  }

  /// The user's flashes from the catalog, each annotated with its current
  /// link, optionally restricted to one city.
  pub async fn linkable_flashes(
    &self,
    fid: u64,
    city: Option<&str>,
  ) -> Result<Vec<FlashWithLinkInfo>> {
    let flashes = self
      .catalog
      .flashes(fid)
      .await
      .map_err(|e| Error::Catalog(Box::new(e)))?;
    let links = self.get_links(fid).await?;
    Ok(links.annotate(flashes, city))
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Link `flash_id` to `target`. A flash that is already linked is moved to
  /// the new target; this is the only relink path.
  pub async fn link_flash(
    &self,
    fid: u64,
    flash_id: u64,
    target: &TargetRef,
    city: &str,
  ) -> Result<UserFlashLinks> {
    target.validate()?;
    let mut links = self.get_links(fid).await?;
    links.link(flash_id, target, city, Utc::now());
    self.save(&mut links).await?;
    Ok(links)
  }

  /// Remove the link of `flash_id`; a no-op success if it has none.
  pub async fn unlink_flash(&self, fid: u64, flash_id: u64) -> Result<UserFlashLinks> {
    let mut links = self.get_links(fid).await?;
    if links.unlink(flash_id) {
      self.save(&mut links).await?;
    }
    Ok(links)
  }
}
