//! [`FlashLinkIndex`] — lookup tables over a user's flash links.
//!
//! Both tables are rebuilt from the complete link list the API returns on
//! every call; they are never patched incrementally.

use std::collections::HashMap;

use anyhow::Result;
use flashmap_core::{
  flash::{FlashLink, FlashWithLinkInfo, UserFlashLinks},
  target::TargetRef,
};

use crate::api::LinkApi;

pub struct FlashLinkIndex<A> {
  api:             A,
  fid:             u64,
  link_by_flash:   HashMap<u64, FlashLink>,
  count_by_target: HashMap<String, usize>,
  pub loading:     bool,
  pub error:       Option<String>,
}

impl<A: LinkApi> FlashLinkIndex<A> {
  pub fn new(api: A, fid: u64) -> Self {
    Self {
      api,
      fid,
      link_by_flash: HashMap::new(),
      count_by_target: HashMap::new(),
      loading: false,
      error: None,
    }
  }

  pub fn api(&self) -> &A { &self.api }

  fn rebuild(&mut self, links: UserFlashLinks) {
    self.count_by_target = links.counts_by_target();
    self.link_by_flash = links
      .links
      .into_iter()
      .map(|link| (link.flash_id, link))
      .collect();
  }

  /// Record the outcome of an API call, rebuilding the tables on success.
  fn settle(&mut self, result: Result<UserFlashLinks>) -> Result<()> {
    self.loading = false;
    match result {
      Ok(links) => {
        self.rebuild(links);
        self.error = None;
        Ok(())
      }
      Err(e) => {
        tracing::warn!(fid = self.fid, error = %e, "flash link call failed");
        self.error = Some(e.to_string());
        Err(e)
      }
    }
  }

  pub async fn load(&mut self) -> Result<()> {
    self.loading = true;
    let result = self.api.links(self.fid).await;
    self.settle(result)
  }

  pub async fn link(&mut self, flash_id: u64, target: &TargetRef, city: &str) -> Result<()> {
    self.loading = true;
    let result = self.api.link(self.fid, flash_id, target, city).await;
    self.settle(result)
  }

  pub async fn unlink(&mut self, flash_id: u64) -> Result<()> {
    self.loading = true;
    let result = self.api.unlink(self.fid, flash_id).await;
    self.settle(result)
  }

  /// The user's flashes with their links; does not touch the tables.
  pub async fn linkable(&mut self, city: Option<&str>) -> Result<Vec<FlashWithLinkInfo>> {
    self.api.linkable(self.fid, city).await.inspect_err(|e| {
      self.error = Some(e.to_string());
    })
  }

  pub fn link_for_flash(&self, flash_id: u64) -> Option<&FlashLink> {
    self.link_by_flash.get(&flash_id)
  }

  pub fn count_for_target(&self, target_id: &str) -> usize {
    self.count_by_target.get(target_id).copied().unwrap_or(0)
  }

  pub fn is_linked(&self, flash_id: u64) -> bool { self.link_by_flash.contains_key(&flash_id) }

  /// All links, ordered by flash id.
  pub fn links(&self) -> Vec<&FlashLink> {
    let mut links: Vec<&FlashLink> = self.link_by_flash.values().collect();
    links.sort_unstable_by_key(|l| l.flash_id);
    links
  }
}
