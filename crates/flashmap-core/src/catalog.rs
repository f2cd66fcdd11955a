//! The `FlashCatalog` trait — the user's captured photos, owned by the
//! external game-stats service.
//!
//! The HTTP implementation lives in `flashmap-server`; this module provides the
//! trivial ones.

use std::{collections::HashMap, convert::Infallible, future::Future};

use crate::flash::Flash;

pub trait FlashCatalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every flash captured by `fid`.
  fn flashes(
    &self,
    fid: u64,
  ) -> impl Future<Output = Result<Vec<Flash>, Self::Error>> + Send + '_;
}

/// A catalog with no flashes, for deployments without a game-stats source.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl FlashCatalog for EmptyCatalog {
  type Error = Infallible;

  async fn flashes(&self, _fid: u64) -> Result<Vec<Flash>, Infallible> {
    Ok(Vec::new())
  }
}

/// A fixed catalog keyed by fid.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
  flashes: HashMap<u64, Vec<Flash>>,
}

impl StaticCatalog {
  pub fn new() -> Self { Self::default() }

  pub fn with_flashes(mut self, fid: u64, flashes: Vec<Flash>) -> Self {
    self.flashes.entry(fid).or_default().extend(flashes);
    self
  }
}

impl FlashCatalog for StaticCatalog {
  type Error = Infallible;

  async fn flashes(&self, fid: u64) -> Result<Vec<Flash>, Infallible> {
    Ok(self.flashes.get(&fid).cloned().unwrap_or_default())
  }
}
