//! Test doubles for the client: [`InProcessApi`], the server-side registries
//! over a [`MemoryStore`] with a switch that makes every call fail as if the
//! network were down, and [`spawn_api`], the real HTTP API on a local port.

use std::{
  collections::HashSet,
  sync::{
    Arc,
    Mutex,
    PoisonError,
    atomic::{AtomicBool, AtomicI64, Ordering},
  },
};

use anyhow::{Result, bail};
use axum::Router;
use flashmap_api::{ApiState, api_router};
use flashmap_core::{
  catalog::{EmptyCatalog, StaticCatalog},
  collection::UserStatusCollection,
  flash::{Flash, FlashWithLinkInfo, UserFlashLinks},
  links::FlashLinkRegistry,
  memory::MemoryStore,
  registry::{RegistryKind, RegistryOptions, StatusRegistry},
  target::TargetRef,
};
use tokio::net::TcpListener;

use crate::{
  ApiClient, ApiConfig,
  api::{Degraded, LinkApi, Rejected, StatusApi, StatusOp},
};

/// Serve the API over a fresh [`MemoryStore`] on a local port. Returns a
/// client for it and the server's store.
pub async fn spawn_api() -> (ApiClient, MemoryStore) {
  let store = MemoryStore::new();
  let state = ApiState::new(
    Arc::new(store.clone()),
    Arc::new(EmptyCatalog),
    &RegistryOptions::default(),
  );
  let app = Router::new().nest("/api", api_router(state));
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  let client = ApiClient::new(ApiConfig::new(format!("http://{addr}"))).unwrap();
  (client, store)
}

pub struct InProcessApi {
  store:   Arc<MemoryStore>,
  links:   FlashLinkRegistry<MemoryStore, StaticCatalog>,
  options: RegistryOptions,
  offline: AtomicBool,
  /// Calls left before going offline; negative means unlimited.
  budget:  AtomicI64,
  /// Target ids whose writes are refused.
  refused: Mutex<HashSet<String>>,
}

impl InProcessApi {
  pub fn new() -> Self { Self::with_flashes(0, Vec::new()) }

  pub fn with_flashes(fid: u64, flashes: Vec<Flash>) -> Self {
    let store = Arc::new(MemoryStore::new());
    let options = RegistryOptions::default();
    let catalog = Arc::new(StaticCatalog::new().with_flashes(fid, flashes));
    Self {
      links: FlashLinkRegistry::new(Arc::clone(&store), catalog, &options),
      store,
      options,
      offline: AtomicBool::new(false),
      budget: AtomicI64::new(-1),
      refused: Mutex::new(HashSet::new()),
    }
  }

  /// The store behind the registries, e.g. to simulate a storage outage.
  pub fn store(&self) -> &MemoryStore { &self.store }

  /// Refuse every later write to `target_id`.
  pub fn refuse(&self, target_id: &str) {
    self
      .refused
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(target_id.to_owned());
  }

  pub fn registry(&self, kind: RegistryKind) -> StatusRegistry<MemoryStore> {
    StatusRegistry::new(Arc::clone(&self.store), kind, &self.options)
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
    self.budget.store(-1, Ordering::SeqCst);
  }

  /// Come online for exactly `calls` more calls.
  pub fn fail_after(&self, calls: i64) {
    self.offline.store(false, Ordering::SeqCst);
    self.budget.store(calls, Ordering::SeqCst);
  }

  fn reachable(&self) -> Result<()> {
    if self.offline.load(Ordering::SeqCst) {
      bail!("api unreachable");
    }
    let left = self.budget.load(Ordering::SeqCst);
    if left == 0 {
      bail!("api unreachable");
    }
    if left > 0 {
      self.budget.store(left - 1, Ordering::SeqCst);
    }
    Ok(())
  }
}

impl StatusApi for InProcessApi {
  async fn collection(&self, kind: RegistryKind, fid: u64) -> Result<UserStatusCollection> {
    self.reachable()?;
    let read = self.registry(kind).read_collection(fid).await;
    if read.degraded {
      return Err(Degraded { what: format!("{kind} collection") }.into());
    }
    Ok(read.collection)
  }

  async fn apply(
    &self,
    kind: RegistryKind,
    fid: u64,
    op: StatusOp,
  ) -> Result<UserStatusCollection> {
    self.reachable()?;
    let refused = self
      .refused
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .contains(op.target_id());
    if refused {
      return Err(
        Rejected {
          what:    format!("{kind} write"),
          status:  400,
          message: format!("{} refused", op.target_id()),
        }
        .into(),
      );
    }
    Ok(op.apply_to(&self.registry(kind), fid).await?)
  }
}

impl LinkApi for InProcessApi {
  async fn links(&self, fid: u64) -> Result<UserFlashLinks> {
    self.reachable()?;
    Ok(self.links.get_links(fid).await?)
  }

  async fn link(
    &self,
    fid: u64,
    flash_id: u64,
    target: &TargetRef,
    city: &str,
  ) -> Result<UserFlashLinks> {
    self.reachable()?;
    Ok(self.links.link_flash(fid, flash_id, target, city).await?)
  }

  async fn unlink(&self, fid: u64, flash_id: u64) -> Result<UserFlashLinks> {
    self.reachable()?;
    Ok(self.links.unlink_flash(fid, flash_id).await?)
  }

  async fn linkable(&self, fid: u64, city: Option<&str>) -> Result<Vec<FlashWithLinkInfo>> {
    self.reachable()?;
    Ok(self.links.linkable_flashes(fid, city).await?)
  }
}
