//! JSON REST API for Flashmap.
//!
//! Exposes an axum [`Router`] over the status registries, the flash-link
//! registry and the experimental-feature allow-list, all backed by one
//! [`KeyValueStore`]. Auth, TLS, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", flashmap_api::api_router(state))
//! ```

pub mod error;
pub mod experimental;
pub mod flash_links;
pub mod params;
pub mod status;

use std::sync::Arc;

use axum::{
  Router,
  extract::{Json, Query, State, rejection::JsonRejection},
  routing::{MethodRouter, get},
};
use flashmap_core::{
  catalog::FlashCatalog,
  flags::FeatureFlags,
  kv::KeyValueStore,
  links::FlashLinkRegistry,
  registry::{RegistryKind, RegistryOptions, StatusRegistry},
};

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Everything a handler needs, built once over a single store.
pub struct ApiState<S, C> {
  pub hunt:     StatusRegistry<S>,
  pub saved:    StatusRegistry<S>,
  pub wishlist: StatusRegistry<S>,
  pub links:    FlashLinkRegistry<S, C>,
  pub flags:    FeatureFlags<S>,
}

impl<S, C> Clone for ApiState<S, C> {
  fn clone(&self) -> Self {
    Self {
      hunt:     self.hunt.clone(),
      saved:    self.saved.clone(),
      wishlist: self.wishlist.clone(),
      links:    self.links.clone(),
      flags:    self.flags.clone(),
    }
  }
}

impl<S, C> ApiState<S, C>
where
  S: KeyValueStore,
  C: FlashCatalog,
{
  pub fn new(store: Arc<S>, catalog: Arc<C>, options: &RegistryOptions) -> Self {
    let registry = |kind| StatusRegistry::new(Arc::clone(&store), kind, options);
    Self {
      hunt:     registry(RegistryKind::Hunt),
      saved:    registry(RegistryKind::Saved),
      wishlist: registry(RegistryKind::Wishlist),
      links:    FlashLinkRegistry::new(Arc::clone(&store), catalog, options),
      flags:    FeatureFlags::new(Arc::clone(&store), options),
    }
  }

  pub fn registry(&self, kind: RegistryKind) -> &StatusRegistry<S> {
    match kind {
      RegistryKind::Hunt => &self.hunt,
      RegistryKind::Saved => &self.saved,
      RegistryKind::Wishlist => &self.wishlist,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(state: ApiState<S, C>) -> Router<()>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  Router::new()
    // Status lists
    .route("/hunt", status_routes(RegistryKind::Hunt))
    .route("/saved", status_routes(RegistryKind::Saved))
    .route("/wishlist", status_routes(RegistryKind::Wishlist))
    // Flash links
    .route(
      "/flash-links",
      get(flash_links::get::<S, C>).post(flash_links::post::<S, C>),
    )
    // Feature flags
    .route(
      "/experimental",
      get(experimental::get::<S, C>).post(experimental::post::<S, C>),
    )
    .with_state(state)
}

/// `GET` and `POST` for one status list, bound to `kind`.
fn status_routes<S, C>(kind: RegistryKind) -> MethodRouter<ApiState<S, C>>
where
  S: KeyValueStore + 'static,
  C: FlashCatalog + 'static,
{
  get(
    move |state: State<ApiState<S, C>>, query: Query<status::StatusQuery>| {
      status::get(kind, state, query)
    },
  )
  .post(
    move |state: State<ApiState<S, C>>,
          body: Result<Json<status::StatusBody>, JsonRejection>| {
      status::post(kind, state, body)
    },
  )
}
