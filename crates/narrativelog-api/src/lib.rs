//! JSON REST API for the narrative log.
//!
//! Exposes an axum [`Router`] backed by any
//! [`narrativelog_core::store::MessageStore`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/narrativelog", narrativelog_api::api_router(state))
//! ```

pub mod error;
pub mod messages;
pub mod service;

use std::sync::Arc;

use axum::{Router, routing::get};
use narrativelog_core::store::MessageStore;

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S> {
  pub store:   Arc<S>,
  /// Stamped on every message this server creates.
  pub site_id: Arc<str>,
}

impl<S> AppState<S> {
  pub fn new(store: S, site_id: impl Into<Arc<str>>) -> Self {
    Self { store: Arc::new(store), site_id: site_id.into() }
  }
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), site_id: Arc::clone(&self.site_id) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: MessageStore + 'static,
{
  Router::new()
    .route(
      "/messages",
      get(messages::find::<S>).post(messages::create::<S>),
    )
    .route(
      "/messages/{id}",
      get(messages::get_one::<S>)
        .patch(messages::edit::<S>)
        .delete(messages::invalidate::<S>),
    )
    .route("/configuration", get(service::configuration::<S>))
    .route("/version", get(service::version))
    .with_state(state)
}
