//! Service metadata endpoints.

use axum::{Json, extract::State};
use narrativelog_core::store::MessageStore;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Configuration {
  pub site_id: String,
}

#[derive(Debug, Serialize)]
pub struct Version {
  pub version: &'static str,
}

/// `GET /configuration`
pub async fn configuration<S>(State(state): State<AppState<S>>) -> Json<Configuration>
where
  S: MessageStore,
{
  Json(Configuration { site_id: state.site_id.to_string() })
}

/// `GET /version`
pub async fn version() -> Json<Version> {
  Json(Version { version: env!("CARGO_PKG_VERSION") })
}
