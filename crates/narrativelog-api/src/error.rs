//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use narrativelog_core::validation::ValidationError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Validation(ValidationError),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Convert any backend error through the shared taxonomy.
  pub fn from_store<E: Into<narrativelog_core::Error>>(e: E) -> Self { Self::from(e.into()) }
}

impl From<narrativelog_core::Error> for ApiError {
  fn from(e: narrativelog_core::Error) -> Self {
    use narrativelog_core::Error;
    match e {
      Error::Validation(v) => Self::Validation(v),
      Error::NotFound(id) => Self::NotFound(format!("message {id} not found")),
      Error::AlreadyInvalidated(id) => {
        Self::Conflict(format!("message {id} is already invalidated"))
      }
      Error::Persistence(source) => Self::Store(source),
    }
  }
}

impl From<ValidationError> for ApiError {
  fn from(e: ValidationError) -> Self { Self::Validation(e) }
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { Self::Validation(ValidationError::single("body", r.body_text())) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self {
    Self::Validation(ValidationError::single("query", r.body_text()))
  }
}

impl From<PathRejection> for ApiError {
  fn from(r: PathRejection) -> Self { Self::Validation(ValidationError::single("id", r.body_text())) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::Validation(v) => (
        StatusCode::BAD_REQUEST,
        json!({ "error": v.to_string(), "violations": v.violations }),
      ),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
      }
    };
    (status, Json(body)).into_response()
  }
}
