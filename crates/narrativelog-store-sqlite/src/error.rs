//! Error type for `narrativelog-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("message not found: {0}")]
  NotFound(uuid::Uuid),

  /// Attempted to invalidate or edit a message that is no longer valid.
  #[error("message {0} is already invalidated")]
  AlreadyInvalidated(uuid::Uuid),
}

impl From<Error> for narrativelog_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::NotFound(id) => Self::NotFound(id),
      Error::AlreadyInvalidated(id) => Self::AlreadyInvalidated(id),
      other => Self::persistence(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
