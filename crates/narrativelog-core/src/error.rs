//! Error taxonomy shared by every layer of the service.
//!
//! Storage backends keep their own error enums but must convert losslessly
//! into [`Error`] so callers can tell the four kinds apart.

use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed or out-of-domain input; rejected before any store access.
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("message not found: {0}")]
  NotFound(Uuid),

  /// An invalidate or edit targeted a message that is no longer valid.
  #[error("message {0} is already invalidated")]
  AlreadyInvalidated(Uuid),

  /// Storage connectivity or constraint failure. The whole operation may be
  /// retried; no partial write is ever visible.
  #[error("persistence error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn persistence(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Persistence(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
