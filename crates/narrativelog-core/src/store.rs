//! The `MessageStore` trait.
//!
//! Implemented by storage backends (e.g. `narrativelog-store-sqlite`). The
//! API layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  message::{EditedMessage, Message, MessageEdit, NewMessage},
  query::MessageQuery,
};

/// Abstraction over a narrative log backend.
///
/// Messages are append-only. The single permitted mutation is the one-way
/// invalidation of a message, either on its own ([`MessageStore::invalidate`])
/// or as half of an edit ([`MessageStore::edit`]). Each write is one bounded
/// transaction: concurrent writers targeting the same message serialise, and
/// the loser observes [`crate::Error::AlreadyInvalidated`].
///
/// Backend errors must convert into [`crate::Error`] so callers can
/// distinguish validation, not-found, already-invalidated and persistence
/// failures without knowing the backend.
pub trait MessageStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  /// Persist a new message. `id` and `date_added` are assigned by the store.
  fn insert(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Retrieve a message by id; fails with a not-found error if absent.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Return the messages matching `query`, ordered by
  /// [`MessageQuery::ordering`] and paginated by `offset` / `limit`.
  fn find<'a>(
    &'a self,
    query: &'a MessageQuery,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'a;

  /// Mark a message as invalid, stamping `date_invalidated` with the store's
  /// current time.
  ///
  /// Not idempotent: fails with an already-invalidated error if the message
  /// is not valid, and with a not-found error if it does not exist.
  fn invalidate(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Atomically invalidate `id` and insert its replacement, whose
  /// `parent_id` is `id` and whose fields are `edit` merged onto the old
  /// message. Either both halves are visible or neither is.
  fn edit(
    &self,
    id: Uuid,
    edit: MessageEdit,
  ) -> impl Future<Output = Result<EditedMessage, Self::Error>> + Send + '_;
}
