//! [`SqliteStore`], the SQLite implementation of [`MessageStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use narrativelog_core::{
  message::{EditedMessage, Message, MessageEdit, MessageState, NewMessage},
  query::MessageQuery,
  store::MessageStore,
};
use rusqlite::{OptionalExtension as _, TransactionBehavior, functions::FunctionFlags};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawMessage, encode_dt, encode_uuid, now},
  query::{UNICODE_LOWER, compile},
  schema::{MESSAGE_COLUMNS, SCHEMA},
};

/// Read connections opened by [`SqliteStore::open`].
pub const DEFAULT_READ_CONNECTIONS: usize = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A narrative log store backed by a single SQLite file.
///
/// Cloning is cheap; connections are reference-counted. Writes go through one
/// writer connection, each as a single `BEGIN IMMEDIATE` transaction on its
/// thread. Reads (`get` and `find`) are spread round-robin over a set of
/// `query_only` connections on the same WAL-mode file, so they are not queued
/// behind writes. With no readers, reads share the writer.
#[derive(Clone)]
pub struct SqliteStore {
  writer:  tokio_rusqlite::Connection,
  readers: Arc<[tokio_rusqlite::Connection]>,
  next:    Arc<AtomicUsize>,
}

/// Outcome of a lifecycle transition attempted inside a transaction.
enum Transition<T> {
  Done(T),
  Missing,
  AlreadyInvalidated,
}

impl<T> Transition<T> {
  fn into_result(self, id: Uuid) -> Result<T> {
    match self {
      Self::Done(value) => Ok(value),
      Self::Missing => Err(Error::NotFound(id)),
      Self::AlreadyInvalidated => Err(Error::AlreadyInvalidated(id)),
    }
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` with
  /// [`DEFAULT_READ_CONNECTIONS`] readers.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_readers(path, DEFAULT_READ_CONNECTIONS).await
  }

  /// Open (or create) a store at `path`, run schema initialisation on the
  /// writer, then open `read_connections` readers on the same file.
  pub async fn open_with_readers(path: impl AsRef<Path>, read_connections: usize) -> Result<Self> {
    let path = path.as_ref();
    let writer = tokio_rusqlite::Connection::open(path).await?;
    init_schema(&writer).await?;

    let mut readers = Vec::with_capacity(read_connections);
    for _ in 0..read_connections {
      let reader = tokio_rusqlite::Connection::open(path).await?;
      reader
        .call(|conn| {
          register_functions(conn)?;
          conn.busy_timeout(BUSY_TIMEOUT)?;
          conn.pragma_update(None, "query_only", true)?;
          Ok(())
        })
        .await?;
      readers.push(reader);
    }
    tracing::debug!(read_connections, "store connections opened");

    Ok(Self {
      writer,
      readers: readers.into(),
      next: Arc::new(AtomicUsize::new(0)),
    })
  }

  /// Open an in-memory store, for tests. A private in-memory database is
  /// visible to one connection only, so reads share the writer.
  pub async fn open_in_memory() -> Result<Self> {
    let writer = tokio_rusqlite::Connection::open_in_memory().await?;
    init_schema(&writer).await?;
    Ok(Self {
      writer,
      readers: Vec::new().into(),
      next: Arc::new(AtomicUsize::new(0)),
    })
  }

  /// Close every connection. Other clones of this store fail with a
  /// database error afterwards.
  pub async fn close(self) -> Result<()> {
    for reader in self.readers.iter() {
      reader.clone().close().await?;
    }
    self.writer.close().await?;
    tracing::info!("message store closed");
    Ok(())
  }

  fn reader(&self) -> &tokio_rusqlite::Connection {
    if self.readers.is_empty() {
      return &self.writer;
    }
    let i = self.next.fetch_add(1, Ordering::Relaxed) % self.readers.len();
    &self.readers[i]
  }

  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<usize> {
    Ok(self.writer.call(move |conn| Ok(conn.execute(sql, [])?)).await?)
  }

  /// Take the write lock and keep it for `hold`.
  #[cfg(test)]
  pub(crate) async fn hold_write_lock(&self, hold: Duration) -> Result<()> {
    self
      .writer
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        std::thread::sleep(hold);
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

async fn init_schema(conn: &tokio_rusqlite::Connection) -> Result<()> {
  conn
    .call(|conn| {
      register_functions(conn)?;
      conn.busy_timeout(BUSY_TIMEOUT)?;
      conn.execute_batch(SCHEMA)?;
      Ok(())
    })
    .await?;
  Ok(())
}

fn register_functions(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.create_scalar_function(
    UNICODE_LOWER,
    1,
    FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
    |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
  )
}

/// Read one message row by its encoded id.
fn select_raw(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawMessage>> {
  conn
    .query_row(
      &format!("SELECT {MESSAGE_COLUMNS} FROM message m WHERE m.id = ?1"),
      rusqlite::params![id],
      RawMessage::from_row,
    )
    .optional()
}

/// Set `date_invalidated` on a valid row. Returns `false` if the row was not
/// valid, which makes a concurrent second invalidation lose.
fn mark_invalidated(conn: &rusqlite::Connection, id: &str, at: &str) -> rusqlite::Result<bool> {
  let changed = conn.execute(
    "UPDATE message SET date_invalidated = ?2
     WHERE id = ?1 AND date_invalidated IS NULL",
    rusqlite::params![id, at],
  )?;
  Ok(changed == 1)
}

/// Decoding failures inside a connection closure travel back as
/// [`tokio_rusqlite::Error::Other`].
fn in_closure<T>(r: Result<T>) -> tokio_rusqlite::Result<T> {
  r.map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))
}

// ─── MessageStore impl ───────────────────────────────────────────────────────

impl MessageStore for SqliteStore {
  type Error = Error;

  async fn insert(&self, input: NewMessage) -> Result<Message> {
    let id = Uuid::new_v4();

    // Returned as stored, not as drafted.
    let raw = self
      .writer
      .call(move |conn| {
        let message = input.into_message(id, now(), None);
        in_closure(RawMessage::from_message(&message))?.insert(conn)?;
        Ok(select_raw(conn, &encode_uuid(id))?)
      })
      .await?;

    let message = raw.ok_or(Error::NotFound(id))?.into_message()?;
    tracing::info!(message_id = %message.id, site_id = %message.site_id, "message added");
    Ok(message)
  }

  async fn get(&self, id: Uuid) -> Result<Message> {
    let id_str = encode_uuid(id);

    let raw = self
      .reader()
      .call(move |conn| Ok(select_raw(conn, &id_str)?))
      .await?;

    raw.ok_or(Error::NotFound(id))?.into_message()
  }

  async fn find(&self, query: &MessageQuery) -> Result<Vec<Message>> {
    let compiled = compile(query);
    tracing::debug!(sql = %compiled.sql, params = compiled.params.len(), "find messages");

    let raws: Vec<RawMessage> = self
      .reader()
      .call(move |conn| {
        let mut stmt = conn.prepare(&compiled.sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(compiled.params), RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let messages = raws
      .into_iter()
      .map(RawMessage::into_message)
      .collect::<Result<Vec<_>>>()?;
    tracing::debug!(matched = messages.len(), "find messages done");
    Ok(messages)
  }

  async fn invalidate(&self, id: Uuid) -> Result<Message> {
    let id_str = encode_uuid(id);

    let outcome = self
      .writer
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let at_str = encode_dt(now());
        let outcome = match select_raw(&tx, &id_str)? {
          None => Transition::Missing,
          Some(_) if !mark_invalidated(&tx, &id_str, &at_str)? => {
            Transition::AlreadyInvalidated
          }
          Some(_) => match select_raw(&tx, &id_str)? {
            Some(updated) => Transition::Done(updated),
            None => Transition::Missing,
          },
        };
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    let message = outcome.into_result(id)?.into_message()?;
    tracing::info!(message_id = %id, "message invalidated");
    Ok(message)
  }

  async fn edit(&self, id: Uuid, edit: MessageEdit) -> Result<EditedMessage> {
    let id_str = encode_uuid(id);
    let new_id = Uuid::new_v4();

    let outcome = self
      .writer
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let at = now();

        let Some(raw) = select_raw(&tx, &id_str)? else {
          return Ok(Transition::Missing);
        };
        let mut old = in_closure(raw.into_message())?;
        let invalidated = old.state() != MessageState::Valid
          || !mark_invalidated(&tx, &id_str, &encode_dt(at))?;
        if invalidated {
          return Ok(Transition::AlreadyInvalidated);
        }
        old.date_invalidated = Some(at);

        let draft = edit.merge_onto(&old).into_message(new_id, at, Some(old.id));
        in_closure(RawMessage::from_message(&draft))?.insert(&tx)?;
        let Some(stored) = select_raw(&tx, &encode_uuid(new_id))? else {
          return Ok(Transition::Missing);
        };
        let new = in_closure(stored.into_message())?;

        tx.commit()?;
        Ok(Transition::Done(EditedMessage { old, new }))
      })
      .await?;

    let edited = outcome.into_result(id)?;
    tracing::info!(
      message_id = %edited.new.id,
      parent_id = %id,
      "message edited"
    );
    Ok(edited)
  }
}
