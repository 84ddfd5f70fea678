//! SQLite backend for the narrative log.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod query;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_READ_CONNECTIONS, SqliteStore};

#[cfg(test)]
mod tests;
