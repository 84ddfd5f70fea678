//! Core types and trait definitions for the narrative log service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::MessageStore`]; the API crate depends
//! on that abstraction only.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod message;
pub mod query;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
