//! Storage layer for the counter harness
//!
//! This crate owns everything that touches the relational store:
//! - CounterStore: the access primitives, one handle per worker
//! - SqliteCounterStore: the rusqlite-backed implementation
//! - Bootstrapper: schema creation and the insert-or-reset of the shared row

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod sqlite;
pub mod store;

pub use bootstrap::Bootstrapper;
pub use sqlite::{store_error, SqliteCounterStore};
pub use store::CounterStore;
