//! SQLite backend for the Stockroom inventory engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Stock counters are only ever changed
//! by single conditional statements or inside explicit transactions.

mod catalog;
mod encode;
mod ledger;
mod orders;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{DEFAULT_HOLD_TTL_SECS, SqliteStore};

#[cfg(test)]
mod tests;
