//! [`SqliteStore`]: the SQLite implementation of the Stockroom store traits.
//!
//! The trait impls live in sibling modules: `ledger` ([`InventoryLedger`]),
//! `catalog` ([`CatalogStore`]) and `orders` ([`OrderStore`]).
//!
//! [`InventoryLedger`]: stockroom_core::store::InventoryLedger
//! [`CatalogStore`]: stockroom_core::store::CatalogStore
//! [`OrderStore`]: stockroom_core::store::OrderStore

use std::path::Path;

use chrono::Duration;
use stockroom_core::store::Store;

use crate::{Error, Result, schema::SCHEMA};

/// How long an order-creation hold counts as outstanding before
/// reconciliation may reclaim it.
pub const DEFAULT_HOLD_TTL_SECS: i64 = 15 * 60;

/// A Stockroom store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:     tokio_rusqlite::Connection,
  pub(crate) hold_ttl: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store. Used by the tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  /// Replace the hold expiry used by reservation reconciliation.
  pub fn with_hold_ttl(mut self, ttl: Duration) -> Self {
    self.hold_ttl = ttl;
    self
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let store = Self { conn, hold_ttl: Duration::seconds(DEFAULT_HOLD_TTL_SECS) };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("sqlite schema initialised");
    Ok(())
  }
}

impl Store for SqliteStore {
  type Error = Error;
}
