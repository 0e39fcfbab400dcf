//! Error type for `stockroom-store-sqlite`.

use stockroom_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] stockroom_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored enum column held a value no variant maps to.
  #[error("cannot decode column value: {0}")]
  Decode(String),
}

impl Error {
  /// Map a UNIQUE/CHECK constraint failure to a domain conflict; pass every
  /// other database error through unchanged.
  pub(crate) fn conflict_on_constraint(e: tokio_rusqlite::Error, what: impl FnOnce() -> String) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, _)) = &e
      && failure.code == rusqlite::ErrorCode::ConstraintViolation
    {
      return Self::Core(stockroom_core::Error::Conflict(what()));
    }
    Self::Database(e)
  }
}

impl StoreError for Error {
  fn as_core(&self) -> Option<&stockroom_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
