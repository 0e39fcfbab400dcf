//! Archive entries: the write-once audit trail of soft deletions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Which kind of catalog document an archive entry snapshots.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentKind {
  Product,
  Variant,
  Size,
}

/// A snapshot of a catalog document taken at the moment it was soft-deleted.
/// Never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
  pub archive_id:  Uuid,
  pub kind:        DocumentKind,
  pub original_id: Uuid,
  /// The document as it was before deletion. Size snapshots include their
  /// inventory rows.
  pub snapshot:    serde_json::Value,
  pub deleted_by:  String,
  pub timestamp:   DateTime<Utc>,
}
