//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings with nanosecond precision. UUIDs are stored as
//! hyphenated lowercase strings. Enums are stored in their `strum` string
//! form. Free-form payloads (shipping addresses, archive snapshots) are
//! compact JSON.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use stockroom_core::{
  archive::{ArchiveEntry, DocumentKind},
  catalog::{Product, ProductStatus, Size, Variant},
  inventory::InventoryRow,
  order::{Order, OrderLine, OrderStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// Fixed-width so that lexical order matches time order.
pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Decode a `strum` string column into its enum.
pub fn decode_enum<T: FromStr>(column: &str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode(format!("{column}: {s:?}")))
}

pub fn encode_product_status(s: ProductStatus) -> String { s.to_string() }

pub fn encode_order_status(s: OrderStatus) -> String { s.to_string() }

// ─── Row types ───────────────────────────────────────────────────────────────

pub const PRODUCT_COLUMNS: &str =
  "product_id, style_number, name, status, is_deleted, created_at";

/// Raw strings read directly from a `products` row.
pub struct RawProduct {
  pub product_id:   String,
  pub style_number: String,
  pub name:         String,
  pub status:       String,
  pub is_deleted:   bool,
  pub created_at:   String,
}

impl RawProduct {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      product_id:   row.get(0)?,
      style_number: row.get(1)?,
      name:         row.get(2)?,
      status:       row.get(3)?,
      is_deleted:   row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_product(self) -> Result<Product> {
    Ok(Product {
      product_id:   decode_uuid(&self.product_id)?,
      style_number: self.style_number,
      name:         self.name,
      status:       decode_enum("products.status", &self.status)?,
      is_deleted:   self.is_deleted,
      created_at:   decode_dt(&self.created_at)?,
    })
  }

  pub fn snapshot(&self) -> serde_json::Value {
    serde_json::json!({
      "productId":   self.product_id,
      "styleNumber": self.style_number,
      "name":        self.name,
      "status":      self.status,
      "isDeleted":   self.is_deleted,
      "createdAt":   self.created_at,
    })
  }
}

pub const VARIANT_COLUMNS: &str = "variant_id, product_id, sku, color, is_deleted, created_at";

/// Raw strings read directly from a `variants` row.
pub struct RawVariant {
  pub variant_id: String,
  pub product_id: String,
  pub sku:        String,
  pub color:      Option<String>,
  pub is_deleted: bool,
  pub created_at: String,
}

impl RawVariant {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      variant_id: row.get(0)?,
      product_id: row.get(1)?,
      sku:        row.get(2)?,
      color:      row.get(3)?,
      is_deleted: row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_variant(self) -> Result<Variant> {
    Ok(Variant {
      variant_id: decode_uuid(&self.variant_id)?,
      product_id: decode_uuid(&self.product_id)?,
      sku:        self.sku,
      color:      self.color,
      is_deleted: self.is_deleted,
      created_at: decode_dt(&self.created_at)?,
    })
  }

  pub fn snapshot(&self) -> serde_json::Value {
    serde_json::json!({
      "variantId": self.variant_id,
      "productId": self.product_id,
      "sku":       self.sku,
      "color":     self.color,
      "isDeleted": self.is_deleted,
      "createdAt": self.created_at,
    })
  }
}

pub const SIZE_COLUMNS: &str = "size_id, variant_id, label, is_deleted, created_at";

/// Raw strings read directly from a `sizes` row.
pub struct RawSize {
  pub size_id:    String,
  pub variant_id: String,
  pub label:      String,
  pub is_deleted: bool,
  pub created_at: String,
}

impl RawSize {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      size_id:    row.get(0)?,
      variant_id: row.get(1)?,
      label:      row.get(2)?,
      is_deleted: row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_size(self) -> Result<Size> {
    Ok(Size {
      size_id:    decode_uuid(&self.size_id)?,
      variant_id: decode_uuid(&self.variant_id)?,
      label:      self.label,
      is_deleted: self.is_deleted,
      created_at: decode_dt(&self.created_at)?,
    })
  }

  /// Snapshot including the size's frozen inventory rows.
  pub fn snapshot(&self, inventory: &[InventoryRow]) -> serde_json::Value {
    serde_json::json!({
      "sizeId":    self.size_id,
      "variantId": self.variant_id,
      "label":     self.label,
      "isDeleted": self.is_deleted,
      "createdAt": self.created_at,
      "inventory": inventory,
    })
  }
}

pub const INVENTORY_COLUMNS: &str = "location, on_hand, on_order, reserved";

pub fn inventory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryRow> {
  Ok(InventoryRow {
    location: row.get(0)?,
    on_hand:  row.get(1)?,
    on_order: row.get(2)?,
    reserved: row.get(3)?,
  })
}

/// Raw strings read directly from an `orders` row.
pub struct RawOrder {
  pub order_number:     String,
  pub customer:         Option<String>,
  pub shipping_address: Option<String>,
  pub total_amount:     i64,
  pub status:           String,
  pub created_at:       String,
  pub updated_at:       String,
}

pub const ORDER_COLUMNS: &str =
  "order_number, customer, shipping_address, total_amount, status, created_at, updated_at";

impl RawOrder {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      order_number:     row.get(0)?,
      customer:         row.get(1)?,
      shipping_address: row.get(2)?,
      total_amount:     row.get(3)?,
      status:           row.get(4)?,
      created_at:       row.get(5)?,
      updated_at:       row.get(6)?,
    })
  }

  pub fn into_order(self, lines: Vec<RawOrderLine>) -> Result<Order> {
    let shipping_address = self
      .shipping_address
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;
    // Line indices are the ledger keys of the lines, so a gap means the
    // order cannot be settled reliably.
    let products = lines
      .into_iter()
      .zip(0u32..)
      .map(|(line, expected)| {
        if line.line_index != expected {
          return Err(Error::Decode(format!(
            "order_lines.line_index: order {} has line {} where {expected} was expected",
            self.order_number, line.line_index
          )));
        }
        line.into_line()
      })
      .collect::<Result<Vec<_>>>()?;

    Ok(Order {
      order_number: self.order_number,
      customer: self.customer,
      shipping_address,
      products,
      total_amount: self.total_amount,
      status: decode_enum("orders.status", &self.status)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const ORDER_LINE_COLUMNS: &str =
  "order_number, line_index, name, price, quantity, product_id, size_id, location";

/// Raw values read directly from an `order_lines` row.
pub struct RawOrderLine {
  pub order_number: String,
  pub line_index:   u32,
  pub name:         String,
  pub price:        i64,
  pub quantity:     u32,
  pub product_id:   String,
  pub size_id:      Option<String>,
  pub location:     String,
}

impl RawOrderLine {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      order_number: row.get(0)?,
      line_index:   row.get(1)?,
      name:         row.get(2)?,
      price:        row.get(3)?,
      quantity:     row.get(4)?,
      product_id:   row.get(5)?,
      size_id:      row.get(6)?,
      location:     row.get(7)?,
    })
  }

  pub fn into_line(self) -> Result<OrderLine> {
    Ok(OrderLine {
      name:       self.name,
      price:      self.price,
      quantity:   self.quantity,
      product_id: self.product_id,
      size_id:    self.size_id.as_deref().map(decode_uuid).transpose()?,
      location:   self.location,
    })
  }
}

pub const ARCHIVE_COLUMNS: &str =
  "archive_id, kind, original_id, snapshot, deleted_by, recorded_at";

/// Raw strings read directly from an `archive` row, or about to be written
/// to one.
pub struct RawArchive {
  pub archive_id:  String,
  pub kind:        String,
  pub original_id: String,
  pub snapshot:    String,
  pub deleted_by:  String,
  pub recorded_at: String,
}

impl RawArchive {
  pub fn new(
    kind: DocumentKind,
    original_id: &str,
    snapshot: &serde_json::Value,
    deleted_by: &str,
    recorded_at: &str,
  ) -> Self {
    Self {
      archive_id:  encode_uuid(Uuid::new_v4()),
      kind:        kind.to_string(),
      original_id: original_id.to_owned(),
      snapshot:    snapshot.to_string(),
      deleted_by:  deleted_by.to_owned(),
      recorded_at: recorded_at.to_owned(),
    }
  }

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      archive_id:  row.get(0)?,
      kind:        row.get(1)?,
      original_id: row.get(2)?,
      snapshot:    row.get(3)?,
      deleted_by:  row.get(4)?,
      recorded_at: row.get(5)?,
    })
  }

  pub fn into_entry(self) -> Result<ArchiveEntry> {
    Ok(ArchiveEntry {
      archive_id:  decode_uuid(&self.archive_id)?,
      kind:        decode_enum("archive.kind", &self.kind)?,
      original_id: decode_uuid(&self.original_id)?,
      snapshot:    serde_json::from_str(&self.snapshot)?,
      deleted_by:  self.deleted_by,
      timestamp:   decode_dt(&self.recorded_at)?,
    })
  }
}
