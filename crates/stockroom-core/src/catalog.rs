//! Catalog hierarchy (product → variant → size) and its read-side rollups.
//!
//! Stored documents carry only identity and soft-delete state. Quantities are
//! never stored on them; the `*View` types compute them from ledger rows at
//! read time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, inventory::InventoryRow};

// ─── Documents ───────────────────────────────────────────────────────────────

/// Lifecycle status of a product. `Archived` always goes together with
/// `is_deleted = true`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProductStatus {
  Active,
  Inactive,
  #[default]
  Draft,
  Archived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub product_id:   Uuid,
  pub style_number: String,
  pub name:         String,
  pub status:       ProductStatus,
  pub is_deleted:   bool,
  pub created_at:   DateTime<Utc>,
}

/// A color/SKU identity under a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
  pub variant_id: Uuid,
  pub product_id: Uuid,
  pub sku:        String,
  pub color:      Option<String>,
  pub is_deleted: bool,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Size {
  pub size_id:    Uuid,
  pub variant_id: Uuid,
  pub label:      String,
  pub is_deleted: bool,
  pub created_at: DateTime<Utc>,
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
  pub style_number: String,
  pub name:         String,
  #[serde(default)]
  pub status:       ProductStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVariant {
  #[serde(skip)]
  pub product_id: Uuid,
  pub sku:        String,
  pub color:      Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSize {
  #[serde(skip)]
  pub variant_id: Uuid,
  pub label:      String,
}

impl NewProduct {
  pub fn validate(&self) -> Result<()> {
    require_non_blank("styleNumber", &self.style_number)?;
    require_non_blank("name", &self.name)?;
    if self.status == ProductStatus::Archived {
      return Err(Error::Validation(
        "a product cannot be created archived".to_owned(),
      ));
    }
    Ok(())
  }
}

impl NewVariant {
  pub fn validate(&self) -> Result<()> { require_non_blank("sku", &self.sku) }
}

impl NewSize {
  pub fn validate(&self) -> Result<()> { require_non_blank("label", &self.label) }
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::Validation(format!("{field} must not be empty")));
  }
  Ok(())
}

// ─── Rollups ─────────────────────────────────────────────────────────────────

/// Derived quantities, summed over ledger rows (for a size) or over child
/// views (for variants and products).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTotals {
  pub total_quantity:    i64,
  pub reserved_total:    i64,
  pub on_order_total:    i64,
  pub sellable_quantity: i64,
}

impl StockTotals {
  pub fn from_rows(rows: &[InventoryRow]) -> Self {
    let total_quantity: i64 = rows.iter().map(|r| r.on_hand).sum();
    let reserved_total: i64 = rows.iter().map(|r| r.reserved).sum();
    let on_order_total: i64 = rows.iter().map(|r| r.on_order).sum();
    Self {
      total_quantity,
      reserved_total,
      on_order_total,
      sellable_quantity: (total_quantity - reserved_total).max(0),
    }
  }

  fn sum<'a>(parts: impl IntoIterator<Item = &'a StockTotals>) -> Self {
    parts.into_iter().fold(Self::default(), |acc, t| Self {
      total_quantity:    acc.total_quantity + t.total_quantity,
      reserved_total:    acc.reserved_total + t.reserved_total,
      on_order_total:    acc.on_order_total + t.on_order_total,
      sellable_quantity: acc.sellable_quantity + t.sellable_quantity,
    })
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeView {
  #[serde(flatten)]
  pub size:      Size,
  /// Rows sorted by location.
  pub inventory: Vec<InventoryRow>,
  #[serde(flatten)]
  pub totals:    StockTotals,
}

impl SizeView {
  pub fn build(size: Size, mut inventory: Vec<InventoryRow>) -> Self {
    inventory.sort_by(|a, b| a.location.cmp(&b.location));
    let totals = StockTotals::from_rows(&inventory);
    Self { size, inventory, totals }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantView {
  #[serde(flatten)]
  pub variant: Variant,
  /// Live sizes only, sorted by label.
  pub sizes:   Vec<SizeView>,
  #[serde(flatten)]
  pub totals:  StockTotals,
}

impl VariantView {
  pub fn build(variant: Variant, mut sizes: Vec<SizeView>) -> Self {
    sizes.retain(|s| !s.size.is_deleted);
    sizes.sort_by(|a, b| a.size.label.cmp(&b.size.label));
    let totals = StockTotals::sum(sizes.iter().map(|s| &s.totals));
    Self { variant, sizes, totals }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
  #[serde(flatten)]
  pub product:  Product,
  /// Live variants only, sorted by SKU.
  pub variants: Vec<VariantView>,
  #[serde(flatten)]
  pub totals:   StockTotals,
}

impl ProductView {
  pub fn build(product: Product, mut variants: Vec<VariantView>) -> Self {
    variants.retain(|v| !v.variant.is_deleted);
    variants.sort_by(|a, b| a.variant.sku.cmp(&b.variant.sku));
    let totals = StockTotals::sum(variants.iter().map(|v| &v.totals));
    Self { product, variants, totals }
  }
}
