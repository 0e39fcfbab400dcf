//! SQL schema for the Stockroom SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS products (
    product_id    TEXT PRIMARY KEY,
    style_number  TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    status        TEXT NOT NULL,   -- 'active' | 'inactive' | 'draft' | 'archived'
    is_deleted    INTEGER NOT NULL DEFAULT 0,
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS variants (
    variant_id  TEXT PRIMARY KEY,
    product_id  TEXT NOT NULL REFERENCES products(product_id),
    sku         TEXT NOT NULL UNIQUE,
    color       TEXT,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sizes (
    size_id     TEXT PRIMARY KEY,
    variant_id  TEXT NOT NULL REFERENCES variants(variant_id),
    label       TEXT NOT NULL,
    is_deleted  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

-- The ledger. One row per (size, location); an absent row means zero stock.
-- Soft-deleting a size never touches its rows.
CREATE TABLE IF NOT EXISTS inventory (
    size_id   TEXT NOT NULL REFERENCES sizes(size_id),
    location  TEXT NOT NULL,
    on_hand   INTEGER NOT NULL DEFAULT 0 CHECK (on_hand  >= 0),
    on_order  INTEGER NOT NULL DEFAULT 0 CHECK (on_order >= 0),
    reserved  INTEGER NOT NULL DEFAULT 0 CHECK (reserved >= 0),
    PRIMARY KEY (size_id, location),
    CHECK (reserved <= on_hand)
);

CREATE TABLE IF NOT EXISTS orders (
    order_number      TEXT PRIMARY KEY,
    customer          TEXT,
    shipping_address  TEXT,            -- JSON or NULL
    total_amount      INTEGER NOT NULL CHECK (total_amount >= 0),
    status            TEXT NOT NULL,   -- 'In Hand' | 'Processing' | 'Delivered'
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS order_lines (
    order_number  TEXT NOT NULL REFERENCES orders(order_number) ON DELETE CASCADE,
    line_index    INTEGER NOT NULL,
    name          TEXT NOT NULL,
    price         INTEGER NOT NULL CHECK (price >= 0),
    quantity      INTEGER NOT NULL CHECK (quantity >= 1),
    product_id    TEXT NOT NULL,
    size_id       TEXT,            -- NULL when no size could be resolved
    location      TEXT NOT NULL,
    PRIMARY KEY (order_number, line_index)
);

-- Reservations taken for lines of an order that is still being created.
-- Replaced by the order's lines when the order is inserted.
CREATE TABLE IF NOT EXISTS holds (
    order_number  TEXT NOT NULL,
    line_index    INTEGER NOT NULL,
    size_id       TEXT NOT NULL,
    location      TEXT NOT NULL,
    quantity      INTEGER NOT NULL CHECK (quantity >= 1),
    held_at       TEXT NOT NULL,
    PRIMARY KEY (order_number, line_index)
);

-- At most one row per order line: its reservation was either committed
-- (shipped) or released. Survives deletion of the order.
CREATE TABLE IF NOT EXISTS settlements (
    order_number  TEXT NOT NULL,
    line_index    INTEGER NOT NULL,
    size_id       TEXT NOT NULL,
    location      TEXT NOT NULL,
    quantity      INTEGER NOT NULL,
    outcome       TEXT NOT NULL,   -- 'committed' | 'released'
    settled_at    TEXT NOT NULL,
    PRIMARY KEY (order_number, line_index)
);

-- Strictly append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS archive (
    archive_id   TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,   -- 'product' | 'variant' | 'size'
    original_id  TEXT NOT NULL,
    snapshot     TEXT NOT NULL,   -- JSON document as it was before deletion
    deleted_by   TEXT NOT NULL,
    recorded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS variants_product_idx    ON variants(product_id);
CREATE INDEX IF NOT EXISTS sizes_variant_idx       ON sizes(variant_id);
CREATE INDEX IF NOT EXISTS order_lines_size_idx    ON order_lines(size_id, location);
CREATE INDEX IF NOT EXISTS holds_size_idx          ON holds(size_id, location);
CREATE INDEX IF NOT EXISTS archive_original_idx    ON archive(original_id);

PRAGMA user_version = 1;
";
