//! [`OrderStore`] for [`SqliteStore`].

use std::collections::HashMap;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use stockroom_core::{
  Error as CoreError,
  order::{Order, OrderStatus},
  store::OrderStore,
};

use crate::{
  Error, Result, SqliteStore,
  encode::{
    ORDER_COLUMNS, ORDER_LINE_COLUMNS, RawOrder, RawOrderLine, encode_dt, encode_order_status,
    encode_uuid,
  },
};

/// Why an order insert was turned away without writing anything.
enum Refused {
  NumberSettled,
  HoldsMissing,
}

fn lines_of(conn: &rusqlite::Connection, order_number: &str) -> rusqlite::Result<Vec<RawOrderLine>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE order_number = ?1 ORDER BY line_index"
  ))?;
  let lines = stmt
    .query_map(rusqlite::params![order_number], RawOrderLine::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(lines)
}

fn select_order(
  conn: &rusqlite::Connection,
  order_number: &str,
) -> rusqlite::Result<Option<(RawOrder, Vec<RawOrderLine>)>> {
  let Some(raw) = conn
    .query_row(
      &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?1"),
      rusqlite::params![order_number],
      RawOrder::from_row,
    )
    .optional()?
  else {
    return Ok(None);
  };
  let lines = lines_of(conn, order_number)?;
  Ok(Some((raw, lines)))
}

impl OrderStore for SqliteStore {
  async fn insert_order(&self, order: &Order) -> Result<()> {
    let number_str  = order.order_number.clone();
    let customer    = order.customer.clone();
    let address_str = order
      .shipping_address
      .as_ref()
      .map(serde_json::to_string)
      .transpose()?;
    let total       = order.total_amount;
    let status_str  = encode_order_status(order.status);
    let created_str = encode_dt(order.created_at);
    let updated_str = encode_dt(order.updated_at);
    let lines: Vec<_> = order
      .products
      .iter()
      .map(|l| {
        (
          l.name.clone(),
          l.price,
          l.quantity,
          l.product_id.clone(),
          l.size_id.map(encode_uuid),
          l.location.clone(),
        )
      })
      .collect();
    let reserved_lines = order.reserved_lines().count();

    let refused = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let settled = tx
          .query_row(
            "SELECT 1 FROM settlements WHERE order_number = ?1 LIMIT 1",
            rusqlite::params![number_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if settled {
          return Ok(Some(Refused::NumberSettled));
        }

        tx.execute(
          "INSERT INTO orders (
             order_number, customer, shipping_address, total_amount,
             status, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            number_str,
            customer,
            address_str,
            total,
            status_str,
            created_str,
            updated_str,
          ],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO order_lines (
               order_number, line_index, name, price, quantity,
               product_id, size_id, location
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for (index, (name, price, quantity, product_id, size_id, location)) in
            (0u32..).zip(lines)
          {
            stmt.execute(rusqlite::params![
              number_str, index, name, price, quantity, product_id, size_id, location,
            ])?;
          }
        }

        // The lines now carry the reservations their holds stood for.
        let converted = tx.execute(
          "DELETE FROM holds WHERE order_number = ?1",
          rusqlite::params![number_str],
        )?;
        if converted != reserved_lines {
          return Ok(Some(Refused::HoldsMissing));
        }
        tx.commit()?;
        Ok(None)
      })
      .await
      .map_err(|e| {
        Error::conflict_on_constraint(e, || {
          format!("order number {} already exists", order.order_number)
        })
      })?;

    match refused {
      None => Ok(()),
      Some(Refused::NumberSettled) => Err(
        CoreError::Conflict(format!("order number {} was already used", order.order_number))
          .into(),
      ),
      Some(Refused::HoldsMissing) => Err(
        CoreError::Conflict(format!(
          "stock held for order {} expired before it was saved",
          order.order_number
        ))
        .into(),
      ),
    }
  }

  async fn get_order(&self, order_number: &str) -> Result<Option<Order>> {
    let number_str = order_number.to_owned();

    let raw = self
      .conn
      .call(move |conn| Ok(select_order(conn, &number_str)?))
      .await?;

    raw.map(|(order, lines)| order.into_order(lines)).transpose()
  }

  async fn list_orders(&self) -> Result<Vec<Order>> {
    let (orders, lines): (Vec<RawOrder>, Vec<RawOrderLine>) = self
      .conn
      .call(|conn| {
        let orders = {
          let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, order_number"
          ))?;
          let rows = stmt
            .query_map([], RawOrder::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };
        let lines = {
          let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines ORDER BY order_number, line_index"
          ))?;
          let rows = stmt
            .query_map([], RawOrderLine::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };
        Ok((orders, lines))
      })
      .await?;

    let mut by_order: HashMap<String, Vec<RawOrderLine>> = HashMap::new();
    for line in lines {
      by_order.entry(line.order_number.clone()).or_default().push(line);
    }

    orders
      .into_iter()
      .map(|raw| {
        let lines = by_order.remove(&raw.order_number).unwrap_or_default();
        raw.into_order(lines)
      })
      .collect()
  }

  async fn update_order_status(
    &self,
    order_number: &str,
    from:         OrderStatus,
    to:           OrderStatus,
  ) -> Result<Option<Order>> {
    let number_str = order_number.to_owned();
    let from_str   = encode_order_status(from);
    let to_str     = encode_order_status(to);
    let at_str     = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE orders SET status = ?3, updated_at = ?4
            WHERE order_number = ?1 AND status = ?2",
          rusqlite::params![number_str, from_str, to_str, at_str],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(select_order(conn, &number_str)?)
      })
      .await?;

    raw.map(|(order, lines)| order.into_order(lines)).transpose()
  }

  async fn delete_order(&self, order_number: &str) -> Result<bool> {
    let number_str = order_number.to_owned();

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM orders WHERE order_number = ?1",
          rusqlite::params![number_str],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }
}
