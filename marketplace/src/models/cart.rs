// marketplace/src/models/cart.rs

//! The buyer's in-progress cart.
//!
//! A cart belongs to the client session (browser storage, a mobile app, a
//! test). The server never keeps one; it only receives the cart's lines as the
//! explicit input of a checkout.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A `(product, quantity)` pair submitted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  pub product_id: Uuid,
  pub quantity: i32,
}

/// A cart entry as the client displays it. `price` and `max_stock` are what the
/// client last saw; checkout re-prices from the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
  pub product_id: Uuid,
  pub title: String,
  pub price: i64,
  pub quantity: i32,
  pub max_stock: i32,
  pub seller_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
  pub items: Vec<CartEntry>,
}

impl Cart {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds an entry, merging with an existing line for the same product.
  /// The merged quantity never exceeds the known stock.
  pub fn add_item(&mut self, entry: CartEntry) {
    match self.items.iter_mut().find(|i| i.product_id == entry.product_id) {
      Some(existing) => {
        existing.quantity = existing.quantity.saturating_add(entry.quantity).min(existing.max_stock);
      }
      None => self.items.push(entry),
    }
  }

  pub fn remove_item(&mut self, product_id: Uuid) {
    self.items.retain(|i| i.product_id != product_id);
  }

  /// Clamps to `[0, max_stock]`; zero removes the line. Unknown products are ignored.
  pub fn update_quantity(&mut self, product_id: Uuid, quantity: i32) {
    let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) else {
      return;
    };
    let clamped = quantity.min(item.max_stock).max(0);
    if clamped == 0 {
      self.remove_item(product_id);
    } else {
      item.quantity = clamped;
    }
  }

  pub fn clear(&mut self) {
    self.items.clear();
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn total_items(&self) -> i64 {
    self.items.iter().map(|i| i64::from(i.quantity)).sum()
  }

  /// Display total from client-held prices. Saturates rather than overflowing,
  /// since both numbers come from the client.
  pub fn total_price(&self) -> i64 {
    self
      .items
      .iter()
      .fold(0i64, |total, i| total.saturating_add(i.price.saturating_mul(i64::from(i.quantity))))
  }

  /// The checkout input for this cart.
  pub fn to_lines(&self) -> Vec<CartLine> {
    self
      .items
      .iter()
      .map(|i| CartLine {
        product_id: i.product_id,
        quantity: i.quantity,
      })
      .collect()
  }
}
