// marketplace/src/models/order_item.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::order::OrderStatus;

/// Immutable line of an order. `price_at_purchase` and `seller_id` are snapshots;
/// `product_id` is cleared if the product is deleted later.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Option<Uuid>,
  pub seller_id: Uuid,
  pub quantity: i32,
  pub price_at_purchase: i64,
}

impl OrderItem {
  /// `price_at_purchase * quantity`; the order total is the sum of these.
  pub fn line_total(&self) -> i64 {
    self.price_at_purchase.saturating_mul(i64::from(self.quantity))
  }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
  pub product_id: Uuid,
  pub seller_id: Uuid,
  pub quantity: i32,
  pub price_at_purchase: i64,
}

/// Order line as shown in the buyer's history. `product_title` is `None`
/// once the product no longer exists.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
  pub id: Uuid,
  pub order_id: Uuid,
  pub product_id: Option<Uuid>,
  pub product_title: Option<String>,
  pub quantity: i32,
  pub price_at_purchase: i64,
}

/// One line of a seller's sales queue.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
  pub order_item_id: Uuid,
  pub order_id: Uuid,
  pub buyer_id: Uuid,
  pub product_id: Option<Uuid>,
  pub product_title: Option<String>,
  pub quantity: i32,
  pub price_at_purchase: i64,
  pub order_status: OrderStatus,
  pub ordered_at: DateTime<Utc>,
}
