// marketplace/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use uuid::Uuid;

use super::order_item::OrderItemView;

/// `pending → paid → shipped → completed`, forward only, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Paid,
  Shipped,
  Completed,
}

impl OrderStatus {
  pub fn next(self) -> Option<OrderStatus> {
    match self {
      OrderStatus::Pending => Some(OrderStatus::Paid),
      OrderStatus::Paid => Some(OrderStatus::Shipped),
      OrderStatus::Shipped => Some(OrderStatus::Completed),
      OrderStatus::Completed => None,
    }
  }

  pub fn can_transition_to(self, to: OrderStatus) -> bool {
    self.next() == Some(to)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Paid => "paid",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Completed => "completed",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub buyer_id: Uuid,
  /// Sum of `price_at_purchase * quantity` over the order's items.
  pub total_amount: i64,
  pub status: OrderStatus,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Buyer order history entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItemView>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_machine_only_moves_one_step_forward() {
    use OrderStatus::*;
    assert!(Pending.can_transition_to(Paid));
    assert!(Paid.can_transition_to(Shipped));
    assert!(Shipped.can_transition_to(Completed));

    assert!(!Pending.can_transition_to(Shipped));
    assert!(!Shipped.can_transition_to(Paid));
    assert!(!Paid.can_transition_to(Paid));
    assert_eq!(Completed.next(), None);
  }

  #[test]
  fn status_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&OrderStatus::Shipped).unwrap(), "\"shipped\"");
    assert_eq!(OrderStatus::Paid.to_string(), "paid");
  }
}
