// marketplace/src/pipelines/contexts.rs

//! Data carried through each pipeline. Handlers receive these wrapped in
//! `keel::ContextData` and must not hold its guard across an `.await`.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::models::{CartLine, OrderStatus, Role, User};
use crate::state::AppState;
use crate::store::CheckoutUnit;

/// A cart line after pricing: the product's seller and price as read at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
  pub product_id: Uuid,
  pub seller_id: Uuid,
  pub quantity: i32,
  pub unit_price: i64,
}

/// A read view that changed because of an order and should be refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "view", rename_all = "camelCase")]
pub enum StaleView {
  #[serde(rename_all = "camelCase")]
  BuyerOrders { buyer_id: Uuid },
  #[serde(rename_all = "camelCase")]
  SellerOrders { seller_id: Uuid },
}

/// The open checkout unit, shared between steps. Steps hold its lock across
/// storage calls, which the context's own guard must never be.
pub type CheckoutUnitSlot = Arc<AsyncMutex<Option<Box<dyn CheckoutUnit>>>>;

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub buyer_id: Uuid,
  /// Lines as submitted; merged per product by the first step.
  pub lines: Vec<CartLine>,
  pub priced: Vec<PricedLine>,
  pub total_amount: i64,
  pub unit: CheckoutUnitSlot,
  /// Decrements applied inside the unit.
  pub reserved: Vec<(Uuid, i32)>,
  pub order_id: Option<Uuid>,
  pub stale_views: Vec<StaleView>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, buyer_id: Uuid, lines: Vec<CartLine>) -> Self {
    Self {
      app_state,
      buyer_id,
      lines,
      priced: Vec::new(),
      total_amount: 0,
      unit: Arc::new(AsyncMutex::new(None)),
      reserved: Vec::new(),
      order_id: None,
      stale_views: Vec::new(),
    }
  }
}

#[derive(Clone)]
pub struct ShipOrderCtxData {
  pub app_state: AppState,
  pub actor_id: Uuid,
  pub order_id: Uuid,
  pub actor: Option<User>,
  pub status_before: Option<OrderStatus>,
}

impl ShipOrderCtxData {
  pub fn new(app_state: AppState, actor_id: Uuid, order_id: Uuid) -> Self {
    Self {
      app_state,
      actor_id,
      order_id,
      actor: None,
      status_before: None,
    }
  }
}

#[derive(Clone)]
pub struct SignupCtxData {
  pub app_state: AppState,
  pub email: String,
  pub password: String,
  pub full_name: Option<String>,
  pub role: Role,
  pub created_user: Option<User>,
}

#[derive(Clone)]
pub struct SigninCtxData {
  pub app_state: AppState,
  pub email: String,
  pub password: String,
  pub candidate: Option<User>,
  pub authenticated: Option<User>,
}
