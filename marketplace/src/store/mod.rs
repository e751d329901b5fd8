// marketplace/src/store/mod.rs

//! Storage seams. The pipelines only ever talk to these traits; the concrete
//! backend is picked at startup (`STORAGE_BACKEND`).

pub mod memory;
pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
  NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderStatus, OrderWithItems, Product, ProductFilter, SaleRecord,
  User,
};

pub use memory::{MemoryCheckout, MemoryStore};
pub use postgres::{PgCheckout, PgStore};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("storage unavailable: {0}")]
  Unavailable(String),

  #[error("duplicate record: {0}")]
  Duplicate(String),

  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result of the conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
  Applied { remaining: i32 },
  InsufficientStock { available: i32 },
  NotPurchasable,
  NotFound,
}

/// The writes of a single checkout. Nothing in a unit is durable until
/// `commit` succeeds, and a unit that is rolled back or dropped leaves no trace:
/// stock is never left decremented without its order, nor the other way round.
#[async_trait]
pub trait CheckoutUnit: Send {
  /// Decrements stock by `quantity` only if the product is active and has at
  /// least that much stock. This is the single place stock goes down.
  async fn conditional_decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> StoreResult<DecrementOutcome>;
  async fn insert_order(&mut self, buyer_id: Uuid, total_amount: i64, status: OrderStatus) -> StoreResult<Order>;
  async fn insert_order_items(&mut self, order_id: Uuid, items: &[NewOrderItem]) -> StoreResult<Vec<OrderItem>>;
  async fn commit(&mut self) -> StoreResult<()>;
  /// Discards everything done through the unit. A no-op once it has finished.
  async fn rollback(&mut self) -> StoreResult<()>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
  /// Products for the given ids, in any order. Missing ids are simply absent.
  async fn get_products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>>;

  async fn list_active_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>>;
  async fn get_active_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
  async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
  async fn insert_product(&self, seller_id: Uuid, product: &NewProduct) -> StoreResult<Product>;
  async fn delete_product(&self, id: Uuid) -> StoreResult<bool>;
  async fn products_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Product>>;
}

#[async_trait]
pub trait OrderLedger: Send + Sync {
  /// Opens a unit of work for one checkout's stock decrements, order row and items.
  async fn begin_checkout(&self) -> StoreResult<Box<dyn CheckoutUnit>>;
  /// Moves the order to `new` only if it is currently `expected`. Returns whether it moved.
  async fn update_order_status(&self, order_id: Uuid, expected: OrderStatus, new: OrderStatus) -> StoreResult<bool>;
  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>>;
  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>>;
  async fn seller_has_items_in_order(&self, seller_id: Uuid, order_id: Uuid) -> StoreResult<bool>;
  async fn orders_for_buyer(&self, buyer_id: Uuid) -> StoreResult<Vec<OrderWithItems>>;
  async fn sales_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<SaleRecord>>;
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
  /// Fails with `StoreError::Duplicate` when the email is taken.
  async fn create_user(&self, user: NewUser) -> StoreResult<User>;
  async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
  async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;
}

/// The three stores the application works against.
#[derive(Clone)]
pub struct Stores {
  pub catalog: Arc<dyn CatalogStore>,
  pub ledger: Arc<dyn OrderLedger>,
  pub identity: Arc<dyn IdentityStore>,
}

impl Stores {
  /// Uses one backend for all three roles.
  pub fn from_backend<B>(backend: Arc<B>) -> Self
  where
    B: CatalogStore + OrderLedger + IdentityStore + 'static,
  {
    Self {
      catalog: backend.clone(),
      ledger: backend.clone(),
      identity: backend,
    }
  }

  pub fn in_memory() -> Self {
    Self::from_backend(Arc::new(MemoryStore::new()))
  }
}
