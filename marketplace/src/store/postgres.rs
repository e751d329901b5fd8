// marketplace/src/store/postgres.rs

//! PostgreSQL backend. Runtime-checked queries; schema lives in `migrations/`.
//!
//! A checkout runs in one transaction: the conditional decrements lock the
//! product rows they touch, so a competing checkout waits and then re-checks
//! `stock >= n` against the committed value.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{CatalogStore, CheckoutUnit, DecrementOutcome, IdentityStore, OrderLedger, StoreError, StoreResult};
use crate::models::{
  NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderItemView, OrderStatus, OrderWithItems, Product,
  ProductFilter, ProductStatus, SaleRecord, User,
};

const PRODUCT_COLUMNS: &str =
  "id, seller_id, title, description, price, stock, category, images, status, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, buyer_id, total_amount, status, created_at, updated_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, seller_id, quantity, price_at_purchase";
const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, created_at";

/// Maps driver errors onto the storage error kinds callers act on.
fn map_err(err: sqlx::Error) -> StoreError {
  match &err {
    sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
      StoreError::Duplicate(db_err.message().to_string())
    }
    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
      StoreError::Unavailable(err.to_string())
    }
    _ => StoreError::Database(err),
  }
}

#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  #[instrument(name = "PgStore::connect", skip(database_url), err(Display))]
  pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
    let pool = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(database_url)
      .await
      .map_err(map_err)?;
    Ok(Self::new(pool))
  }

  /// Applies the embedded migrations.
  #[instrument(name = "PgStore::migrate", skip(self), err(Display))]
  pub async fn migrate(&self) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
      .run(&self.pool)
      .await
      .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  async fn item_views(&self, order_ids: &[Uuid]) -> StoreResult<Vec<OrderItemView>> {
    sqlx::query_as::<_, OrderItemView>(
      "SELECT oi.id, oi.order_id, oi.product_id, p.title AS product_title, oi.quantity, oi.price_at_purchase \
       FROM order_items oi LEFT JOIN products p ON p.id = oi.product_id \
       WHERE oi.order_id = ANY($1)",
    )
    .bind(order_ids)
    .fetch_all(&self.pool)
    .await
    .map_err(map_err)
  }
}

#[async_trait]
impl CatalogStore for PgStore {
  #[instrument(skip(self, ids), fields(count = ids.len()), err(Display))]
  async fn get_products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = ANY($1)", PRODUCT_COLUMNS))
      .bind(ids)
      .fetch_all(&self.pool)
      .await
      .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn list_active_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    let category = filter.category.as_deref().filter(|c| !c.is_empty());
    sqlx::query_as::<_, Product>(&format!(
      "SELECT {} FROM products \
       WHERE status = 'active' \
         AND ($1::text IS NULL OR category = $1) \
         AND ($2::text IS NULL OR title ILIKE $2) \
       ORDER BY created_at DESC",
      PRODUCT_COLUMNS
    ))
    .bind(category)
    .bind(filter.like_pattern())
    .fetch_all(&self.pool)
    .await
    .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn get_active_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    sqlx::query_as::<_, Product>(&format!(
      "SELECT {} FROM products WHERE id = $1 AND status = 'active'",
      PRODUCT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&self.pool)
    .await
    .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    sqlx::query_as::<_, Product>(&format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_err)
  }

  #[instrument(skip(self, product), fields(title = %product.title), err(Display))]
  async fn insert_product(&self, seller_id: Uuid, product: &NewProduct) -> StoreResult<Product> {
    sqlx::query_as::<_, Product>(&format!(
      "INSERT INTO products (id, seller_id, title, description, price, stock, category, images, status) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active') RETURNING {}",
      PRODUCT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(seller_id)
    .bind(product.title.trim())
    .bind(&product.description)
    .bind(product.price)
    .bind(product.stock)
    .bind(&product.category)
    .bind(&product.images)
    .fetch_one(&self.pool)
    .await
    .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await
      .map_err(map_err)?;
    Ok(result.rows_affected() > 0)
  }

  #[instrument(skip(self), err(Display))]
  async fn products_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Product>> {
    sqlx::query_as::<_, Product>(&format!(
      "SELECT {} FROM products WHERE seller_id = $1 ORDER BY created_at DESC",
      PRODUCT_COLUMNS
    ))
    .bind(seller_id)
    .fetch_all(&self.pool)
    .await
    .map_err(map_err)
  }
}

#[async_trait]
impl OrderLedger for PgStore {
  #[instrument(skip(self), err(Display))]
  async fn begin_checkout(&self) -> StoreResult<Box<dyn CheckoutUnit>> {
    let tx = self.pool.begin().await.map_err(map_err)?;
    Ok(Box::new(PgCheckout { tx: Some(tx) }))
  }

  #[instrument(skip(self), err(Display))]
  async fn update_order_status(&self, order_id: Uuid, expected: OrderStatus, new: OrderStatus) -> StoreResult<bool> {
    let result = sqlx::query("UPDATE orders SET status = $3, updated_at = now() WHERE id = $1 AND status = $2")
      .bind(order_id)
      .bind(expected)
      .bind(new)
      .execute(&self.pool)
      .await
      .map_err(map_err)?;
    Ok(result.rows_affected() == 1)
  }

  #[instrument(skip(self), err(Display))]
  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    sqlx::query_as::<_, Order>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    sqlx::query_as::<_, OrderItem>(&format!(
      "SELECT {} FROM order_items WHERE order_id = $1",
      ORDER_ITEM_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&self.pool)
    .await
    .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn seller_has_items_in_order(&self, seller_id: Uuid, order_id: Uuid) -> StoreResult<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM order_items WHERE order_id = $1 AND seller_id = $2)")
      .bind(order_id)
      .bind(seller_id)
      .fetch_one(&self.pool)
      .await
      .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn orders_for_buyer(&self, buyer_id: Uuid) -> StoreResult<Vec<OrderWithItems>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
      "SELECT {} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC",
      ORDER_COLUMNS
    ))
    .bind(buyer_id)
    .fetch_all(&self.pool)
    .await
    .map_err(map_err)?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items_by_order: HashMap<Uuid, Vec<OrderItemView>> = HashMap::new();
    for item in self.item_views(&order_ids).await? {
      items_by_order.entry(item.order_id).or_default().push(item);
    }

    Ok(
      orders
        .into_iter()
        .map(|order| {
          let items = items_by_order.remove(&order.id).unwrap_or_default();
          OrderWithItems { order, items }
        })
        .collect(),
    )
  }

  #[instrument(skip(self), err(Display))]
  async fn sales_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<SaleRecord>> {
    sqlx::query_as::<_, SaleRecord>(
      "SELECT oi.id AS order_item_id, o.id AS order_id, o.buyer_id, oi.product_id, p.title AS product_title, \
              oi.quantity, oi.price_at_purchase, o.status AS order_status, o.created_at AS ordered_at \
       FROM order_items oi \
       JOIN orders o ON o.id = oi.order_id \
       LEFT JOIN products p ON p.id = oi.product_id \
       WHERE oi.seller_id = $1 \
       ORDER BY o.created_at DESC",
    )
    .bind(seller_id)
    .fetch_all(&self.pool)
    .await
    .map_err(map_err)
  }
}

/// Checkout unit backed by a single transaction. Dropping it without a
/// commit rolls the transaction back.
pub struct PgCheckout {
  tx: Option<Transaction<'static, Postgres>>,
}

impl PgCheckout {
  fn conn(&mut self) -> StoreResult<&mut PgConnection> {
    match self.tx.as_mut() {
      Some(tx) => Ok(&mut **tx),
      None => Err(StoreError::Unavailable("checkout transaction already finished".to_string())),
    }
  }
}

#[async_trait]
impl CheckoutUnit for PgCheckout {
  #[instrument(skip(self), err(Display))]
  async fn conditional_decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> StoreResult<DecrementOutcome> {
    let conn = self.conn()?;
    let remaining: Option<i32> = sqlx::query_scalar(
      "UPDATE products SET stock = stock - $2, updated_at = now() \
       WHERE id = $1 AND status = 'active' AND stock >= $2 RETURNING stock",
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await
    .map_err(map_err)?;

    if let Some(remaining) = remaining {
      return Ok(DecrementOutcome::Applied { remaining });
    }

    // The update matched nothing; find out why for the caller's error.
    let row: Option<(ProductStatus, i32)> = sqlx::query_as("SELECT status, stock FROM products WHERE id = $1")
      .bind(product_id)
      .fetch_optional(&mut *conn)
      .await
      .map_err(map_err)?;
    let outcome = match row {
      None => DecrementOutcome::NotFound,
      Some((status, _)) if status != ProductStatus::Active => DecrementOutcome::NotPurchasable,
      Some((_, available)) => DecrementOutcome::InsufficientStock { available },
    };
    debug!(?outcome, "Conditional decrement not applied.");
    Ok(outcome)
  }

  #[instrument(skip(self), err(Display))]
  async fn insert_order(&mut self, buyer_id: Uuid, total_amount: i64, status: OrderStatus) -> StoreResult<Order> {
    let conn = self.conn()?;
    sqlx::query_as::<_, Order>(&format!(
      "INSERT INTO orders (id, buyer_id, total_amount, status) VALUES ($1, $2, $3, $4) RETURNING {}",
      ORDER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(buyer_id)
    .bind(total_amount)
    .bind(status)
    .fetch_one(conn)
    .await
    .map_err(map_err)
  }

  #[instrument(skip(self, items), fields(count = items.len()), err(Display))]
  async fn insert_order_items(&mut self, order_id: Uuid, items: &[NewOrderItem]) -> StoreResult<Vec<OrderItem>> {
    let ids: Vec<Uuid> = items.iter().map(|_| Uuid::new_v4()).collect();
    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let seller_ids: Vec<Uuid> = items.iter().map(|i| i.seller_id).collect();
    let quantities: Vec<i32> = items.iter().map(|i| i.quantity).collect();
    let prices: Vec<i64> = items.iter().map(|i| i.price_at_purchase).collect();

    let conn = self.conn()?;
    sqlx::query_as::<_, OrderItem>(&format!(
      "INSERT INTO order_items (id, order_id, product_id, seller_id, quantity, price_at_purchase) \
       SELECT t.id, $1, t.product_id, t.seller_id, t.quantity, t.price \
       FROM UNNEST($2::uuid[], $3::uuid[], $4::uuid[], $5::int4[], $6::int8[]) \
         AS t(id, product_id, seller_id, quantity, price) \
       RETURNING {}",
      ORDER_ITEM_COLUMNS
    ))
    .bind(order_id)
    .bind(&ids)
    .bind(&product_ids)
    .bind(&seller_ids)
    .bind(&quantities)
    .bind(&prices)
    .fetch_all(conn)
    .await
    .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn commit(&mut self) -> StoreResult<()> {
    let tx = self
      .tx
      .take()
      .ok_or_else(|| StoreError::Unavailable("checkout transaction already finished".to_string()))?;
    tx.commit().await.map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn rollback(&mut self) -> StoreResult<()> {
    match self.tx.take() {
      // If this fails the connection is gone, and the server discards the
      // uncommitted transaction with it.
      Some(tx) => tx.rollback().await.map_err(map_err),
      None => Ok(()),
    }
  }
}

#[async_trait]
impl IdentityStore for PgStore {
  #[instrument(skip(self, user), fields(email = %user.email), err(Display))]
  async fn create_user(&self, user: NewUser) -> StoreResult<User> {
    sqlx::query_as::<_, User>(&format!(
      "INSERT INTO users (id, email, password_hash, full_name, role) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
      USER_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(user.email.trim().to_lowercase())
    .bind(&user.password_hash)
    .bind(&user.full_name)
    .bind(user.role)
    .fetch_one(&self.pool)
    .await
    .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
      .bind(email.trim().to_lowercase())
      .fetch_optional(&self.pool)
      .await
      .map_err(map_err)
  }

  #[instrument(skip(self), err(Display))]
  async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
      .bind(id)
      .fetch_optional(&self.pool)
      .await
      .map_err(map_err)
  }
}
