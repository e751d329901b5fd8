// marketplace/tests/common/mod.rs

#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use marketplace::config::AppConfig;
use marketplace::models::{
  NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderStatus, OrderWithItems, Product, ProductFilter, Role,
  SaleRecord, User,
};
use marketplace::state::AppState;
use marketplace::store::{
  CatalogStore, CheckoutUnit, DecrementOutcome, IdentityStore, MemoryStore, OrderLedger, StoreError, StoreResult,
  Stores,
};

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

/// Failure switches and a count of every storage call, shared by a
/// `FlakyStore` and the checkout units it hands out.
#[derive(Default)]
pub struct Faults {
  pub calls: AtomicUsize,
  /// Number of upcoming `begin_checkout` calls that fail.
  pub begin_failures: AtomicUsize,
  /// Decrements allowed to succeed before the next one reports the store as down.
  pub fail_decrement_after: AtomicUsize,
  pub decrement_failure_armed: AtomicBool,
  pub fail_insert_order: AtomicBool,
  pub fail_insert_items: AtomicBool,
  pub fail_commit: AtomicBool,
  /// Number of upcoming `rollback` calls that fail.
  pub rollback_failures: AtomicUsize,
}

impl Faults {
  fn touch(&self) {
    self.calls.fetch_add(1, Ordering::SeqCst);
  }

  /// Consumes one pending failure from `counter`, if any.
  fn take_one(counter: &AtomicUsize) -> bool {
    counter
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok()
  }
}

/// Memory store with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
  pub inner: MemoryStore,
  pub faults: Arc<Faults>,
}

fn down(what: &str) -> StoreError {
  StoreError::Unavailable(format!("injected failure in {}", what))
}

impl FlakyStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn touch(&self) {
    self.faults.touch();
  }

  pub fn call_count(&self) -> usize {
    self.faults.calls.load(Ordering::SeqCst)
  }

  pub fn fail_decrements_after(&self, successes: usize) {
    self.faults.fail_decrement_after.store(successes, Ordering::SeqCst);
    self.faults.decrement_failure_armed.store(true, Ordering::SeqCst);
  }
}

/// Wraps the memory unit; an injected failure never reaches it, so whatever it
/// holds is released only by its own rollback or drop.
pub struct FlakyCheckout {
  inner: Box<dyn CheckoutUnit>,
  faults: Arc<Faults>,
}

#[async_trait]
impl CheckoutUnit for FlakyCheckout {
  async fn conditional_decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> StoreResult<DecrementOutcome> {
    self.faults.touch();
    if self.faults.decrement_failure_armed.load(Ordering::SeqCst)
      && !Faults::take_one(&self.faults.fail_decrement_after)
    {
      return Err(down("conditional_decrement_stock"));
    }
    self.inner.conditional_decrement_stock(product_id, quantity).await
  }

  async fn insert_order(&mut self, buyer_id: Uuid, total_amount: i64, status: OrderStatus) -> StoreResult<Order> {
    self.faults.touch();
    if self.faults.fail_insert_order.load(Ordering::SeqCst) {
      return Err(down("insert_order"));
    }
    self.inner.insert_order(buyer_id, total_amount, status).await
  }

  async fn insert_order_items(&mut self, order_id: Uuid, items: &[NewOrderItem]) -> StoreResult<Vec<OrderItem>> {
    self.faults.touch();
    if self.faults.fail_insert_items.load(Ordering::SeqCst) {
      return Err(down("insert_order_items"));
    }
    self.inner.insert_order_items(order_id, items).await
  }

  async fn commit(&mut self) -> StoreResult<()> {
    self.faults.touch();
    if self.faults.fail_commit.load(Ordering::SeqCst) {
      return Err(down("commit"));
    }
    self.inner.commit().await
  }

  async fn rollback(&mut self) -> StoreResult<()> {
    self.faults.touch();
    if Faults::take_one(&self.faults.rollback_failures) {
      return Err(down("rollback"));
    }
    self.inner.rollback().await
  }
}

#[async_trait]
impl CatalogStore for FlakyStore {
  async fn get_products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    self.touch();
    self.inner.get_products_by_ids(ids).await
  }

  async fn list_active_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    self.touch();
    self.inner.list_active_products(filter).await
  }

  async fn get_active_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    self.touch();
    self.inner.get_active_product(id).await
  }

  async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    self.touch();
    self.inner.get_product(id).await
  }

  async fn insert_product(&self, seller_id: Uuid, product: &NewProduct) -> StoreResult<Product> {
    self.touch();
    self.inner.insert_product(seller_id, product).await
  }

  async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
    self.touch();
    self.inner.delete_product(id).await
  }

  async fn products_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Product>> {
    self.touch();
    self.inner.products_for_seller(seller_id).await
  }
}

#[async_trait]
impl OrderLedger for FlakyStore {
  async fn begin_checkout(&self) -> StoreResult<Box<dyn CheckoutUnit>> {
    self.touch();
    if Faults::take_one(&self.faults.begin_failures) {
      return Err(down("begin_checkout"));
    }
    Ok(Box::new(FlakyCheckout {
      inner: self.inner.begin_checkout().await?,
      faults: self.faults.clone(),
    }))
  }

  async fn update_order_status(&self, order_id: Uuid, expected: OrderStatus, new: OrderStatus) -> StoreResult<bool> {
    self.touch();
    self.inner.update_order_status(order_id, expected, new).await
  }

  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    self.touch();
    self.inner.get_order(order_id).await
  }

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    self.touch();
    self.inner.order_items(order_id).await
  }

  async fn seller_has_items_in_order(&self, seller_id: Uuid, order_id: Uuid) -> StoreResult<bool> {
    self.touch();
    self.inner.seller_has_items_in_order(seller_id, order_id).await
  }

  async fn orders_for_buyer(&self, buyer_id: Uuid) -> StoreResult<Vec<OrderWithItems>> {
    self.touch();
    self.inner.orders_for_buyer(buyer_id).await
  }

  async fn sales_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<SaleRecord>> {
    self.touch();
    self.inner.sales_for_seller(seller_id).await
  }
}

#[async_trait]
impl IdentityStore for FlakyStore {
  async fn create_user(&self, user: NewUser) -> StoreResult<User> {
    self.touch();
    self.inner.create_user(user).await
  }

  async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
    self.touch();
    self.inner.find_user_by_email(email).await
  }

  async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
    self.touch();
    self.inner.get_user(id).await
  }
}

pub struct TestApp {
  pub state: AppState,
  pub store: Arc<FlakyStore>,
}

pub fn test_config() -> AppConfig {
  AppConfig {
    checkout_retry_backoff_ms: 1,
    ..AppConfig::default()
  }
}

pub fn test_app() -> TestApp {
  setup_tracing();
  let store = Arc::new(FlakyStore::new());
  let state = AppState::new(test_config(), Stores::from_backend(store.clone()));
  TestApp { state, store }
}

impl TestApp {
  /// Users are inserted directly; the hash is never checked by these tests.
  pub async fn user(&self, role: Role) -> User {
    self
      .store
      .inner
      .create_user(NewUser {
        email: format!("{}@test.local", Uuid::new_v4()),
        password_hash: "unused".to_string(),
        full_name: None,
        role,
      })
      .await
      .expect("create user")
  }

  pub async fn product(&self, seller: &User, price: i64, stock: i32) -> Product {
    self
      .store
      .inner
      .insert_product(
        seller.id,
        &NewProduct {
          title: format!("Product {}", &Uuid::new_v4().simple().to_string()[..8]),
          description: None,
          price,
          category: Some("misc".to_string()),
          images: vec![],
          stock,
        },
      )
      .await
      .expect("insert product")
  }

  pub async fn stock_of(&self, product_id: Uuid) -> i32 {
    self
      .store
      .inner
      .get_product(product_id)
      .await
      .expect("read product")
      .map(|p| p.stock)
      .expect("product exists")
  }

  pub async fn orders_of(&self, buyer_id: Uuid) -> Vec<OrderWithItems> {
    self.store.inner.orders_for_buyer(buyer_id).await.expect("read orders")
  }

  pub fn reset_call_count(&self) {
    self.store.faults.calls.store(0, Ordering::SeqCst);
  }
}
