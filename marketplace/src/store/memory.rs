// marketplace/src/store/memory.rs

//! In-process backend for development and tests. One mutex guards all tables,
//! so every trait method is atomic with respect to the others.
//!
//! A checkout unit takes its stock immediately (other checkouts see it gone)
//! and keeps its order and items to itself until `commit`, which publishes
//! both under one lock. Rolling back or dropping the unit gives the stock back.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{CatalogStore, CheckoutUnit, DecrementOutcome, IdentityStore, OrderLedger, StoreError, StoreResult};
use crate::models::{
  NewOrderItem, NewProduct, NewUser, Order, OrderItem, OrderItemView, OrderStatus, OrderWithItems, Product,
  ProductFilter, ProductStatus, SaleRecord, User,
};

#[derive(Default)]
struct Tables {
  users: Vec<User>,
  products: Vec<Product>,
  orders: Vec<Order>,
  order_items: Vec<OrderItem>,
}

impl Tables {
  fn product_mut(&mut self, id: Uuid) -> Option<&mut Product> {
    self.products.iter_mut().find(|p| p.id == id)
  }

  fn conditional_decrement(&mut self, product_id: Uuid, quantity: i32) -> DecrementOutcome {
    let Some(product) = self.product_mut(product_id) else {
      return DecrementOutcome::NotFound;
    };
    if product.status != ProductStatus::Active {
      return DecrementOutcome::NotPurchasable;
    }
    if product.stock < quantity {
      return DecrementOutcome::InsufficientStock { available: product.stock };
    }
    product.stock -= quantity;
    product.updated_at = Utc::now();
    DecrementOutcome::Applied {
      remaining: product.stock,
    }
  }

  fn item_views(&self, order_id: Uuid) -> Vec<OrderItemView> {
    let titles: HashMap<Uuid, &str> = self.products.iter().map(|p| (p.id, p.title.as_str())).collect();
    self
      .order_items
      .iter()
      .filter(|item| item.order_id == order_id)
      .map(|item| OrderItemView {
        id: item.id,
        order_id: item.order_id,
        product_id: item.product_id,
        product_title: item.product_id.and_then(|id| titles.get(&id).map(|t| t.to_string())),
        quantity: item.quantity,
        price_at_purchase: item.price_at_purchase,
      })
      .collect()
  }
}

#[derive(Default)]
pub struct MemoryStore {
  tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Inserts a fully formed product, e.g. to set up a non-active status in tests.
  pub fn put_product(&self, product: Product) {
    self.tables.lock().products.push(product);
  }
}

#[async_trait]
impl CatalogStore for MemoryStore {
  async fn get_products_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Product>> {
    let tables = self.tables.lock();
    Ok(tables.products.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
  }

  async fn list_active_products(&self, filter: &ProductFilter) -> StoreResult<Vec<Product>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .products
        .iter()
        .rev()
        .filter(|p| p.status == ProductStatus::Active && filter.matches(p))
        .cloned()
        .collect(),
    )
  }

  async fn get_active_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .products
        .iter()
        .find(|p| p.id == id && p.status == ProductStatus::Active)
        .cloned(),
    )
  }

  async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
    Ok(self.tables.lock().products.iter().find(|p| p.id == id).cloned())
  }

  async fn insert_product(&self, seller_id: Uuid, new: &NewProduct) -> StoreResult<Product> {
    let now = Utc::now();
    let product = Product {
      id: Uuid::new_v4(),
      seller_id,
      title: new.title.trim().to_string(),
      description: new.description.clone(),
      price: new.price,
      stock: new.stock,
      category: new.category.clone(),
      images: new.images.clone(),
      status: ProductStatus::Active,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().products.push(product.clone());
    Ok(product)
  }

  async fn delete_product(&self, id: Uuid) -> StoreResult<bool> {
    let mut tables = self.tables.lock();
    let before = tables.products.len();
    tables.products.retain(|p| p.id != id);
    if tables.products.len() == before {
      return Ok(false);
    }
    for item in tables.order_items.iter_mut().filter(|i| i.product_id == Some(id)) {
      item.product_id = None;
    }
    Ok(true)
  }

  async fn products_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<Product>> {
    let tables = self.tables.lock();
    Ok(tables.products.iter().rev().filter(|p| p.seller_id == seller_id).cloned().collect())
  }
}

#[async_trait]
impl OrderLedger for MemoryStore {
  async fn begin_checkout(&self) -> StoreResult<Box<dyn CheckoutUnit>> {
    Ok(Box::new(MemoryCheckout::new(self.tables.clone())))
  }

  async fn update_order_status(&self, order_id: Uuid, expected: OrderStatus, new: OrderStatus) -> StoreResult<bool> {
    let mut tables = self.tables.lock();
    match tables.orders.iter_mut().find(|o| o.id == order_id && o.status == expected) {
      Some(order) => {
        order.status = new;
        order.updated_at = Utc::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }

  async fn get_order(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    Ok(self.tables.lock().orders.iter().find(|o| o.id == order_id).cloned())
  }

  async fn order_items(&self, order_id: Uuid) -> StoreResult<Vec<OrderItem>> {
    let tables = self.tables.lock();
    Ok(tables.order_items.iter().filter(|i| i.order_id == order_id).cloned().collect())
  }

  async fn seller_has_items_in_order(&self, seller_id: Uuid, order_id: Uuid) -> StoreResult<bool> {
    let tables = self.tables.lock();
    Ok(
      tables
        .order_items
        .iter()
        .any(|i| i.order_id == order_id && i.seller_id == seller_id),
    )
  }

  async fn orders_for_buyer(&self, buyer_id: Uuid) -> StoreResult<Vec<OrderWithItems>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .orders
        .iter()
        .rev()
        .filter(|o| o.buyer_id == buyer_id)
        .map(|o| OrderWithItems {
          order: o.clone(),
          items: tables.item_views(o.id),
        })
        .collect(),
    )
  }

  async fn sales_for_seller(&self, seller_id: Uuid) -> StoreResult<Vec<SaleRecord>> {
    let tables = self.tables.lock();
    let orders: HashMap<Uuid, &Order> = tables.orders.iter().map(|o| (o.id, o)).collect();
    let mut sales: Vec<SaleRecord> = tables
      .order_items
      .iter()
      .filter(|i| i.seller_id == seller_id)
      .filter_map(|item| {
        let order = orders.get(&item.order_id)?;
        let product_title = item
          .product_id
          .and_then(|pid| tables.products.iter().find(|p| p.id == pid))
          .map(|p| p.title.clone());
        Some(SaleRecord {
          order_item_id: item.id,
          order_id: order.id,
          buyer_id: order.buyer_id,
          product_id: item.product_id,
          product_title,
          quantity: item.quantity,
          price_at_purchase: item.price_at_purchase,
          order_status: order.status,
          ordered_at: order.created_at,
        })
      })
      .collect();
    // Items are appended in insertion order; newest order first.
    sales.reverse();
    Ok(sales)
  }
}

/// Checkout unit of the memory backend.
pub struct MemoryCheckout {
  tables: Arc<Mutex<Tables>>,
  reserved: Vec<(Uuid, i32)>,
  order: Option<Order>,
  items: Vec<OrderItem>,
  finished: bool,
}

impl MemoryCheckout {
  fn new(tables: Arc<Mutex<Tables>>) -> Self {
    Self {
      tables,
      reserved: Vec::new(),
      order: None,
      items: Vec::new(),
      finished: false,
    }
  }

  fn ensure_open(&self) -> StoreResult<()> {
    if self.finished {
      return Err(StoreError::Unavailable("checkout unit already finished".to_string()));
    }
    Ok(())
  }

  /// Gives back every reservation and forgets the staged rows.
  fn release(&mut self) {
    if self.finished {
      return;
    }
    self.finished = true;
    self.order = None;
    self.items.clear();
    let mut tables = self.tables.lock();
    for (product_id, quantity) in self.reserved.drain(..) {
      // A product deleted meanwhile has nothing to give back to.
      if let Some(product) = tables.product_mut(product_id) {
        product.stock = product.stock.saturating_add(quantity);
        product.updated_at = Utc::now();
      }
    }
  }
}

#[async_trait]
impl CheckoutUnit for MemoryCheckout {
  async fn conditional_decrement_stock(&mut self, product_id: Uuid, quantity: i32) -> StoreResult<DecrementOutcome> {
    self.ensure_open()?;
    let outcome = self.tables.lock().conditional_decrement(product_id, quantity);
    if let DecrementOutcome::Applied { .. } = outcome {
      self.reserved.push((product_id, quantity));
    }
    Ok(outcome)
  }

  async fn insert_order(&mut self, buyer_id: Uuid, total_amount: i64, status: OrderStatus) -> StoreResult<Order> {
    self.ensure_open()?;
    if self.order.is_some() {
      return Err(StoreError::Unavailable("checkout unit already holds an order".to_string()));
    }
    let now = Utc::now();
    let order = Order {
      id: Uuid::new_v4(),
      buyer_id,
      total_amount,
      status,
      created_at: now,
      updated_at: now,
    };
    self.order = Some(order.clone());
    Ok(order)
  }

  async fn insert_order_items(&mut self, order_id: Uuid, items: &[NewOrderItem]) -> StoreResult<Vec<OrderItem>> {
    self.ensure_open()?;
    if self.order.as_ref().map(|o| o.id) != Some(order_id) {
      return Err(StoreError::Unavailable(format!("order {} does not exist", order_id)));
    }
    let rows: Vec<OrderItem> = items
      .iter()
      .map(|item| OrderItem {
        id: Uuid::new_v4(),
        order_id,
        product_id: Some(item.product_id),
        seller_id: item.seller_id,
        quantity: item.quantity,
        price_at_purchase: item.price_at_purchase,
      })
      .collect();
    self.items.extend(rows.iter().cloned());
    Ok(rows)
  }

  async fn commit(&mut self) -> StoreResult<()> {
    self.ensure_open()?;
    let Some(order) = self.order.take() else {
      return Err(StoreError::Unavailable("nothing to commit: no order recorded".to_string()));
    };
    let mut tables = self.tables.lock();
    tables.orders.push(order);
    tables.order_items.append(&mut self.items);
    self.reserved.clear();
    self.finished = true;
    Ok(())
  }

  async fn rollback(&mut self) -> StoreResult<()> {
    self.release();
    Ok(())
  }
}

impl Drop for MemoryCheckout {
  fn drop(&mut self) {
    self.release();
  }
}

#[async_trait]
impl IdentityStore for MemoryStore {
  async fn create_user(&self, new: NewUser) -> StoreResult<User> {
    let mut tables = self.tables.lock();
    let email = new.email.trim().to_lowercase();
    if tables.users.iter().any(|u| u.email == email) {
      return Err(StoreError::Duplicate(format!("user with email {}", email)));
    }
    let user = User {
      id: Uuid::new_v4(),
      email,
      password_hash: new.password_hash,
      full_name: new.full_name,
      role: new.role,
      created_at: Utc::now(),
    };
    tables.users.push(user.clone());
    Ok(user)
  }

  async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
    let email = email.trim().to_lowercase();
    Ok(self.tables.lock().users.iter().find(|u| u.email == email).cloned())
  }

  async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
    Ok(self.tables.lock().users.iter().find(|u| u.id == id).cloned())
  }
}
