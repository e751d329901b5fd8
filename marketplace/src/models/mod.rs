// marketplace/src/models/mod.rs

//! Data structures representing catalogue, ledger and identity records.

pub mod cart;
pub mod order;
pub mod order_item;
pub mod product;
pub mod user;

pub use cart::{Cart, CartEntry, CartLine};
pub use order::{Order, OrderStatus, OrderWithItems};
pub use order_item::{NewOrderItem, OrderItem, OrderItemView, SaleRecord};
pub use product::{NewProduct, Product, ProductFilter, ProductStatus};
pub use user::{NewUser, Role, User};
