//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{NewProduct, Product, ProductError, ProductForm, ProductUpdate};
pub use order::{Order, OrderAction, OrderActionKind, OrderError, OrderStatus};
pub use cart::{Cart, CartEntry};
