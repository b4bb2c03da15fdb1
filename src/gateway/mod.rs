//! Remote data gateway.
//!
//! The order/product store the storefront talks to. Implementations enforce
//! the order transition table themselves; callers still gate actions locally.

mod cached;
mod memory;
mod postgres;

pub use cached::CachedGateway;
pub use memory::InMemoryGateway;
pub use postgres::PgGateway;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::domain::aggregates::order::OrderRequest;
use crate::domain::aggregates::{NewProduct, Order, OrderError, Product, ProductError, ProductUpdate};
use crate::domain::value_objects::TransactionId;
use crate::{OrderId, ProductId};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("rejected by server: {0}")]
    Rejected(#[from] OrderError),

    #[error("invalid product: {0}")]
    InvalidProduct(#[from] ProductError),

    #[error("caller is not authorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool { matches!(self, Self::OrderNotFound(_) | Self::ProductNotFound(_)) }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteDataGateway: Send + Sync {
    /// Creates a `pending` order; the gateway assigns id, timestamp and creator.
    async fn create_order(&self, request: OrderRequest) -> Result<Order, GatewayError>;

    async fn get_order(&self, id: OrderId) -> Result<Order, GatewayError>;

    async fn get_all_orders(&self) -> Result<Vec<Order>, GatewayError>;

    async fn get_active_products(&self) -> Result<Vec<Product>, GatewayError>;

    async fn get_all_products(&self) -> Result<Vec<Product>, GatewayError>;

    async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError>;

    async fn verify_payment(&self, id: OrderId, transaction_id: TransactionId) -> Result<(), GatewayError>;

    async fn confirm_order(&self, id: OrderId) -> Result<(), GatewayError>;

    async fn mark_order_delivered(&self, id: OrderId) -> Result<(), GatewayError>;

    async fn cancel_order(&self, id: OrderId) -> Result<(), GatewayError>;

    async fn create_product(&self, product: NewProduct) -> Result<Product, GatewayError>;

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, GatewayError>;

    async fn deactivate_product(&self, id: ProductId) -> Result<(), GatewayError>;
}
