//! In-process gateway, used when no database is configured and in tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{GatewayError, RemoteDataGateway};
use crate::domain::aggregates::order::OrderRequest;
use crate::domain::aggregates::{NewProduct, Order, OrderAction, Product, ProductUpdate};
use crate::domain::value_objects::TransactionId;
use crate::{OrderId, ProductId};

#[derive(Debug)]
pub struct InMemoryGateway {
    principal: String,
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    next_product: u64,
    next_order: u64,
}

impl InMemoryGateway {
    pub fn new(principal: impl Into<String>) -> Self {
        Self { principal: principal.into(), state: RwLock::new(State { next_product: 1, next_order: 1, ..State::default() }) }
    }

    /// Builds a gateway pre-loaded with a catalog.
    pub fn with_catalog(principal: impl Into<String>, catalog: impl IntoIterator<Item = NewProduct>) -> Self {
        let mut state = State { next_product: 1, next_order: 1, ..State::default() };
        for draft in catalog {
            let id = ProductId(state.next_product);
            state.next_product += 1;
            state.products.insert(id, Product::create(id, draft));
        }
        Self { principal: principal.into(), state: RwLock::new(state) }
    }

    /// Drops a product entirely, as if it had been purged from the store.
    pub async fn purge_product(&self, id: ProductId) { self.state.write().await.products.remove(&id); }

    async fn transition(&self, id: OrderId, action: OrderAction) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        let order = state.orders.get_mut(&id).ok_or(GatewayError::OrderNotFound(id))?;
        order.apply(&action)?;
        order.take_events();
        Ok(())
    }
}

#[async_trait]
impl RemoteDataGateway for InMemoryGateway {
    async fn create_order(&self, request: OrderRequest) -> Result<Order, GatewayError> {
        let mut state = self.state.write().await;
        if let Some(missing) = request.line_items.iter().find(|i| !state.products.contains_key(&i.product_id)) {
            return Err(GatewayError::ProductNotFound(missing.product_id));
        }
        let id = OrderId(state.next_order);
        state.next_order += 1;
        let mut order = Order::place(id, request, self.principal.clone(), Utc::now());
        order.take_events();
        state.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Order, GatewayError> {
        self.state.read().await.orders.get(&id).cloned().ok_or(GatewayError::OrderNotFound(id))
    }

    async fn get_all_orders(&self) -> Result<Vec<Order>, GatewayError> {
        // Newest first
        Ok(self.state.read().await.orders.values().rev().cloned().collect())
    }

    async fn get_active_products(&self) -> Result<Vec<Product>, GatewayError> {
        Ok(self.state.read().await.products.values().filter(|p| p.active).cloned().collect())
    }

    async fn get_all_products(&self) -> Result<Vec<Product>, GatewayError> {
        Ok(self.state.read().await.products.values().cloned().collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError> {
        self.state.read().await.products.get(&id).cloned().ok_or(GatewayError::ProductNotFound(id))
    }

    async fn verify_payment(&self, id: OrderId, transaction_id: TransactionId) -> Result<(), GatewayError> {
        self.transition(id, OrderAction::VerifyPayment { transaction_id }).await
    }

    async fn confirm_order(&self, id: OrderId) -> Result<(), GatewayError> { self.transition(id, OrderAction::ConfirmOrder).await }

    async fn mark_order_delivered(&self, id: OrderId) -> Result<(), GatewayError> { self.transition(id, OrderAction::MarkDelivered).await }

    async fn cancel_order(&self, id: OrderId) -> Result<(), GatewayError> { self.transition(id, OrderAction::CancelOrder).await }

    async fn create_product(&self, product: NewProduct) -> Result<Product, GatewayError> {
        let mut state = self.state.write().await;
        let id = ProductId(state.next_product);
        state.next_product += 1;
        let created = Product::create(id, product);
        state.products.insert(id, created.clone());
        Ok(created)
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, GatewayError> {
        let mut state = self.state.write().await;
        let product = state.products.get_mut(&id).ok_or(GatewayError::ProductNotFound(id))?;
        product.apply_update(update);
        Ok(product.clone())
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        state.products.get_mut(&id).ok_or(GatewayError::ProductNotFound(id))?.deactivate();
        Ok(())
    }
}
