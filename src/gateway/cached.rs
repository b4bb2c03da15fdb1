//! Read-through cache in front of a gateway.
//!
//! Every mutation drops the cached collections it can affect, so staff
//! gating always sees the status the server last reported.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{GatewayError, RemoteDataGateway};
use crate::domain::aggregates::order::OrderRequest;
use crate::domain::aggregates::{NewProduct, Order, Product, ProductUpdate};
use crate::domain::value_objects::TransactionId;
use crate::{OrderId, ProductId};

#[derive(Debug)]
pub struct CachedGateway<G> {
    inner: G,
    cache: RwLock<Cache>,
}

#[derive(Debug, Default)]
struct Cache {
    /// Bumped by every invalidation. A read only stores what it fetched if
    /// no invalidation happened while it was waiting on the inner gateway.
    generation: u64,
    all_orders: Option<Vec<Order>>,
    all_products: Option<Vec<Product>>,
    active_products: Option<Vec<Product>>,
    orders: HashMap<OrderId, Order>,
    products: HashMap<ProductId, Product>,
}

impl Cache {
    fn invalidate(&mut self) -> &mut Self {
        self.generation += 1;
        self
    }
}

impl<G: RemoteDataGateway> CachedGateway<G> {
    pub fn new(inner: G) -> Self { Self { inner, cache: RwLock::new(Cache::default()) } }

    /// Returns the cached value, or the current generation on a miss.
    async fn lookup<T>(&self, read: impl FnOnce(&Cache) -> Option<T>) -> Result<T, u64> {
        let cache = self.cache.read().await;
        read(&*cache).ok_or(cache.generation)
    }

    async fn store_if_current(&self, generation: u64, write: impl FnOnce(&mut Cache)) {
        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            write(&mut *cache);
        } else {
            tracing::trace!("cache invalidated during read; result not stored");
        }
    }

    async fn invalidate_order(&self, id: OrderId) {
        let mut cache = self.cache.write().await;
        let cache = cache.invalidate();
        cache.all_orders = None;
        cache.orders.remove(&id);
    }

    async fn invalidate_products(&self, id: Option<ProductId>) {
        let mut cache = self.cache.write().await;
        let cache = cache.invalidate();
        cache.all_products = None;
        cache.active_products = None;
        match id {
            Some(id) => { cache.products.remove(&id); }
            None => cache.products.clear(),
        }
    }
}

#[async_trait]
impl<G: RemoteDataGateway> RemoteDataGateway for CachedGateway<G> {
    async fn create_order(&self, request: OrderRequest) -> Result<Order, GatewayError> {
        let created = self.inner.create_order(request).await;
        self.cache.write().await.invalidate().all_orders = None;
        created
    }

    async fn get_order(&self, id: OrderId) -> Result<Order, GatewayError> {
        let generation = match self.lookup(|c| c.orders.get(&id).cloned()).await {
            Ok(hit) => {
                tracing::trace!(order_id = %id, "order cache hit");
                return Ok(hit);
            }
            Err(generation) => generation,
        };
        let order = self.inner.get_order(id).await?;
        self.store_if_current(generation, |c| { c.orders.insert(id, order.clone()); }).await;
        Ok(order)
    }

    async fn get_all_orders(&self) -> Result<Vec<Order>, GatewayError> {
        let generation = match self.lookup(|c| c.all_orders.clone()).await {
            Ok(hit) => return Ok(hit),
            Err(generation) => generation,
        };
        let orders = self.inner.get_all_orders().await?;
        self.store_if_current(generation, |c| c.all_orders = Some(orders.clone())).await;
        Ok(orders)
    }

    async fn get_active_products(&self) -> Result<Vec<Product>, GatewayError> {
        let generation = match self.lookup(|c| c.active_products.clone()).await {
            Ok(hit) => return Ok(hit),
            Err(generation) => generation,
        };
        let products = self.inner.get_active_products().await?;
        self.store_if_current(generation, |c| c.active_products = Some(products.clone())).await;
        Ok(products)
    }

    async fn get_all_products(&self) -> Result<Vec<Product>, GatewayError> {
        let generation = match self.lookup(|c| c.all_products.clone()).await {
            Ok(hit) => return Ok(hit),
            Err(generation) => generation,
        };
        let products = self.inner.get_all_products().await?;
        self.store_if_current(generation, |c| c.all_products = Some(products.clone())).await;
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Product, GatewayError> {
        let generation = match self.lookup(|c| c.products.get(&id).cloned()).await {
            Ok(hit) => {
                tracing::trace!(product_id = %id, "product cache hit");
                return Ok(hit);
            }
            Err(generation) => generation,
        };
        let product = self.inner.get_product(id).await?;
        self.store_if_current(generation, |c| { c.products.insert(id, product.clone()); }).await;
        Ok(product)
    }

    // Status mutations invalidate even when rejected: a rejection usually
    // means the cached status was stale.
    async fn verify_payment(&self, id: OrderId, transaction_id: TransactionId) -> Result<(), GatewayError> {
        let result = self.inner.verify_payment(id, transaction_id).await;
        self.invalidate_order(id).await;
        result
    }

    async fn confirm_order(&self, id: OrderId) -> Result<(), GatewayError> {
        let result = self.inner.confirm_order(id).await;
        self.invalidate_order(id).await;
        result
    }

    async fn mark_order_delivered(&self, id: OrderId) -> Result<(), GatewayError> {
        let result = self.inner.mark_order_delivered(id).await;
        self.invalidate_order(id).await;
        result
    }

    async fn cancel_order(&self, id: OrderId) -> Result<(), GatewayError> {
        let result = self.inner.cancel_order(id).await;
        self.invalidate_order(id).await;
        result
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product, GatewayError> {
        let created = self.inner.create_product(product).await;
        self.invalidate_products(created.as_ref().ok().map(|p| p.id)).await;
        created
    }

    async fn update_product(&self, id: ProductId, update: ProductUpdate) -> Result<Product, GatewayError> {
        let updated = self.inner.update_product(id, update).await;
        self.invalidate_products(Some(id)).await;
        updated
    }

    async fn deactivate_product(&self, id: ProductId) -> Result<(), GatewayError> {
        let result = self.inner.deactivate_product(id).await;
        self.invalidate_products(Some(id)).await;
        result
    }
}
