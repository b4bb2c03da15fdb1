//! Staff back office: order fulfillment and product management.
//!
//! Order actions are gated locally against the transition table before the
//! gateway is called, so an illegal action never leaves the process. The
//! gateway enforces the same table on its side.

use serde::Serialize;
use std::sync::Arc;

use crate::domain::aggregates::{NewProduct, OrderError, ProductUpdate};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::gateway::RemoteDataGateway;
use crate::notify::EventPublisher;
use crate::{Order, OrderAction, OrderActionKind, OrderId, Product, ProductId, Result};

/// Order detail as shown on the admin order page.
#[derive(Clone, Debug, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: &'static str,
    pub payment_label: &'static str,
    pub available_actions: Vec<OrderActionKind>,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            status_label: order.status().label(),
            payment_label: order.payment_method().label(),
            available_actions: order.status().available_actions(),
            order,
        }
    }
}

pub struct OrderDesk {
    gateway: Arc<dyn RemoteDataGateway>,
    events: Arc<dyn EventPublisher>,
}

impl OrderDesk {
    pub fn new(gateway: Arc<dyn RemoteDataGateway>, events: Arc<dyn EventPublisher>) -> Self { Self { gateway, events } }

    /// All orders, newest first.
    pub async fn orders(&self) -> Result<Vec<OrderView>> {
        Ok(self.gateway.get_all_orders().await?.into_iter().map(OrderView::from).collect())
    }

    pub async fn order(&self, id: OrderId) -> Result<OrderView> { Ok(self.gateway.get_order(id).await?.into()) }

    /// Performs a staff action on an order and returns the updated order.
    pub async fn perform(&self, id: OrderId, action: OrderAction) -> Result<OrderView> {
        let mut order = self.gateway.get_order(id).await?;
        let kind = action.kind();
        if !order.can(kind) {
            tracing::warn!(order_id = %id, action = kind.as_str(), status = order.status().as_str(), "action not available");
            return Err(OrderError::IllegalTransition { action: kind, from: order.status() }.into());
        }

        let sent = match &action {
            OrderAction::VerifyPayment { transaction_id } => self.gateway.verify_payment(id, transaction_id.clone()).await,
            OrderAction::ConfirmOrder => self.gateway.confirm_order(id).await,
            OrderAction::MarkDelivered => self.gateway.mark_order_delivered(id).await,
            OrderAction::CancelOrder => self.gateway.cancel_order(id).await,
        };
        if let Err(e) = sent {
            tracing::warn!(order_id = %id, action = kind.as_str(), error = %e, "order action failed");
            return Err(e.into());
        }

        let from = order.status();
        order.apply(&action)?;
        tracing::info!(order_id = %id, action = kind.as_str(), from = from.as_str(), to = order.status().as_str(), "order updated");
        for event in order.take_events() { self.events.publish(&event).await; }
        Ok(order.into())
    }
}

pub struct ProductDesk {
    gateway: Arc<dyn RemoteDataGateway>,
    events: Arc<dyn EventPublisher>,
}

impl ProductDesk {
    pub fn new(gateway: Arc<dyn RemoteDataGateway>, events: Arc<dyn EventPublisher>) -> Self { Self { gateway, events } }

    pub async fn products(&self) -> Result<Vec<Product>> { Ok(self.gateway.get_all_products().await?) }

    pub async fn create(&self, draft: NewProduct) -> Result<Product> {
        let product = self.gateway.create_product(draft).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "product created");
        self.publish(ProductEvent::Created { product_id: product.id }).await;
        Ok(product)
    }

    pub async fn update(&self, id: ProductId, update: ProductUpdate) -> Result<Product> {
        let product = self.gateway.update_product(id, update).await?;
        tracing::info!(product_id = %id, price = %product.price, "product updated");
        self.publish(ProductEvent::Updated { product_id: id, price: product.price }).await;
        Ok(product)
    }

    /// Soft delete: the product leaves the storefront but old orders still resolve it.
    pub async fn deactivate(&self, id: ProductId) -> Result<()> {
        self.gateway.deactivate_product(id).await?;
        tracing::info!(product_id = %id, "product deactivated");
        self.publish(ProductEvent::Deactivated { product_id: id }).await;
        Ok(())
    }

    async fn publish(&self, event: ProductEvent) { self.events.publish(&DomainEvent::Product(event)).await; }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::OrderRequest;
    use crate::domain::aggregates::OrderStatus;
    use crate::domain::value_objects::{Money, Quantity, TransactionId};
    use crate::gateway::{GatewayError, InMemoryGateway, MockRemoteDataGateway};
    use crate::notify::RecordingPublisher;
    use crate::{CustomerInfo, LineItem, PaymentMethod, StorefrontError};
    use chrono::Utc;

    fn request(method: PaymentMethod) -> OrderRequest {
        OrderRequest {
            customer: CustomerInfo { name: "Bilal".into(), phone: "0300 1234567".into(), address: "Karachi".into() },
            line_items: vec![LineItem { product_id: ProductId(1), quantity: Quantity::one(), price: Money::new(5000) }],
            subtotal: Money::new(5000),
            delivery_fee: Money::new(200),
            payment_method: method,
            transaction_id: None,
        }
    }

    async fn seeded(method: PaymentMethod) -> (Arc<InMemoryGateway>, OrderId) {
        let gateway = Arc::new(InMemoryGateway::with_catalog("staff", [NewProduct::new("Chronograph", "", Money::new(5000), &[]).unwrap()]));
        let order = gateway.create_order(request(method)).await.unwrap();
        (gateway, order.id())
    }

    #[tokio::test]
    async fn test_full_lifecycle_publishes_events() {
        let (gateway, id) = seeded(PaymentMethod::EasyPaisa).await;
        let events = Arc::new(RecordingPublisher::default());
        let desk = OrderDesk::new(gateway, events.clone());

        let view = desk.perform(id, OrderAction::VerifyPayment { transaction_id: TransactionId::new("EP-991").unwrap() }).await.unwrap();
        assert_eq!(view.order.status(), OrderStatus::PaymentVerified);
        assert_eq!(view.order.transaction_id().map(TransactionId::as_str), Some("EP-991"));
        desk.perform(id, OrderAction::ConfirmOrder).await.unwrap();
        let view = desk.perform(id, OrderAction::MarkDelivered).await.unwrap();
        assert_eq!(view.status_label, "Delivered");
        assert!(view.available_actions.is_empty());
        assert_eq!(events.subjects(), vec!["orders.payment_verified", "orders.confirmed", "orders.delivered"]);

        assert_eq!(desk.order(id).await.unwrap().order.status(), OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_cash_on_delivery_verification_records_no_transaction_id() {
        let (gateway, id) = seeded(PaymentMethod::CashOnDelivery).await;
        let desk = OrderDesk::new(gateway, Arc::new(RecordingPublisher::default()));
        let view = desk.perform(id, OrderAction::VerifyPayment { transaction_id: TransactionId::new("X").unwrap() }).await.unwrap();
        assert_eq!(view.order.status(), OrderStatus::PaymentVerified);
        assert_eq!(view.order.transaction_id(), None);
    }

    #[tokio::test]
    async fn test_illegal_action_never_reaches_gateway() {
        let mut gateway = MockRemoteDataGateway::new();
        gateway.expect_get_order().returning(|id| Ok(Order::restore(id, OrderStatus::Delivered, request(PaymentMethod::CashOnDelivery), "staff", Utc::now())));
        gateway.expect_cancel_order().never();
        let events = Arc::new(RecordingPublisher::default());
        let desk = OrderDesk::new(Arc::new(gateway), events.clone());

        let err = desk.perform(OrderId(4), OrderAction::CancelOrder).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Transition(OrderError::IllegalTransition { action: OrderActionKind::CancelOrder, from: OrderStatus::Delivered })));
        assert!(events.subjects().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_rejection_publishes_nothing() {
        let mut gateway = MockRemoteDataGateway::new();
        gateway.expect_get_order().returning(|id| Ok(Order::restore(id, OrderStatus::Pending, request(PaymentMethod::CashOnDelivery), "staff", Utc::now())));
        gateway.expect_confirm_order().never();
        gateway.expect_cancel_order().times(1).returning(|_| Err(GatewayError::Unauthorized));
        let events = Arc::new(RecordingPublisher::default());
        let desk = OrderDesk::new(Arc::new(gateway), events.clone());

        let err = desk.perform(OrderId(4), OrderAction::CancelOrder).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Gateway(GatewayError::Unauthorized)));
        assert!(events.subjects().is_empty());
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let desk = OrderDesk::new(Arc::new(InMemoryGateway::new("staff")), Arc::new(RecordingPublisher::default()));
        assert!(matches!(desk.perform(OrderId(42), OrderAction::ConfirmOrder).await, Err(StorefrontError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_product_management() {
        let events = Arc::new(RecordingPublisher::default());
        let desk = ProductDesk::new(Arc::new(InMemoryGateway::new("staff")), events.clone());

        let created = desk.create(NewProduct::new(" Diver ", "200m", Money::new(9000), &[]).unwrap()).await.unwrap();
        assert_eq!(created.name, "Diver");
        let updated = desk.update(created.id, ProductUpdate::new("Diver", "300m", Money::new(9500), &[], true).unwrap()).await.unwrap();
        assert_eq!(updated.price, Money::new(9500));
        desk.deactivate(created.id).await.unwrap();

        let all = desk.products().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].active);
        assert_eq!(events.subjects(), vec!["products.created", "products.updated", "products.deactivated"]);
    }
}
