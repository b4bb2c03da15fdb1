//! Domain events
use serde::Serialize;
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::Money;
use crate::{OrderId, ProductId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProductEvent {
    Created { product_id: ProductId },
    Updated { product_id: ProductId, price: Money },
    Deactivated { product_id: ProductId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, total: Money, summary: String },
    PaymentVerified { order_id: OrderId, transaction_id: Option<String> },
    Confirmed { order_id: OrderId },
    Delivered { order_id: OrderId },
    Cancelled { order_id: OrderId, from: OrderStatus },
}

impl DomainEvent {
    /// Subject suffix used when publishing, e.g. `orders.placed`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::Created { .. }) => "products.created",
            Self::Product(ProductEvent::Updated { .. }) => "products.updated",
            Self::Product(ProductEvent::Deactivated { .. }) => "products.deactivated",
            Self::Order(OrderEvent::Placed { .. }) => "orders.placed",
            Self::Order(OrderEvent::PaymentVerified { .. }) => "orders.payment_verified",
            Self::Order(OrderEvent::Confirmed { .. }) => "orders.confirmed",
            Self::Order(OrderEvent::Delivered { .. }) => "orders.delivered",
            Self::Order(OrderEvent::Cancelled { .. }) => "orders.cancelled",
        }
    }
}
