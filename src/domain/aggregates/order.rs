//! Order Aggregate
//!
//! Orders move `pending → paymentVerified → confirmed → delivered`, and can be
//! cancelled from any non-terminal status. The same table gates the staff
//! actions offered by the admin surface and is enforced by the gateways.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{Money, TransactionId};
use crate::{CustomerInfo, LineItem, OrderId, PaymentMethod, UnknownVariant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
    #[default]
    Pending,
    PaymentVerified,
    Confirmed,
    Delivered,
    Cancelled,
}

/// Staff action, without its payload. Used for gating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderActionKind {
    VerifyPayment,
    ConfirmOrder,
    MarkDelivered,
    CancelOrder,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderAction {
    VerifyPayment { transaction_id: TransactionId },
    ConfirmOrder,
    MarkDelivered,
    CancelOrder,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::PaymentVerified, Self::Confirmed, Self::Delivered, Self::Cancelled];

    /// Destination of `action` from this status, if the table allows it.
    pub fn transition(self, action: OrderActionKind) -> Result<OrderStatus, OrderError> {
        use OrderActionKind::*;
        use OrderStatus::*;
        match (action, self) {
            (VerifyPayment, Pending) => Ok(PaymentVerified),
            (ConfirmOrder, PaymentVerified) => Ok(Confirmed),
            (MarkDelivered, Confirmed) => Ok(Delivered),
            (CancelOrder, Pending | PaymentVerified | Confirmed) => Ok(Cancelled),
            (action, from) => Err(OrderError::IllegalTransition { action, from }),
        }
    }

    pub fn permits(self, action: OrderActionKind) -> bool { self.transition(action).is_ok() }

    pub fn available_actions(self) -> Vec<OrderActionKind> {
        OrderActionKind::ALL.into_iter().filter(|a| self.permits(*a)).collect()
    }

    pub fn is_terminal(self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::PaymentVerified => "Payment Verified",
            Self::Confirmed => "Confirmed",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaymentVerified => "paymentVerified",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

impl OrderActionKind {
    pub const ALL: [OrderActionKind; 4] = [Self::VerifyPayment, Self::ConfirmOrder, Self::MarkDelivered, Self::CancelOrder];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VerifyPayment => "verify payment",
            Self::ConfirmOrder => "confirm",
            Self::MarkDelivered => "mark delivered",
            Self::CancelOrder => "cancel",
        }
    }
}

impl fmt::Display for OrderActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl OrderAction {
    pub fn kind(&self) -> OrderActionKind {
        match self {
            Self::VerifyPayment { .. } => OrderActionKind::VerifyPayment,
            Self::ConfirmOrder => OrderActionKind::ConfirmOrder,
            Self::MarkDelivered => OrderActionKind::MarkDelivered,
            Self::CancelOrder => OrderActionKind::CancelOrder,
        }
    }
}

/// Everything the gateway needs to create an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub customer: CustomerInfo,
    pub line_items: Vec<LineItem>,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<TransactionId>,
}

impl OrderRequest {
    pub fn total(&self) -> Money { self.subtotal.add(self.delivery_fee) }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    status: OrderStatus,
    line_items: Vec<LineItem>,
    subtotal: Money,
    delivery_fee: Money,
    total: Money,
    payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transaction_id: Option<TransactionId>,
    customer: CustomerInfo,
    created_at: DateTime<Utc>,
    created_by: String,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Order {
    /// New `pending` order. Raises `OrderEvent::Placed`.
    pub fn place(id: OrderId, request: OrderRequest, created_by: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let mut order = Self::restore(id, OrderStatus::Pending, request, created_by, created_at);
        let placed = OrderEvent::Placed { order_id: id, total: order.total, summary: order.summary() };
        order.raise_event(DomainEvent::Order(placed));
        order
    }

    /// Rebuilds an order read back from storage. No events are raised.
    pub fn restore(id: OrderId, status: OrderStatus, request: OrderRequest, created_by: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let total = request.total();
        let transaction_id = request.transaction_id.filter(|_| request.payment_method.is_manual());
        Self {
            id, status, line_items: request.line_items, subtotal: request.subtotal, delivery_fee: request.delivery_fee, total,
            payment_method: request.payment_method, transaction_id, customer: request.customer,
            created_at, created_by: created_by.into(), events: vec![],
        }
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn line_items(&self) -> &[LineItem] { &self.line_items }
    pub fn subtotal(&self) -> Money { self.subtotal }
    pub fn delivery_fee(&self) -> Money { self.delivery_fee }
    pub fn total(&self) -> Money { self.total }
    pub fn payment_method(&self) -> PaymentMethod { self.payment_method }
    pub fn customer(&self) -> &CustomerInfo { &self.customer }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn created_by(&self) -> &str { &self.created_by }

    /// Transaction reference; always `None` for cash on delivery.
    pub fn transaction_id(&self) -> Option<&TransactionId> {
        self.transaction_id.as_ref().filter(|_| self.payment_method.is_manual())
    }

    pub fn can(&self, action: OrderActionKind) -> bool { self.status.permits(action) }

    pub fn apply(&mut self, action: &OrderAction) -> Result<(), OrderError> {
        let from = self.status;
        self.status = from.transition(action.kind())?;
        let event = match action {
            OrderAction::VerifyPayment { transaction_id } => {
                if self.payment_method.is_manual() { self.transaction_id = Some(transaction_id.clone()); }
                OrderEvent::PaymentVerified { order_id: self.id, transaction_id: self.transaction_id().map(|t| t.to_string()) }
            }
            OrderAction::ConfirmOrder => OrderEvent::Confirmed { order_id: self.id },
            OrderAction::MarkDelivered => OrderEvent::Delivered { order_id: self.id },
            OrderAction::CancelOrder => OrderEvent::Cancelled { order_id: self.id, from },
        };
        self.raise_event(DomainEvent::Order(event));
        Ok(())
    }

    /// Plain-text order summary sent to staff when the order is placed.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "*New Order from iMazu*\n");
        let _ = writeln!(out, "*Order ID:* {}\n", self.id);
        let _ = writeln!(out, "*Customer Details:*");
        let _ = writeln!(out, "Name: {}", self.customer.name);
        let _ = writeln!(out, "Phone: {}", self.customer.phone);
        let _ = writeln!(out, "Address: {}\n", self.customer.address);
        let _ = writeln!(out, "*Order Items:*");
        for (index, item) in self.line_items.iter().enumerate() {
            let _ = writeln!(out, "{}. Product ID: {} - Qty: {} - Price: {}", index + 1, item.product_id, item.quantity, item.price);
        }
        let _ = writeln!(out, "\n*Order Summary:*");
        let _ = writeln!(out, "Subtotal: {}", self.subtotal);
        let _ = writeln!(out, "Delivery Fee: {}", self.delivery_fee);
        let _ = writeln!(out, "Total: {}\n", self.total);
        let _ = write!(out, "*Payment Method:* {}", self.payment_method.label());
        if let Some(tx) = self.transaction_id() {
            let _ = write!(out, "\nTransaction Id: {tx}");
        }
        let _ = write!(out, "\n\nThank you for shopping with iMazu!");
        out
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("cannot {action} an order that is {from}")]
    IllegalTransition { action: OrderActionKind, from: OrderStatus },
}
