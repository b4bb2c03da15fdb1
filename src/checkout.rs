//! Checkout: validates the customer form and turns the cart into an order.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::domain::aggregates::Cart;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::TransactionId;
use crate::gateway::RemoteDataGateway;
use crate::notify::EventPublisher;
use crate::pricing::DeliveryPolicy;
use crate::session::CartStore;
use crate::{required, CustomerInfo, LineItem, Order, PaymentMethod};

pub use crate::domain::aggregates::order::OrderRequest;

/// Customer details as typed into the checkout form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CheckoutForm {
    #[validate(custom = "validate_name")]
    pub name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(custom = "validate_address")]
    pub address: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("your cart is empty")]
    EmptyCart,

    #[error("please fill in all required fields ({})", crate::invalid_fields(.0).join(", "))]
    InvalidFields(ValidationErrors),
}

impl CheckoutError {
    /// Names of the offending form fields, for inline error display.
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            Self::EmptyCart => vec![],
            Self::InvalidFields(errors) => crate::invalid_fields(errors),
        }
    }
}

fn validate_name(value: &str) -> Result<(), ValidationError> { required(value, "Full name is required") }

fn validate_address(value: &str) -> Result<(), ValidationError> { required(value, "Delivery address is required") }

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    required(value, "Phone number is required")?;
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')');
    if !value.chars().all(allowed) {
        let mut err = ValidationError::new("phone");
        err.message = Some(Cow::Borrowed("Please enter a valid phone number"));
        return Err(err);
    }
    Ok(())
}

impl CheckoutForm {
    /// Field validation plus the transaction id rule for manual payments.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_else(ValidationErrors::new);
        if self.payment_method.is_manual() && TransactionId::parse_optional(self.transaction_id.as_deref()).is_none() {
            let mut err = ValidationError::new("required");
            err.message = Some(Cow::Borrowed("Transaction ID is required for manual payment"));
            errors.add("transaction_id", err);
        }
        if errors.errors().is_empty() { Ok(()) } else { Err(errors) }
    }

    fn customer(&self) -> CustomerInfo {
        CustomerInfo { name: self.name.trim().to_string(), phone: self.phone.trim().to_string(), address: self.address.trim().to_string() }
    }
}

/// Builds the order-creation request from the cart as it is right now.
///
/// Prices are copied from the cart's current product snapshots and the
/// delivery fee is computed here, at submission time.
pub fn build_order_request(cart: &Cart, form: &CheckoutForm, policy: &DeliveryPolicy) -> Result<OrderRequest, CheckoutError> {
    form.check().map_err(CheckoutError::InvalidFields)?;
    if cart.is_empty() { return Err(CheckoutError::EmptyCart); }

    let line_items = cart.entries().iter()
        .map(|e| LineItem { product_id: e.product_id(), quantity: e.quantity, price: e.product.price })
        .collect();
    let totals = policy.totals(cart);
    let transaction_id = if form.payment_method.is_manual() {
        TransactionId::parse_optional(form.transaction_id.as_deref())
    } else {
        None
    };

    Ok(OrderRequest {
        customer: form.customer(),
        line_items,
        subtotal: totals.subtotal,
        delivery_fee: totals.delivery_fee,
        payment_method: form.payment_method,
        transaction_id,
    })
}

/// Checkout flow: validate, create the order remotely, then clear the cart.
pub struct Checkout {
    gateway: Arc<dyn RemoteDataGateway>,
    policy: DeliveryPolicy,
    events: Arc<dyn EventPublisher>,
}

impl Checkout {
    pub fn new(gateway: Arc<dyn RemoteDataGateway>, policy: DeliveryPolicy, events: Arc<dyn EventPublisher>) -> Self {
        Self { gateway, policy, events }
    }

    pub fn policy(&self) -> &DeliveryPolicy { &self.policy }

    /// On failure the cart is left exactly as it was so the shopper can retry.
    pub async fn place_order(&self, store: &Mutex<CartStore>, form: &CheckoutForm) -> crate::Result<Order> {
        let (request, ticket) = {
            let store = store.lock().await;
            (build_order_request(store.cart(), form, &self.policy)?, store.ticket())
        };

        let order = self.gateway.create_order(request).await.map_err(|e| {
            tracing::warn!(error = %e, "order creation failed");
            e
        })?;

        if !store.lock().await.clear_if_unchanged(ticket) {
            tracing::warn!(order_id = %order.id(), "cart changed while the order was being placed; keeping it");
        }
        tracing::info!(order_id = %order.id(), total = %order.total(), payment = order.payment_method().as_str(), "order placed");

        let placed = OrderEvent::Placed { order_id: order.id(), total: order.total(), summary: order.summary() };
        self.events.publish(&DomainEvent::Order(placed)).await;
        Ok(order)
    }
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout").field("policy", &self.policy).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderStatus, Product};
    use crate::domain::value_objects::Money;
    use crate::gateway::{GatewayError, MockRemoteDataGateway};
    use crate::notify::RecordingPublisher;
    use crate::persistence::MemoryCartPersistence;
    use crate::{OrderId, ProductId, StorefrontError};
    use chrono::Utc;

    fn product(id: u64, name: &str, price: u64) -> Product {
        Product { id: ProductId(id), name: name.into(), description: String::new(), price: Money::new(price), images: vec![], active: true }
    }

    fn form(method: PaymentMethod, tx: Option<&str>) -> CheckoutForm {
        CheckoutForm {
            name: "Ayesha Khan".into(),
            phone: "+92 (331) 399-5870".into(),
            address: "House 4, Street 9, Lahore".into(),
            payment_method: method,
            transaction_id: tx.map(str::to_string),
        }
    }

    fn two_item_cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_item(product(1, "Chronograph", 5000), 2);
        cart.add_item(product(2, "Diver", 1250), 1);
        cart
    }

    #[test]
    fn test_accepts_valid_cash_on_delivery_order() {
        let policy = DeliveryPolicy::default();
        let cart = two_item_cart();
        let request = build_order_request(&cart, &form(PaymentMethod::CashOnDelivery, Some("ignored")), &policy).unwrap();
        let totals = policy.totals(&cart);
        assert_eq!(request.line_items.len(), 2);
        assert_eq!(request.line_items[0].price, Money::new(5000));
        assert_eq!(request.subtotal, totals.subtotal);
        assert_eq!(request.delivery_fee, totals.delivery_fee);
        assert_eq!(request.total(), totals.total);
        assert_eq!(request.transaction_id, None);
    }

    #[test]
    fn test_rejects_empty_cart() {
        let err = build_order_request(&Cart::new(), &form(PaymentMethod::CashOnDelivery, None), &DeliveryPolicy::default()).unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[test]
    fn test_rejects_blank_fields() {
        let mut blank = form(PaymentMethod::CashOnDelivery, None);
        blank.name = "   ".into();
        blank.address = String::new();
        let err = build_order_request(&two_item_cart(), &blank, &DeliveryPolicy::default()).unwrap_err();
        assert_eq!(err.fields(), vec!["address", "name"]);
    }

    #[test]
    fn test_rejects_malformed_phone() {
        let mut bad = form(PaymentMethod::CashOnDelivery, None);
        bad.phone = "abc".into();
        let err = build_order_request(&two_item_cart(), &bad, &DeliveryPolicy::default()).unwrap_err();
        assert_eq!(err.fields(), vec!["phone"]);
    }

    #[test]
    fn test_manual_payment_requires_transaction_id() {
        for tx in [None, Some(""), Some("   ")] {
            let err = build_order_request(&two_item_cart(), &form(PaymentMethod::EasyPaisa, tx), &DeliveryPolicy::default()).unwrap_err();
            assert_eq!(err.fields(), vec!["transaction_id"]);
        }
        let ok = build_order_request(&two_item_cart(), &form(PaymentMethod::JazzCash, Some(" TX-1 ")), &DeliveryPolicy::default()).unwrap();
        assert_eq!(ok.transaction_id.unwrap().as_str(), "TX-1");
    }

    #[test]
    fn test_prices_float_until_submission() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "Chronograph", 5000), 1);
        cart.refresh_product(product(1, "Chronograph", 5500));
        let request = build_order_request(&cart, &form(PaymentMethod::CashOnDelivery, None), &DeliveryPolicy::default()).unwrap();
        assert_eq!(request.line_items[0].price, Money::new(5500));
    }

    fn store_with(cart: &Cart) -> Mutex<CartStore> {
        let mut store = CartStore::load(Box::new(MemoryCartPersistence::new()));
        for e in cart.entries() { store.add_item(e.product.clone(), e.quantity.value()); }
        Mutex::new(store)
    }

    #[tokio::test]
    async fn test_place_order_clears_cart_on_success() {
        let mut gateway = MockRemoteDataGateway::new();
        gateway.expect_create_order().times(1)
            .withf(|r| r.subtotal == Money::new(11250) && r.delivery_fee == Money::new(200))
            .returning(|r| Ok(Order::restore(OrderId(8), OrderStatus::Pending, r, "storefront", Utc::now())));
        let events = Arc::new(RecordingPublisher::default());
        let checkout = Checkout::new(Arc::new(gateway), DeliveryPolicy::default(), events.clone());
        let store = store_with(&two_item_cart());

        let order = checkout.place_order(&store, &form(PaymentMethod::CashOnDelivery, None)).await.unwrap();
        assert_eq!(order.id(), OrderId(8));
        assert_eq!(order.total(), Money::new(11450));
        assert_eq!(store.lock().await.item_count(), 0);
        assert_eq!(events.subjects(), vec!["orders.placed"]);
    }

    #[tokio::test]
    async fn test_gateway_failure_keeps_cart() {
        let mut gateway = MockRemoteDataGateway::new();
        gateway.expect_create_order().times(1).returning(|_| Err(GatewayError::Unavailable("offline".into())));
        let events = Arc::new(RecordingPublisher::default());
        let checkout = Checkout::new(Arc::new(gateway), DeliveryPolicy::default(), events.clone());
        let store = store_with(&two_item_cart());

        let err = checkout.place_order(&store, &form(PaymentMethod::CashOnDelivery, None)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Gateway(GatewayError::Unavailable(_))));
        assert_eq!(store.lock().await.item_count(), 3);
        assert!(events.subjects().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_gateway() {
        let mut gateway = MockRemoteDataGateway::new();
        gateway.expect_create_order().never();
        let checkout = Checkout::new(Arc::new(gateway), DeliveryPolicy::default(), Arc::new(RecordingPublisher::default()));
        let store = store_with(&Cart::new());

        let err = checkout.place_order(&store, &form(PaymentMethod::CashOnDelivery, None)).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(CheckoutError::EmptyCart)));
    }
}
