//! iMazu Storefront
//!
//! Storefront client for a watch retailer.
//!
//! ## Features
//! - Product catalog browsing
//! - Shopping cart with live pricing and conditional delivery fee
//! - Checkout with cash-on-delivery or manual transfer payment
//! - Staff order fulfillment (payment verification, confirmation, delivery, cancellation)
//! - Product management

pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod fulfillment;
pub mod gateway;
pub mod notify;
pub mod persistence;
pub mod pricing;
pub mod session;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

pub use domain::aggregates::{Cart, CartEntry, Order, OrderAction, OrderActionKind, OrderStatus, Product};
pub use domain::value_objects::{Money, Quantity, TransactionId};

// =============================================================================
// Core Types
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// One ordered product. The price is frozen when the order is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub price: Money,
}

impl LineItem {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    EasyPaisa,
    JazzCash,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [Self::CashOnDelivery, Self::EasyPaisa, Self::JazzCash];

    /// Manual transfers are confirmed out of band with a transaction id.
    pub fn is_manual(&self) -> bool {
        match self {
            Self::CashOnDelivery => false,
            Self::EasyPaisa | Self::JazzCash => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Cash on Delivery (COD)",
            Self::EasyPaisa | Self::JazzCash => "EasyPaisa/JazzCash (Manual)",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cashOnDelivery",
            Self::EasyPaisa => "easyPaisa",
            Self::JazzCash => "jazzCash",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|m| m.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown variant: {0}")]
pub struct UnknownVariant(pub String);

// =============================================================================
// Form Validation
// =============================================================================

/// Custom `validator` check: the value must not be blank once trimmed.
pub(crate) fn required(value: &str, message: &'static str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(Cow::Borrowed(message));
        return Err(err);
    }
    Ok(())
}

/// Offending field names, sorted, for inline error display.
pub(crate) fn invalid_fields(errors: &ValidationErrors) -> Vec<&'static str> {
    let mut fields: Vec<_> = errors.errors().keys().copied().collect();
    fields.sort_unstable();
    fields
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("validation failed: {0}")]
    Validation(#[from] checkout::CheckoutError),

    #[error("invalid product: {0}")]
    Product(#[from] domain::aggregates::ProductError),

    #[error(transparent)]
    Transition(#[from] domain::aggregates::OrderError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("gateway error: {0}")]
    Gateway(gateway::GatewayError),
}

impl From<gateway::GatewayError> for StorefrontError {
    fn from(err: gateway::GatewayError) -> Self {
        use gateway::GatewayError;
        match err {
            GatewayError::OrderNotFound(id) => Self::NotFound(format!("order {id}")),
            GatewayError::ProductNotFound(id) => Self::NotFound(format!("product {id}")),
            other => Self::Gateway(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_labels() {
        assert!(!PaymentMethod::CashOnDelivery.is_manual());
        assert!(PaymentMethod::EasyPaisa.is_manual());
        assert!(PaymentMethod::JazzCash.is_manual());
        assert_eq!(PaymentMethod::EasyPaisa.label(), PaymentMethod::JazzCash.label());
        assert_eq!("jazzCash".parse::<PaymentMethod>().unwrap(), PaymentMethod::JazzCash);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_wire_format() {
        let json = serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap();
        assert_eq!(json, "\"cashOnDelivery\"");
    }

    #[test]
    fn test_gateway_not_found_becomes_not_found() {
        let err: StorefrontError = gateway::GatewayError::OrderNotFound(OrderId(7)).into();
        assert!(matches!(err, StorefrontError::NotFound(ref what) if what == "order 7"));
    }
}
