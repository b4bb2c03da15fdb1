//! Delivery fee and cart totals.
//!
//! Pure functions over a [`Cart`]; nothing here is cached or stateful.

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::Cart;
use crate::domain::value_objects::Money;

pub const STANDARD_DELIVERY_FEE: Money = Money::new(200);

/// Name of the product that ships free when it is the only product ordered.
pub const DEFAULT_FREE_DELIVERY_PRODUCT: &str = "Classy Watch For Men";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub standard_fee: Money,
    /// Matched against the product name exactly. `None` disables free delivery.
    pub free_delivery_product: Option<String>,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self { standard_fee: STANDARD_DELIVERY_FEE, free_delivery_product: Some(DEFAULT_FREE_DELIVERY_PRODUCT.to_string()) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
}

impl DeliveryPolicy {
    /// Free when the cart holds exactly one distinct product, in any quantity,
    /// named like the free-delivery product. Otherwise the standard fee,
    /// including for an empty cart.
    pub fn delivery_fee(&self, cart: &Cart) -> Money {
        match (cart.entries(), self.free_delivery_product.as_deref()) {
            ([only], Some(free)) if only.product.name == free => Money::ZERO,
            _ => self.standard_fee,
        }
    }

    pub fn totals(&self, cart: &Cart) -> Totals {
        let subtotal = cart.total();
        let delivery_fee = self.delivery_fee(cart);
        Totals { subtotal, delivery_fee, total: subtotal.add(delivery_fee) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::Product;
    use crate::ProductId;

    fn product(id: u64, name: &str, price: u64) -> Product {
        Product { id: ProductId(id), name: name.into(), description: String::new(), price: Money::new(price), images: vec![], active: true }
    }

    #[test]
    fn test_empty_cart_pays_standard_fee() {
        assert_eq!(DeliveryPolicy::default().delivery_fee(&Cart::new()), Money::new(200));
    }

    #[test]
    fn test_single_free_product_any_quantity_is_free() {
        let policy = DeliveryPolicy::default();
        let mut cart = Cart::new();
        cart.add_item(product(1, DEFAULT_FREE_DELIVERY_PRODUCT, 3000), 5);
        let totals = policy.totals(&cart);
        assert_eq!(totals.delivery_fee, Money::ZERO);
        assert_eq!(totals.subtotal, Money::new(15000));
        assert_eq!(totals.total, totals.subtotal);
    }

    #[test]
    fn test_free_product_with_another_product_pays_fee() {
        let policy = DeliveryPolicy::default();
        let mut cart = Cart::new();
        cart.add_item(product(1, DEFAULT_FREE_DELIVERY_PRODUCT, 3000), 1);
        cart.add_item(product(2, "Diver", 1000), 1);
        assert_eq!(policy.delivery_fee(&cart), Money::new(200));
    }

    #[test]
    fn test_name_must_match_exactly() {
        let policy = DeliveryPolicy::default();
        let mut cart = Cart::new();
        cart.add_item(product(1, "classy watch for men", 3000), 1);
        assert_eq!(policy.delivery_fee(&cart), Money::new(200));
    }

    #[test]
    fn test_policy_is_configurable() {
        let policy = DeliveryPolicy { standard_fee: Money::new(350), free_delivery_product: Some("Diver".into()) };
        let mut cart = Cart::new();
        cart.add_item(product(2, "Diver", 1000), 2);
        assert_eq!(policy.delivery_fee(&cart), Money::ZERO);

        let disabled = DeliveryPolicy { free_delivery_product: None, ..policy };
        assert_eq!(disabled.delivery_fee(&cart), Money::new(350));
    }

    #[test]
    fn test_totals_for_regular_order() {
        let mut cart = Cart::new();
        cart.add_item(product(1, "Chronograph", 5000), 2);
        let totals = DeliveryPolicy::default().totals(&cart);
        assert_eq!(totals, Totals { subtotal: Money::new(10000), delivery_fee: Money::new(200), total: Money::new(10200) });
    }
}
