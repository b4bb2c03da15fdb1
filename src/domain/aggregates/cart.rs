//! Cart Aggregate

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::Product;
use crate::domain::value_objects::{Money, Quantity};
use crate::ProductId;

/// Shopping cart: at most one entry per product, every quantity in `1..=99`.
///
/// Totals are derived on every read; nothing is cached on the aggregate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub product: Product,
    pub quantity: Quantity,
}

impl CartEntry {
    pub fn product_id(&self) -> ProductId { self.product.id }
    pub fn line_total(&self) -> Money { self.product.price.multiply(self.quantity) }
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Rebuilds a cart from stored entries, merging duplicates the same way `add_item` does.
    pub fn from_entries(entries: impl IntoIterator<Item = CartEntry>) -> Self {
        let mut cart = Self::new();
        for entry in entries { cart.add_item(entry.product, entry.quantity.value()); }
        cart
    }

    pub fn entries(&self) -> &[CartEntry] { &self.entries }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn distinct_products(&self) -> usize { self.entries.len() }
    pub fn get(&self, product_id: ProductId) -> Option<&CartEntry> { self.entries.iter().find(|e| e.product_id() == product_id) }

    /// Sum of quantities across entries.
    pub fn item_count(&self) -> u32 { self.entries.iter().map(|e| e.quantity.value()).sum() }

    /// Subtotal: price × quantity summed over entries. Delivery is priced separately.
    pub fn total(&self) -> Money { self.entries.iter().map(CartEntry::line_total).sum() }

    /// Adds `quantity` of `product`, accumulating onto an existing entry.
    ///
    /// The stored product is replaced with the one passed in so the entry
    /// reflects the latest price. A zero quantity is ignored.
    pub fn add_item(&mut self, product: Product, quantity: u32) {
        let Some(requested) = Quantity::clamped(quantity) else { return };
        if let Some(existing) = self.entries.iter_mut().find(|e| e.product.id == product.id) {
            existing.quantity = existing.quantity.increment(requested.value());
            existing.product = product;
        } else {
            self.entries.push(CartEntry { product, quantity: requested });
        }
    }

    /// Sets the quantity directly. Zero removes the entry; absent products are ignored.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: u32) {
        match Quantity::clamped(quantity) {
            None => self.remove_item(product_id),
            Some(q) => {
                if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id() == product_id) { entry.quantity = q; }
            }
        }
    }

    pub fn remove_item(&mut self, product_id: ProductId) { self.entries.retain(|e| e.product_id() != product_id); }

    pub fn clear(&mut self) { self.entries.clear(); }

    /// Replaces the stored snapshot of a product already in the cart.
    pub fn refresh_product(&mut self, product: Product) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.product.id == product.id) { entry.product = product; }
    }
}
