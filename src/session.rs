//! Session-scoped cart store.
//!
//! Owns the shopper's [`Cart`], loads it once at start-up and saves it after
//! every change. Persistence failures are logged and never surface to the
//! shopper: cart operations cannot fail.

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::domain::aggregates::{Cart, Product};
use crate::domain::value_objects::Money;
use crate::gateway::RemoteDataGateway;
use crate::persistence::{CartPersistence, PersistedCart};
use crate::ProductId;

pub struct CartStore {
    cart: Cart,
    persistence: Box<dyn CartPersistence>,
    revision: u64,
}

/// Snapshot of the cart's revision, taken when a checkout is submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CartTicket(u64);

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore").field("cart", &self.cart).field("revision", &self.revision).finish_non_exhaustive()
    }
}

impl CartStore {
    /// Restores the saved cart, or starts empty if there is none or it cannot be read.
    pub fn load(persistence: Box<dyn CartPersistence>) -> Self {
        let cart = match persistence.load() {
            Ok(Some(saved)) => Cart::from(saved),
            Ok(None) => Cart::new(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable saved cart");
                Cart::new()
            }
        };
        Self { cart, persistence, revision: 0 }
    }

    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn item_count(&self) -> u32 { self.cart.item_count() }
    pub fn total(&self) -> Money { self.cart.total() }

    pub fn add_item(&mut self, product: Product, quantity: u32) {
        tracing::debug!(product_id = %product.id, quantity, "add to cart");
        self.mutate(|cart| cart.add_item(product, quantity));
    }

    pub fn update_quantity(&mut self, product_id: ProductId, quantity: u32) {
        tracing::debug!(%product_id, quantity, "set cart quantity");
        self.mutate(|cart| cart.update_quantity(product_id, quantity));
    }

    pub fn remove_item(&mut self, product_id: ProductId) {
        tracing::debug!(%product_id, "remove from cart");
        self.mutate(|cart| cart.remove_item(product_id));
    }

    pub fn clear_cart(&mut self) { self.mutate(Cart::clear); }

    pub fn ticket(&self) -> CartTicket { CartTicket(self.revision) }

    /// Clears the cart only if nothing changed since `ticket` was taken.
    pub fn clear_if_unchanged(&mut self, ticket: CartTicket) -> bool {
        if ticket != self.ticket() { return false; }
        self.clear_cart();
        true
    }

    /// Re-reads every product in the cart from the gateway.
    ///
    /// Entries whose product no longer exists are dropped; the others pick up
    /// the current price and details. Entries are kept when the gateway is
    /// unreachable.
    pub async fn rehydrate(&mut self, gateway: &dyn RemoteDataGateway) {
        let mut refreshed = Vec::new();
        let mut missing = Vec::new();
        for entry in self.cart.entries() {
            let id = entry.product_id();
            match gateway.get_product(id).await {
                Ok(product) => refreshed.push(product),
                Err(e) if e.is_not_found() => missing.push(id),
                Err(e) => tracing::warn!(product_id = %id, error = %e, "could not refresh cart entry"),
            }
        }
        self.mutate(|cart| {
            for id in &missing {
                tracing::warn!(product_id = %id, "dropping cart entry for missing product");
                cart.remove_item(*id);
            }
            for product in refreshed { cart.refresh_product(product); }
        });
    }

    fn mutate(&mut self, change: impl FnOnce(&mut Cart)) {
        let before = self.cart.clone();
        change(&mut self.cart);
        if self.cart == before { return; }
        self.revision += 1;
        self.save();
    }

    // Saving is a small synchronous write. On a multi-threaded runtime it is
    // moved off the async worker; block_in_place panics on current-thread.
    fn save(&self) {
        let record = PersistedCart::from(&self.cart);
        let on_worker = Handle::try_current().is_ok_and(|h| h.runtime_flavor() == RuntimeFlavor::MultiThread);
        let saved = if on_worker {
            tokio::task::block_in_place(|| self.persistence.save(&record))
        } else {
            self.persistence.save(&record)
        };
        if let Err(e) = saved {
            tracing::warn!(error = %e, "failed to persist cart");
        }
    }
}
