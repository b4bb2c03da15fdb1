//! Local cart persistence.
//!
//! The cart survives process restarts as a small JSON record. Storage is an
//! injected capability so the cart itself never touches the filesystem.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

use crate::domain::aggregates::{Cart, CartEntry, Product};
use crate::domain::value_objects::Quantity;

/// Persisted form of the cart: product snapshots with their quantities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub entries: Vec<PersistedEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub product: Product,
    pub quantity: Quantity,
}

impl From<&Cart> for PersistedCart {
    fn from(cart: &Cart) -> Self {
        Self { entries: cart.entries().iter().map(|e| PersistedEntry { product: e.product.clone(), quantity: e.quantity }).collect() }
    }
}

impl From<PersistedCart> for Cart {
    fn from(saved: PersistedCart) -> Self {
        Cart::from_entries(saved.entries.into_iter().map(|e| CartEntry { product: e.product, quantity: e.quantity }))
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait CartPersistence: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<PersistedCart>, PersistenceError>;
    fn save(&self, cart: &PersistedCart) -> Result<(), PersistenceError>;
}

/// Stores the cart as JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonFileCartPersistence {
    path: PathBuf,
}

impl JsonFileCartPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl CartPersistence for JsonFileCartPersistence {
    fn load(&self) -> Result<Option<PersistedCart>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, cart: &PersistedCart) -> Result<(), PersistenceError> {
        // Write then rename so a crash never leaves a truncated file behind.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(cart)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Keeps the record in memory; for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCartPersistence {
    saved: Mutex<Option<PersistedCart>>,
}

impl MemoryCartPersistence {
    pub fn new() -> Self { Self::default() }

    pub fn with(cart: PersistedCart) -> Self { Self { saved: Mutex::new(Some(cart)) } }
}

impl CartPersistence for MemoryCartPersistence {
    fn load(&self) -> Result<Option<PersistedCart>, PersistenceError> {
        Ok(self.saved.lock().map(|s| s.clone()).unwrap_or_else(|poisoned| poisoned.into_inner().clone()))
    }

    fn save(&self, cart: &PersistedCart) -> Result<(), PersistenceError> {
        let mut saved = self.saved.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *saved = Some(cart.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Money;
    use crate::ProductId;

    fn cart() -> Cart {
        let mut cart = Cart::new();
        cart.add_item(Product { id: ProductId(4), name: "Diver".into(), description: "200m".into(), price: Money::new(9000), images: vec!["diver.png".into()], active: true }, 3);
        cart
    }

    #[test]
    fn test_json_file_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCartPersistence::new(dir.path().join("cart.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save(&PersistedCart::from(&cart())).unwrap();
        let reloaded: Cart = store.load().unwrap().unwrap().into();
        assert_eq!(reloaded, cart());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(JsonFileCartPersistence::new(path).load(), Err(PersistenceError::Serialization(_))));
    }

    #[test]
    fn test_record_format() {
        let json = serde_json::to_value(PersistedCart::from(&cart())).unwrap();
        assert_eq!(json["entries"][0]["quantity"], 3);
        assert_eq!(json["entries"][0]["product"]["id"], 4);
        assert_eq!(json["entries"][0]["product"]["price"], 9000);
    }

    #[test]
    fn test_memory_persistence() {
        let store = MemoryCartPersistence::new();
        store.save(&PersistedCart::from(&cart())).unwrap();
        assert_eq!(store.load().unwrap().map(Cart::from), Some(cart()));
    }
}
