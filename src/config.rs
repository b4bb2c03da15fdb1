//! Environment configuration.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::value_objects::Money;
use crate::pricing::{DeliveryPolicy, DEFAULT_FREE_DELIVERY_PRODUCT, STANDARD_DELIVERY_FEE};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a whole number, got {value:?}")]
    NotANumber { name: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub cart_path: PathBuf,
    pub standard_delivery_fee: Money,
    pub free_delivery_product: Option<String>,
    pub principal: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8083,
            database_url: None,
            nats_url: None,
            nats_subject_prefix: "storefront".into(),
            cart_path: PathBuf::from("cart.json"),
            standard_delivery_fee: STANDARD_DELIVERY_FEE,
            free_delivery_product: Some(DEFAULT_FREE_DELIVERY_PRODUCT.into()),
            principal: "storefront".into(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|name| std::env::var(name).ok()) }

    /// Reads settings through `lookup`; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match lookup("PORT") {
            Some(v) => parse("PORT", &v)?,
            None => defaults.port,
        };
        let standard_delivery_fee = match lookup("STANDARD_DELIVERY_FEE") {
            Some(v) => Money::new(parse("STANDARD_DELIVERY_FEE", &v)?),
            None => defaults.standard_delivery_fee,
        };
        // Set but empty disables free delivery.
        let free_delivery_product = match lookup("FREE_DELIVERY_PRODUCT") {
            Some(v) if v.is_empty() => None,
            Some(v) => Some(v),
            None => defaults.free_delivery_product,
        };

        Ok(Self {
            port,
            database_url: non_empty("DATABASE_URL"),
            nats_url: non_empty("NATS_URL"),
            nats_subject_prefix: non_empty("NATS_SUBJECT_PREFIX").unwrap_or(defaults.nats_subject_prefix),
            cart_path: non_empty("CART_PATH").map(PathBuf::from).unwrap_or(defaults.cart_path),
            standard_delivery_fee,
            free_delivery_product,
            principal: non_empty("STOREFRONT_PRINCIPAL").unwrap_or(defaults.principal),
        })
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy { standard_fee: self.standard_delivery_fee, free_delivery_product: self.free_delivery_product.clone() }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::NotANumber { name, value: value.to_string() })
}
