//! Product Aggregate

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};
use crate::domain::value_objects::Money;
use crate::{required, ProductId};

/// Catalog product as served by the data gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub images: Vec<String>,
    pub active: bool,
}

impl Product {
    pub fn create(id: ProductId, draft: NewProduct) -> Self {
        Self { id, name: draft.name, description: draft.description, price: draft.price, images: draft.images, active: true }
    }

    pub fn apply_update(&mut self, update: ProductUpdate) {
        self.name = update.name;
        self.description = update.description;
        self.price = update.price;
        self.images = update.images;
        self.active = update.active;
    }

    pub fn deactivate(&mut self) { self.active = false; }
}

/// Product form as filled in by staff on the admin screens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ProductForm {
    #[validate(custom = "validate_product_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "listed")]
    pub active: bool,
}

fn listed() -> bool { true }

fn validate_product_name(value: &str) -> Result<(), ValidationError> { required(value, "Product name is required") }

impl ProductForm {
    pub fn new(name: &str, description: &str, price: Money, images: &[String]) -> Self {
        Self { name: name.to_string(), description: description.to_string(), price, images: images.to_vec(), active: true }
    }

    pub fn into_new_product(self) -> Result<NewProduct, ProductError> {
        self.validate().map_err(ProductError::InvalidFields)?;
        Ok(NewProduct { name: self.name.trim().to_string(), description: self.description.trim().to_string(), price: self.price, images: clean_images(&self.images) })
    }

    pub fn into_update(self) -> Result<ProductUpdate, ProductError> {
        let active = self.active;
        let NewProduct { name, description, price, images } = self.into_new_product()?;
        Ok(ProductUpdate { name, description, price, images, active })
    }
}

/// Validated input for creating a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub images: Vec<String>,
}

impl NewProduct {
    pub fn new(name: &str, description: &str, price: Money, images: &[String]) -> Result<Self, ProductError> {
        ProductForm::new(name, description, price, images).into_new_product()
    }
}

/// Validated input for replacing a product's editable fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub images: Vec<String>,
    pub active: bool,
}

impl ProductUpdate {
    pub fn new(name: &str, description: &str, price: Money, images: &[String], active: bool) -> Result<Self, ProductError> {
        ProductForm { active, ..ProductForm::new(name, description, price, images) }.into_update()
    }
}

fn clean_images(images: &[String]) -> Vec<String> {
    images.iter().map(|i| i.trim()).filter(|i| !i.is_empty()).map(str::to_string).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("please fill in all required product fields ({})", crate::invalid_fields(.0).join(", "))]
    InvalidFields(ValidationErrors),
}

impl ProductError {
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidFields(errors) => crate::invalid_fields(errors),
        }
    }
}
