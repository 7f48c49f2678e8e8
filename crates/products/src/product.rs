use serde::{Deserialize, Serialize};

use stockline_core::{EngineError, EngineResult};

/// A stock-keeping unit.
///
/// `stock` is mutated only by the engine's reserve/restore operations and
/// by direct product updates; it never goes negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub price: f64,
    pub stock: i32,
}

/// Input for product creation and full updates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub stock: i32,
}

impl NewProduct {
    /// Validate the input before it reaches storage.
    pub fn validate(&self) -> EngineResult<()> {
        if self.sku.trim().is_empty() {
            return Err(EngineError::validation("sku cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::validation("name cannot be empty"));
        }
        if self.price <= 0.0 {
            return Err(EngineError::validation("price must be > 0"));
        }
        if self.stock < 0 {
            return Err(EngineError::validation("stock must be >= 0"));
        }
        Ok(())
    }
}

/// Partial update: only the provided fields change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductPatch {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
}

impl ProductPatch {
    pub fn validate(&self) -> EngineResult<()> {
        if let Some(sku) = &self.sku {
            if sku.trim().is_empty() {
                return Err(EngineError::validation("sku cannot be empty"));
            }
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(EngineError::validation("name cannot be empty"));
            }
        }
        if let Some(price) = self.price {
            if price <= 0.0 {
                return Err(EngineError::validation("price must be > 0"));
            }
        }
        if let Some(stock) = self.stock {
            if stock < 0 {
                return Err(EngineError::validation("stock must be >= 0"));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sku.is_none() && self.name.is_none() && self.price.is_none() && self.stock.is_none()
    }

    /// Apply the patch to an existing product, leaving absent fields alone.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(sku) = &self.sku {
            product.sku = sku.clone();
        }
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
    }
}
