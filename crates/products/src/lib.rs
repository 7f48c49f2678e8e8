//! `stockline-products` — product entity and input validation.

pub mod product;

pub use product::{NewProduct, Product, ProductPatch};
