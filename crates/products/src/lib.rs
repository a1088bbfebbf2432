//! Products domain module.
//!
//! This crate contains the product record, the update request, and the event
//! announcing an update, implemented purely as deterministic domain logic (no
//! IO, no HTTP, no storage).

pub mod product;

pub use product::{Product, ProductChanges, ProductUpdated, UpdateProduct, ValidatedUpdate};
