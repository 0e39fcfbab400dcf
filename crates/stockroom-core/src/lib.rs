//! Core types, store traits and services for the Stockroom inventory engine.
//!
//! This crate has no HTTP or database dependencies. Storage
//! backends implement the traits in [`store`]; the services in [`stock`],
//! [`aggregate`] and [`lifecycle`] are generic over them.

// Trait methods spell out `Send` futures; impls use native `async fn`.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod archive;
pub mod catalog;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod order;
pub mod stock;
pub mod store;

pub use error::{Error, Result};
