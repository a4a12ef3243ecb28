//! Shopfront Core - Shared domain types.
//!
//! This crate provides the types used across all Shopfront components:
//! - `storefront` - Buyer, seller and admin JSON API over the managed backend
//! - `cli` - Operational commands (session table, user creation, table dumps)
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients. Cart arithmetic, id allocation and pagination math live here so
//! they can be tested without a backend.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, roles and order states
//! - [`cart`] - Product-id to quantity map with merge semantics
//! - [`category`] - Category list parsing (legacy text and JSON array forms)
//! - [`pagination`] - Page/range arithmetic

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod category;
pub mod pagination;
pub mod types;

pub use cart::{Cart, CartError};
pub use category::CategoryList;
pub use pagination::{PageRequest, Paginated};
pub use types::*;
