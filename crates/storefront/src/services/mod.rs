//! Data-access services over the managed backend.
//!
//! Each service borrows a [`SupabaseClient`](crate::supabase::SupabaseClient)
//! (anonymous for public catalog reads, user-scoped otherwise) and the shared
//! [`QueryCache`](crate::cache::QueryCache), issues one or more backend calls
//! and shapes the result for the buyer, seller and admin pages.
//!
//! # Services
//!
//! - `auth` - Sign-up, sign-in, token refresh and sign-out
//! - `catalog` - Home rails, product pages, categories and search
//! - `cart` - Server cart with optimistic updates and login merge
//! - `orders` - Buyer order history, tracking and checkout
//! - `profile` - Display name, phone, password and avatar
//! - `sellers` - Seller statistics and product management
//! - `admin` - Store statistics, product and order administration

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
mod error;
pub mod ids;
pub mod images;
pub mod orders;
pub mod profile;
pub mod sellers;

pub use error::ServiceError;
