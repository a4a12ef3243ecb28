//! Domain models for the storefront.
//!
//! Row types mirror the backend tables (`products`, `orders`) field for field
//! so they deserialize straight from `PostgREST`. Response types shape those
//! rows for the buyer, seller and admin pages.

pub mod order;
pub mod product;
pub mod profile;
pub mod session;

pub use order::{NewOrder, Order, OrderWithProducts, ProductIdList, ShippingAddress};
pub use product::{NewProduct, Product, ProductChanges, ProductImages, ProductSummary};
pub use profile::Profile;
pub use session::{AuthState, SessionUser, session_keys};
