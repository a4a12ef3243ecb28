//! Guard decisions for browser paths.
//!
//! The browser UI asks where a visitor may go; this module answers with
//! allow, redirect or not-found from the path and the visitor's role alone.

use serde::Serialize;
use shopfront_core::Role;

/// Where anonymous visitors on protected pages are sent.
pub const SIGN_IN_PATH: &str = "/authentication";
/// Where visitors without the seller or admin role are sent, signed in or not.
pub const HOME_PATH: &str = "/";

/// Who may open a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    /// Everyone.
    Public,
    /// Anonymous visitors and buyers (cart, checkout, confirmation).
    Buyer,
    /// Any signed-in user (buyer dashboard, order tracking).
    Protected,
    /// Sellers only.
    Seller,
    /// Admins only.
    Admin,
}

/// Outcome for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Redirect { to: &'static str },
    NotFound,
}

/// Area of a browser path, `None` for unknown paths.
///
/// Query strings, fragments and a trailing slash are ignored.
#[must_use]
pub fn area_of(path: &str) -> Option<Area> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let area = match segments.as_slice() {
        []
        | ["category" | "product", _]
        | ["search" | "authentication"] => Area::Public,
        ["cart" | "checkout"] | ["order-confirmation", _] => Area::Buyer,
        ["dashboard"] | ["order-tracking"] | ["order-tracking", _] => Area::Protected,
        ["seller"]
        | ["seller", "dashboard" | "products" | "add-product" | "settings"]
        | ["seller", "edit-product", _] => Area::Seller,
        ["admin"] | ["admin", "products" | "orders"] => Area::Admin,
        _ => return None,
    };
    Some(area)
}

/// Decide whether a visitor with `role` (`None` when signed out) may open
/// `path`.
#[must_use]
pub fn resolve(path: &str, role: Option<Role>) -> Decision {
    let Some(area) = area_of(path) else {
        return Decision::NotFound;
    };
    let allowed = match (area, role) {
        (Area::Public, _) | (Area::Buyer, None | Some(Role::Buyer)) => true,
        (Area::Protected, None) => return Decision::Redirect { to: SIGN_IN_PATH },
        (Area::Protected, Some(_)) => true,
        (Area::Seller, role) => role == Some(Role::Seller),
        (Area::Admin, role) => role == Some(Role::Admin),
        (Area::Buyer, Some(_)) => false,
    };
    if allowed {
        Decision::Allow
    } else {
        Decision::Redirect { to: HOME_PATH }
    }
}
