//! Newtype IDs for type-safe entity references.
//!
//! Products and orders carry human-readable codes (`PRD00001`, `ORD00042`)
//! that the backend stores as text primary keys. Users are identified by the
//! auth provider's UUID.
//!
//! Use the `define_code_id!` macro to create a code wrapper with a fixed
//! prefix. Two allocation schemes are supported:
//!
//! - sequential: prefix + zero-padded counter, derived from the latest code
//! - generated: prefix + `-` + a random UUID in simple form

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Width of the zero-padded counter in sequential codes.
pub const SEQUENCE_WIDTH: usize = 5;

/// Macro to define a type-safe, prefixed code identifier.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - Sequential helpers: `sequence_number()`, `from_sequence()`, `next_after()`
/// - `generate()` for collision-free UUID-backed codes
///
/// # Example
///
/// ```rust
/// # use shopfront_core::define_code_id;
/// define_code_id!(InvoiceId, "INV");
///
/// let first = InvoiceId::next_after(None);
/// assert_eq!(first.as_str(), "INV00001");
/// assert_eq!(InvoiceId::next_after(Some(&first)).as_str(), "INV00002");
/// ```
#[macro_export]
macro_rules! define_code_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix shared by every code of this type.
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing code without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the code as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the id and returns the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Numeric counter of a sequential code (`PRD00042` -> 42).
            ///
            /// Returns `None` for generated codes or foreign formats.
            #[must_use]
            pub fn sequence_number(&self) -> Option<u32> {
                let digits = self.0.strip_prefix(Self::PREFIX)?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                digits.parse().ok()
            }

            /// Build the sequential code for counter `n`.
            #[must_use]
            pub fn from_sequence(n: u32) -> Self {
                Self(format!(
                    "{}{:0width$}",
                    Self::PREFIX,
                    n,
                    width = $crate::types::id::SEQUENCE_WIDTH
                ))
            }

            /// The sequential code following `latest`, or the first code.
            #[must_use]
            pub fn next_after(latest: Option<&Self>) -> Self {
                let next = latest
                    .and_then(Self::sequence_number)
                    .map_or(1, |n| n.saturating_add(1));
                Self::from_sequence(next)
            }

            /// A fresh UUID-backed code (`PRD-<32 hex>`).
            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}-{}", Self::PREFIX, ::uuid::Uuid::new_v4().simple()))
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_code_id!(ProductId, "PRD");
define_code_id!(OrderId, "ORD");

/// Identifier of an account in the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Wrap an auth provider UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for UserId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sequential_code() {
        assert_eq!(OrderId::next_after(None).as_str(), "ORD00001");
        assert_eq!(ProductId::next_after(None).as_str(), "PRD00001");
    }

    #[test]
    fn test_next_after_increments_suffix() {
        let latest = OrderId::new("ORD00041");
        assert_eq!(OrderId::next_after(Some(&latest)).as_str(), "ORD00042");
    }

    #[test]
    fn test_next_after_grows_past_padding() {
        let latest = ProductId::new("PRD99999");
        assert_eq!(ProductId::next_after(Some(&latest)).as_str(), "PRD100000");
    }

    #[test]
    fn test_sequence_number_rejects_foreign_formats() {
        assert_eq!(OrderId::new("ORD00007").sequence_number(), Some(7));
        assert_eq!(OrderId::new("PRD00007").sequence_number(), None);
        assert_eq!(OrderId::new("ORD").sequence_number(), None);
        assert_eq!(OrderId::new("ORD-1a2b").sequence_number(), None);
        assert_eq!(OrderId::new("ORD+0001").sequence_number(), None);
    }

    #[test]
    fn test_next_after_generated_code_restarts() {
        let latest = OrderId::generate();
        assert_eq!(OrderId::next_after(Some(&latest)).as_str(), "ORD00001");
    }

    #[test]
    fn test_generate_is_prefixed_and_unique() {
        let a = ProductId::generate();
        let b = ProductId::generate();
        assert!(a.as_str().starts_with("PRD-"));
        assert_eq!(a.as_str().len(), "PRD-".len() + 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_codes_order_lexicographically() {
        let mut ids = vec![
            ProductId::new("PRD00010"),
            ProductId::new("PRD00002"),
            ProductId::new("PRD00001"),
        ];
        ids.sort();
        assert_eq!(ids.first().unwrap().as_str(), "PRD00001");
        assert_eq!(ids.last().unwrap().as_str(), "PRD00010");
    }

    #[test]
    fn test_code_serde_is_transparent() {
        let id = ProductId::new("PRD00003");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"PRD00003\"");
    }

    #[test]
    fn test_user_id_parse() {
        let id: UserId = "7d0c5a4e-8f6b-4a44-9f0e-2b3f6b1c9a10".parse().unwrap();
        assert_eq!(id.to_string(), "7d0c5a4e-8f6b-4a44-9f0e-2b3f6b1c9a10");
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }
}
