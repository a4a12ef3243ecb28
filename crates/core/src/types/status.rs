//! Role, order state and payment method enums.
//!
//! All three are stored as lowercase text in the backend (`user_metadata.role`,
//! `orders.order_state`, `orders.payment_method`).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing one of the enums in this module fails.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Account role. Decides which area of the store a user may enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Browses, buys and tracks orders.
    #[default]
    Buyer,
    /// Lists and manages their own products.
    Seller,
    /// Sees every product and order and store-wide statistics.
    Admin,
}

impl Role {
    /// The stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buyer" => Ok(Self::Buyer),
            "seller" => Ok(Self::Seller),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseEnumError::new("role", s)),
        }
    }
}

/// Lifecycle state of an order, as set by admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    #[default]
    Pending,
    Confirmed,
    Delivered,
    Returned,
    Cancelled,
}

impl OrderState {
    /// Every state, in tracker order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Delivered,
        Self::Returned,
        Self::Cancelled,
    ];

    /// The stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the order can still change.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == lower)
            .ok_or_else(|| ParseEnumError::new("order state", s))
    }
}

/// How the buyer chose to pay at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CreditCard,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    /// The stored string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("Seller".parse::<Role>().unwrap(), Role::Seller);
        assert_eq!(" admin ".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_matches_metadata() {
        assert_eq!(serde_json::to_string(&Role::Buyer).unwrap(), "\"buyer\"");
        let role: Role = serde_json::from_str("\"seller\"").unwrap();
        assert_eq!(role, Role::Seller);
    }

    #[test]
    fn test_order_state_roundtrip_via_str() {
        for state in OrderState::ALL {
            assert_eq!(state.as_str().parse::<OrderState>().unwrap(), state);
        }
        assert_eq!("Delivered".parse::<OrderState>().unwrap(), OrderState::Delivered);
    }

    #[test]
    fn test_order_state_open() {
        assert!(OrderState::Pending.is_open());
        assert!(!OrderState::Cancelled.is_open());
    }

    #[test]
    fn test_payment_method_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
    }

    #[test]
    fn test_parse_error_message() {
        let err = "shipped".parse::<OrderState>().unwrap_err();
        assert_eq!(err.to_string(), "invalid order state: shipped");
    }
}
