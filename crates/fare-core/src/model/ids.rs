//! Type-safe identifiers.
//!
//! Numeric IDs serialize as plain numbers so the dashboard sees the same shapes it always has;
//! `Display` adds a short prefix for log lines.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Printed card number, the identity of a card.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardNumber(pub String);

impl CardNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CardNumber {
    fn from(number: &str) -> Self {
        Self(number.to_string())
    }
}

impl From<String> for CardNumber {
    fn from(number: String) -> Self {
        Self(number)
    }
}

impl Display for CardNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl From<$inner> for $name {
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }
    };
}

numeric_id!(StationId(u32), "station");
numeric_id!(CardTypeId(u32), "card_type");
numeric_id!(PassengerId(u32), "passenger");
numeric_id!(FareRuleId(u32), "fare_rule");
numeric_id!(
    /// Allocated by the store when a trip is opened.
    TripId(u64),
    "trip"
);
numeric_id!(
    /// Allocated by the store inside the commit that appends the transaction.
    TransactionId(u64),
    "tx"
);
