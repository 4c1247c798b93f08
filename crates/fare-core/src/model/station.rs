//! Read-only catalog records.

use super::ids::{CardTypeId, StationId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub line_color: String,
}

impl Station {
    pub fn new(id: u32, name: impl Into<String>, line_color: impl Into<String>) -> Self {
        Self {
            id: StationId(id),
            name: name.into(),
            line_color: line_color.into(),
        }
    }
}

/// A class of card with its own fare multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardType {
    pub id: CardTypeId,
    pub name: String,
    pub fare_multiplier: Decimal,
    pub description: String,
}

impl CardType {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        fare_multiplier: Decimal,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: CardTypeId(id),
            name: name.into(),
            fare_multiplier,
            description: description.into(),
        }
    }
}
