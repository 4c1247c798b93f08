use super::ids::{FareRuleId, StationId};
use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// What a fare rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FareKey {
    /// A directed station pair.
    Route { start: StationId, end: StationId },
    /// A flat fare matched against the card type name.
    FareType(String),
}

impl Display for FareKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FareKey::Route { start, end } => write!(f, "{start} -> {end}"),
            FareKey::FareType(name) => write!(f, "fare type {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareRule {
    pub id: FareRuleId,
    pub key: FareKey,
    pub amount: Money,
}

/// Whether a route rule for `(a, b)` also prices the reverse trip `(b, a)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutePolicy {
    #[default]
    Symmetric,
    Directed,
}
