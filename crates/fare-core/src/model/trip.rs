//! Trip records.
//!
//! A trip is opened by an entry tap and closed either by an exit tap (`Completed`) or by the
//! abandoned-trip sweeper (`Abandoned`). How the closing charge went is part of the status, so
//! a finished trip can never be observed without its settlement.

use super::ids::{CardNumber, StationId, TripId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a closing charge was left unpaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnpaidReason {
    InsufficientFunds,
}

/// How a closed trip was paid for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Settlement {
    /// The amount was debited and a transaction written.
    Charged { amount: Money },
    /// The amount was owed but the debit failed; the card was blocked instead.
    Unpaid { amount: Money, reason: UnpaidReason },
    /// The fare came to zero; nothing was debited.
    Free,
    /// Nothing was owed (an abandoned trip with no penalty configured).
    NotCharged,
}

impl Settlement {
    /// The amount this settlement priced, paid or not.
    pub fn amount(&self) -> Option<Money> {
        match self {
            Settlement::Charged { amount } | Settlement::Unpaid { amount, .. } => Some(*amount),
            Settlement::Free => Some(Money::ZERO),
            Settlement::NotCharged => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TripStatus {
    Ongoing,
    Completed { settlement: Settlement },
    Abandoned { settlement: Settlement },
}

impl TripStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TripStatus::Ongoing => "Ongoing",
            TripStatus::Completed { .. } => "Completed",
            TripStatus::Abandoned { .. } => "Abandoned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripExit {
    pub station: StationId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub card: CardNumber,
    pub entry_station: StationId,
    pub entry_time: DateTime<Utc>,
    pub exit: Option<TripExit>,
    pub status: TripStatus,
}

impl Trip {
    pub fn open(id: TripId, card: CardNumber, station: StationId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            card,
            entry_station: station,
            entry_time: at,
            exit: None,
            status: TripStatus::Ongoing,
        }
    }

    pub fn is_ongoing(&self) -> bool {
        matches!(self.status, TripStatus::Ongoing)
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match &self.status {
            TripStatus::Ongoing => None,
            TripStatus::Completed { settlement } | TripStatus::Abandoned { settlement } => {
                Some(settlement)
            }
        }
    }

    /// The computed fare (or penalty), absent while the trip is ongoing.
    pub fn fare_amount(&self) -> Option<Money> {
        self.settlement().and_then(Settlement::amount)
    }

    pub fn complete(&mut self, exit: TripExit, settlement: Settlement) {
        self.exit = Some(exit);
        self.status = TripStatus::Completed { settlement };
    }

    pub fn abandon(&mut self, settlement: Settlement) {
        self.status = TripStatus::Abandoned { settlement };
    }
}
