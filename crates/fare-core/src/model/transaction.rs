//! Ledger entries.
//!
//! Transactions are append-only. The signed amounts of one card's transactions always sum to
//! that card's balance.

use super::ids::{CardNumber, TransactionId, TripId};
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    InitialLoad,
    Recharge,
    FareDeduction,
    PenaltyFare,
    Adjustment,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransactionType::InitialLoad => "InitialLoad",
            TransactionType::Recharge => "Recharge",
            TransactionType::FareDeduction => "FareDeduction",
            TransactionType::PenaltyFare => "PenaltyFare",
            TransactionType::Adjustment => "Adjustment",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub card: CardNumber,
    /// Positive for credits, negative for debits.
    pub amount: Money,
    pub kind: TransactionType,
    pub at: DateTime<Utc>,
    pub trip: Option<TripId>,
    pub reason: String,
}

/// A transaction that has not been committed yet. The store assigns the ID.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub card: CardNumber,
    pub amount: Money,
    pub kind: TransactionType,
    pub at: DateTime<Utc>,
    pub trip: Option<TripId>,
    pub reason: String,
}

impl NewTransaction {
    pub fn credit(
        card: CardNumber,
        amount: Money,
        kind: TransactionType,
        at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            card,
            amount,
            kind,
            at,
            trip: None,
            reason: reason.into(),
        }
    }

    /// A debit of `amount`, recorded with a negative sign.
    pub fn debit(
        card: CardNumber,
        amount: Money,
        kind: TransactionType,
        at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            card,
            amount: -amount,
            kind,
            at,
            trip: None,
            reason: reason.into(),
        }
    }

    pub fn for_trip(mut self, trip: TripId) -> Self {
        self.trip = Some(trip);
        self
    }

    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            card: self.card,
            amount: self.amount,
            kind: self.kind,
            at: self.at,
            trip: self.trip,
            reason: self.reason,
        }
    }
}
