//! Stored-value fare cards.
//!
//! Cards are mutated only through their card actor (see
//! [`CardAccount`](crate::card_actor::CardAccount)), which commits every change together with
//! the transaction that explains it. Cards are never deleted.
use super::ids::{CardNumber, CardTypeId, PassengerId};
use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardStatus {
    Active,
    Blocked,
    Inactive,
}

impl Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CardStatus::Active => "Active",
            CardStatus::Blocked => "Blocked",
            CardStatus::Inactive => "Inactive",
        };
        f.write_str(label)
    }
}

/// Why a card was blocked. Only fare-debit blocks clear themselves on recharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockReason {
    FareDebitFailed,
    Administrative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub number: CardNumber,
    pub card_type: CardTypeId,
    pub passenger: Option<PassengerId>,
    pub status: CardStatus,
    pub block_reason: Option<BlockReason>,
    pub balance: Money,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
}

impl Card {
    /// A card is usable through its expiry date and expired from the following day.
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|last_day| at.date_naive() > last_day)
    }

    pub fn block(&mut self, reason: BlockReason) {
        self.status = CardStatus::Blocked;
        self.block_reason = Some(reason);
    }

    pub fn activate(&mut self) {
        self.status = CardStatus::Active;
        self.block_reason = None;
    }
}

/// DTO for issuing a new card.
#[derive(Debug, Clone)]
pub struct CardIssue {
    pub number: CardNumber,
    pub card_type: CardTypeId,
    pub passenger: Option<PassengerId>,
    pub opening_balance: Money,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
}

impl CardIssue {
    pub fn new(
        number: impl Into<CardNumber>,
        card_type: CardTypeId,
        opening_balance: Money,
        issued_on: NaiveDate,
    ) -> Self {
        Self {
            number: number.into(),
            card_type,
            passenger: None,
            opening_balance,
            issued_on,
            expires_on: None,
        }
    }

    pub fn expires_on(mut self, last_day: NaiveDate) -> Self {
        self.expires_on = Some(last_day);
        self
    }

    pub fn passenger(mut self, passenger: PassengerId) -> Self {
        self.passenger = Some(passenger);
        self
    }

    pub(crate) fn into_card(self) -> Card {
        Card {
            number: self.number,
            card_type: self.card_type,
            passenger: self.passenger,
            status: CardStatus::Active,
            block_reason: None,
            balance: self.opening_balance,
            issued_on: self.issued_on,
            expires_on: self.expires_on,
        }
    }
}
