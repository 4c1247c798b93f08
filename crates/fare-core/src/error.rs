//! # Core Errors
//!
//! [`CoreError`] is the single error type returned by card operations, gate intake and
//! administrative commands. Each variant belongs to one [`ErrorKind`], which is what callers
//! branch on; the variant carries the detail for logs and messages.

use crate::fare::FareError;
use crate::model::{CardNumber, CardStatus, CardTypeId, FareKey, FareRuleId, StationId, TripId};
use crate::money::Money;
use crate::store::StoreError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Coarse classification of a [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientFunds,
    NoFareRule,
    Conflict,
    InvalidInput,
    Unavailable,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    #[error("Card not found: {0}")]
    UnknownCard(CardNumber),

    #[error("Station not found: {0}")]
    UnknownStation(StationId),

    #[error("Card type not found: {0}")]
    UnknownCardType(CardTypeId),

    #[error("Fare rule not found: {0}")]
    UnknownFareRule(FareRuleId),

    #[error("Card {card} is {status}{}", recharge_hint(.status))]
    CardNotActive { card: CardNumber, status: CardStatus },

    /// An entry was requested while the card already has an ongoing trip.
    #[error("Card {card} already has ongoing trip {trip}")]
    GateMismatch { card: CardNumber, trip: TripId },

    #[error("Tap already processed for card {card} at {station} ({at})")]
    DuplicateTap {
        card: CardNumber,
        station: StationId,
        at: DateTime<Utc>,
    },

    #[error("Card {card} already exited at {station}")]
    DuplicateExit { card: CardNumber, station: StationId },

    #[error("Exit tap at {at} precedes the entry of {trip}")]
    TapBeforeEntry {
        card: CardNumber,
        trip: TripId,
        at: DateTime<Utc>,
    },

    #[error("Insufficient funds on card {card}: requested {requested}, available {available}")]
    InsufficientFunds {
        card: CardNumber,
        requested: Money,
        available: Money,
        /// The trip whose fare could not be paid, when the debit came from a tap.
        trip: Option<TripId>,
    },

    #[error("No fare rule for {card_type} from {entry} to {exit}")]
    NoFareRule {
        card_type: String,
        entry: StationId,
        exit: StationId,
    },

    #[error("Card {card} changed concurrently; gave up after {attempts} attempts")]
    Conflict { card: CardNumber, attempts: u32 },

    #[error("Card already exists: {0}")]
    CardExists(CardNumber),

    #[error("A fare rule already exists for {0}")]
    DuplicateFareRule(FareKey),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Money),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

fn recharge_hint(status: &CardStatus) -> &'static str {
    match status {
        CardStatus::Blocked => ", recharge required",
        CardStatus::Active | CardStatus::Inactive => "",
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::UnknownCard(_)
            | CoreError::UnknownStation(_)
            | CoreError::UnknownCardType(_)
            | CoreError::UnknownFareRule(_) => ErrorKind::NotFound,
            CoreError::CardNotActive { .. }
            | CoreError::GateMismatch { .. }
            | CoreError::DuplicateTap { .. }
            | CoreError::DuplicateExit { .. }
            | CoreError::TapBeforeEntry { .. } => ErrorKind::InvalidState,
            CoreError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            CoreError::NoFareRule { .. } => ErrorKind::NoFareRule,
            CoreError::Conflict { .. }
            | CoreError::CardExists(_)
            | CoreError::DuplicateFareRule(_) => ErrorKind::Conflict,
            CoreError::InvalidAmount(_) => ErrorKind::InvalidInput,
            CoreError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<FareError> for CoreError {
    fn from(e: FareError) -> Self {
        match e {
            FareError::NoFareRule {
                card_type,
                entry,
                exit,
            } => CoreError::NoFareRule {
                card_type,
                entry,
                exit,
            },
            FareError::DuplicateRule(key) => CoreError::DuplicateFareRule(key),
            FareError::UnknownRule(id) => CoreError::UnknownFareRule(id),
            FareError::UnknownStation(id) => CoreError::UnknownStation(id),
            FareError::InvalidAmount(amount) => CoreError::InvalidAmount(amount),
        }
    }
}

/// Store failures that reach a caller. Conflicts are normally retried before this point.
impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(card) => CoreError::UnknownCard(card),
            StoreError::AlreadyExists(card) => CoreError::CardExists(card),
            StoreError::Conflict { card, .. } => CoreError::Conflict { card, attempts: 1 },
            StoreError::Unavailable(reason) => CoreError::Unavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_card_asks_for_recharge() {
        let err = CoreError::CardNotActive {
            card: CardNumber::from("MC-1001"),
            status: CardStatus::Blocked,
        };
        assert_eq!(err.to_string(), "Card MC-1001 is Blocked, recharge required");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn inactive_card_has_no_hint() {
        let err = CoreError::CardNotActive {
            card: CardNumber::from("MC-1001"),
            status: CardStatus::Inactive,
        };
        assert_eq!(err.to_string(), "Card MC-1001 is Inactive");
    }

    #[test]
    fn store_errors_keep_their_kind() {
        let card = CardNumber::from("MC-1001");
        assert_eq!(
            CoreError::from(StoreError::NotFound(card.clone())).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::from(StoreError::Unavailable("disk".into())).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            CoreError::from(StoreError::Conflict {
                card,
                expected: 1,
                actual: 2
            })
            .kind(),
            ErrorKind::Conflict
        );
    }
}
