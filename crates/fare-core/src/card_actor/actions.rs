//! Actions for the card actor.
//!
//! Every change to a card goes through one of these, handled by
//! [`CardAccount::handle_action`](fare_actor::ActorEntity::handle_action) one at a time per
//! card. Actions are `Clone` because a conflicting commit replays the action against a
//! freshly loaded record.

use crate::model::{CardStatus, StationId, TransactionType, Trip};
use crate::money::Money;
use chrono::{DateTime, Utc};

/// A gate tap, as reported by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tap {
    pub station: StationId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum CardAction {
    /// Entry or exit, decided by the card's current trip.
    Tap(Tap),
    /// Adds value to the card.
    Credit {
        amount: Money,
        kind: TransactionType,
        reason: String,
        at: DateTime<Utc>,
    },
    /// Administrative debit, recorded as an adjustment.
    Debit {
        amount: Money,
        reason: String,
        at: DateTime<Utc>,
    },
    Block,
    Unblock,
    /// Closes the ongoing trip if it is overdue at `now`.
    SweepAbandoned { now: DateTime<Utc> },
}

/// What a tap did.
#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    Entered,
    Exited { fare: Money, balance: Money },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TapResult {
    /// The trip as committed.
    pub trip: Trip,
    pub outcome: TapOutcome,
}

/// Results from CardActions - variants match the action that produced them
#[derive(Debug, Clone)]
pub enum CardActionResult {
    Tap(TapResult),
    /// Balance after a credit or debit.
    Balance(Money),
    /// Status after a block or unblock.
    Status(CardStatus),
    /// The trip closed by a sweep, if one was overdue.
    Swept(Option<Trip>),
}
