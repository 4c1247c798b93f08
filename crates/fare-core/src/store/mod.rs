//! # Ledger Store
//!
//! Persistence boundary of the fare core. A card's record (card, open trip, dedup memory) is
//! written together with at most one transaction and at most one trip in a single
//! [`LedgerStore::commit`]. The commit is guarded by the record's version: if another writer
//! got there first the whole commit is refused with [`StoreError::Conflict`] and nothing is
//! applied.
//!
//! [`MemoryStore`] is the in-process implementation used by the demo binary and the tests.

pub mod memory;

pub use memory::MemoryStore;

use crate::model::{Card, CardNumber, NewTransaction, StationId, Transaction, Trip, TripExit, TripId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Version conflict on card {card}: expected {expected}, found {actual}")]
    Conflict {
        card: CardNumber,
        expected: u64,
        actual: u64,
    },
    #[error("Card not found: {0}")]
    NotFound(CardNumber),
    #[error("Card already exists: {0}")]
    AlreadyExists(CardNumber),
    #[error("{0}")]
    Unavailable(String),
}

/// Identity of a processed tap, remembered to reject replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapKey {
    pub station: StationId,
    pub at: DateTime<Utc>,
}

/// Everything the store keeps for one card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRecord {
    pub card: Card,
    /// Incremented by every commit.
    pub version: u64,
    pub open_trip: Option<Trip>,
    /// Where and when the card last left the system, for duplicate-exit detection.
    pub last_exit: Option<TripExit>,
    /// Most recent taps, oldest first.
    pub recent_taps: VecDeque<TapKey>,
    /// Timestamp of the newest tap ever processed. Outlives `recent_taps`.
    pub last_tap_at: Option<DateTime<Utc>>,
}

impl CardRecord {
    pub fn new(card: Card) -> Self {
        Self {
            card,
            version: 0,
            open_trip: None,
            last_exit: None,
            recent_taps: VecDeque::new(),
            last_tap_at: None,
        }
    }

    pub fn has_seen(&self, tap: &TapKey) -> bool {
        self.recent_taps.contains(tap)
    }

    /// True when no trip is open and `at` lies more than `window` before the newest
    /// processed tap. Such a tap can only be a replay that fell out of `recent_taps`.
    pub fn is_stale(&self, at: DateTime<Utc>, window: chrono::Duration) -> bool {
        self.open_trip.is_none() && self.last_tap_at.is_some_and(|newest| at < newest - window)
    }

    pub fn remember_tap(&mut self, tap: TapKey, capacity: usize) {
        self.last_tap_at = Some(self.last_tap_at.map_or(tap.at, |newest| newest.max(tap.at)));
        self.recent_taps.push_back(tap);
        while self.recent_taps.len() > capacity {
            self.recent_taps.pop_front();
        }
    }
}

/// One atomic write for one card.
#[derive(Debug, Clone)]
pub struct CardCommit {
    /// Version the writer read. The commit fails unless it is still current.
    pub expected_version: u64,
    pub record: CardRecord,
    pub entry: Option<NewTransaction>,
    /// Inserted or replaced by ID.
    pub trip: Option<Trip>,
}

#[derive(Debug, Clone)]
pub struct CommitReceipt {
    pub version: u64,
    pub transaction: Option<Transaction>,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Stores a new card and its opening transaction. Fails if the number is taken.
    async fn insert_card(
        &self,
        record: CardRecord,
        opening: Option<NewTransaction>,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn load_card(&self, card: &CardNumber) -> Result<Option<CardRecord>, StoreError>;

    async fn commit(&self, commit: CardCommit) -> Result<CommitReceipt, StoreError>;

    async fn allocate_trip_id(&self) -> Result<TripId, StoreError>;

    async fn list_cards(&self) -> Result<Vec<Card>, StoreError>;

    async fn transactions_for(&self, card: &CardNumber) -> Result<Vec<Transaction>, StoreError>;

    async fn all_transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    async fn trips_for(&self, card: &CardNumber) -> Result<Vec<Trip>, StoreError>;

    async fn all_trips(&self) -> Result<Vec<Trip>, StoreError>;

    /// Cards with an ongoing trip and that trip's entry time.
    async fn open_trips(&self) -> Result<Vec<(CardNumber, DateTime<Utc>)>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CardIssue, CardTypeId, TripId};
    use crate::money::Money;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn record() -> CardRecord {
        let issued = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        CardRecord::new(
            CardIssue::new("MC-1001", CardTypeId(1), Money::from_cents(10000), issued).into_card(),
        )
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    fn tap(station: u32, at: DateTime<Utc>) -> TapKey {
        TapKey {
            station: StationId(station),
            at,
        }
    }

    #[test]
    fn newest_tap_survives_ring_eviction() {
        let mut record = record();
        record.remember_tap(tap(1, at(9, 0)), 2);
        record.remember_tap(tap(2, at(9, 20)), 2);
        record.remember_tap(tap(1, at(9, 10)), 2);
        assert!(!record.has_seen(&tap(1, at(9, 0))));
        assert_eq!(record.last_tap_at, Some(at(9, 20)));
    }

    #[test]
    fn old_taps_are_stale_only_without_an_open_trip() {
        let window = Duration::seconds(30);
        let mut record = record();
        assert!(!record.is_stale(at(9, 0), window));

        record.remember_tap(tap(2, at(9, 20)), 16);
        assert!(record.is_stale(at(9, 0), window));
        assert!(!record.is_stale(at(9, 20) - Duration::seconds(10), window));
        assert!(!record.is_stale(at(9, 30), window));

        record.open_trip = Some(Trip::open(
            TripId(1),
            record.card.number.clone(),
            StationId(1),
            at(9, 25),
        ));
        assert!(!record.is_stale(at(9, 0), window));
    }
}
