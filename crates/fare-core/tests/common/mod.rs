//! Shared fixtures for the fare-core integration tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fare_core::catalog::MemoryCatalog;
use fare_core::config::FareConfig;
use fare_core::lifecycle::FareSystem;
use fare_core::model::{
    CardIssue, CardNumber, CardTypeId, FareKey, StationId, Transaction, TransactionType, Trip,
};
use fare_core::store::{LedgerStore, MemoryStore};
use fare_core::Money;
use std::sync::Arc;

pub const REGULAR: CardTypeId = CardTypeId(1);
pub const STUDENT: CardTypeId = CardTypeId(2);

pub const CENTRAL: StationId = StationId(1);
pub const DOWNTOWN: StationId = StationId(2);
pub const UNIVERSITY: StationId = StationId(3);
pub const TERMINAL: StationId = StationId(5);

/// 2024-05-01 at `hour:minute` UTC.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

pub fn issued_on() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub struct Harness {
    pub system: FareSystem,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(FareConfig::default())
    }

    pub fn with_config(config: FareConfig) -> Self {
        Self::over_store(config, Arc::new(MemoryStore::new()))
    }

    /// A fresh system over an existing store, as after a restart.
    pub fn over_store(config: FareConfig, store: Arc<MemoryStore>) -> Self {
        let system = FareSystem::new(
            config,
            Arc::new(MemoryCatalog::metro_defaults()),
            store.clone() as Arc<dyn LedgerStore>,
        );
        Self { system, store }
    }

    pub async fn issue(&self, number: &str, card_type: CardTypeId, cents: i64) -> CardNumber {
        let issue = CardIssue::new(number, card_type, Money::from_cents(cents), issued_on());
        self.system
            .issue_card(issue)
            .await
            .expect("Failed to issue card")
            .number
    }

    pub fn route(&self, start: StationId, end: StationId, cents: i64) {
        self.system
            .fares()
            .insert(FareKey::Route { start, end }, Money::from_cents(cents))
            .expect("Failed to create fare rule");
    }

    pub async fn balance(&self, card: &CardNumber) -> Money {
        self.system
            .cards()
            .snapshot(card.clone())
            .await
            .expect("Failed to read card")
            .balance
    }

    pub async fn transactions(&self, card: &CardNumber) -> Vec<Transaction> {
        self.system
            .transactions()
            .list_by_card(card.clone())
            .start()
            .await
            .expect("Failed to read transactions")
            .collect()
    }

    pub async fn transactions_of(&self, card: &CardNumber, kind: TransactionType) -> Vec<Transaction> {
        self.transactions(card)
            .await
            .into_iter()
            .filter(|tx| tx.kind == kind)
            .collect()
    }

    pub async fn trips(&self, card: &CardNumber) -> Vec<Trip> {
        self.store
            .trips_for(card)
            .await
            .expect("Failed to read trips")
    }

    /// The signed sum of the card's transactions matches its balance.
    pub async fn assert_reconciled(&self, card: &CardNumber) {
        let ledger = self
            .system
            .transactions()
            .balance_of(card.clone())
            .await
            .expect("Failed to sum transactions");
        assert_eq!(
            ledger,
            self.balance(card).await,
            "Transactions of {card} do not reconcile with its balance"
        );
    }

    /// The card has at most one ongoing trip.
    pub async fn assert_single_open_trip(&self, card: &CardNumber) {
        let ongoing = self
            .trips(card)
            .await
            .into_iter()
            .filter(Trip::is_ongoing)
            .count();
        assert!(ongoing <= 1, "{card} has {ongoing} ongoing trips");
    }
}

pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}
