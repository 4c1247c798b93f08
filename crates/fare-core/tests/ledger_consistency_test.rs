//! Ledger invariants under replays, concurrency, store conflicts, outages and restarts.

mod common;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::*;
use fare_core::card_actor::TapOutcome;
use fare_core::catalog::MemoryCatalog;
use fare_core::config::FareConfig;
use fare_core::lifecycle::FareSystem;
use fare_core::model::{
    BlockReason, Card, CardIssue, CardNumber, CardStatus, NewTransaction, Settlement, StationId,
    Transaction, TransactionType, Trip, TripId, TripStatus,
};
use fare_core::store::{
    CardCommit, CardRecord, CommitReceipt, LedgerStore, MemoryStore, StoreError,
};
use fare_core::{CoreError, ErrorKind, Money};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// --- Conflict injection ---

/// Delegates to a [`MemoryStore`] but refuses the next `conflicts` commits as if another
/// writer had bumped the version.
struct FlakyStore {
    inner: MemoryStore,
    conflicts: AtomicU32,
}

impl FlakyStore {
    fn new(conflicts: u32) -> Self {
        Self {
            inner: MemoryStore::new(),
            conflicts: AtomicU32::new(conflicts),
        }
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn insert_card(
        &self,
        record: CardRecord,
        opening: Option<NewTransaction>,
    ) -> Result<Option<Transaction>, StoreError> {
        self.inner.insert_card(record, opening).await
    }

    async fn load_card(&self, card: &CardNumber) -> Result<Option<CardRecord>, StoreError> {
        self.inner.load_card(card).await
    }

    async fn commit(&self, commit: CardCommit) -> Result<CommitReceipt, StoreError> {
        let inject = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            return Err(StoreError::Conflict {
                card: commit.record.card.number.clone(),
                expected: commit.expected_version,
                actual: commit.expected_version + 1,
            });
        }
        self.inner.commit(commit).await
    }

    async fn allocate_trip_id(&self) -> Result<TripId, StoreError> {
        self.inner.allocate_trip_id().await
    }

    async fn list_cards(&self) -> Result<Vec<Card>, StoreError> {
        self.inner.list_cards().await
    }

    async fn transactions_for(&self, card: &CardNumber) -> Result<Vec<Transaction>, StoreError> {
        self.inner.transactions_for(card).await
    }

    async fn all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.all_transactions().await
    }

    async fn trips_for(&self, card: &CardNumber) -> Result<Vec<Trip>, StoreError> {
        self.inner.trips_for(card).await
    }

    async fn all_trips(&self) -> Result<Vec<Trip>, StoreError> {
        self.inner.all_trips().await
    }

    async fn open_trips(&self) -> Result<Vec<(CardNumber, DateTime<Utc>)>, StoreError> {
        self.inner.open_trips().await
    }
}

fn flaky_system(conflicts: u32, retries: u32) -> (FareSystem, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore::new(conflicts));
    let config = FareConfig {
        max_conflict_retries: retries,
        ..FareConfig::default()
    };
    let system = FareSystem::new(
        config,
        Arc::new(MemoryCatalog::metro_defaults()),
        store.clone() as Arc<dyn LedgerStore>,
    );
    (system, store)
}

#[tokio::test]
async fn test_conflicting_commit_is_retried() {
    let (system, store) = flaky_system(0, 3);
    let issue = CardIssue::new("MC-3001", REGULAR, Money::from_cents(10_00), issued_on());
    let card = system.issue_card(issue).await.unwrap().number;

    // Two refused commits, then success within three retries
    store.conflicts.store(2, Ordering::SeqCst);
    let balance = system
        .cards()
        .recharge(card.clone(), Money::from_cents(5_00), at(9, 0))
        .await
        .expect("Recharge should succeed after retries");
    assert_eq!(balance, Money::from_cents(15_00));

    // Applied exactly once
    let recharges: Vec<_> = store
        .transactions_for(&card)
        .await
        .unwrap()
        .into_iter()
        .filter(|tx| tx.kind == TransactionType::Recharge)
        .collect();
    assert_eq!(recharges.len(), 1);
    let stored = store.load_card(&card).await.unwrap().unwrap();
    assert_eq!(stored.card.balance, Money::from_cents(15_00));
}

#[tokio::test]
async fn test_exhausted_retries_report_conflict() {
    let (system, store) = flaky_system(0, 2);
    let issue = CardIssue::new("MC-3002", REGULAR, Money::from_cents(10_00), issued_on());
    let card = system.issue_card(issue).await.unwrap().number;

    store.conflicts.store(10, Ordering::SeqCst);
    let err = system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .expect_err("Tap should give up");
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(matches!(err, CoreError::Conflict { attempts: 3, .. }));

    // Nothing was written
    store.conflicts.store(0, Ordering::SeqCst);
    assert!(store.trips_for(&card).await.unwrap().is_empty());
    let snapshot = system.cards().snapshot(card).await.unwrap();
    assert_eq!(snapshot.balance, Money::from_cents(10_00));
}

// --- Replays and round trips ---

#[tokio::test]
async fn test_replayed_tap_is_rejected_without_effect() {
    let h = Harness::new();
    let card = h.issue("MC-3101", REGULAR, 50_00).await;
    h.route(CENTRAL, DOWNTOWN, 2_50);

    h.system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .unwrap();
    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .expect_err("Replayed entry should be rejected");
    assert!(matches!(err, CoreError::DuplicateTap { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    h.system
        .intake()
        .handle_tap(card.clone(), DOWNTOWN, at(9, 15))
        .await
        .unwrap();
    let before = h.transactions(&card).await;

    // Replaying the exit does not charge again or open a trip
    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), DOWNTOWN, at(9, 15))
        .await
        .expect_err("Replayed exit should be rejected");
    assert!(matches!(err, CoreError::DuplicateTap { .. }));

    assert_eq!(h.transactions(&card).await, before);
    assert_eq!(h.trips(&card).await.len(), 1);
    assert_eq!(h.balance(&card).await, Money::from_cents(47_50));
}

/// A replay older than the card's tap memory is still rejected, and leaves nothing for the sweeper.
#[tokio::test]
async fn test_old_replay_is_rejected_after_many_taps() {
    let config = FareConfig {
        abandoned_penalty: Some(Money::from_cents(5_00)),
        ..FareConfig::default()
    };
    let h = Harness::with_config(config);
    let card = h.issue("MC-3103", REGULAR, 50_00).await;
    h.route(CENTRAL, DOWNTOWN, 2_50);

    // 18 taps push the first entry out of the recent-tap memory
    for round in 0..9 {
        let entry = at(9, 0) + minutes(30 * round);
        h.system
            .intake()
            .handle_tap(card.clone(), CENTRAL, entry)
            .await
            .expect("Entry tap failed");
        h.system
            .intake()
            .handle_tap(card.clone(), DOWNTOWN, entry + minutes(15))
            .await
            .expect("Exit tap failed");
    }
    let before = h.transactions(&card).await;
    assert_eq!(h.trips(&card).await.len(), 9);

    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .expect_err("Old replayed entry should be rejected");
    assert!(matches!(err, CoreError::DuplicateTap { .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    // A stale entry at another station is no better
    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), UNIVERSITY, at(9, 5))
        .await
        .expect_err("Stale entry should be rejected");
    assert!(matches!(err, CoreError::DuplicateTap { .. }));

    let swept = h
        .system
        .sweeper()
        .sweep_once(at(20, 0))
        .await
        .expect("Sweep failed");
    assert!(swept.is_empty());
    assert!(h
        .transactions_of(&card, TransactionType::PenaltyFare)
        .await
        .is_empty());
    assert_eq!(h.transactions(&card).await, before);
    assert_eq!(h.trips(&card).await.len(), 9);
    assert_eq!(h.balance(&card).await, Money::from_cents(27_50));
    h.assert_reconciled(&card).await;

    // Fresh taps still work
    let next = h
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(20, 5))
        .await
        .expect("New entry failed");
    assert_eq!(next.outcome, TapOutcome::Entered);
}

#[tokio::test]
async fn test_credit_then_debit_restores_balance() {
    let h = Harness::new();
    let card = h.issue("MC-3102", REGULAR, 12_34).await;

    h.system
        .cards()
        .credit(
            card.clone(),
            Money::from_cents(7_66),
            TransactionType::Recharge,
            "Counter top-up",
            at(9, 0),
        )
        .await
        .unwrap();
    let balance = h
        .system
        .cards()
        .debit(card.clone(), Money::from_cents(7_66), "Refund", at(9, 5))
        .await
        .unwrap();

    assert_eq!(balance, Money::from_cents(12_34));
    let history = h.transactions(&card).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].kind, TransactionType::Adjustment);
    assert_eq!(history[2].amount, Money::from_cents(-7_66));
    h.assert_reconciled(&card).await;
}

#[tokio::test]
async fn test_invalid_amounts_are_rejected() {
    let h = Harness::new();
    let card = h.issue("MC-3103", REGULAR, 5_00).await;

    let err = h
        .system
        .cards()
        .recharge(card.clone(), Money::ZERO, at(9, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = h
        .system
        .cards()
        .debit(card.clone(), Money::from_cents(6_00), "Correction", at(9, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    // An administrative debit failure does not block the card
    let snapshot = h.system.cards().snapshot(card.clone()).await.unwrap();
    assert_eq!(snapshot.status, CardStatus::Active);
    assert_eq!(h.transactions(&card).await.len(), 1);
}

// --- Concurrency ---

#[tokio::test]
async fn test_cards_are_processed_in_parallel() {
    let h = Arc::new(Harness::new());
    h.route(CENTRAL, DOWNTOWN, 2_50);

    let mut cards = Vec::new();
    for n in 0..20 {
        cards.push(h.issue(&format!("MC-4{n:03}"), REGULAR, 10_00).await);
    }

    let handles: Vec<_> = cards
        .iter()
        .cloned()
        .map(|card| {
            let intake = h.system.intake().clone();
            tokio::spawn(async move {
                intake.handle_tap(card.clone(), CENTRAL, at(9, 0)).await?;
                intake.handle_tap(card, DOWNTOWN, at(9, 10)).await
            })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap().expect("Trip failed");
        assert!(matches!(result.outcome, TapOutcome::Exited { .. }));
    }

    for card in &cards {
        assert_eq!(h.balance(card).await, Money::from_cents(7_50));
        h.assert_reconciled(card).await;
        h.assert_single_open_trip(card).await;
    }
}

#[tokio::test]
async fn test_interleaved_operations_keep_ledger_reconciled() {
    let h = Arc::new(Harness::new());
    h.route(CENTRAL, DOWNTOWN, 2_50);
    let card = h.issue("MC-4100", REGULAR, 5_00).await;

    // Taps, recharges and debits for one card race from separate tasks
    let mut handles = Vec::new();
    for i in 0..10u32 {
        let h = h.clone();
        let card = card.clone();
        handles.push(tokio::spawn(async move {
            let base = at(9, 0) + minutes(i64::from(i) * 10);
            let _ = h
                .system
                .intake()
                .handle_tap(card.clone(), CENTRAL, base)
                .await;
            let _ = h
                .system
                .cards()
                .recharge(card.clone(), Money::from_cents(1_00), base)
                .await;
            let _ = h
                .system
                .intake()
                .handle_tap(card.clone(), DOWNTOWN, base + minutes(5))
                .await;
            let _ = h
                .system
                .cards()
                .debit(card, Money::from_cents(50), "Correction", base)
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    h.assert_reconciled(&card).await;
    h.assert_single_open_trip(&card).await;
}

// --- Outages and restarts ---

#[tokio::test]
async fn test_offline_store_leaves_no_partial_effects() {
    let h = Harness::new();
    h.route(CENTRAL, DOWNTOWN, 2_50);
    let card = h.issue("MC-5001", REGULAR, 10_00).await;
    h.system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .unwrap();

    h.store.set_offline(true);
    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), DOWNTOWN, at(9, 10))
        .await
        .expect_err("Tap should fail while the store is offline");
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    h.store.set_offline(false);

    // Still ongoing and uncharged
    let trips = h.trips(&card).await;
    assert_eq!(trips.len(), 1);
    assert!(trips[0].is_ongoing());
    assert_eq!(h.balance(&card).await, Money::from_cents(10_00));

    // The same exit succeeds once the store is back
    let exited = h
        .system
        .intake()
        .handle_tap(card.clone(), DOWNTOWN, at(9, 10))
        .await
        .expect("Exit should succeed after recovery");
    assert!(matches!(exited.outcome, TapOutcome::Exited { .. }));
    h.assert_reconciled(&card).await;
}

#[tokio::test]
async fn test_state_survives_restart() {
    let store = Arc::new(MemoryStore::new());

    let first = Harness::over_store(FareConfig::default(), store.clone());
    first.route(CENTRAL, DOWNTOWN, 2_50);
    let card = first.issue("MC-5002", REGULAR, 10_00).await;
    first
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .unwrap();
    first.system.shutdown().await.expect("Shutdown failed");

    // A new system over the same store picks up the ongoing trip
    let second = Harness::over_store(FareConfig::default(), store);
    second.route(CENTRAL, DOWNTOWN, 2_50);
    let exited = second
        .system
        .intake()
        .handle_tap(card.clone(), DOWNTOWN, at(9, 20))
        .await
        .expect("Exit after restart failed");
    assert_eq!(
        exited.outcome,
        TapOutcome::Exited {
            fare: Money::from_cents(2_50),
            balance: Money::from_cents(7_50),
        }
    );

    // Replay protection is persisted with the card
    let err = second
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .expect_err("Replay after restart should be rejected");
    assert!(matches!(err, CoreError::DuplicateTap { .. }));
    second.assert_reconciled(&card).await;
}

#[tokio::test]
async fn test_idle_card_actor_is_reopened() {
    let config = FareConfig {
        actor_idle_secs: 1,
        ..FareConfig::default()
    };
    let h = Harness::with_config(config);
    h.route(CENTRAL, DOWNTOWN, 2_50);
    let card = h.issue("MC-5003", REGULAR, 10_00).await;

    h.system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .unwrap();
    assert_eq!(h.system.live_cards(), 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.system.live_cards(), 0, "Idle actor should have closed");

    let exited = h
        .system
        .intake()
        .handle_tap(card.clone(), DOWNTOWN, at(9, 10))
        .await
        .expect("Exit after eviction failed");
    assert!(matches!(exited.outcome, TapOutcome::Exited { .. }));
}

// --- Card state and tap edge cases ---

#[tokio::test]
async fn test_expired_card_becomes_inactive() {
    let h = Harness::new();
    let last_day = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
    let issue = CardIssue::new("MC-6001", REGULAR, Money::from_cents(10_00), issued_on())
        .expires_on(last_day);
    let card = h.system.issue_card(issue).await.unwrap().number;

    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .expect_err("Expired card should be rejected");
    assert!(matches!(
        err,
        CoreError::CardNotActive {
            status: CardStatus::Inactive,
            ..
        }
    ));
    let snapshot = h.system.cards().snapshot(card.clone()).await.unwrap();
    assert_eq!(snapshot.status, CardStatus::Inactive);

    // Inactive cards take no credit either
    let err = h
        .system
        .cards()
        .recharge(card, Money::from_cents(5_00), at(9, 5))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_administrative_block_survives_recharge() {
    let h = Harness::new();
    let card = h.issue("MC-6002", REGULAR, 10_00).await;

    let status = h.system.cards().block(card.clone()).await.unwrap();
    assert_eq!(status, CardStatus::Blocked);

    h.system
        .cards()
        .recharge(card.clone(), Money::from_cents(5_00), at(9, 0))
        .await
        .unwrap();
    let snapshot = h.system.cards().snapshot(card.clone()).await.unwrap();
    assert_eq!(snapshot.status, CardStatus::Blocked);
    assert_eq!(snapshot.block_reason, Some(BlockReason::Administrative));

    let status = h.system.cards().unblock(card.clone()).await.unwrap();
    assert_eq!(status, CardStatus::Active);
    h.system
        .intake()
        .handle_tap(card, CENTRAL, at(9, 5))
        .await
        .expect("Unblocked card should tap in");
}

#[tokio::test]
async fn test_same_station_exit() {
    // Free by default
    let h = Harness::new();
    let card = h.issue("MC-6003", REGULAR, 10_00).await;
    h.system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .unwrap();
    let exited = h
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 4))
        .await
        .unwrap();
    assert_eq!(
        exited.trip.status,
        TripStatus::Completed {
            settlement: Settlement::Free
        }
    );
    assert_eq!(h.transactions(&card).await.len(), 1);

    // Charged the flat fare when configured
    let config = FareConfig {
        same_station_fare: Money::from_cents(1_50),
        ..FareConfig::default()
    };
    let h = Harness::with_config(config);
    let card = h.issue("MC-6004", REGULAR, 10_00).await;
    h.system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .unwrap();
    let exited = h
        .system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 4))
        .await
        .unwrap();
    assert_eq!(
        exited.outcome,
        TapOutcome::Exited {
            fare: Money::from_cents(1_50),
            balance: Money::from_cents(8_50),
        }
    );
    h.assert_reconciled(&card).await;
}

#[tokio::test]
async fn test_rejected_exits_keep_trip_open() {
    let h = Harness::new();
    let card = h.issue("MC-6005", REGULAR, 10_00).await;
    h.system
        .intake()
        .handle_tap(card.clone(), CENTRAL, at(9, 0))
        .await
        .unwrap();

    // Stamped before the entry
    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), DOWNTOWN, at(8, 59))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::TapBeforeEntry { .. }));

    // No rule between these stations
    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), TERMINAL, at(9, 30))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoFareRule);

    let trips = h.trips(&card).await;
    assert_eq!(trips.len(), 1);
    assert!(trips[0].is_ongoing());
    assert_eq!(h.balance(&card).await, Money::from_cents(10_00));

    // Adding the missing rule lets the same exit through
    h.route(TERMINAL, CENTRAL, 4_00);
    h.system
        .intake()
        .handle_tap(card.clone(), TERMINAL, at(9, 30))
        .await
        .expect("Exit should succeed once priced");
    h.assert_reconciled(&card).await;
}

#[tokio::test]
async fn test_unknown_card_and_station() {
    let h = Harness::new();
    let card = h.issue("MC-6006", REGULAR, 10_00).await;

    let err = h
        .system
        .intake()
        .handle_tap(CardNumber::from("MC-0000"), CENTRAL, at(9, 0))
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::UnknownCard(CardNumber::from("MC-0000")));

    let err = h
        .system
        .intake()
        .handle_tap(card.clone(), StationId(99), at(9, 0))
        .await
        .unwrap_err();
    assert_eq!(err, CoreError::UnknownStation(StationId(99)));
    assert!(h.trips(&card).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_card_number_is_refused() {
    let h = Harness::new();
    h.issue("MC-6007", REGULAR, 10_00).await;

    let issue = CardIssue::new("MC-6007", REGULAR, Money::from_cents(1_00), issued_on());
    let err = h.system.issue_card(issue).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_opening_balance_is_an_initial_load() {
    let h = Harness::new();
    let card = h.issue("MC-6008", REGULAR, 20_00).await;

    let history = h.transactions(&card).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, TransactionType::InitialLoad);
    assert_eq!(history[0].amount, Money::from_cents(20_00));

    let empty = h.issue("MC-6009", REGULAR, 0).await;
    assert!(h.transactions(&empty).await.is_empty());
    h.assert_reconciled(&empty).await;
}

#[tokio::test]
async fn test_trip_ids_are_unique_across_cards() {
    let h = Harness::new();
    let a = h.issue("MC-6010", REGULAR, 10_00).await;
    let b = h.issue("MC-6011", REGULAR, 10_00).await;

    let first = h
        .system
        .intake()
        .handle_tap(a, CENTRAL, at(9, 0))
        .await
        .unwrap();
    let second = h
        .system
        .intake()
        .handle_tap(b, CENTRAL, at(9, 0))
        .await
        .unwrap();
    assert_ne!(first.trip.id, second.trip.id);

    let all = h.system.trips().await.unwrap();
    assert_eq!(all.len(), 2);
}
