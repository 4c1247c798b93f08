//! In-memory [`LedgerStore`].
//!
//! Cards are spread over a fixed number of shards by hash. A commit touches exactly one
//! shard and applies the record, the transaction and the trip under that shard's lock, after
//! the version check has passed, so a refused commit leaves no trace.

use super::{CardCommit, CardRecord, CommitReceipt, LedgerStore, StoreError};
use crate::model::{Card, CardNumber, NewTransaction, Transaction, TransactionId, Trip, TripId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

const SHARDS: usize = 16;

#[derive(Default)]
struct Shard {
    cards: HashMap<CardNumber, CardRecord>,
    transactions: HashMap<CardNumber, Vec<Transaction>>,
    trips: HashMap<CardNumber, BTreeMap<TripId, Trip>>,
}

pub struct MemoryStore {
    shards: Vec<Mutex<Shard>>,
    next_transaction: AtomicU64,
    next_trip: AtomicU64,
    offline: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(Shard::default())).collect(),
            next_transaction: AtomicU64::new(1),
            next_trip: AtomicU64::new(1),
            offline: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`] until switched back.
    pub fn set_offline(&self, offline: bool) {
        warn!(offline, "Memory store availability changed");
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("ledger store is offline".to_string()));
        }
        Ok(())
    }

    fn shard_for(&self, card: &CardNumber) -> Result<MutexGuard<'_, Shard>, StoreError> {
        self.ensure_online()?;
        let mut hasher = DefaultHasher::new();
        card.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        self.shards[index]
            .lock()
            .map_err(|_| StoreError::Unavailable("shard lock poisoned".to_string()))
    }

    fn each_shard<R>(&self, mut visit: impl FnMut(&Shard, &mut Vec<R>)) -> Result<Vec<R>, StoreError> {
        self.ensure_online()?;
        let mut out = Vec::new();
        for shard in &self.shards {
            let shard = shard
                .lock()
                .map_err(|_| StoreError::Unavailable("shard lock poisoned".to_string()))?;
            visit(&shard, &mut out);
        }
        Ok(out)
    }

    fn append(&self, shard: &mut Shard, entry: NewTransaction) -> Transaction {
        let id = TransactionId(self.next_transaction.fetch_add(1, Ordering::Relaxed));
        let transaction = entry.into_transaction(id);
        shard
            .transactions
            .entry(transaction.card.clone())
            .or_default()
            .push(transaction.clone());
        transaction
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_card(
        &self,
        mut record: CardRecord,
        opening: Option<NewTransaction>,
    ) -> Result<Option<Transaction>, StoreError> {
        let number = record.card.number.clone();
        let mut shard = self.shard_for(&number)?;
        if shard.cards.contains_key(&number) {
            return Err(StoreError::AlreadyExists(number));
        }
        record.version = 1;
        let transaction = opening.map(|entry| self.append(&mut shard, entry));
        shard.cards.insert(number.clone(), record);
        debug!(card = %number, "Card inserted");
        Ok(transaction)
    }

    async fn load_card(&self, card: &CardNumber) -> Result<Option<CardRecord>, StoreError> {
        Ok(self.shard_for(card)?.cards.get(card).cloned())
    }

    async fn commit(&self, commit: CardCommit) -> Result<CommitReceipt, StoreError> {
        let CardCommit {
            expected_version,
            mut record,
            entry,
            trip,
        } = commit;
        let number = record.card.number.clone();
        let mut shard = self.shard_for(&number)?;

        let actual = shard
            .cards
            .get(&number)
            .map(|current| current.version)
            .ok_or_else(|| StoreError::NotFound(number.clone()))?;
        if actual != expected_version {
            return Err(StoreError::Conflict {
                card: number,
                expected: expected_version,
                actual,
            });
        }

        let version = actual + 1;
        record.version = version;
        let transaction = entry.map(|entry| self.append(&mut shard, entry));
        if let Some(trip) = trip {
            shard
                .trips
                .entry(number.clone())
                .or_default()
                .insert(trip.id, trip);
        }
        shard.cards.insert(number.clone(), record);
        debug!(card = %number, version, "Committed");

        Ok(CommitReceipt {
            version,
            transaction,
        })
    }

    async fn allocate_trip_id(&self) -> Result<TripId, StoreError> {
        self.ensure_online()?;
        Ok(TripId(self.next_trip.fetch_add(1, Ordering::Relaxed)))
    }

    async fn list_cards(&self) -> Result<Vec<Card>, StoreError> {
        let mut cards = self.each_shard(|shard, out| {
            out.extend(shard.cards.values().map(|record| record.card.clone()))
        })?;
        cards.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(cards)
    }

    async fn transactions_for(&self, card: &CardNumber) -> Result<Vec<Transaction>, StoreError> {
        let shard = self.shard_for(card)?;
        Ok(shard.transactions.get(card).cloned().unwrap_or_default())
    }

    async fn all_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        self.each_shard(|shard, out| {
            out.extend(shard.transactions.values().flatten().cloned())
        })
    }

    async fn trips_for(&self, card: &CardNumber) -> Result<Vec<Trip>, StoreError> {
        let shard = self.shard_for(card)?;
        Ok(shard
            .trips
            .get(card)
            .map(|trips| trips.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn all_trips(&self) -> Result<Vec<Trip>, StoreError> {
        self.each_shard(|shard, out| {
            out.extend(shard.trips.values().flat_map(|trips| trips.values().cloned()))
        })
    }

    async fn open_trips(&self) -> Result<Vec<(CardNumber, DateTime<Utc>)>, StoreError> {
        self.each_shard(|shard, out| {
            out.extend(shard.cards.values().filter_map(|record| {
                record
                    .open_trip
                    .as_ref()
                    .map(|trip| (record.card.number.clone(), trip.entry_time))
            }))
        })
    }
}
