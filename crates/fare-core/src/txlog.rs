//! # Transaction Log
//!
//! Read side of the append-only ledger. Appends happen only inside card commits (see
//! [`LedgerStore::commit`]); this module answers the questions asked of the log afterwards.

use crate::error::CoreError;
use crate::model::{CardNumber, Transaction};
use crate::money::Money;
use crate::store::LedgerStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct TransactionLog {
    store: Arc<dyn LedgerStore>,
}

impl TransactionLog {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// History of one card. Nothing is read until the history is started.
    pub fn list_by_card(&self, card: CardNumber) -> TransactionHistory {
        TransactionHistory {
            store: self.store.clone(),
            card,
        }
    }

    /// Every transaction, newest first.
    pub async fn list_all(&self) -> Result<Vec<Transaction>, CoreError> {
        let mut all = self.store.all_transactions().await?;
        all.sort_by(|a, b| b.at.cmp(&a.at).then(b.id.cmp(&a.id)));
        Ok(all)
    }

    /// Sum of a card's transactions, which must equal its balance.
    pub async fn balance_of(&self, card: CardNumber) -> Result<Money, CoreError> {
        Ok(self.list_by_card(card).start().await?.map(|tx| tx.amount).sum())
    }
}

/// A card's transactions ordered by timestamp, ties broken by ID.
///
/// Each call to [`start`](TransactionHistory::start) reads a fresh snapshot, so the history
/// can be walked any number of times and always ends.
pub struct TransactionHistory {
    store: Arc<dyn LedgerStore>,
    card: CardNumber,
}

impl TransactionHistory {
    pub fn card(&self) -> &CardNumber {
        &self.card
    }

    pub async fn start(&self) -> Result<HistoryCursor, CoreError> {
        let mut entries = self.store.transactions_for(&self.card).await?;
        entries.sort_by(|a, b| a.at.cmp(&b.at).then(a.id.cmp(&b.id)));
        Ok(HistoryCursor {
            entries: entries.into_iter(),
        })
    }
}

pub struct HistoryCursor {
    entries: std::vec::IntoIter<Transaction>,
}

impl Iterator for HistoryCursor {
    type Item = Transaction;

    fn next(&mut self) -> Option<Transaction> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
