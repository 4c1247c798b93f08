//! # Abandoned-Trip Sweeper
//!
//! Periodically finds ongoing trips older than `max_trip_duration` and closes them as
//! abandoned. The sweeper never touches a card record itself: it sends a sweep action to the
//! card's actor, which re-checks the trip under the card's own ordering. A trip that was
//! exited in the meantime is simply left alone.

use crate::clients::CardClient;
use crate::config::FareConfig;
use crate::error::CoreError;
use crate::model::Trip;
use crate::store::LedgerStore;
use crate::trip::is_overdue;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct AbandonedTripSweeper {
    store: Arc<dyn LedgerStore>,
    cards: CardClient,
    config: Arc<FareConfig>,
}

impl AbandonedTripSweeper {
    pub fn new(store: Arc<dyn LedgerStore>, cards: CardClient, config: Arc<FareConfig>) -> Self {
        Self {
            store,
            cards,
            config,
        }
    }

    /// Runs one pass at `now` and returns the trips it abandoned.
    ///
    /// A card that fails to sweep is logged and skipped so one bad card cannot stall the rest.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<Vec<Trip>, CoreError> {
        let limit = self.config.max_trip_duration();
        let candidates: Vec<_> = self
            .store
            .open_trips()
            .await?
            .into_iter()
            .filter(|(_, entered)| is_overdue(*entered, now, limit))
            .collect();
        debug!(candidates = candidates.len(), "Sweep started");

        let mut abandoned = Vec::new();
        for (card, _) in candidates {
            match self.cards.sweep_abandoned(card.clone(), now).await {
                Ok(Some(trip)) => abandoned.push(trip),
                Ok(None) => {}
                Err(e) => warn!(%card, error = %e, "Sweep failed for card"),
            }
        }
        if !abandoned.is_empty() {
            info!(count = abandoned.len(), "Abandoned trips closed");
        }
        Ok(abandoned)
    }

    /// Sweeps every `interval` until `shutdown` flips to true.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once(Utc::now()).await {
                            warn!(error = %e, "Sweep pass failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Sweeper stopped");
        })
    }
}
