//! [`ActorEntity`] implementation for [`CardAccount`].
//!
//! Each handler stages its changes on a copy of the card record and commits that copy, the
//! transaction and the trip in one versioned store write. Only a successful commit replaces
//! the actor's in-memory record. When the store reports a version conflict the record is
//! reloaded and the whole action runs again, up to `max_conflict_retries` times.

use super::actions::{CardAction, CardActionResult, Tap, TapOutcome, TapResult};
use super::{CardAccount, CardContext};
use crate::error::CoreError;
use crate::ledger::{self, Charge};
use crate::model::{
    BlockReason, CardNumber, CardStatus, NewTransaction, Settlement, TransactionType, Trip,
    TripExit, UnpaidReason,
};
use crate::money::Money;
use crate::store::{CardCommit, CardRecord, TapKey};
use crate::trip::{self, TapIntent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fare_actor::ActorEntity;
use tracing::{debug, info, warn};

#[async_trait]
impl ActorEntity for CardAccount {
    type Id = CardNumber;
    type Action = CardAction;
    type ActionResult = CardActionResult;
    type Context = CardContext;
    type Error = CoreError;

    async fn load(id: &CardNumber, ctx: &CardContext) -> Result<Option<Self>, CoreError> {
        let Some(record) = ctx.store.load_card(id).await? else {
            return Ok(None);
        };
        let card_type = ctx.catalog.card_type(record.card.card_type)?;
        debug!(card = %id, version = record.version, "Card loaded");
        Ok(Some(CardAccount { record, card_type }))
    }

    async fn handle_action(
        &mut self,
        action: CardAction,
        ctx: &CardContext,
    ) -> Result<CardActionResult, CoreError> {
        let retries = ctx.config.max_conflict_retries;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.apply(action.clone(), ctx).await {
                Err(CoreError::Conflict { card, .. }) => {
                    if attempt > retries {
                        return Err(CoreError::Conflict {
                            card,
                            attempts: attempt,
                        });
                    }
                    warn!(%card, attempt, "Version conflict, reloading card");
                    self.reload(ctx).await?;
                }
                other => return other,
            }
        }
    }
}

impl CardAccount {
    async fn apply(
        &mut self,
        action: CardAction,
        ctx: &CardContext,
    ) -> Result<CardActionResult, CoreError> {
        match action {
            CardAction::Tap(tap) => self.tap(tap, ctx).await.map(CardActionResult::Tap),
            CardAction::Credit {
                amount,
                kind,
                reason,
                at,
            } => self
                .credit(amount, kind, reason, at, ctx)
                .await
                .map(CardActionResult::Balance),
            CardAction::Debit { amount, reason, at } => self
                .debit(amount, reason, at, ctx)
                .await
                .map(CardActionResult::Balance),
            CardAction::Block => self.block(ctx).await.map(CardActionResult::Status),
            CardAction::Unblock => self.unblock(ctx).await.map(CardActionResult::Status),
            CardAction::SweepAbandoned { now } => {
                self.sweep(now, ctx).await.map(CardActionResult::Swept)
            }
        }
    }

    async fn reload(&mut self, ctx: &CardContext) -> Result<(), CoreError> {
        let number = self.record.card.number.clone();
        self.record = ctx
            .store
            .load_card(&number)
            .await?
            .ok_or(CoreError::UnknownCard(number))?;
        Ok(())
    }

    /// Writes `next` with its transaction and trip, then adopts it as the current record.
    async fn commit(
        &mut self,
        mut next: CardRecord,
        entry: Option<NewTransaction>,
        trip: Option<Trip>,
        ctx: &CardContext,
    ) -> Result<(), CoreError> {
        let receipt = ctx
            .store
            .commit(CardCommit {
                expected_version: self.record.version,
                record: next.clone(),
                entry,
                trip,
            })
            .await?;
        next.version = receipt.version;
        self.record = next;
        if let Some(transaction) = receipt.transaction {
            debug!(
                card = %transaction.card,
                tx = %transaction.id,
                amount = %transaction.amount,
                kind = %transaction.kind,
                "Transaction appended"
            );
        }
        Ok(())
    }

    fn number(&self) -> CardNumber {
        self.record.card.number.clone()
    }

    fn not_active(&self) -> CoreError {
        CoreError::CardNotActive {
            card: self.number(),
            status: self.record.card.status,
        }
    }

    /// Fails unless the card may be used at `at`. An expired active card is retired first.
    async fn ensure_usable(&mut self, at: DateTime<Utc>, ctx: &CardContext) -> Result<(), CoreError> {
        if self.record.card.status == CardStatus::Active && self.record.card.is_expired(at) {
            let mut next = self.record.clone();
            next.card.status = CardStatus::Inactive;
            next.card.block_reason = None;
            self.commit(next, None, None, ctx).await?;
            info!(card = %self.number(), "Card expired, now inactive");
        }
        match self.record.card.status {
            CardStatus::Active => Ok(()),
            CardStatus::Blocked | CardStatus::Inactive => Err(self.not_active()),
        }
    }

    async fn tap(&mut self, tap: Tap, ctx: &CardContext) -> Result<TapResult, CoreError> {
        let key = TapKey {
            station: tap.station,
            at: tap.at,
        };
        let window = ctx.config.duplicate_tap_window();
        if self.record.has_seen(&key) || self.record.is_stale(tap.at, window) {
            return Err(CoreError::DuplicateTap {
                card: self.number(),
                station: tap.station,
                at: tap.at,
            });
        }
        ctx.catalog.station(tap.station)?;
        self.ensure_usable(tap.at, ctx).await?;

        let open = self.record.open_trip.clone();
        let intent = trip::interpret(
            open.as_ref(),
            self.record.last_exit.as_ref(),
            tap.station,
            tap.at,
            window,
        );
        match (intent, open) {
            (TapIntent::Exit { same_station, .. }, Some(trip)) => {
                self.exit(trip, key, same_station, ctx).await
            }
            (TapIntent::Entry, _) | (TapIntent::Exit { .. }, None) => self.enter(key, ctx).await,
            (TapIntent::ExitBeforeEntry { trip }, _) => Err(CoreError::TapBeforeEntry {
                card: self.number(),
                trip,
                at: tap.at,
            }),
            (TapIntent::DuplicateExit, _) => Err(CoreError::DuplicateExit {
                card: self.number(),
                station: tap.station,
            }),
        }
    }

    async fn enter(&mut self, tap: TapKey, ctx: &CardContext) -> Result<TapResult, CoreError> {
        if let Some(open) = &self.record.open_trip {
            return Err(CoreError::GateMismatch {
                card: self.number(),
                trip: open.id,
            });
        }

        let id = ctx.store.allocate_trip_id().await?;
        let trip = Trip::open(id, self.number(), tap.station, tap.at);
        let mut next = self.record.clone();
        next.open_trip = Some(trip.clone());
        next.remember_tap(tap, ctx.config.recent_tap_capacity);
        self.commit(next, None, Some(trip.clone()), ctx).await?;

        info!(card = %trip.card, trip = %trip.id, station = %tap.station, "Trip started");
        Ok(TapResult {
            trip,
            outcome: TapOutcome::Entered,
        })
    }

    async fn exit(
        &mut self,
        mut trip: Trip,
        tap: TapKey,
        same_station: bool,
        ctx: &CardContext,
    ) -> Result<TapResult, CoreError> {
        let fare = if same_station {
            ctx.config.same_station_fare
        } else {
            ctx.fares
                .compute_fare(&self.card_type, trip.entry_station, tap.station)?
        };

        let mut next = self.record.clone();
        let charge = ledger::charge(&mut next.card, fare, ctx.config.overdraft_allowance);
        let (settlement, entry) = match charge {
            Charge::Free => (Settlement::Free, None),
            Charge::Debited => {
                let reason = format!("Fare {} to {}", trip.entry_station, tap.station);
                let entry = NewTransaction::debit(
                    self.number(),
                    fare,
                    TransactionType::FareDeduction,
                    tap.at,
                    reason,
                )
                .for_trip(trip.id);
                (Settlement::Charged { amount: fare }, Some(entry))
            }
            Charge::Refused { .. } => (
                Settlement::Unpaid {
                    amount: fare,
                    reason: UnpaidReason::InsufficientFunds,
                },
                None,
            ),
        };

        let exit = TripExit {
            station: tap.station,
            at: tap.at,
        };
        trip.complete(exit, settlement);
        next.open_trip = None;
        next.last_exit = Some(exit);
        next.remember_tap(tap, ctx.config.recent_tap_capacity);
        self.commit(next, entry, Some(trip.clone()), ctx).await?;

        let balance = self.record.card.balance;
        if let Charge::Refused { available } = charge {
            warn!(
                card = %trip.card,
                trip = %trip.id,
                amount = %fare,
                %available,
                "Fare unpaid, card blocked"
            );
            return Err(CoreError::InsufficientFunds {
                card: trip.card,
                requested: fare,
                available,
                trip: Some(trip.id),
            });
        }

        info!(
            card = %trip.card,
            trip = %trip.id,
            station = %tap.station,
            amount = %fare,
            %balance,
            "Trip completed"
        );
        Ok(TapResult {
            trip,
            outcome: TapOutcome::Exited { fare, balance },
        })
    }

    async fn credit(
        &mut self,
        amount: Money,
        kind: TransactionType,
        reason: String,
        at: DateTime<Utc>,
        ctx: &CardContext,
    ) -> Result<Money, CoreError> {
        let mut next = self.record.clone();
        let balance = ledger::credit(&mut next.card, amount, ctx.config.unblock_on_recharge)?;
        let reactivated = self.record.card.status != next.card.status;
        let entry = NewTransaction::credit(self.number(), amount, kind, at, reason);
        self.commit(next, Some(entry), None, ctx).await?;

        info!(card = %self.number(), %amount, %balance, reactivated, "Credited");
        Ok(balance)
    }

    async fn debit(
        &mut self,
        amount: Money,
        reason: String,
        at: DateTime<Utc>,
        ctx: &CardContext,
    ) -> Result<Money, CoreError> {
        let mut next = self.record.clone();
        let balance = ledger::debit(&mut next.card, amount, ctx.config.overdraft_allowance)?;
        let entry =
            NewTransaction::debit(self.number(), amount, TransactionType::Adjustment, at, reason);
        self.commit(next, Some(entry), None, ctx).await?;

        info!(card = %self.number(), %amount, %balance, "Debited");
        Ok(balance)
    }

    async fn block(&mut self, ctx: &CardContext) -> Result<CardStatus, CoreError> {
        match self.record.card.status {
            CardStatus::Blocked => Ok(CardStatus::Blocked),
            CardStatus::Inactive => Err(self.not_active()),
            CardStatus::Active => {
                let mut next = self.record.clone();
                next.card.block(BlockReason::Administrative);
                self.commit(next, None, None, ctx).await?;
                info!(card = %self.number(), "Card blocked");
                Ok(CardStatus::Blocked)
            }
        }
    }

    async fn unblock(&mut self, ctx: &CardContext) -> Result<CardStatus, CoreError> {
        match self.record.card.status {
            CardStatus::Active => Ok(CardStatus::Active),
            CardStatus::Inactive => Err(self.not_active()),
            CardStatus::Blocked => {
                let mut next = self.record.clone();
                next.card.activate();
                self.commit(next, None, None, ctx).await?;
                info!(card = %self.number(), "Card unblocked");
                Ok(CardStatus::Active)
            }
        }
    }

    /// Abandons the ongoing trip if it is overdue at `now`, charging the configured penalty.
    async fn sweep(&mut self, now: DateTime<Utc>, ctx: &CardContext) -> Result<Option<Trip>, CoreError> {
        let Some(mut trip) = self.record.open_trip.clone() else {
            return Ok(None);
        };
        if !trip::is_overdue(trip.entry_time, now, ctx.config.max_trip_duration()) {
            return Ok(None);
        }

        let mut next = self.record.clone();
        let (settlement, entry) = match ctx.config.abandoned_penalty {
            None => (Settlement::NotCharged, None),
            Some(penalty) => {
                match ledger::charge(&mut next.card, penalty, ctx.config.overdraft_allowance) {
                    Charge::Free => (Settlement::Free, None),
                    Charge::Debited => {
                        let entry = NewTransaction::debit(
                            self.number(),
                            penalty,
                            TransactionType::PenaltyFare,
                            now,
                            format!("Abandoned trip from {}", trip.entry_station),
                        )
                        .for_trip(trip.id);
                        (Settlement::Charged { amount: penalty }, Some(entry))
                    }
                    Charge::Refused { available } => {
                        warn!(
                            card = %trip.card,
                            trip = %trip.id,
                            amount = %penalty,
                            %available,
                            "Penalty unpaid, card blocked"
                        );
                        (
                            Settlement::Unpaid {
                                amount: penalty,
                                reason: UnpaidReason::InsufficientFunds,
                            },
                            None,
                        )
                    }
                }
            }
        };

        trip.abandon(settlement);
        next.open_trip = None;
        self.commit(next, entry, Some(trip.clone()), ctx).await?;
        info!(card = %trip.card, trip = %trip.id, "Trip abandoned");
        Ok(Some(trip))
    }
}
