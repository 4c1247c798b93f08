//! # Card Client
//!
//! Provides a high-level API for talking to card actors. It wraps a
//! `ResourceClient<CardAccount>` and turns action results back into domain return values.
use crate::card_actor::{CardAccount, CardAction, CardActionResult, Tap, TapResult};
use crate::error::CoreError;
use crate::model::{Card, CardNumber, CardStatus, StationId, TransactionType, Trip};
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fare_actor::{ActorClient, FrameworkError, ResourceClient};
use tracing::{debug, instrument};

/// Client for card actors, addressed by card number.
#[derive(Clone)]
pub struct CardClient {
    inner: ResourceClient<CardAccount>,
}

impl CardClient {
    pub fn new(inner: ResourceClient<CardAccount>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ActorClient<CardAccount> for CardClient {
    type Error = CoreError;

    fn inner(&self) -> &ResourceClient<CardAccount> {
        &self.inner
    }

    fn map_error(e: FrameworkError<CoreError>) -> CoreError {
        match e {
            FrameworkError::Entity(e) => e,
            FrameworkError::NotFound(number) => CoreError::UnknownCard(CardNumber(number)),
            FrameworkError::LoadFailed(reason) => CoreError::Unavailable(reason),
            FrameworkError::ActorClosed | FrameworkError::ActorDropped => {
                CoreError::Unavailable(e.to_string())
            }
        }
    }
}

impl CardClient {
    async fn act(&self, card: CardNumber, action: CardAction) -> Result<CardActionResult, CoreError> {
        self.inner
            .perform_action(card, action)
            .await
            .map_err(Self::map_error)
    }

    /// Current state of a card.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, card: CardNumber) -> Result<Card, CoreError> {
        debug!("Sending request");
        self.get(card).await.map(|account| account.record.card)
    }

    /// Processes a gate tap for the card.
    #[instrument(skip(self))]
    pub async fn tap(
        &self,
        card: CardNumber,
        station: StationId,
        at: DateTime<Utc>,
    ) -> Result<TapResult, CoreError> {
        debug!("Sending tap");
        match self.act(card, CardAction::Tap(Tap { station, at })).await? {
            CardActionResult::Tap(result) => Ok(result),
            _ => unreachable!("Tap action must return Tap result"),
        }
    }

    /// Adds value to a card and returns the new balance.
    #[instrument(skip(self, reason))]
    pub async fn credit(
        &self,
        card: CardNumber,
        amount: Money,
        kind: TransactionType,
        reason: impl Into<String> + Send,
        at: DateTime<Utc>,
    ) -> Result<Money, CoreError> {
        let action = CardAction::Credit {
            amount,
            kind,
            reason: reason.into(),
            at,
        };
        match self.act(card, action).await? {
            CardActionResult::Balance(balance) => Ok(balance),
            _ => unreachable!("Credit action must return Balance result"),
        }
    }

    /// Recharge at a ticket machine or counter.
    pub async fn recharge(
        &self,
        card: CardNumber,
        amount: Money,
        at: DateTime<Utc>,
    ) -> Result<Money, CoreError> {
        self.credit(card, amount, TransactionType::Recharge, "Recharge", at)
            .await
    }

    /// Administrative debit, recorded as an adjustment.
    #[instrument(skip(self, reason))]
    pub async fn debit(
        &self,
        card: CardNumber,
        amount: Money,
        reason: impl Into<String> + Send,
        at: DateTime<Utc>,
    ) -> Result<Money, CoreError> {
        let action = CardAction::Debit {
            amount,
            reason: reason.into(),
            at,
        };
        match self.act(card, action).await? {
            CardActionResult::Balance(balance) => Ok(balance),
            _ => unreachable!("Debit action must return Balance result"),
        }
    }

    #[instrument(skip(self))]
    pub async fn block(&self, card: CardNumber) -> Result<CardStatus, CoreError> {
        match self.act(card, CardAction::Block).await? {
            CardActionResult::Status(status) => Ok(status),
            _ => unreachable!("Block action must return Status result"),
        }
    }

    #[instrument(skip(self))]
    pub async fn unblock(&self, card: CardNumber) -> Result<CardStatus, CoreError> {
        match self.act(card, CardAction::Unblock).await? {
            CardActionResult::Status(status) => Ok(status),
            _ => unreachable!("Unblock action must return Status result"),
        }
    }

    /// Abandons the card's ongoing trip if it is overdue at `now`.
    #[instrument(skip(self))]
    pub async fn sweep_abandoned(
        &self,
        card: CardNumber,
        now: DateTime<Utc>,
    ) -> Result<Option<Trip>, CoreError> {
        match self.act(card, CardAction::SweepAbandoned { now }).await? {
            CardActionResult::Swept(trip) => Ok(trip),
            _ => unreachable!("SweepAbandoned action must return Swept result"),
        }
    }
}
