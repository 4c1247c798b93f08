//! # Dashboard API
//!
//! Transport-agnostic request handlers for the metro dashboard. Each method takes the
//! request body an HTTP route would receive and returns either the response body or an
//! [`ApiError`] carrying a stable machine-readable code and the HTTP status to send.
//!
//! Field names follow the dashboard's existing JSON: PascalCase for listings
//! (`TripID`, `FareAmount`, ...) and camelCase for gate events (`cardNumber`, `stationId`).

use crate::card_actor::TapOutcome;
use crate::error::{CoreError, ErrorKind};
use crate::lifecycle::FareSystem;
use crate::model::{
    Card, CardNumber, CardStatus, FareKey, FareRule, FareRuleId, StationId, Transaction,
    TransactionId, TransactionType, Trip, TripId,
};
use crate::money::Money;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The addressed card, station or rule does not exist.
    NotFound,
    /// The card's state does not allow the operation.
    InvalidState,
    /// A fare or debit exceeded the card's balance.
    InsufficientFunds,
    /// No fare rule covers the trip.
    NoFareRule,
    /// The operation collided with existing data or a concurrent update.
    Conflict,
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// Storage or the card's actor could not be reached.
    Unavailable,
}

impl ErrorCode {
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::InvalidState | ErrorCode::Conflict => 409,
            ErrorCode::InsufficientFunds => 402,
            ErrorCode::NoFareRule => 422,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Unavailable => 503,
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::InvalidState => ErrorCode::InvalidState,
            ErrorKind::InsufficientFunds => ErrorCode::InsufficientFunds,
            ErrorKind::NoFareRule => ErrorCode::NoFareRule,
            ErrorKind::Conflict => ErrorCode::Conflict,
            ErrorKind::InvalidInput => ErrorCode::InvalidRequest,
            ErrorKind::Unavailable => ErrorCode::Unavailable,
        }
    }
}

/// Error body returned by every handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    /// The trip left unpaid by a refused fare, if any.
    #[serde(rename = "tripId", skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<TripId>,
    #[serde(skip)]
    pub status: u16,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trip_id: None,
            status: code.http_status(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let trip_id = match &e {
            CoreError::InsufficientFunds { trip, .. } => *trip,
            _ => None,
        };
        ApiError {
            trip_id,
            ..ApiError::new(e.kind().into(), e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateEventRequest {
    pub card_number: String,
    pub station_id: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TapEvent {
    Entry,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TapResponse {
    pub trip_id: TripId,
    pub event: TapEvent,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fare: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TripView {
    #[serde(rename = "TripID")]
    pub trip_id: TripId,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub fare_amount: Option<Money>,
    pub card_number: CardNumber,
    #[serde(rename = "EntryStationID")]
    pub entry_station_id: StationId,
    pub entry_station: Option<String>,
    #[serde(rename = "ExitStationID")]
    pub exit_station_id: Option<StationId>,
    pub exit_station: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionView {
    #[serde(rename = "TransactionID")]
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub transaction_date: DateTime<Utc>,
    pub card_number: CardNumber,
    #[serde(rename = "TripID")]
    pub trip_id: Option<TripId>,
    pub description: String,
}

impl From<Transaction> for TransactionView {
    fn from(tx: Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            transaction_type: tx.kind,
            amount: tx.amount,
            transaction_date: tx.at,
            card_number: tx.card,
            trip_id: tx.trip,
            description: tx.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CardView {
    pub card_number: CardNumber,
    pub card_type: Option<String>,
    pub balance: Money,
    pub status: CardStatus,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CardStatusView {
    pub card_number: CardNumber,
    pub status: CardStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RechargeRequest {
    pub card_number: String,
    pub amount: Money,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BalanceView {
    pub card_number: CardNumber,
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FareRuleView {
    #[serde(rename = "FareRuleID")]
    pub fare_rule_id: FareRuleId,
    #[serde(rename = "StartStationID")]
    pub start_station_id: Option<StationId>,
    #[serde(rename = "EndStationID")]
    pub end_station_id: Option<StationId>,
    pub fare_type: Option<String>,
    pub fare_amount: Money,
}

impl From<FareRule> for FareRuleView {
    fn from(rule: FareRule) -> Self {
        let (start, end, fare_type) = match rule.key {
            FareKey::Route { start, end } => (Some(start), Some(end), None),
            FareKey::FareType(name) => (None, None, Some(name)),
        };
        Self {
            fare_rule_id: rule.id,
            start_station_id: start,
            end_station_id: end,
            fare_type,
            fare_amount: rule.amount,
        }
    }
}

/// Body of a fare rule creation. Either both station IDs or a fare type must be given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FareRuleRequest {
    #[serde(rename = "StartStationID", default)]
    pub start_station_id: Option<u32>,
    #[serde(rename = "EndStationID", default)]
    pub end_station_id: Option<u32>,
    #[serde(default)]
    pub fare_type: Option<String>,
    pub fare_amount: Money,
}

impl FareRuleRequest {
    fn key(&self) -> Result<FareKey, ApiError> {
        match (self.start_station_id, self.end_station_id, &self.fare_type) {
            (Some(start), Some(end), None) => Ok(FareKey::Route {
                start: StationId(start),
                end: StationId(end),
            }),
            (None, None, Some(name)) if !name.trim().is_empty() => {
                Ok(FareKey::FareType(name.trim().to_string()))
            }
            _ => Err(ApiError::new(
                ErrorCode::InvalidRequest,
                "a fare rule needs both StartStationID and EndStationID, or a FareType",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FareRuleUpdate {
    pub fare_amount: Money,
}

/// Request handlers over a running [`FareSystem`].
pub struct DashboardApi<'a> {
    system: &'a FareSystem,
}

impl<'a> DashboardApi<'a> {
    pub fn new(system: &'a FareSystem) -> Self {
        Self { system }
    }

    fn station_name(&self, id: StationId) -> Option<String> {
        self.system.catalog().station(id).ok().map(|station| station.name)
    }

    fn trip_view(&self, trip: Trip) -> TripView {
        let exit_station_id = trip.exit.map(|exit| exit.station);
        TripView {
            trip_id: trip.id,
            entry_time: trip.entry_time,
            exit_time: trip.exit.map(|exit| exit.at),
            fare_amount: trip.fare_amount(),
            entry_station: self.station_name(trip.entry_station),
            entry_station_id: trip.entry_station,
            exit_station: exit_station_id.and_then(|id| self.station_name(id)),
            exit_station_id,
            status: trip.status.label().to_string(),
            card_number: trip.card,
        }
    }

    fn card_view(&self, card: Card) -> CardView {
        CardView {
            card_type: self
                .system
                .catalog()
                .card_type(card.card_type)
                .ok()
                .map(|card_type| card_type.name),
            card_number: card.number,
            balance: card.balance,
            status: card.status,
            issue_date: card.issued_on,
            expiry_date: card.expires_on,
        }
    }

    /// `POST /gate-events`
    #[instrument(skip(self))]
    pub async fn post_gate_event(&self, request: GateEventRequest) -> Result<TapResponse, ApiError> {
        let result = self
            .system
            .intake()
            .handle_tap(
                CardNumber(request.card_number),
                StationId(request.station_id),
                request.timestamp,
            )
            .await?;
        let (event, fare, balance) = match result.outcome {
            TapOutcome::Entered => (TapEvent::Entry, None, None),
            TapOutcome::Exited { fare, balance } => (TapEvent::Exit, Some(fare), Some(balance)),
        };
        Ok(TapResponse {
            trip_id: result.trip.id,
            event,
            status: result.trip.status.label().to_string(),
            fare,
            balance,
        })
    }

    /// `GET /trips`, most recent first.
    pub async fn get_trips(&self) -> Result<Vec<TripView>, ApiError> {
        let trips = self.system.trips().await?;
        debug!(count = trips.len(), "Fetched trips");
        Ok(trips.into_iter().map(|trip| self.trip_view(trip)).collect())
    }

    /// `GET /transactions`, most recent first.
    pub async fn get_transactions(&self) -> Result<Vec<TransactionView>, ApiError> {
        let all = self.system.transactions().list_all().await?;
        debug!(count = all.len(), "Fetched transactions");
        Ok(all.into_iter().map(TransactionView::from).collect())
    }

    /// `GET /cards`
    pub async fn get_cards(&self) -> Result<Vec<CardView>, ApiError> {
        let cards = self.system.list_cards().await?;
        Ok(cards.into_iter().map(|card| self.card_view(card)).collect())
    }

    /// `POST /cards/{number}/block`
    #[instrument(skip(self))]
    pub async fn block_card(&self, card_number: &str) -> Result<CardStatusView, ApiError> {
        let card = CardNumber::from(card_number);
        let status = self.system.cards().block(card.clone()).await?;
        Ok(CardStatusView {
            card_number: card,
            status,
        })
    }

    /// `POST /cards/{number}/unblock`
    #[instrument(skip(self))]
    pub async fn unblock_card(&self, card_number: &str) -> Result<CardStatusView, ApiError> {
        let card = CardNumber::from(card_number);
        let status = self.system.cards().unblock(card.clone()).await?;
        Ok(CardStatusView {
            card_number: card,
            status,
        })
    }

    /// `POST /cards/recharge`
    #[instrument(skip(self))]
    pub async fn recharge(&self, request: RechargeRequest) -> Result<BalanceView, ApiError> {
        let card = CardNumber(request.card_number);
        let at = request.timestamp.unwrap_or_else(Utc::now);
        let balance = self
            .system
            .cards()
            .recharge(card.clone(), request.amount, at)
            .await?;
        Ok(BalanceView {
            card_number: card,
            balance,
        })
    }

    /// `GET /fare-rules`
    pub fn list_fare_rules(&self) -> Vec<FareRuleView> {
        self.system
            .fares()
            .list()
            .into_iter()
            .map(FareRuleView::from)
            .collect()
    }

    /// `POST /fare-rules`
    #[instrument(skip(self))]
    pub fn create_fare_rule(&self, request: FareRuleRequest) -> Result<FareRuleView, ApiError> {
        let key = request.key()?;
        let rule = self
            .system
            .fares()
            .insert(key, request.fare_amount)
            .map_err(CoreError::from)?;
        Ok(rule.into())
    }

    /// `PUT /fare-rules/{id}`
    #[instrument(skip(self))]
    pub fn update_fare_rule(
        &self,
        id: u32,
        update: FareRuleUpdate,
    ) -> Result<FareRuleView, ApiError> {
        let rule = self
            .system
            .fares()
            .update_amount(FareRuleId(id), update.fare_amount)
            .map_err(CoreError::from)?;
        Ok(rule.into())
    }

    /// `DELETE /fare-rules/{id}`
    #[instrument(skip(self))]
    pub fn delete_fare_rule(&self, id: u32) -> Result<FareRuleView, ApiError> {
        let rule = self
            .system
            .fares()
            .remove(FareRuleId(id))
            .map_err(CoreError::from)?;
        Ok(rule.into())
    }
}
