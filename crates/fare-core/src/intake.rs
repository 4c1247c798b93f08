//! # Gate Event Intake
//!
//! Single entry point for taps reported by station gates. The intake rejects stations the
//! catalog does not know before anything reaches the card, then hands the tap to the card's
//! actor, which serializes it with every other operation on that card.

use crate::card_actor::TapResult;
use crate::catalog::Catalog;
use crate::clients::CardClient;
use crate::error::CoreError;
use crate::model::{CardNumber, StationId};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct GateIntake {
    catalog: Arc<dyn Catalog>,
    cards: CardClient,
}

impl GateIntake {
    pub fn new(catalog: Arc<dyn Catalog>, cards: CardClient) -> Self {
        Self { catalog, cards }
    }

    /// Processes one tap.
    ///
    /// Returns the trip as it stands after the tap and, for an exit, the fare charged and the
    /// remaining balance. A fare that could not be paid is reported as
    /// [`CoreError::InsufficientFunds`] even though the trip was closed and the card blocked.
    #[instrument(skip_all, fields(card = %card, station = %station))]
    pub async fn handle_tap(
        &self,
        card: CardNumber,
        station: StationId,
        at: DateTime<Utc>,
    ) -> Result<TapResult, CoreError> {
        self.catalog.station(station)?;
        match self.cards.tap(card, station, at).await {
            Ok(result) => {
                info!(trip = %result.trip.id, status = result.trip.status.label(), "Tap processed");
                Ok(result)
            }
            Err(e) => {
                warn!(error = %e, kind = ?e.kind(), "Tap rejected");
                Err(e)
            }
        }
    }
}
