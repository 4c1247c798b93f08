//! # Catalog
//!
//! Read-only lookup of card types and stations. Maintaining these records is outside the
//! fare core; it only needs to resolve IDs, and an ID that does not resolve is `NotFound`.

use crate::error::CoreError;
use crate::model::{CardType, CardTypeId, Station, StationId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

pub trait Catalog: Send + Sync {
    fn card_type(&self, id: CardTypeId) -> Result<CardType, CoreError>;

    fn station(&self, id: StationId) -> Result<Station, CoreError>;

    fn card_types(&self) -> Vec<CardType>;

    fn stations(&self) -> Vec<Station>;
}

/// In-memory catalog, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    card_types: BTreeMap<CardTypeId, CardType>,
    stations: BTreeMap<StationId, Station>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_card_type(mut self, card_type: CardType) -> Self {
        self.card_types.insert(card_type.id, card_type);
        self
    }

    pub fn with_station(mut self, station: Station) -> Self {
        self.stations.insert(station.id, station);
        self
    }

    /// The card types and stations the metro dashboard ships with.
    pub fn metro_defaults() -> Self {
        Self::new()
            .with_card_type(CardType::new(1, "Regular", Decimal::ONE, "Standard fare card"))
            .with_card_type(CardType::new(
                2,
                "Student",
                Decimal::new(5, 1),
                "Discounted fare for students",
            ))
            .with_card_type(CardType::new(
                3,
                "Senior",
                Decimal::new(7, 1),
                "Discounted fare for senior citizens",
            ))
            .with_card_type(CardType::new(
                4,
                "Monthly",
                Decimal::new(9, 1),
                "Monthly subscription card",
            ))
            .with_station(Station::new(1, "Central Station", "Blue"))
            .with_station(Station::new(2, "Downtown", "Blue"))
            .with_station(Station::new(3, "University", "Red"))
            .with_station(Station::new(4, "City Park", "Green"))
            .with_station(Station::new(5, "Terminal", "Red"))
    }
}

impl Catalog for MemoryCatalog {
    fn card_type(&self, id: CardTypeId) -> Result<CardType, CoreError> {
        self.card_types
            .get(&id)
            .cloned()
            .ok_or(CoreError::UnknownCardType(id))
    }

    fn station(&self, id: StationId) -> Result<Station, CoreError> {
        self.stations
            .get(&id)
            .cloned()
            .ok_or(CoreError::UnknownStation(id))
    }

    fn card_types(&self) -> Vec<CardType> {
        self.card_types.values().cloned().collect()
    }

    fn stations(&self) -> Vec<Station> {
        self.stations.values().cloned().collect()
    }
}
