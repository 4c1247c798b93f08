//! # Card Actor
//!
//! One actor per fare card. The actor owns the card's record and is the only writer of it,
//! so taps, recharges, administrative commands and sweeps for one card are applied strictly
//! one after another while different cards proceed in parallel.
//!
//! ## Structure
//!
//! - [`entity`] - [`ActorEntity`](fare_actor::ActorEntity) implementation for [`CardAccount`]
//! - [`actions`] - [`CardAction`] and [`CardActionResult`]
//! - [`new()`] - Factory that creates the registry and its client
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (registry, client) = card_actor::new(context, &config);
//! let cards = CardClient::new(client);
//! let result = cards.tap(number, Tap { station, at }).await?;
//! ```

pub mod actions;
pub mod entity;

pub use actions::*;

use crate::catalog::Catalog;
use crate::config::FareConfig;
use crate::fare::FareRuleTable;
use crate::model::CardType;
use crate::store::{CardRecord, LedgerStore};
use fare_actor::{ActorRegistry, RegistryConfig, ResourceClient};
use std::sync::Arc;

/// The in-memory state of one card actor: the stored record and the card's type, resolved
/// once when the actor loads.
#[derive(Debug, Clone)]
pub struct CardAccount {
    pub record: CardRecord,
    pub card_type: CardType,
}

/// Dependencies shared by every card actor.
#[derive(Clone)]
pub struct CardContext {
    pub store: Arc<dyn LedgerStore>,
    pub catalog: Arc<dyn Catalog>,
    pub fares: Arc<FareRuleTable>,
    pub config: Arc<FareConfig>,
}

/// Creates the card actor registry and a client routed through it.
pub fn new(
    context: CardContext,
    config: &FareConfig,
) -> (Arc<ActorRegistry<CardAccount>>, ResourceClient<CardAccount>) {
    let registry_config = RegistryConfig {
        buffer_size: config.mailbox_capacity,
        idle_timeout: config.actor_idle_timeout(),
    };
    ActorRegistry::new(registry_config, context)
}
