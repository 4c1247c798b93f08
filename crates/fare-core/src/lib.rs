//! # Fare Core
//!
//! Transaction and trip-lifecycle engine behind the metro dashboard. It keeps a stored-value
//! ledger consistent while station gates report taps concurrently, turns each card's taps into
//! trips, prices them, and records every balance change as an append-only transaction.
//!
//! ## Core Components
//!
//! - **[card_actor]**: one actor per card; the only writer of a card's balance, status and trip
//! - **[trip]**: the entry/exit decision for a tap
//! - **[fare]**: fare rule table and fare computation
//! - **[ledger]**: credit, debit and blocking rules
//! - **[txlog]**: read side of the transaction log
//! - **[intake]**: gate event entry point
//! - **[sweep]**: background closing of abandoned trips
//! - **[store]**: versioned persistence boundary and its in-memory implementation
//! - **[lifecycle]**: wiring, issuance and shutdown ([`FareSystem`](lifecycle::FareSystem))
//! - **[api]**: dashboard request handlers
//!
//! ## Invariants
//!
//! - The signed sum of a card's transactions equals its balance.
//! - A card has at most one ongoing trip.
//! - A balance change and its transaction are stored in the same commit, or neither is.

pub mod api;
pub mod card_actor;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod error;
pub mod fare;
pub mod intake;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod money;
pub mod store;
pub mod sweep;
pub mod trip;
pub mod txlog;

pub use error::{CoreError, ErrorKind};
pub use money::Money;
