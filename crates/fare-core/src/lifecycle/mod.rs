//! # System Lifecycle & Orchestration
//!
//! Wires the fare core together and owns its runtime resources.
//!
//! ## Wiring
//!
//! Card actors are not spawned up front. [`FareSystem::new`] builds one shared
//! [`CardContext`](crate::card_actor::CardContext) and an actor registry over it; the first
//! request for a card opens that card's actor, which loads the card from the store. Idle
//! actors close after `actor_idle_secs` and are reopened on demand.
//!
//! ```text
//!   GateIntake ──┐
//!   DashboardApi ├──> CardClient ──> ActorRegistry ──> card actor (one per card)
//!   Sweeper ─────┘                                         │
//!                                                          v
//!                                   LedgerStore <── commit (card + transaction + trip)
//! ```
//!
//! ## Graceful Shutdown
//!
//! 1. **Stop the sweeper** - no new sweep actions are sent
//! 2. **Close mailboxes** - the registry stops accepting requests
//! 3. **Drain** - each card actor finishes what was already queued, then exits
//! 4. **Await completion** - shutdown returns once every actor task has ended
//!
//! Messages accepted before shutdown are never dropped.
//!
//! ## Observability
//!
//! [`setup_tracing`] initializes structured logging; see the [`tracing`] module.

pub mod fare_system;
pub mod tracing;

pub use self::fare_system::*;
pub use self::tracing::setup_tracing;
