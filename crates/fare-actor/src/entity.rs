//! # ActorEntity Trait
//!
//! The `ActorEntity` trait defines the contract that every keyed resource (a fare card, for
//! instance) must implement to be owned by an [`EntityActor`](crate::EntityActor). It names the
//! associated types for IDs, actions, context, and errors, and provides the two hooks the
//! runtime drives: [`load`](ActorEntity::load) when a mailbox is opened and
//! [`handle_action`](ActorEntity::handle_action) for every message.
//!
//! # Architecture Note
//! One actor owns exactly one entity. The entity is hydrated from its backing store when the
//! actor starts and every state change flows through `handle_action`, so all mutations of a
//! given entity are applied one at a time in arrival order. Entities with different IDs live
//! in different actors and never wait on each other.
//!
//! # Provided Methods (Hooks)
//! - [`ActorEntity::on_stop`]
//!
//! You do **not** need to implement `on_stop` unless the entity holds something that must be
//! released when its mailbox closes. The default implementation does nothing.

use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait that any keyed entity must implement to be managed by an `EntityActor`.
///
/// # Async & Context
/// This trait is `#[async_trait]` so hooks can await storage or other actors. The `Context`
/// type is shared by every actor of the same entity type and injected into each hook, which
/// keeps dependencies (stores, lookup tables, configuration) out of the entity itself.
#[async_trait]
pub trait ActorEntity: Clone + Send + Sync + 'static {
    /// The unique identifier that routes messages to this entity's mailbox.
    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug + 'static;

    /// Enum representing entity-specific operations.
    type Action: Send + Sync + Debug;

    /// The result type returned by actions.
    type ActionResult: Send + Sync + Debug;

    /// Shared runtime dependencies, handed to every actor as an `Arc`.
    type Context: Send + Sync + 'static;

    /// The error type for this entity.
    ///
    /// # Design Note: Error Granularity
    ///
    /// The framework uses one error type per entity rather than one per action. Clients deal
    /// with a single enum and pattern match on the variants they care about.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Hydrate the entity from its backing store.
    ///
    /// Returns `Ok(None)` when no entity with this ID exists; the actor then answers every
    /// queued request with `FrameworkError::NotFound` and exits.
    async fn load(id: &Self::Id, ctx: &Self::Context) -> Result<Option<Self>, Self::Error>;

    /// Handle an entity-specific action.
    async fn handle_action(
        &mut self,
        action: Self::Action,
        ctx: &Self::Context,
    ) -> Result<Self::ActionResult, Self::Error>;

    /// Called once after the mailbox has drained, right before the actor task ends.
    async fn on_stop(&self, _ctx: &Self::Context) {}
}
