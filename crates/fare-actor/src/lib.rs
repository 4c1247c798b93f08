//! # Fare Actor
//!
//! Keyed actor runtime used by the fare core to give every fare card its own critical
//! section. It follows the **Actor Model**: one Tokio task per entity, a mailbox in front of
//! it, and sequential processing inside it.
//!
//! ## Why one actor per entity?
//!
//! - **Isolation**: an entity's state is owned by exactly one task, so no lock guards it.
//! - **Ordering**: messages for one entity are handled in the order their senders enqueued them.
//! - **Independence**: entities with different IDs never share a task and never wait on
//!   each other.
//!
//! ## Architecture Overview
//!
//! 1. **Entity Layer** ([`ActorEntity`]) - hydration and action handling for one entity
//! 2. **Runtime Layer** ([`EntityActor`], [`ActorRegistry`]) - mailboxes, lazy spawning,
//!    idle eviction, shutdown
//! 3. **Interface Layer** ([`ResourceClient`], [`ActorClient`]) - type-safe requests by ID
//!
//! ```rust
//! use fare_actor::{ActorEntity, ActorRegistry, RegistryConfig};
//! use async_trait::async_trait;
//!
//! #[derive(Clone, Debug)]
//! struct Counter { id: u32, value: u64 }
//!
//! #[derive(Debug)] enum CounterAction { Add(u64) }
//! #[derive(Debug)] struct CounterError;
//! impl std::fmt::Display for CounterError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "counter") }
//! }
//! impl std::error::Error for CounterError {}
//!
//! #[async_trait]
//! impl ActorEntity for Counter {
//!     type Id = u32;
//!     type Action = CounterAction;
//!     type ActionResult = u64;
//!     type Context = ();
//!     type Error = CounterError;
//!
//!     async fn load(id: &u32, _: &()) -> Result<Option<Self>, CounterError> {
//!         Ok(Some(Self { id: *id, value: 0 }))
//!     }
//!
//!     async fn handle_action(&mut self, action: CounterAction, _: &()) -> Result<u64, CounterError> {
//!         let CounterAction::Add(n) = action;
//!         self.value += n;
//!         Ok(self.value)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (registry, client) = ActorRegistry::<Counter>::new(RegistryConfig::default(), ());
//!     assert_eq!(client.perform_action(1, CounterAction::Add(2)).await.unwrap(), 2);
//!     assert_eq!(client.perform_action(1, CounterAction::Add(3)).await.unwrap(), 5);
//!     assert_eq!(client.perform_action(2, CounterAction::Add(1)).await.unwrap(), 1);
//!     registry.shutdown().await.unwrap();
//! }
//! ```
//!
//! ## Testing
//!
//! The [`mock`] module provides a `MockClient` that answers requests from a queue of
//! expectations, for testing client wrappers without live actors.

pub mod actor;
pub mod client;
pub mod client_trait;
pub mod entity;
pub mod error;
pub mod message;
pub mod mock;
pub mod registry;

// Re-export core types for convenience
pub use actor::EntityActor;
pub use client::ResourceClient;
pub use client_trait::ActorClient;
pub use entity::ActorEntity;
pub use error::FrameworkError;
pub use message::{ResourceRequest, Response};
pub use registry::{ActorRegistry, RegistryConfig};
