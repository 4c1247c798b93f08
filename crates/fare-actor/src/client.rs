//! # Generic Client
//!
//! This module defines the generic client for communicating with entity actors.

use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::message::ResourceRequest;
use crate::registry::ActorRegistry;
use std::sync::Arc;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
enum Route<T: ActorEntity> {
    Registry(Arc<ActorRegistry<T>>),
    Channel(mpsc::Sender<ResourceRequest<T>>),
}

/// ## ResourceClient
///
/// The `ResourceClient<T>` provides a type-safe, async API for addressing entities by ID. In
/// production it routes through an [`ActorRegistry`], which opens one actor per entity; in
/// tests it can be bound to a bare channel (see [`crate::mock`]).
///
/// * **Cloneable** – holds only an `Arc` or a sender, so cloning is inexpensive.
/// * **Async API** – all methods resolve to `Result<…, FrameworkError<T::Error>>`.
#[derive(Clone)]
pub struct ResourceClient<T: ActorEntity> {
    route: Route<T>,
}

impl<T: ActorEntity> ResourceClient<T> {
    /// Binds a client to a single channel. Every request goes to the same receiver.
    pub fn new(sender: mpsc::Sender<ResourceRequest<T>>) -> Self {
        Self {
            route: Route::Channel(sender),
        }
    }

    /// Binds a client to a registry that opens one actor per entity ID.
    pub fn from_registry(registry: Arc<ActorRegistry<T>>) -> Self {
        Self {
            route: Route::Registry(registry),
        }
    }

    pub async fn get(&self, id: T::Id) -> Result<T, FrameworkError<T::Error>> {
        let (respond_to, response) = oneshot::channel();
        self.dispatch(&id.clone(), ResourceRequest::Get { id, respond_to })
            .await?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    pub async fn perform_action(
        &self,
        id: T::Id,
        action: T::Action,
    ) -> Result<T::ActionResult, FrameworkError<T::Error>> {
        let (respond_to, response) = oneshot::channel();
        self.dispatch(
            &id.clone(),
            ResourceRequest::Action {
                id,
                action,
                respond_to,
            },
        )
        .await?;
        response.await.map_err(|_| FrameworkError::ActorDropped)?
    }

    async fn dispatch(
        &self,
        id: &T::Id,
        mut request: ResourceRequest<T>,
    ) -> Result<(), FrameworkError<T::Error>> {
        match &self.route {
            Route::Channel(sender) => sender
                .send(request)
                .await
                .map_err(|_| FrameworkError::ActorClosed),
            Route::Registry(registry) => {
                // A mailbox can close between lookup and send; the second lookup opens a new one.
                for _ in 0..2 {
                    let sender = registry.sender_for(id)?;
                    match sender.send(request).await {
                        Ok(()) => return Ok(()),
                        Err(SendError(returned)) => request = returned,
                    }
                }
                Err(FrameworkError::ActorClosed)
            }
        }
    }
}
