//! # Entity Actor
//!
//! This module defines the `EntityActor`, the server half of the actor model. Each actor owns
//! one entity and the receiving end of its mailbox, and processes messages strictly one at a
//! time. That sequential loop is the per-entity critical section: no lock guards the entity,
//! because nothing but this task can reach it.

use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::message::ResourceRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The actor that owns a single entity.
///
/// # Lifecycle
///
/// 1. **Load**: `run()` hydrates the entity via [`ActorEntity::load`]. If the entity does not
///    exist (or cannot be loaded) the mailbox is closed and every queued request is answered
///    with an error.
/// 2. **Serve**: messages are handled in arrival order until the mailbox closes.
/// 3. **Idle eviction**: with an idle timeout set, an actor that sees no traffic closes its
///    mailbox, drains what was already queued, and exits. The registry opens a fresh actor on
///    the next request.
///
/// # Implementation Details
///
/// * **Get**: returns a clone of the entity's current state.
/// * **Action**: calls [`ActorEntity::handle_action`] with mutable access and returns its
///   result. Errors are wrapped in [`FrameworkError::Entity`].
pub struct EntityActor<T: ActorEntity> {
    id: T::Id,
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    idle_timeout: Option<Duration>,
}

impl<T: ActorEntity> EntityActor<T> {
    /// Creates a new actor for `id` and the sender side of its mailbox.
    ///
    /// # Arguments
    ///
    /// * `buffer_size` - The capacity of the mailbox. When full, senders wait for space.
    /// * `idle_timeout` - How long the actor may sit without traffic before it exits.
    pub fn new(
        id: T::Id,
        buffer_size: usize,
        idle_timeout: Option<Duration>,
    ) -> (Self, mpsc::Sender<ResourceRequest<T>>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            id,
            receiver,
            idle_timeout,
        };
        (actor, sender)
    }

    /// Runs the actor's event loop until the mailbox closes.
    pub async fn run(mut self, context: Arc<T::Context>) {
        // Extract just the type name (e.g., "CardAccount" instead of the full module path)
        let entity_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        let id = self.id.clone();
        info!(entity_type, %id, "Actor started");

        let mut entity = match T::load(&id, &context).await {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                warn!(entity_type, %id, "Not found");
                self.drain_with(|| FrameworkError::NotFound(id.to_string()))
                    .await;
                return;
            }
            Err(e) => {
                warn!(entity_type, %id, error = %e, "Load failed");
                let reason = e.to_string();
                self.drain_with(|| FrameworkError::LoadFailed(reason.clone()))
                    .await;
                return;
            }
        };

        let mut closing = false;
        let mut handled: u64 = 0;
        loop {
            let next = match (closing, self.idle_timeout) {
                (false, Some(idle)) => {
                    match tokio::time::timeout(idle, self.receiver.recv()).await {
                        Ok(msg) => msg,
                        Err(_) => {
                            debug!(entity_type, %id, "Idle, closing mailbox");
                            self.receiver.close();
                            closing = true;
                            continue;
                        }
                    }
                }
                _ => self.receiver.recv().await,
            };
            let Some(msg) = next else { break };
            handled += 1;

            match msg {
                ResourceRequest::Get { id, respond_to } => {
                    debug!(entity_type, %id, "Get");
                    let _ = respond_to.send(Ok(entity.clone()));
                }
                ResourceRequest::Action {
                    id,
                    action,
                    respond_to,
                } => {
                    debug!(entity_type, %id, ?action, "Action");
                    let result = entity
                        .handle_action(action, &context)
                        .await
                        .map_err(FrameworkError::Entity);
                    match &result {
                        Ok(_) => info!(entity_type, %id, "Action ok"),
                        Err(e) => warn!(entity_type, %id, error = %e, "Action failed"),
                    }
                    let _ = respond_to.send(result);
                }
            }
        }

        entity.on_stop(&context).await;
        info!(entity_type, %id, handled, "Shutdown");
    }

    async fn drain_with(&mut self, error: impl Fn() -> FrameworkError<T::Error>) {
        self.receiver.close();
        while let Some(msg) = self.receiver.recv().await {
            msg.reject(&error);
        }
    }
}
