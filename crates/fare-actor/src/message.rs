//! # Generic Messages
//!
//! This module defines the message types exchanged between a `ResourceClient` and the
//! `EntityActor` that owns the addressed entity.

use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by actors.
pub type Response<T, E> = oneshot::Sender<Result<T, FrameworkError<E>>>;

/// Message sent to an entity's mailbox.
///
/// The ID travels with every request even though each actor owns a single entity: it keeps
/// log lines self-describing and lets test doubles assert on the addressed entity.
#[derive(Debug)]
pub enum ResourceRequest<T: ActorEntity> {
    Get {
        id: T::Id,
        respond_to: Response<T, T::Error>,
    },
    Action {
        id: T::Id,
        action: T::Action,
        respond_to: Response<T::ActionResult, T::Error>,
    },
}

impl<T: ActorEntity> ResourceRequest<T> {
    /// Answers the request with a framework failure without touching the entity.
    pub(crate) fn reject(self, error: impl Fn() -> FrameworkError<T::Error>) {
        match self {
            ResourceRequest::Get { respond_to, .. } => {
                let _ = respond_to.send(Err(error()));
            }
            ResourceRequest::Action { respond_to, .. } => {
                let _ = respond_to.send(Err(error()));
            }
        }
    }
}
