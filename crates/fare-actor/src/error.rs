//! # Framework Errors
//!
//! Transport-level failures of the actor runtime, generic over the entity's own error type so
//! that domain errors cross the mailbox without being flattened into strings.

/// Errors that can occur while talking to an entity actor.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError<E: std::error::Error + 'static> {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Entity could not be loaded: {0}")]
    LoadFailed(String),
    #[error("Entity error: {0}")]
    Entity(E),
}

impl<E: std::error::Error + 'static> FrameworkError<E> {
    /// Returns the entity error, if this failure came from the entity itself.
    pub fn into_entity(self) -> Option<E> {
        match self {
            FrameworkError::Entity(e) => Some(e),
            _ => None,
        }
    }
}
