//! # ActorClient Trait
//!
//! Provides a common interface for entity-specific clients, adding a default `get` built on
//! top of the generic `ResourceClient` and a single place to translate framework failures into
//! the domain's error type.
use crate::{ActorEntity, FrameworkError, ResourceClient};
use async_trait::async_trait;

/// Trait for entity-specific clients to inherit the standard read operation.
#[async_trait]
pub trait ActorClient<T: ActorEntity>: Send + Sync {
    /// The entity-specific error type.
    type Error: Send + Sync;

    /// Access the inner generic ResourceClient.
    fn inner(&self) -> &ResourceClient<T>;

    /// Map framework errors to the specific error type.
    fn map_error(e: FrameworkError<T::Error>) -> Self::Error;

    /// Fetch a snapshot of an entity by ID.
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: T::Id) -> Result<T, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().get(id).await.map_err(Self::map_error)
    }
}
