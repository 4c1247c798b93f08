//! # Actor Registry
//!
//! The registry maps entity IDs to live mailboxes and opens a new [`EntityActor`] the first
//! time an ID is addressed. It is the only shared structure on the request path and is held
//! just long enough to clone a sender, never while a message is being handled.

use crate::actor::EntityActor;
use crate::client::ResourceClient;
use crate::entity::ActorEntity;
use crate::error::FrameworkError;
use crate::message::ResourceRequest;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Mailbox settings shared by every actor the registry opens.
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// Capacity of each entity's mailbox.
    pub buffer_size: usize,
    /// Idle period after which an actor closes its mailbox. `None` keeps actors forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            buffer_size: 32,
            idle_timeout: None,
        }
    }
}

struct Mailbox<T: ActorEntity> {
    sender: mpsc::Sender<ResourceRequest<T>>,
    handle: JoinHandle<()>,
}

/// Routes requests to one actor per entity ID.
///
/// # Ordering Across Restarts
///
/// When an actor has closed its mailbox (idle eviction, or an ID that did not exist) the next
/// request opens a replacement. The replacement waits for the previous task to finish before
/// loading, so messages accepted by the old mailbox are always handled before any message
/// accepted by the new one.
pub struct ActorRegistry<T: ActorEntity> {
    mailboxes: RwLock<HashMap<T::Id, Mailbox<T>>>,
    context: Arc<T::Context>,
    config: RegistryConfig,
    closed: AtomicBool,
}

impl<T: ActorEntity> ActorRegistry<T> {
    /// Creates a registry and a client routed through it.
    pub fn new(config: RegistryConfig, context: T::Context) -> (Arc<Self>, ResourceClient<T>) {
        let registry = Arc::new(Self {
            mailboxes: RwLock::new(HashMap::new()),
            context: Arc::new(context),
            config,
            closed: AtomicBool::new(false),
        });
        let client = ResourceClient::from_registry(registry.clone());
        (registry, client)
    }

    /// The context shared by every actor of this registry.
    pub fn context(&self) -> &Arc<T::Context> {
        &self.context
    }

    /// Number of mailboxes currently accepting messages.
    pub fn live_actors(&self) -> usize {
        self.mailboxes
            .read()
            .map(|boxes| boxes.values().filter(|m| !m.sender.is_closed()).count())
            .unwrap_or(0)
    }

    /// Number of mailboxes the registry still tracks, including closed ones not yet pruned.
    pub fn tracked_mailboxes(&self) -> usize {
        self.mailboxes.read().map(|boxes| boxes.len()).unwrap_or(0)
    }

    /// Returns the sender for `id`, opening a new actor if none is accepting messages.
    pub fn sender_for(
        &self,
        id: &T::Id,
    ) -> Result<mpsc::Sender<ResourceRequest<T>>, FrameworkError<T::Error>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FrameworkError::ActorClosed);
        }

        {
            let boxes = self
                .mailboxes
                .read()
                .map_err(|_| FrameworkError::ActorClosed)?;
            if let Some(mailbox) = boxes.get(id) {
                if !mailbox.sender.is_closed() {
                    return Ok(mailbox.sender.clone());
                }
            }
        }

        let mut boxes = self
            .mailboxes
            .write()
            .map_err(|_| FrameworkError::ActorClosed)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(FrameworkError::ActorClosed);
        }
        if let Some(mailbox) = boxes.get(id) {
            if !mailbox.sender.is_closed() {
                return Ok(mailbox.sender.clone());
            }
        }

        // Closed mailboxes whose task has ended have nothing left to order against.
        let before = boxes.len();
        boxes.retain(|key, m| key == id || !(m.sender.is_closed() && m.handle.is_finished()));
        if boxes.len() < before {
            debug!(pruned = before - boxes.len(), "Pruned finished mailboxes");
        }

        let previous = boxes.remove(id).map(|m| m.handle);
        let (actor, sender) =
            EntityActor::<T>::new(id.clone(), self.config.buffer_size, self.config.idle_timeout);
        let context = self.context.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            actor.run(context).await;
        });
        debug!(%id, live = boxes.len() + 1, "Opened mailbox");
        boxes.insert(
            id.clone(),
            Mailbox {
                sender: sender.clone(),
                handle,
            },
        );
        Ok(sender)
    }

    /// Stops accepting new requests, closes every mailbox and waits for the actors to drain.
    pub async fn shutdown(&self) -> Result<(), String> {
        self.closed.store(true, Ordering::Release);
        let boxes = match self.mailboxes.write() {
            Ok(mut boxes) => std::mem::take(&mut *boxes),
            Err(_) => return Err("actor registry lock poisoned".to_string()),
        };
        info!(actors = boxes.len(), "Closing mailboxes");

        let handles: Vec<JoinHandle<()>> = boxes
            .into_values()
            .map(|Mailbox { sender, handle }| {
                drop(sender);
                handle
            })
            .collect();

        let mut failures = 0usize;
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = ?e, "Actor task failed");
                failures += 1;
            }
        }
        if failures > 0 {
            return Err(format!("{failures} actor task(s) failed"));
        }
        Ok(())
    }
}
