//! Client notification fan-out: `SyncCompleted` and `Notify` messages.
//!
//! Attached clients (the embedding application's windows/tabs/processes) register a bounded
//! channel; the sync engine and lifecycle controller broadcast to all of them with
//! non-blocking `try_send` so one slow or gone client never stalls the broadcaster.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Messages the agent pushes to attached clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentMessage {
    SyncCompleted { attempted: usize, synced: usize },
    Notify { title: String, body: String },
}

/// Opaque handle identifying one attached client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

/// Failure modes for a non-blocking send to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("client channel is full")]
    Full,
    #[error("client has disconnected")]
    Disconnected,
}

/// A registered client's outbound channel.
pub struct ClientHandle {
    id: ClientId,
    tx: mpsc::Sender<AgentMessage>,
}

impl ClientHandle {
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Attempts to deliver `message` without blocking.
    pub fn try_send(&self, message: AgentMessage) -> Result<(), SendError> {
        self.tx.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Disconnected,
        })
    }
}

/// Registry of attached clients, keyed by [`ClientId`].
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<ClientId, Arc<ClientHandle>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client with the given channel capacity, returning its handle and the
    /// receiving end for the transport layer to drain.
    pub fn register(&self, channel_capacity: usize) -> (Arc<ClientHandle>, mpsc::Receiver<AgentMessage>) {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(channel_capacity);
        let handle = Arc::new(ClientHandle { id, tx });
        self.clients.insert(id, Arc::clone(&handle));
        (handle, rx)
    }

    pub fn remove(&self, id: ClientId) {
        self.clients.remove(&id);
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Broadcasts `message` to every registered client. Individual send failures are logged,
    /// not propagated -- a gone or lagged client should never block delivery to the rest.
    pub fn broadcast(&self, message: AgentMessage) {
        for entry in self.clients.iter() {
            if let Err(err) = entry.value().try_send(message.clone()) {
                tracing::warn!(client_id = ?entry.key(), error = %err, "dropped notification");
            }
        }
    }
}
