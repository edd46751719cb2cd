//! Client registry and notification bus.
//!
//! Every connected UI gets a bounded outgoing queue drained by its writer
//! task in `serve`. Publishing never blocks an RPC handler: a client whose
//! queue is full is dropped rather than stalling mutation. Per-client order
//! is preserved by the queue.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use arhub_data::events::Event;

/// Bound of one client's outgoing queue.
pub const SEND_QUEUE_CAPACITY: usize = 256;

/// One message on a client's outgoing queue.
#[derive(Clone, Debug)]
pub enum Outgoing {
    /// Pre-serialized frame (response or event).
    Text(String),
    /// WebSocket ping used by the duplicate-login liveness probe.
    Ping,
}

#[derive(Clone)]
pub struct ClientHandle {
    pub id: Uuid,
    tx: mpsc::Sender<Outgoing>,
}

impl ClientHandle {
    /// `false` when the queue is full or the client is gone.
    fn push(&self, msg: Outgoing) -> bool {
        self.tx.try_send(msg).is_ok()
    }
}

#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<Uuid, ClientHandle>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new client; the returned receiver feeds its writer task.
    pub fn add(&self, id: Uuid) -> mpsc::Receiver<Outgoing> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_CAPACITY);
        self.clients.insert(id, ClientHandle { id, tx });
        rx
    }

    pub fn remove(&self, id: Uuid) {
        self.clients.remove(&id);
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Sends a liveness ping; `false` means the client is already gone.
    pub fn ping(&self, id: Uuid) -> bool {
        match self.clients.get(&id) {
            Some(handle) => handle.push(Outgoing::Ping),
            None => false,
        }
    }

    /// Enqueues a raw frame to one client.
    pub fn send_raw(&self, id: Uuid, text: String) -> bool {
        match self.clients.get(&id) {
            Some(handle) => handle.push(Outgoing::Text(text)),
            None => false,
        }
    }

    /// Sends an event to one client.
    pub fn event(&self, id: Uuid, event: &Event) {
        if let Ok(text) = serde_json::to_string(event) {
            if !self.send_raw(id, text) {
                self.drop_slow(id);
            }
        }
    }

    /// Broadcasts an event to every client (optionally excluding one).
    /// Slow clients are dropped instead of blocking the caller.
    pub fn broadcast_event(&self, event: &Event, exclude: Option<Uuid>) {
        let text = match serde_json::to_string(event) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("event serialization failed: {e}");
                return;
            }
        };
        self.broadcast_raw(&text, exclude);
    }

    /// Broadcasts a pre-serialized frame (used for execution-runtime events).
    pub fn broadcast_raw(&self, text: &str, exclude: Option<Uuid>) {
        let mut slow = Vec::new();
        for entry in self.clients.iter() {
            if Some(entry.id) == exclude {
                continue;
            }
            if !entry.push(Outgoing::Text(text.to_string())) {
                slow.push(entry.id);
            }
        }
        for id in slow {
            self.drop_slow(id);
        }
    }

    fn drop_slow(&self, id: Uuid) {
        tracing::warn!(client = %id, "send queue full or closed, dropping client");
        self.clients.remove(&id);
    }
}
