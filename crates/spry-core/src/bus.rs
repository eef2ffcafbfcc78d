//! Live-update bus.
//!
//! Fan-out of [`LiveMessage`]s to every currently subscribed client. Each
//! subscriber gets a bounded queue; delivery is best-effort and at most once.
//! A subscriber whose queue is full misses the message, and one whose
//! receiver is gone is dropped from the bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::protocol::LiveMessage;

/// Messages buffered per client before new ones are dropped.
const CLIENT_QUEUE: usize = 100;

/// Identifies one subscription.
pub type ClientId = u64;

#[derive(Debug, Default)]
struct BusInner {
    clients: RwLock<FxHashMap<ClientId, mpsc::Sender<LiveMessage>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Cheaply cloneable handle to the shared client set.
#[derive(Debug, Clone, Default)]
pub struct LiveUpdateBus {
    inner: Arc<BusInner>,
}

impl LiveUpdateBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client.
    ///
    /// After [`close`](Self::close) the returned receiver is already
    /// disconnected.
    pub fn subscribe(&self) -> (ClientId, mpsc::Receiver<LiveMessage>) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE);

        let mut clients = self.inner.clients.write();
        if !self.inner.closed.load(Ordering::Acquire) {
            clients.insert(id, tx);
            tracing::debug!(client = id, total = clients.len(), "live client connected");
        }
        (id, rx)
    }

    pub fn unsubscribe(&self, id: ClientId) {
        if self.inner.clients.write().remove(&id).is_some() {
            tracing::debug!(client = id, "live client disconnected");
        }
    }

    /// Send `message` to every subscriber. Returns how many accepted it.
    pub fn publish(&self, message: LiveMessage) -> usize {
        let mut delivered = 0;
        let mut gone = Vec::new();

        {
            let clients = self.inner.clients.read();
            for (id, tx) in clients.iter() {
                match tx.try_send(message.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!(client = id, "live client lagging, message dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => gone.push(*id),
                }
            }
        }

        if !gone.is_empty() {
            let mut clients = self.inner.clients.write();
            for id in gone {
                clients.remove(&id);
            }
        }

        delivered
    }

    /// Disconnect every client and refuse new ones.
    ///
    /// Messages already queued are still delivered before each receiver
    /// observes the end of the stream.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let dropped = std::mem::take(&mut *self.inner.clients.write());
        tracing::debug!(clients = dropped.len(), "live channel closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.read().len()
    }
}
