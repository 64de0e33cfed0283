//! Module `client::state`
//!
//! Defines the identity of a connected client and the handle the registry keeps
//! for it: the sending side of its outbound queue and its close signal.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Notify, mpsc};

/// Identifier of one accepted connection. Never reused within a server.
pub type ClientId = u64;

/// Shared outbound payload, already framed for the wire
pub type Payload = Arc<[u8]>;

/// Identity carried by every client-scoped event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub peer: SocketAddr,
}

impl fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({})", self.id, self.peer)
    }
}

/// Hands out client ids in strictly increasing order, starting at 0
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> ClientId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Outbound queue was closed before the payload could be queued
#[derive(Debug)]
pub struct QueueClosed;

/// Registry entry for one live connection.
///
/// Cloning is cheap; clones share the same queue and close signal.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    info: ClientInfo,
    outbound: mpsc::UnboundedSender<Payload>,
    closer: Arc<Notify>,
}

impl ClientHandle {
    pub fn new(info: ClientInfo, outbound: mpsc::UnboundedSender<Payload>) -> Self {
        Self {
            info,
            outbound,
            closer: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> ClientId {
        self.info.id
    }

    pub fn info(&self) -> &ClientInfo {
        &self.info
    }

    /// Queue a payload for this client's writer without waiting for the write.
    pub fn send(&self, payload: Payload) -> Result<(), QueueClosed> {
        self.outbound.send(payload).map_err(|_| QueueClosed)
    }

    /// Force the connection handler out of its read loop.
    ///
    /// The signal is latched, so a close fired between two reads is not lost.
    pub fn close(&self) {
        self.closer.notify_one();
    }

    pub(crate) fn close_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.closer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: ClientId) -> ClientInfo {
        ClientInfo {
            id,
            peer: "127.0.0.1:4000".parse().unwrap(),
        }
    }

    #[test]
    fn test_ids_strictly_increase() {
        let ids = IdAllocator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_eq!(first, 0);
        assert!(second > first);
    }

    #[test]
    fn test_send_fails_once_queue_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ClientHandle::new(info(1), tx);
        assert!(handle.send(Arc::from(&b"x"[..])).is_ok());
        drop(rx);
        assert!(handle.send(Arc::from(&b"y"[..])).is_err());
    }

    #[tokio::test]
    async fn test_close_is_latched() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = ClientHandle::new(info(2), tx);
        handle.close();
        // Waiter arrives after the signal and still observes it.
        handle.close_signal().notified().await;
    }
}
