//! Client registry
//!
//! Live mapping from client id to connection handle. Safe to snapshot while other
//! tasks insert and remove.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::client::state::{ClientHandle, ClientId};

/// Registry for tracking active clients
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<ClientId, ClientHandle>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle. Returns false if the id was already present, in which
    /// case the registry is left untouched.
    pub async fn insert(&self, handle: ClientHandle) -> bool {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&handle.id()) {
            return false;
        }
        clients.insert(handle.id(), handle);
        true
    }

    pub async fn remove(&self, id: ClientId) -> Option<ClientHandle> {
        self.clients.write().await.remove(&id)
    }

    pub async fn get(&self, id: ClientId) -> Option<ClientHandle> {
        self.clients.read().await.get(&id).cloned()
    }

    /// Point-in-time copy of every registered handle, ordered by id.
    ///
    /// The lock is released before the caller touches any handle.
    pub async fn snapshot(&self) -> Vec<ClientHandle> {
        let mut handles: Vec<ClientHandle> =
            self.clients.read().await.values().cloned().collect();
        handles.sort_by_key(ClientHandle::id);
        handles
    }

    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::state::ClientInfo;
    use tokio::sync::mpsc;

    fn handle(id: ClientId) -> ClientHandle {
        let (tx, _rx) = mpsc::unbounded_channel();
        ClientHandle::new(
            ClientInfo {
                id,
                peer: "127.0.0.1:5000".parse().unwrap(),
            },
            tx,
        )
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let registry = ClientRegistry::new();
        assert!(registry.insert(handle(7)).await);
        assert!(!registry.insert(handle(7)).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_happens_once() {
        let registry = ClientRegistry::new();
        registry.insert(handle(1)).await;
        assert!(registry.remove(1).await.is_some());
        assert!(registry.remove(1).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_survives_concurrent_removal() {
        let registry = ClientRegistry::new();
        for id in 0..3 {
            registry.insert(handle(id)).await;
        }

        let snapshot = registry.snapshot().await;
        registry.remove(1).await;

        let ids: Vec<ClientId> = snapshot.iter().map(ClientHandle::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(registry.len().await, 2);
        assert!(registry.get(1).await.is_none());
    }
}
