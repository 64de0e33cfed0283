//! Broadcaster
//!
//! Relays one payload to every registered client except an optional originator.
//! Requests go through a FIFO queue drained by a single dispatcher task, so one
//! broadcast finishes handing out its writes before the next one starts. The
//! writes themselves complete independently on each client's writer task.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use crate::client::{ClientId, ClientRegistry, Payload};
use crate::protocol::Framing;
use crate::server::events::EventBus;

struct BroadcastJob {
    payload: Payload,
    exclude: Option<ClientId>,
}

/// Cheap to clone; all clones feed the same dispatcher.
#[derive(Clone)]
pub struct Broadcaster {
    jobs: mpsc::UnboundedSender<BroadcastJob>,
    framing: Framing,
}

impl Broadcaster {
    /// Spawns the dispatcher task. Must be called from within a Tokio runtime.
    pub fn spawn(registry: ClientRegistry, events: EventBus, framing: Framing) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(queue, registry, events));
        Self { jobs, framing }
    }

    /// Queue `message` for every client whose id differs from `exclude`.
    ///
    /// Returns immediately; delivery failures surface as per-client error events.
    pub fn send(&self, message: &[u8], exclude: Option<ClientId>) {
        let payload: Payload = Arc::from(self.framing.encode(message));
        if self.jobs.send(BroadcastJob { payload, exclude }).is_err() {
            warn!("Broadcast dispatcher has stopped, dropping message");
        }
    }
}

async fn dispatch(
    mut queue: mpsc::UnboundedReceiver<BroadcastJob>,
    registry: ClientRegistry,
    events: EventBus,
) {
    while let Some(job) = queue.recv().await {
        let targets = registry.snapshot().await;
        let mut delivered = 0usize;

        for client in targets.iter().filter(|c| Some(c.id()) != job.exclude) {
            match client.send(Arc::clone(&job.payload)) {
                Ok(()) => delivered += 1,
                Err(_) => events.error(Some(client.info()), "connection is closed"),
            }
        }

        debug!(
            "Broadcast of {} bytes queued for {} client(s)",
            job.payload.len(),
            delivered
        );
    }
    debug!("Broadcast dispatcher exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientHandle, ClientInfo};
    use crate::server::events::ServerEvent;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    fn handle(id: ClientId) -> (ClientHandle, mpsc::UnboundedReceiver<Payload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let info = ClientInfo {
            id,
            peer: "127.0.0.1:6000".parse().unwrap(),
        };
        (ClientHandle::new(info, tx), rx)
    }

    #[tokio::test]
    async fn test_originator_is_skipped() {
        let registry = ClientRegistry::new();
        let (a, mut a_rx) = handle(0);
        let (b, mut b_rx) = handle(1);
        registry.insert(a).await;
        registry.insert(b).await;

        let broadcaster = Broadcaster::spawn(registry, EventBus::new(8), Framing::Burst);
        broadcaster.send(b"hello", Some(0));
        broadcaster.send(b"again", None);

        let first = timeout(WAIT, b_rx.recv()).await.unwrap().unwrap();
        assert_eq!(&first[..], b"hello");
        let second = timeout(WAIT, b_rx.recv()).await.unwrap().unwrap();
        assert_eq!(&second[..], b"again");

        // The originator only sees the unattributed broadcast.
        let only = timeout(WAIT, a_rx.recv()).await.unwrap().unwrap();
        assert_eq!(&only[..], b"again");
    }

    #[tokio::test]
    async fn test_closed_client_reports_error_and_others_still_receive() {
        let registry = ClientRegistry::new();
        let events = EventBus::new(8);
        let mut subscriber = events.subscribe();

        let (gone, gone_rx) = handle(0);
        let (alive, mut alive_rx) = handle(1);
        registry.insert(gone).await;
        registry.insert(alive).await;
        drop(gone_rx);

        let broadcaster = Broadcaster::spawn(registry, events, Framing::Burst);
        broadcaster.send(b"ping", None);

        let received = timeout(WAIT, alive_rx.recv()).await.unwrap().unwrap();
        assert_eq!(&received[..], b"ping");

        match timeout(WAIT, subscriber.recv()).await.unwrap().unwrap() {
            ServerEvent::Error {
                client: Some(client),
                ..
            } => assert_eq!(client.id, 0),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_payload_is_framed() {
        let registry = ClientRegistry::new();
        let (a, mut a_rx) = handle(0);
        registry.insert(a).await;

        let framing = Framing::Delimited {
            delimiter: b'\n',
            max_frame_length: 64,
        };
        let broadcaster = Broadcaster::spawn(registry, EventBus::new(8), framing);
        broadcaster.send(b"line", None);

        let received = timeout(WAIT, a_rx.recv()).await.unwrap().unwrap();
        assert_eq!(&received[..], b"line\n");
    }
}
