//! Server notifications
//!
//! Every lifecycle change, message and transport failure becomes a `ServerEvent`.
//! Events fan out to any number of subscribers over a broadcast channel and are
//! logged whether or not anyone is listening.

use log::{debug, error, info, warn};
use tokio::sync::broadcast;

use crate::client::ClientInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    StatusChanged { running: bool, message: String },
    Connected(ClientInfo),
    Disconnected(ClientInfo),
    MessageReceived { client: ClientInfo, message: String },
    /// Hosts showing a message log should clear it
    ClearDisplay,
    /// `client` is `None` for listener-level failures
    Error {
        client: Option<ClientInfo>,
        message: String,
    },
}

/// Publishing side of the event channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ServerEvent) {
        log_event(&event);
        // No subscribers is fine; the log line above still records it.
        let _ = self.sender.send(event);
    }

    pub fn status(&self, running: bool, message: impl Into<String>) {
        self.publish(ServerEvent::StatusChanged {
            running,
            message: message.into(),
        });
    }

    pub fn error(&self, client: Option<&ClientInfo>, message: impl Into<String>) {
        self.publish(ServerEvent::Error {
            client: client.cloned(),
            message: message.into(),
        });
    }
}

fn log_event(event: &ServerEvent) {
    match event {
        ServerEvent::StatusChanged { running, message } => {
            info!("Status changed (running={}): {}", running, message)
        }
        ServerEvent::Connected(client) => info!("Client {} connected", client),
        ServerEvent::Disconnected(client) => info!("Client {} disconnected", client),
        ServerEvent::MessageReceived { client, message } => {
            debug!("Received from {}: {:?}", client, message)
        }
        ServerEvent::ClearDisplay => debug!("Display cleared"),
        ServerEvent::Error {
            client: Some(client),
            message,
        } => warn!("Client {} error: {}", client, message),
        ServerEvent::Error {
            client: None,
            message,
        } => error!("Listener error: {}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_sees_each_event() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.status(true, "Server Started");

        let expected = ServerEvent::StatusChanged {
            running: true,
            message: "Server Started".to_string(),
        };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(1);
        bus.publish(ServerEvent::ClearDisplay);
        bus.error(None, "nobody listening");
    }
}
