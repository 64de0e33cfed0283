use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;

use crate::client::{ClientRegistry, ConnectionContext, IdAllocator};
use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::server::accept::run_accept_loop;
use crate::server::broadcast::Broadcaster;
use crate::server::events::{EventBus, ServerEvent};
use crate::server::state::ServerState;
use crate::utils::validation::validate_endpoint;

/// Multi-client TCP relay.
///
/// Cloning gives another handle to the same server.
#[derive(Clone)]
pub struct RelayServer {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    ids: Arc<IdAllocator>,
    registry: ClientRegistry,
    events: EventBus,
    broadcaster: Broadcaster,
    connection: Arc<ConnectionContext>,
    lifecycle: Mutex<Lifecycle>,
}

struct Lifecycle {
    state: ServerState,
    listener: Option<ListenerHandle>,
    drain: Option<JoinHandle<()>>,
}

struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl ListenerHandle {
    fn signal(&self) {
        self.shutdown.send_replace(true);
    }

    /// Signal the accept loop and wait until the listening socket is gone.
    async fn close(self) {
        self.signal();
        let _ = self.task.await;
    }
}

impl RelayServer {
    /// Builds a stopped server. Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let registry = ClientRegistry::new();
        let events = EventBus::new(config.event_capacity);
        let framing = config.framing();
        let broadcaster = Broadcaster::spawn(registry.clone(), events.clone(), framing);

        let connection = Arc::new(ConnectionContext {
            registry: registry.clone(),
            broadcaster: broadcaster.clone(),
            events: events.clone(),
            framing,
            buffer_size: config.buffer_size,
        });

        Self {
            inner: Arc::new(Inner {
                config,
                ids: Arc::new(IdAllocator::new()),
                registry,
                events,
                broadcaster,
                connection,
                lifecycle: Mutex::new(Lifecycle {
                    state: ServerState::Stopped,
                    listener: None,
                    drain: None,
                }),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.events.subscribe()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub async fn state(&self) -> ServerState {
        self.inner.lifecycle.lock().await.state
    }

    /// Address the listener is bound to while running
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        let lifecycle = self.inner.lifecycle.lock().await;
        match lifecycle.state {
            ServerState::Running => lifecycle.listener.as_ref().map(|l| l.local_addr),
            _ => None,
        }
    }

    pub async fn client_count(&self) -> usize {
        self.inner.registry.len().await
    }

    /// Starts listening, or stops listening if already running.
    ///
    /// When running, only the accept loop is halted; connected clients stay up.
    /// Endpoint validation failures are published as status events, one per failure.
    pub async fn start(&self) -> Result<(), RelayError> {
        let events = &self.inner.events;
        let mut lifecycle = self.inner.lifecycle.lock().await;

        match lifecycle.state {
            ServerState::Running => {
                if let Some(listener) = &lifecycle.listener {
                    listener.signal();
                }
                lifecycle.state = ServerState::Stopped;
                events.status(false, "Listener Stopped");
                return Ok(());
            }
            ServerState::Starting | ServerState::Stopping => {
                return Err(RelayError::InvalidState(format!(
                    "cannot start while {}",
                    lifecycle.state
                )));
            }
            ServerState::Stopped => {}
        }

        // A previous accept loop may still be winding down after a toggle.
        if let Some(previous) = lifecycle.listener.take() {
            previous.close().await;
        }

        let config = &self.inner.config;
        let addr = match validate_endpoint(&config.bind_address, config.port) {
            Ok(addr) => addr,
            Err(failures) => {
                for failure in &failures {
                    events.status(false, failure.to_string());
                }
                return Err(RelayError::Config(failures[0].clone()));
            }
        };

        lifecycle.state = ServerState::Starting;
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                lifecycle.state = ServerState::Stopped;
                let err = RelayError::Bind(addr, e);
                events.error(None, err.to_string());
                return Err(err);
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                lifecycle.state = ServerState::Stopped;
                return Err(RelayError::Io(e));
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_accept_loop(
            listener,
            shutdown_rx,
            Arc::clone(&self.inner.ids),
            Arc::clone(&self.inner.connection),
        ));

        lifecycle.listener = Some(ListenerHandle {
            shutdown,
            task,
            local_addr,
        });
        lifecycle.state = ServerState::Running;
        info!("Relay server listening on {}", local_addr);
        events.status(true, "Server Started");
        Ok(())
    }

    /// Stops accepting and force-closes every connected client.
    ///
    /// The close runs on a background task; `wait_stopped` waits for it. A call made
    /// while a previous drain is still in flight does nothing.
    pub async fn stop(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        let listener = lifecycle.listener.take();
        if let Some(listener) = &listener {
            listener.signal();
        }

        if lifecycle.drain.as_ref().is_some_and(|d| !d.is_finished()) {
            if let Some(listener) = listener {
                tokio::spawn(listener.close());
            }
            return;
        }

        lifecycle.state = ServerState::Stopping;
        let inner = Arc::clone(&self.inner);
        lifecycle.drain = Some(tokio::spawn(async move {
            if let Some(listener) = listener {
                listener.close().await;
            }

            let clients = inner.registry.snapshot().await;
            info!("Closing {} client connection(s)", clients.len());
            for client in &clients {
                client.close();
            }

            let mut lifecycle = inner.lifecycle.lock().await;
            if lifecycle.state == ServerState::Stopping {
                lifecycle.state = ServerState::Stopped;
            }
        }));

        self.inner.events.status(false, "Stop Server");
    }

    /// Waits for an in-flight stop to finish closing connections.
    pub async fn wait_stopped(&self) {
        let drain = self.inner.lifecycle.lock().await.drain.take();
        if let Some(drain) = drain {
            if let Err(e) = drain.await {
                warn!("Shutdown task failed: {}", e);
            }
        }
    }

    /// Operator broadcast to every connected client.
    pub fn broadcast(&self, message: &str) {
        self.inner.broadcaster.send(message.as_bytes(), None);
    }

    /// Tells hosts to clear whatever message log they display.
    pub fn clear_display(&self) {
        self.inner.events.publish(ServerEvent::ClearDisplay);
    }
}
