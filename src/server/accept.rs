//! Accept loop
//!
//! Turns inbound connections into registered clients until told to stop or until
//! the listener fails. Connections already running are never touched from here.

use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::client::{ClientInfo, ConnectionContext, IdAllocator, handle_connection, register_client};

pub async fn run_accept_loop(
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
    ids: Arc<IdAllocator>,
    ctx: Arc<ConnectionContext>,
) {
    let local = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("Accepting connections on {}", local);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender means the owning server is gone.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let client = ClientInfo { id: ids.next_id(), peer };
                    // Registered before the loop can observe shutdown again, so the
                    // stop drain never misses an accepted connection.
                    match register_client(client, &ctx.registry).await {
                        Some(registered) => {
                            tokio::spawn(handle_connection(stream, registered, Arc::clone(&ctx)));
                        }
                        None => error!("Dropping connection from {}", peer),
                    }
                }
                Err(e) => {
                    ctx.events.error(None, format!("Error accepting connection: {}", e));
                    break;
                }
            }
        }
    }

    info!("Listener on {} closed", local);
}
