//! Outbound writer
//!
//! Each connection's write half lives in its own task, fed by an unbounded queue.
//! A stalled peer only backs up its own queue.

use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::state::{ClientInfo, Payload};
use crate::error::handlers::is_disconnect;
use crate::server::events::EventBus;

/// Spawns the writer for one client.
///
/// The first failed write is reported and ends the task. The queue closes with it,
/// so later broadcasts to this client report a closed connection.
pub fn spawn_writer(
    mut write_half: OwnedWriteHalf,
    mut queue: mpsc::UnboundedReceiver<Payload>,
    client: ClientInfo,
    events: EventBus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(payload) = queue.recv().await {
            if let Err(e) = write_half.write_all(&payload).await {
                if is_disconnect(&e) {
                    info!("Client {} went away mid-write", client);
                }
                events.error(Some(&client), e.to_string());
                break;
            }
        }
        debug!("Writer for client {} exiting", client);
    })
}
