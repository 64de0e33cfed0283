use log::{debug, error, info};
use std::io;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;

use crate::client::registry::ClientRegistry;
use crate::client::state::{ClientHandle, ClientInfo, Payload};
use crate::client::writer::spawn_writer;
use crate::error::RelayError;
use crate::error::handlers::is_disconnect;
use crate::protocol::{FrameDecoder, Framing};
use crate::server::broadcast::Broadcaster;
use crate::server::events::{EventBus, ServerEvent};

/// Everything a connection handler shares with the rest of the server
pub struct ConnectionContext {
    pub registry: ClientRegistry,
    pub broadcaster: Broadcaster,
    pub events: EventBus,
    pub framing: Framing,
    pub buffer_size: usize,
}

/// Why a read loop ended without an error
enum Closed {
    ByPeer,
    Forced,
}

/// A client that is already in the registry but whose handler has not started yet
pub struct Registered {
    handle: ClientHandle,
    queue: mpsc::UnboundedReceiver<Payload>,
}

/// Creates the client's outbound queue and close signal and registers it.
///
/// Called by the accept loop before the handler task is spawned, so a stop that
/// snapshots the registry after the listener has closed sees every accepted client.
pub async fn register_client(client: ClientInfo, registry: &ClientRegistry) -> Option<Registered> {
    let (outbound, queue) = mpsc::unbounded_channel();
    let handle = ClientHandle::new(client, outbound);

    if !registry.insert(handle.clone()).await {
        error!("Client id {} is already registered, dropping connection", handle.id());
        return None;
    }
    Some(Registered { handle, queue })
}

/// Runs one registered client connection until it is removed.
///
/// - Publishes `Connected` and spawns the outbound writer.
/// - Reads sequentially; only one read is ever outstanding for this client.
/// - Publishes each complete message and relays it to every other client.
/// - On peer close, transport error, framing violation or forced close, tears the
///   connection down and publishes `Disconnected` exactly once.
pub async fn handle_connection(
    stream: TcpStream,
    registered: Registered,
    ctx: Arc<ConnectionContext>,
) {
    let Registered { handle, queue } = registered;
    let client = handle.info().clone();
    let close = handle.close_signal();
    drop(handle);

    let (mut reader, write_half) = stream.into_split();
    ctx.events.publish(ServerEvent::Connected(client.clone()));

    let writer = spawn_writer(write_half, queue, client.clone(), ctx.events.clone());

    let outcome = tokio::select! {
        result = read_loop(&mut reader, &client, &ctx) => result,
        _ = close.notified() => Ok(Closed::Forced),
    };

    match outcome {
        Ok(Closed::ByPeer) => info!("Connection closed by client {}", client),
        Ok(Closed::Forced) => info!("Connection to client {} closed by server", client),
        Err(RelayError::Io(e)) => {
            if is_disconnect(&e) {
                info!("Client {} dropped: {}", client, e);
            }
            ctx.events.error(Some(&client), e.to_string());
        }
        Err(e) => ctx.events.error(Some(&client), e.to_string()),
    }

    drop(reader);
    writer.abort();
    let _ = writer.await;

    if ctx.registry.remove(client.id).await.is_none() {
        error!("Client {} was missing from the registry at disconnect", client);
    }
    ctx.events.publish(ServerEvent::Disconnected(client));
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    client: &ClientInfo,
    ctx: &ConnectionContext,
) -> Result<Closed, RelayError> {
    let mut buffer = vec![0u8; ctx.buffer_size];
    let mut decoder = FrameDecoder::new(ctx.framing);

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            return Ok(Closed::ByPeer);
        }
        decoder.push(&buffer[..n]);

        if ctx.framing.is_burst() {
            drain_available(reader, &mut buffer, &mut decoder)?;
            let message = decoder.take_all();
            relay(ctx, client, &message);
        } else {
            while let Some(frame) = decoder.next_frame()? {
                relay(ctx, client, &frame);
            }
        }
    }
}

/// Pulls in whatever else is already waiting on the socket without blocking.
///
/// End of stream counts as "nothing more available"; the next awaited read sees it
/// again and closes the connection.
fn drain_available(
    reader: &OwnedReadHalf,
    buffer: &mut [u8],
    decoder: &mut FrameDecoder,
) -> io::Result<()> {
    loop {
        match reader.try_read(buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => decoder.push(&buffer[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn relay(ctx: &ConnectionContext, client: &ClientInfo, message: &[u8]) {
    debug!("Relaying {} bytes from client {}", message.len(), client);
    ctx.events.publish(ServerEvent::MessageReceived {
        client: client.clone(),
        message: String::from_utf8_lossy(message).into_owned(),
    });
    ctx.broadcaster.send(message, Some(client.id));
}
