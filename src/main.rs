//! Relay hub - operator console
//!
//! Starts the relay on the configured endpoint and turns stdin lines into operator
//! broadcasts or console commands.
//!
//! Usage: `tcp-relay-hub [ADDRESS] [PORT]`

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use tcp_relay_hub::error::handlers::log_error;
use tcp_relay_hub::utils::logging::setup_logging;
use tcp_relay_hub::utils::validation::parse_port;
use tcp_relay_hub::{RelayError, RelayServer, ServerConfig, ServerEvent};

#[tokio::main]
async fn main() {
    setup_logging();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log_error(&e);
            std::process::exit(1);
        }
    };

    let server = RelayServer::new(config);
    info!("Launching relay hub on {}...", server.config().endpoint());

    let events = server.subscribe();
    tokio::spawn(print_events(events));

    if let Err(e) = server.start().await {
        log_error(&e);
    }

    run_console(&server).await;

    server.stop().await;
    server.wait_stopped().await;
    info!("Relay hub exited");
}

/// File and environment settings, then positional `ADDRESS PORT` overrides
fn load_config() -> Result<ServerConfig, RelayError> {
    let mut config = ServerConfig::load()?;
    let mut args = std::env::args().skip(1);

    if let Some(address) = args.next() {
        config.bind_address = address;
    }
    if let Some(port) = args.next() {
        config.port = parse_port(&port)?;
    }

    Ok(config)
}

async fn run_console(server: &RelayServer) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(server, line.trim_end()).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read console input: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
}

/// Returns false when the console should exit
async fn handle_line(server: &RelayServer, line: &str) -> bool {
    match line {
        "" => {}
        "/quit" => return false,
        "/start" => {
            if let Err(e) = server.start().await {
                log_error(&e);
            }
        }
        "/stop" => server.stop().await,
        "/clear" => server.clear_display(),
        "/status" => {
            let addr = server
                .local_addr()
                .await
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "*** {} on {}, {} client(s)",
                server.state().await,
                addr,
                server.client_count().await
            );
        }
        message => {
            println!("<- Server (You) -> {}", message);
            server.broadcast(message);
        }
    }
    true
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<ServerEvent>) {
    loop {
        match events.recv().await {
            Ok(ServerEvent::StatusChanged { message, .. }) => println!("*** {}", message),
            Ok(ServerEvent::Connected(client)) => {
                println!("Client : {} Connected", client.peer)
            }
            Ok(ServerEvent::Disconnected(client)) => {
                println!("Client : {} Disconnected", client.peer)
            }
            Ok(ServerEvent::MessageReceived { client, message }) => {
                println!("[{}] {}", client.id, message)
            }
            // ANSI clear screen, cursor home
            Ok(ServerEvent::ClearDisplay) => print!("\x1b[2J\x1b[H"),
            // Already logged by the server.
            Ok(ServerEvent::Error { .. }) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Console skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}
