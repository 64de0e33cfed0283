//! Multi-client TCP relay hub.
//!
//! Accepts any number of connections, cuts each client's byte stream into messages
//! and republishes every message to all other connected clients. Lifecycle changes,
//! messages and transport failures are published as `ServerEvent`s.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod utils;

pub use config::{FramingMode, ServerConfig};
pub use error::RelayError;
pub use server::{RelayServer, ServerEvent, ServerState};
