//! Server core functionality
//!
//! This module contains the control surface, the accept loop, the broadcaster and
//! the event bus of the relay.

pub mod accept;
pub mod broadcast;
pub mod core;
pub mod events;
pub mod state;

pub use self::core::RelayServer;
pub use events::{EventBus, ServerEvent};
pub use state::ServerState;
