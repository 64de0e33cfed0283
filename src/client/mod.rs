//! Client management system
//!
//! Handles client connections, the live registry and each connection's read and
//! write sides.

pub mod handler;
pub mod registry;
pub mod state;
pub mod writer;

pub use handler::{ConnectionContext, Registered, handle_connection, register_client};
pub use registry::ClientRegistry;
pub use state::{ClientHandle, ClientId, ClientInfo, IdAllocator, Payload};
