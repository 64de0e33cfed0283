//! Error handlers
//!
//! Provides error reporting and classification helpers.

use crate::error::types::RelayError;
use log::error;
use std::io;

/// Log a relay error
pub fn log_error(err: &RelayError) {
    error!("Relay error: {}", err);
}

/// Whether an I/O error just means the peer went away
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::NotConnected
    )
}
