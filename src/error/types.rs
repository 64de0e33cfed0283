//! Error types
//!
//! Defines domain-specific error types for configuration, framing and the relay server.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Endpoint validation errors.
///
/// The `Display` strings are the exact status messages published when `start` refuses
/// to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAddress,
    InvalidPort,
    PortOutOfRange,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress => write!(f, "Address is not valid"),
            ConfigError::InvalidPort => write!(f, "Port is not valid"),
            ConfigError::PortOutOfRange => write!(f, "Port is out of range"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Framing violations detected while decoding an inbound stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    FrameTooLong { length: usize, max: usize },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::FrameTooLong { length, max } => {
                write!(f, "Frame of {} bytes exceeds limit of {} bytes", length, max)
            }
        }
    }
}

impl std::error::Error for FramingError {}

/// General relay error that encompasses all error types
#[derive(Debug)]
pub enum RelayError {
    Config(ConfigError),
    Bind(SocketAddr, io::Error),
    Io(io::Error),
    Framing(FramingError),
    InvalidState(String),
    Settings(config::ConfigError),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
            RelayError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            RelayError::Io(e) => write!(f, "I/O error: {}", e),
            RelayError::Framing(e) => write!(f, "Framing error: {}", e),
            RelayError::InvalidState(s) => write!(f, "Invalid state: {}", s),
            RelayError::Settings(e) => write!(f, "Settings error: {}", e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Config(e) => Some(e),
            RelayError::Bind(_, e) | RelayError::Io(e) => Some(e),
            RelayError::Framing(e) => Some(e),
            RelayError::Settings(e) => Some(e),
            RelayError::InvalidState(_) => None,
        }
    }
}

impl From<ConfigError> for RelayError {
    fn from(error: ConfigError) -> Self {
        RelayError::Config(error)
    }
}

impl From<FramingError> for RelayError {
    fn from(error: FramingError) -> Self {
        RelayError::Framing(error)
    }
}

impl From<io::Error> for RelayError {
    fn from(error: io::Error) -> Self {
        RelayError::Io(error)
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Settings(error)
    }
}
