//! Configuration management for the relay hub
//!
//! Settings come from built-in defaults, an optional `relay-hub.toml` in the
//! working directory, and `RELAY_HUB_*` environment variables, in that order of
//! increasing priority.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::protocol::Framing;

const CONFIG_FILE: &str = "relay-hub";
const ENV_PREFIX: &str = "RELAY_HUB";

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: i64 = 23;
pub const DEFAULT_BUFFER_SIZE: usize = 8192;
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// How inbound byte streams are cut into messages
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FramingMode {
    /// A message ends when no more bytes are immediately available
    Burst,
    Delimited,
    LengthPrefixed,
}

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// IP address to bind the listener on. Validated by `start`, not at load.
    pub bind_address: String,

    /// Listening port. Kept wide so out-of-range values reach `start` and get
    /// reported as a status failure.
    pub port: i64,

    /// Size of each connection's receive buffer
    pub buffer_size: usize,

    pub framing: FramingMode,

    /// Frame terminator for `FramingMode::Delimited`
    pub delimiter: u8,

    /// Upper bound for a single delimited or length-prefixed frame
    pub max_frame_length: usize,

    /// Events buffered per subscriber before slow subscribers start lagging
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            framing: FramingMode::Burst,
            delimiter: b'\n',
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Default settings bound to the given endpoint
    pub fn new(bind_address: impl Into<String>, port: i64) -> Self {
        Self {
            bind_address: bind_address.into(),
            port,
            ..Self::default()
        }
    }

    /// Load configuration from `relay-hub.toml` with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        let settings = Config::builder()
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", defaults.port)?
            .set_default("buffer_size", defaults.buffer_size as u64)?
            .set_default("framing", "burst")?
            .set_default("delimiter", u64::from(defaults.delimiter))?
            .set_default("max_frame_length", defaults.max_frame_length as u64)?
            .set_default("event_capacity", defaults.event_capacity as u64)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?;

        let config: ServerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation. Address and port are checked when the server starts.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.buffer_size == 0 {
            return Err(config::ConfigError::Message(
                "buffer_size must be greater than 0".into(),
            ));
        }

        if self.max_frame_length == 0 {
            return Err(config::ConfigError::Message(
                "max_frame_length must be greater than 0".into(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(config::ConfigError::Message(
                "event_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Framing policy described by these settings
    pub fn framing(&self) -> Framing {
        match self.framing {
            FramingMode::Burst => Framing::Burst,
            FramingMode::Delimited => Framing::Delimited {
                delimiter: self.delimiter,
                max_frame_length: self.max_frame_length,
            },
            FramingMode::LengthPrefixed => Framing::LengthPrefixed {
                max_frame_length: self.max_frame_length,
            },
        }
    }

    /// Host-facing endpoint, for log lines
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.endpoint(), "0.0.0.0:23");
        assert_eq!(config.framing(), Framing::Burst);
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let config = ServerConfig {
            buffer_size: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_delimited_framing_carries_settings() {
        let config = ServerConfig {
            framing: FramingMode::Delimited,
            delimiter: b';',
            max_frame_length: 16,
            ..ServerConfig::new("127.0.0.1", 0)
        };
        assert_eq!(
            config.framing(),
            Framing::Delimited {
                delimiter: b';',
                max_frame_length: 16
            }
        );
    }
}
