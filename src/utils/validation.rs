//! Endpoint validation
//!
//! Turns the configured address and port into a bindable socket address, or into
//! the status failures the server reports when it refuses to start.

use std::net::{IpAddr, SocketAddr};

use crate::error::ConfigError;

/// Parse a textual port. Range is checked separately by `check_port`.
pub fn parse_port(raw: &str) -> Result<i64, ConfigError> {
    raw.trim().parse::<i64>().map_err(|_| ConfigError::InvalidPort)
}

/// Accept ports in 0..=65535. Port 0 asks the OS for an ephemeral port.
pub fn check_port(port: i64) -> Result<u16, ConfigError> {
    u16::try_from(port).map_err(|_| ConfigError::PortOutOfRange)
}

pub fn parse_address(raw: &str) -> Result<IpAddr, ConfigError> {
    raw.trim()
        .parse::<IpAddr>()
        .map_err(|_| ConfigError::InvalidAddress)
}

/// Validate both halves of an endpoint, collecting every failure.
pub fn validate_endpoint(address: &str, port: i64) -> Result<SocketAddr, Vec<ConfigError>> {
    match (parse_address(address), check_port(port)) {
        (Ok(ip), Ok(port)) => Ok(SocketAddr::new(ip, port)),
        (ip, port) => Err([ip.err(), port.err()].into_iter().flatten().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_endpoint() {
        let addr = validate_endpoint("127.0.0.1", 2323).unwrap();
        assert_eq!(addr, "127.0.0.1:2323".parse::<SocketAddr>().unwrap());
        assert!(validate_endpoint("::1", 0).is_ok());
    }

    #[test]
    fn test_every_failure_is_reported() {
        let errors = validate_endpoint("not-an-ip", 70000).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigError::InvalidAddress, ConfigError::PortOutOfRange]
        );
    }

    #[test]
    fn test_negative_port_out_of_range() {
        assert_eq!(check_port(-1), Err(ConfigError::PortOutOfRange));
        assert_eq!(check_port(65535), Ok(65535));
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(" 23 "), Ok(23));
        assert_eq!(parse_port("telnet"), Err(ConfigError::InvalidPort));
        assert_eq!(
            ConfigError::InvalidPort.to_string(),
            "Port is not valid"
        );
    }
}
