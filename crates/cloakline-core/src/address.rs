//! Server address validation.
//!
//! Runs before any network I/O so a typo never reaches the transport.

use std::fmt;

use thiserror::Error;

/// Why an address was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Empty hostname.
    #[error("Hostname is too short")]
    HostnameTooShort,
    /// Empty port.
    #[error("Port is too short")]
    PortTooShort,
    /// Port is not an integer in `0..=65535`.
    #[error("Port is not a number or is over 65535")]
    InvalidPort,
}

/// Validated `hostname:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Validate raw user input. Nothing is trimmed.
    pub fn parse(host: &str, port: &str) -> Result<Self, AddressError> {
        if host.is_empty() {
            return Err(AddressError::HostnameTooShort);
        }
        if port.is_empty() {
            return Err(AddressError::PortTooShort);
        }
        let port = port.parse::<u16>().map_err(|_| AddressError::InvalidPort)?;

        Ok(Self { host: host.to_string(), port })
    }

    /// Hostname.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
