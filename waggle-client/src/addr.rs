//! Broker addressing.
//!
//! Brokers advertise themselves by host name and port; the client never
//! resolves addresses itself, it only routes by them and records them in
//! diagnostics.

use serde::{Deserialize, Serialize};

/// A transport-layer address identifying one cluster node.
///
/// # Examples
///
/// ```
/// use waggle_client::BrokerAddress;
///
/// let addr = BrokerAddress::parse("broker-0.cluster.local:51015").expect("parse");
/// assert_eq!(addr.port, 51015);
/// assert_eq!(addr.to_string(), "broker-0.cluster.local:51015");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrokerAddress {
    /// Host name or IP literal.
    pub host: String,
    /// Port number.
    pub port: u16,
}

impl BrokerAddress {
    /// Create a new broker address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse from `"host:port"` format.
    ///
    /// Supports bracketed IPv6 literals (`[::1]:51015`).
    ///
    /// # Errors
    ///
    /// Returns an error if host or port cannot be parsed.
    pub fn parse(s: &str) -> Result<Self, AddressParseError> {
        let (host, port_str) = if let Some(bracket_end) = s.rfind(']') {
            if !s.starts_with('[') {
                return Err(AddressParseError::InvalidHost);
            }
            let host = &s[1..bracket_end];
            let port = s
                .get(bracket_end + 2..)
                .ok_or(AddressParseError::MissingPort)?;
            (host, port)
        } else {
            s.rsplit_once(':').ok_or(AddressParseError::MissingPort)?
        };

        if host.is_empty() {
            return Err(AddressParseError::InvalidHost);
        }
        let port: u16 = port_str
            .parse()
            .map_err(|_| AddressParseError::InvalidPort)?;

        Ok(Self::new(host, port))
    }
}

impl std::fmt::Display for BrokerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Error parsing a broker address from string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    /// The host part is empty or malformed.
    #[error("invalid host")]
    InvalidHost,
    /// The port number could not be parsed.
    #[error("invalid port number")]
    InvalidPort,
    /// No port separator (`:`) found in the input.
    #[error("missing port separator")]
    MissingPort,
}
