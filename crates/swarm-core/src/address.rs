//! Node address parsing.
//!
//! Accepts `host`, `host:port`, bare IPv6 and `[v6]:port`. Remote manager
//! addresses reported by `docker info` carry the swarm port, which has to
//! be stripped before the host can be used as a transport target.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("invalid address {0:?}")]
    Invalid(String),
    #[error("invalid port in address {0:?}")]
    InvalidPort(String),
}

/// A parsed `host[:port]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: Option<u16>,
}

impl HostPort {
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Ok(sock) = address.parse::<SocketAddr>() {
            return Ok(HostPort {
                host: sock.ip().to_string(),
                port: Some(sock.port()),
            });
        }
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(HostPort {
                host: ip.to_string(),
                port: None,
            });
        }
        if address.starts_with('[') {
            return Err(AddressError::Invalid(address.to_string()));
        }

        let (host, port) = match address.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| AddressError::InvalidPort(address.to_string()))?;
                (host, Some(port))
            }
            None => (address, None),
        };

        let valid_host = !host.is_empty()
            && host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_');
        if !valid_host {
            return Err(AddressError::Invalid(address.to_string()));
        }

        Ok(HostPort {
            host: host.to_string(),
            port,
        })
    }

    /// `host:port`, bracketing IPv6 hosts.
    pub fn with_port(&self, default_port: u16) -> String {
        let port = self.port.unwrap_or(default_port);
        if self.host.contains(':') {
            format!("[{}]:{port}", self.host)
        } else {
            format!("{}:{port}", self.host)
        }
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => f.write_str(&self.with_port(port)),
            None => f.write_str(&self.host),
        }
    }
}

/// The host part of `address`, without any port.
pub fn split_host(address: &str) -> Result<String, AddressError> {
    HostPort::parse(address).map(|hp| hp.host)
}
