//! Error types for the DHCP responder

use rackdirector_inventory::HostNotFound;
use std::net::SocketAddr;
use thiserror::Error;

/// Error type for DHCP operations
#[derive(Debug, Error)]
pub enum DhcpError {
    /// Failed to bind to socket
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse DHCP packet
    #[error("failed to parse DHCP packet: {0}")]
    ParseError(String),

    /// Failed to encode DHCP packet
    #[error("failed to encode DHCP packet: {0}")]
    EncodeError(String),

    /// Requesting machine is not in the host directory
    #[error(transparent)]
    HostNotFound(#[from] HostNotFound),

    /// Socket send error
    #[error("failed to send packet: {0}")]
    SendError(#[from] std::io::Error),
}

/// Result type for DHCP operations
pub type Result<T> = std::result::Result<T, DhcpError>;
