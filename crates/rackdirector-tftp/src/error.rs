//! Error types for the TFTP server

use std::net::SocketAddr;
use thiserror::Error;

/// Error type for TFTP operations
#[derive(Debug, Error)]
pub enum TftpError {
    /// Failed to bind to socket
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TFTP packet
    #[error("invalid TFTP packet: {0}")]
    InvalidPacket(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client stopped acknowledging
    #[error("transfer timed out waiting for ack of block {block}")]
    Timeout { block: u16 },
}

/// Result type for TFTP operations
pub type Result<T> = std::result::Result<T, TftpError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_error_display() {
        let err = TftpError::InvalidPacket("unknown opcode: 9".to_string());
        assert_eq!(err.to_string(), "invalid TFTP packet: unknown opcode: 9");

        let err = TftpError::Timeout { block: 3 };
        assert!(err.to_string().contains("block 3"));

        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 69);
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = TftpError::BindFailed {
            addr,
            source: io_err,
        };
        assert!(err.to_string().contains("failed to bind"));
    }
}
