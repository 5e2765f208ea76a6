//! Error types for the host directory
//!
//! Load-time problems (bad inventory files, ambiguous topology) are
//! [`InventoryError`]s and stop the process before any listener starts.
//! Lookup misses at request time are the lighter [`HostNotFound`].

use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for building the host directory
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Failed to read the inventory file
    #[error("failed to read inventory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Inventory file is not valid JSON for the expected schema
    #[error("failed to parse inventory: {0}")]
    Parse(#[from] serde_json::Error),

    /// Address/prefix field is not valid CIDR notation
    #[error("invalid CIDR '{value}' for {owner}")]
    InvalidCidr { owner: String, value: String },

    /// Gateway field is not a valid IPv4 address
    #[error("invalid gateway '{value}' for {owner}")]
    InvalidGateway { owner: String, value: String },

    /// Two endpoints claim the same attachment point on the same subnet
    #[error("attachment '{port}' on {subnet} is claimed by both {first} and {second}")]
    AmbiguousAttachment {
        port: String,
        subnet: String,
        first: String,
        second: String,
    },

    /// Two endpoints are bound to the same address
    #[error("address {address} is bound by both {first} and {second}")]
    DuplicateAddress {
        address: Ipv4Addr,
        first: String,
        second: String,
    },

    /// Two hosts or controllers share a hostname
    #[error("hostname '{0}' is defined more than once")]
    DuplicateHostname(String),
}

/// No host in the directory matches the lookup key
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host not found: {0}")]
pub struct HostNotFound(pub String);

/// Result type for inventory loading
pub type Result<T> = std::result::Result<T, InventoryError>;
