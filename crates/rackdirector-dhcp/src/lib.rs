//! rackdirector DHCP responder
//!
//! Answers DHCP requests forwarded by relay agents. The relay's circuit id
//! and its own address locate the requesting interface in the host
//! directory; the client's architecture and user class then select how it
//! loads iPXE.
//!
//! # Boot method selection
//!
//! | Architecture | User class   | Reply                                   |
//! |--------------|--------------|-----------------------------------------|
//! | BIOS         | `iPXE`       | `http://<server>/config.ipxe`           |
//! | BIOS         | other        | TFTP `undionly.kpxe`                    |
//! | UEFI         | `iPXE`       | `http://<server>/config.ipxe`           |
//! | UEFI         | `HTTPClient` | `http://<server>/ipxe.efi`              |
//! | UEFI         | other        | TFTP `ipxe.efi`                         |
//!
//! # Example
//!
//! ```ignore
//! use rackdirector_dhcp::{DhcpConfig, DhcpServer};
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! let config = DhcpConfig::new(Ipv4Addr::new(10, 0, 1, 10));
//! let server = DhcpServer::new(config, Arc::new(directory));
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! server.run(shutdown_rx).await?;
//! ```

pub mod config;
pub mod decision;
pub mod error;
pub mod packet;
pub mod server;

pub use config::*;
pub use decision::*;
pub use error::*;
pub use packet::*;
pub use server::*;
