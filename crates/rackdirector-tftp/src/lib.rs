//! rackdirector TFTP server
//!
//! Serves the first-stage boot loaders (iPXE, undionly, syslinux) that PXE
//! firmware fetches before it can speak HTTP. It implements RFC 1350 with
//! the option extensions from RFC 2347 (negotiation), RFC 2348 (block size)
//! and RFC 2349 (timeout and transfer size).
//!
//! Requested names pass through a fixed alias table ([`BootFileAliases`]);
//! anything outside it is "file not found". Write requests are rejected.
//!
//! # Example
//!
//! ```ignore
//! use rackdirector_tftp::{BootFileAliases, TftpServer};
//! use std::net::Ipv4Addr;
//! use std::sync::Arc;
//!
//! let files = BootFileAliases::new("/srv/tftp");
//! let server = TftpServer::new(Ipv4Addr::UNSPECIFIED, Arc::new(files));
//!
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! server.run(shutdown_rx).await?;
//! ```

pub mod error;
pub mod files;
pub mod packet;
pub mod server;

pub use error::*;
pub use files::*;
pub use packet::*;
pub use server::*;
