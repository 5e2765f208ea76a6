//! Host directory for rackdirector
//!
//! Maps the attachment point a DHCP relay reports, plus the relay's own
//! address, to the host and interface that sits behind it. Also answers
//! reverse lookups by address and by hostname for the HTTP and
//! provisioning paths.
//!
//! The directory is loaded once from a JSON inventory file and is read-only
//! afterwards.

pub mod directory;
pub mod error;
pub mod loader;
pub mod types;

pub use directory::{HostDirectory, HostResolver};
pub use error::{HostNotFound, InventoryError, Result};
pub use types::{Attachment, Endpoint, HostRecord, ManagementController, NetworkInterface};
