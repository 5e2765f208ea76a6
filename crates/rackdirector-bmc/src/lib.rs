//! rackdirector BMC control
//!
//! Power control of hosts through their baseboard management controllers.
//! Plan assignment power cycles a host so it network boots into the
//! installer.
//!
//! # Example
//!
//! ```no_run
//! use rackdirector_bmc::{IpmiTool, IpmiToolConfig, PowerControl};
//! use std::time::Duration;
//!
//! # async fn example() -> rackdirector_bmc::Result<()> {
//! let config = IpmiToolConfig::new("ADMIN", "ADMIN").with_timeout(Duration::from_secs(30));
//! let controller = IpmiTool::new(config);
//!
//! controller.power_cycle("node01-bmc.lab.example").await?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod error;
pub mod ipmi;

pub use controller::PowerControl;
pub use error::{BmcError, Result};
pub use ipmi::{IpmiTool, IpmiToolConfig};
