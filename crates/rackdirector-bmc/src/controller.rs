//! Power control capability

use async_trait::async_trait;

use crate::error::Result;

/// Out-of-band power control of a host
///
/// Implementations address the host through its management controller
/// hostname.
#[async_trait]
pub trait PowerControl: Send + Sync {
    /// Power cycle the machine behind `bmc_hostname` (off then on)
    async fn power_cycle(&self, bmc_hostname: &str) -> Result<()>;
}
