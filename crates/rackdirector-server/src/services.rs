//! Network boot services
//!
//! Starts the DHCP responder and the TFTP server alongside HTTP. Either can
//! be disabled; both stop when the shutdown channel flips to `true`.

use rackdirector_dhcp::{DhcpConfig, DhcpServer};
use rackdirector_inventory::HostResolver;
use rackdirector_tftp::{BootFileAliases, TftpServer};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// TFTP service configuration
#[derive(Debug, Clone)]
pub struct TftpServiceConfig {
    pub bind_ip: Ipv4Addr,
    /// Directory the alias table resolves into
    pub base_dir: PathBuf,
}

impl Default for TftpServiceConfig {
    fn default() -> Self {
        Self {
            bind_ip: Ipv4Addr::UNSPECIFIED,
            base_dir: PathBuf::from("tftp"),
        }
    }
}

/// Which UDP services to run (None = disabled)
#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    pub dhcp: Option<DhcpConfig>,
    pub tftp: Option<TftpServiceConfig>,
}

/// Join handles of the started services
#[derive(Default)]
pub struct ServiceHandles {
    pub dhcp: Option<JoinHandle<()>>,
    pub tftp: Option<JoinHandle<()>>,
}

impl ServiceHandles {
    /// Wait for every started service to exit
    pub async fn join(self) {
        for handle in [self.dhcp, self.tftp].into_iter().flatten() {
            if let Err(e) = handle.await {
                error!(error = %e, "Service task panicked");
            }
        }
    }
}

/// Spawn the configured services
pub fn start(
    config: &ServicesConfig,
    hosts: Arc<dyn HostResolver>,
    shutdown: watch::Receiver<bool>,
) -> ServiceHandles {
    let mut handles = ServiceHandles::default();

    if let Some(dhcp_config) = &config.dhcp {
        info!(
            server_ip = %dhcp_config.server_ip,
            port = dhcp_config.port,
            "Starting DHCP server"
        );
        let server = DhcpServer::new(dhcp_config.clone(), hosts);
        let shutdown = shutdown.clone();
        handles.dhcp = Some(tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                error!(error = %e, "DHCP server error");
            }
        }));
    }

    if let Some(tftp_config) = &config.tftp {
        info!(
            ip = %tftp_config.bind_ip,
            dir = %tftp_config.base_dir.display(),
            "Starting TFTP server"
        );
        let provider = BootFileAliases::new(tftp_config.base_dir.clone());
        let server = TftpServer::new(tftp_config.bind_ip, Arc::new(provider));
        handles.tftp = Some(tokio::spawn(async move {
            if let Err(e) = server.run(shutdown).await {
                error!(error = %e, "TFTP server error");
            }
        }));
    }

    handles
}
