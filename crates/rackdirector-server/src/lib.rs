//! rackdirector server
//!
//! HTTP front-end for network boot and plan control, plus wiring for the
//! DHCP and TFTP listeners. All three share one [`ProvisioningService`]
//! and one host directory.
//!
//! # Routes
//!
//! | Route | Response |
//! |---|---|
//! | `GET /config.ipxe` | iPXE script for the caller |
//! | `GET /{bios,efi32,efi64}/pxelinux.cfg/default` | PXE menu for the caller |
//! | `GET /{bios,efi32,efi64}/*`, `GET /ipxe.efi` | static boot loader files |
//! | `GET /installseed` | installer seed for the caller |
//! | `GET /api/plan?address=` | current plan |
//! | `POST /api/plan` | assign a plan (power cycles the host) |
//! | `POST /api/advanceplan` | advance the caller's plan |
//! | `GET /healthz` | liveness |

pub mod api;
pub mod error;
pub mod files;
pub mod services;
pub mod state;

pub use api::{router, AdvanceResponse, AssignPlanRequest, PlanResponse};
pub use error::{ApiError, ErrorResponse};
pub use services::{ServiceHandles, ServicesConfig, TftpServiceConfig};
pub use state::AppState;

use anyhow::Context;
use rackdirector_provision::ProvisioningService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Root of the statically served boot loader files
    pub http_dir: PathBuf,
    pub services: ServicesConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 80)),
            http_dir: PathBuf::from("http"),
            services: ServicesConfig::default(),
        }
    }
}

/// Run HTTP, DHCP and TFTP until Ctrl+C or SIGTERM
pub async fn run(config: ServerConfig, service: Arc<ProvisioningService>) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", config.http_addr))?;
    info!(
        addr = %listener.local_addr().context("Failed to get local address")?,
        "HTTP server listening"
    );

    let handles = services::start(&config.services, service.hosts(), shutdown_rx);
    let app = router(AppState::new(service, config.http_dir));

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx))
    .await
    .context("HTTP server error")?;

    handles.join().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Sending shutdown signal to all services");
    let _ = shutdown_tx.send(true);
}
