//! Shared handler state

use rackdirector_provision::ProvisioningService;
use std::path::PathBuf;
use std::sync::Arc;

/// State handed to every HTTP handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ProvisioningService>,
    /// Root of the statically served boot loader files
    pub http_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(service: Arc<ProvisioningService>, http_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            http_dir: Arc::new(http_dir.into()),
        }
    }
}
