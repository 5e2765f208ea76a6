//! Boot loader file lookup
//!
//! Only a fixed set of loader names is served. Everything else is reported
//! as missing, so the TFTP root can hold other files without exposing them.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Legacy BIOS iPXE chainloader
pub const UNDIONLY: &str = "undionly.kpxe";
/// UEFI iPXE binary
pub const IPXE_EFI: &str = "ipxe.efi";
/// Loader every BIOS pxelinux variant is served from
pub const BIOS_LPXELINUX: &str = "bios/lpxelinux.0";

/// Trait for providing files to the TFTP server
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Get file contents by requested name
    async fn get_file(&self, path: &str) -> Option<Bytes>;
}

/// Alias table mapping requested boot loader names to files under a base directory
#[derive(Debug, Clone)]
pub struct BootFileAliases {
    base_dir: PathBuf,
}

impl BootFileAliases {
    /// Create an alias table rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Base directory files are served from
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a requested filename to the file that should be sent
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let filename = filename.trim_start_matches('/');

        let relative = match filename {
            IPXE_EFI | UNDIONLY => filename,
            "bios/pxelinux.0" | "bios/gpxelinux.0" | "bios/ipxelinux.0" | BIOS_LPXELINUX => {
                BIOS_LPXELINUX
            }
            "efi32/syslinux.efi" | "efi64/syslinux.efi" => filename,
            _ => match filename.split_once('/') {
                Some(("efi32" | "efi64", basename))
                    if !basename.is_empty()
                        && !basename.contains('/')
                        && basename != "."
                        && basename != ".." =>
                {
                    filename
                }
                _ => return None,
            },
        };

        Some(self.base_dir.join(relative))
    }
}

#[async_trait]
impl FileProvider for BootFileAliases {
    async fn get_file(&self, path: &str) -> Option<Bytes> {
        let resolved = self.resolve(path)?;
        match tokio::fs::read(&resolved).await {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) => {
                debug!(requested = %path, path = %resolved.display(), error = %e, "Boot file unreadable");
                None
            }
        }
    }
}
