//! IPMI power control through the `ipmitool` binary
//!
//! The password is handed over in the `IPMI_PASSWORD` environment variable
//! (`ipmitool -E`), so it never shows up in the process list.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::controller::PowerControl;
use crate::error::{BmcError, Result};

/// `ipmitool` invocation settings
#[derive(Debug, Clone)]
pub struct IpmiToolConfig {
    /// Path or name of the ipmitool binary
    pub program: String,
    /// IPMI interface (`-I`)
    pub interface: String,
    /// BMC username
    pub username: String,
    /// BMC password, passed through the environment
    pub password: String,
    /// Upper bound on a single invocation
    pub timeout: Duration,
}

impl Default for IpmiToolConfig {
    fn default() -> Self {
        Self {
            program: "ipmitool".to_string(),
            interface: "lanplus".to_string(),
            username: "ADMIN".to_string(),
            password: "ADMIN".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl IpmiToolConfig {
    /// Create a config with the given credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    /// Use a different ipmitool binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Use a different IPMI interface
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interface = interface.into();
        self
    }

    /// Set the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Power control backed by `ipmitool`
#[derive(Debug, Clone)]
pub struct IpmiTool {
    config: IpmiToolConfig,
}

impl IpmiTool {
    /// Create a new ipmitool controller
    pub fn new(config: IpmiToolConfig) -> Self {
        Self { config }
    }

    /// Build ipmitool command args
    fn args(&self, bmc_hostname: &str, command: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = [
            "-I",
            self.config.interface.as_str(),
            "-H",
            bmc_hostname,
            "-U",
            self.config.username.as_str(),
            "-E",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.extend(command.iter().map(|s| s.to_string()));
        args
    }

    async fn execute(&self, bmc_hostname: &str, command: &[&str]) -> Result<()> {
        let args = self.args(bmc_hostname, command);
        debug!(program = %self.config.program, args = ?args, "Running ipmitool");

        let child = Command::new(&self.config.program)
            .args(&args)
            .env("IPMI_PASSWORD", &self.config.password)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BmcError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| BmcError::Spawn {
                program: self.config.program.clone(),
                source,
            })?,
            Err(_) => {
                warn!(bmc = %bmc_hostname, timeout = ?self.config.timeout, "ipmitool timed out");
                return Err(BmcError::Timeout {
                    target: bmc_hostname.to_string(),
                    timeout: self.config.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(BmcError::CommandFailed {
                target: bmc_hostname.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PowerControl for IpmiTool {
    async fn power_cycle(&self, bmc_hostname: &str) -> Result<()> {
        self.execute(bmc_hostname, &["chassis", "power", "cycle"])
            .await?;
        info!(bmc = %bmc_hostname, "Power cycled host");
        Ok(())
    }
}
