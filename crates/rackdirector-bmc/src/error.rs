//! Error types for BMC operations

use std::time::Duration;
use thiserror::Error;

/// Error type for BMC operations
#[derive(Debug, Error)]
pub enum BmcError {
    /// Management tool could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Management tool exited unsuccessfully
    #[error("command failed against {target} ({status}): {stderr}")]
    CommandFailed {
        target: String,
        status: String,
        stderr: String,
    },

    /// Management tool did not finish in time
    #[error("power command against {target} timed out after {timeout:?}")]
    Timeout { target: String, timeout: Duration },
}

/// Result type for BMC operations
pub type Result<T> = std::result::Result<T, BmcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BmcError::CommandFailed {
            target: "node01-bmc.lab".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "Unable to establish IPMI v2 / RMCP+ session".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command failed against node01-bmc.lab (exit status: 1): Unable to establish IPMI v2 / RMCP+ session"
        );

        let err = BmcError::Timeout {
            target: "node01-bmc.lab".to_string(),
            timeout: Duration::from_secs(60),
        };
        assert_eq!(
            err.to_string(),
            "power command against node01-bmc.lab timed out after 60s"
        );
    }
}
