//! Error types for provisioning
//!
//! [`ProvisionError`] is returned by every request-time operation and
//! carries a stable [`ProvisionError::kind`] code for the HTTP boundary.
//! [`ConfigError`] covers loading plan catalogs and templates at startup.

use rackdirector_bmc::BmcError;
use rackdirector_inventory::HostNotFound;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for provisioning operations
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Address is not bound to any known host
    #[error(transparent)]
    HostNotFound(#[from] HostNotFound),

    /// Host has no active plan
    #[error("{0} is not in a plan")]
    PlanNotFound(Ipv4Addr),

    /// Host already has an active plan
    #[error("{address} is already in plan {plan}")]
    PlanAlreadyActive { address: Ipv4Addr, plan: String },

    /// Plan name is not in the catalog
    #[error("plan {0} doesn't exist")]
    UnknownPlan(String),

    /// Install content requested outside an install stage
    #[error("{address} is not in an install stage (current stage: {})", .stage.as_deref().unwrap_or("none"))]
    NotInInstallStage {
        address: Ipv4Addr,
        stage: Option<String>,
    },

    /// No template registered under this name
    #[error("template {0} is missing")]
    TemplateMissing(String),

    /// Power cycling the host's management controller failed
    #[error("power cycle via {bmc} failed: {source}")]
    ManagementCommandFailure {
        bmc: String,
        #[source]
        source: BmcError,
    },

    /// Template evaluation failed
    #[error("failed to render {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: minijinja::Error,
    },
}

impl ProvisionError {
    /// Machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::HostNotFound(_) => "host_not_found",
            ProvisionError::PlanNotFound(_) => "plan_not_found",
            ProvisionError::PlanAlreadyActive { .. } => "plan_already_active",
            ProvisionError::UnknownPlan(_) => "unknown_plan",
            ProvisionError::NotInInstallStage { .. } => "not_in_install_stage",
            ProvisionError::TemplateMissing(_) => "template_missing",
            ProvisionError::ManagementCommandFailure { .. } => "management_command_failure",
            ProvisionError::Render { .. } => "render_failed",
        }
    }
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Error type for loading provisioning configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file or directory
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Plan catalog is not valid YAML for the expected schema
    #[error("failed to parse plan catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Plan has no stages
    #[error("plan {0} has no stages")]
    EmptyPlan(String),

    /// Template source does not compile
    #[error("invalid template {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let address = Ipv4Addr::new(10, 0, 1, 20);

        let err = ProvisionError::PlanAlreadyActive {
            address,
            plan: "reinstall-centos-8".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "10.0.1.20 is already in plan reinstall-centos-8"
        );

        let err = ProvisionError::NotInInstallStage {
            address,
            stage: None,
        };
        assert_eq!(
            err.to_string(),
            "10.0.1.20 is not in an install stage (current stage: none)"
        );

        let err = ProvisionError::from(HostNotFound("10.0.1.99".to_string()));
        assert_eq!(err.to_string(), "host not found: 10.0.1.99");

        let err = ConfigError::EmptyPlan("wipe".to_string());
        assert_eq!(err.to_string(), "plan wipe has no stages");
    }

    #[test]
    fn test_error_kinds() {
        let address = Ipv4Addr::new(10, 0, 1, 20);

        assert_eq!(
            ProvisionError::from(HostNotFound(String::new())).kind(),
            "host_not_found"
        );
        assert_eq!(ProvisionError::PlanNotFound(address).kind(), "plan_not_found");
        assert_eq!(
            ProvisionError::UnknownPlan("x".to_string()).kind(),
            "unknown_plan"
        );
        assert_eq!(
            ProvisionError::TemplateMissing("x.template".to_string()).kind(),
            "template_missing"
        );
        assert_eq!(
            ProvisionError::ManagementCommandFailure {
                bmc: "node01-bmc".to_string(),
                source: BmcError::Timeout {
                    target: "node01-bmc".to_string(),
                    timeout: std::time::Duration::from_secs(1),
                },
            }
            .kind(),
            "management_command_failure"
        );
    }
}
