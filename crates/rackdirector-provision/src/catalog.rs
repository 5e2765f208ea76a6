//! Plan catalog
//!
//! Maps plan names to their ordered stage lists. The built-in catalog can
//! be replaced wholesale by a YAML file:
//!
//! ```yaml
//! plans:
//!   reinstall-centos-8:
//!     - install-centos-8
//! ```

use crate::error::{ConfigError, ProvisionError};
use crate::registry::ProvisioningPlan;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CatalogFile {
    plans: BTreeMap<String, Vec<String>>,
}

/// Named plans and their stage sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: BTreeMap<String, Vec<String>>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let plans = [
            ("reinstall-centos-8", "install-centos-8"),
            ("reinstall-centos-7", "install-centos-7"),
        ]
        .into_iter()
        .map(|(plan, stage)| (plan.to_string(), vec![stage.to_string()]))
        .collect();
        Self { plans }
    }
}

impl PlanCatalog {
    /// Build a catalog, rejecting plans without stages
    pub fn new(plans: BTreeMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        if let Some((name, _)) = plans.iter().find(|(_, stages)| stages.is_empty()) {
            return Err(ConfigError::EmptyPlan(name.clone()));
        }
        Ok(Self { plans })
    }

    /// Parse a YAML catalog
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.plans)
    }

    /// Load a YAML catalog from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_yaml(&yaml)?;
        info!(path = %path.display(), plans = catalog.plans.len(), "Loaded plan catalog");
        Ok(catalog)
    }

    /// Stage list for a plan
    pub fn stages(&self, name: &str) -> Option<&[String]> {
        self.plans.get(name).map(Vec::as_slice)
    }

    /// Plan names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plans.keys().map(String::as_str)
    }

    /// A fresh plan positioned at its first stage
    pub fn instantiate(&self, name: &str) -> Result<ProvisioningPlan, ProvisionError> {
        let stages = self
            .stages(name)
            .ok_or_else(|| ProvisionError::UnknownPlan(name.to_string()))?;
        Ok(ProvisioningPlan::new(name, stages.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_plans() {
        let catalog = PlanCatalog::default();

        assert_eq!(
            catalog.stages("reinstall-centos-8"),
            Some(&["install-centos-8".to_string()][..])
        );
        assert_eq!(
            catalog.names().collect::<Vec<_>>(),
            vec!["reinstall-centos-7", "reinstall-centos-8"]
        );
    }

    #[test]
    fn test_instantiate() {
        let catalog = PlanCatalog::default();

        let plan = catalog.instantiate("reinstall-centos-7").unwrap();
        assert_eq!(plan.name, "reinstall-centos-7");
        assert_eq!(plan.current_stage(), "install-centos-7");

        let err = catalog.instantiate("reinstall-windows").unwrap_err();
        assert!(matches!(err, ProvisionError::UnknownPlan(ref name) if name == "reinstall-windows"));
    }

    #[test]
    fn test_from_yaml() {
        let catalog = PlanCatalog::from_yaml(
            "plans:\n  rebuild:\n    - install-debian-12\n    - burn-in\n",
        )
        .unwrap();

        assert_eq!(catalog.stages("rebuild").unwrap().len(), 2);
        // Replaces the built-in plans
        assert!(catalog.stages("reinstall-centos-8").is_none());
    }

    #[test]
    fn test_empty_plan_rejected() {
        let err = PlanCatalog::from_yaml("plans:\n  nothing: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPlan(ref name) if name == "nothing"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plans:\n  reinstall-rocky-9: [install-rocky-9]\n")
            .unwrap();

        let catalog = PlanCatalog::from_file(file.path()).unwrap();
        assert!(catalog.stages("reinstall-rocky-9").is_some());

        let err = PlanCatalog::from_file("/nonexistent/plans.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
