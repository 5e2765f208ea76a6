//! Plan registry
//!
//! The only mutable shared state in the provisioning core. Entries are keyed
//! by the host's primary address and removed once their last stage is
//! advanced past.

use crate::catalog::PlanCatalog;
use crate::error::{ProvisionError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// A plan in progress on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningPlan {
    /// Catalog name of the plan
    pub name: String,
    /// Ordered stage identifiers, never empty
    pub stages: Vec<String>,
    /// Index into `stages`
    pub current: usize,
}

impl ProvisioningPlan {
    pub(crate) fn new(name: impl Into<String>, stages: Vec<String>) -> Self {
        Self {
            name: name.into(),
            stages,
            current: 0,
        }
    }

    /// Identifier of the stage the host is in
    pub fn current_stage(&self) -> &str {
        self.stages
            .get(self.current)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Result of advancing a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The plan moved on and is still active
    Moved(ProvisioningPlan),
    /// The last stage finished; the entry was removed
    Completed(ProvisioningPlan),
}

/// Get, set and advance plan state by host key
pub trait PlanStore: Send + Sync {
    /// Start `plan_name` at its first stage
    fn assign(&self, key: Ipv4Addr, plan_name: &str) -> Result<ProvisioningPlan>;

    /// The active plan for `key`
    fn get(&self, key: Ipv4Addr) -> Result<ProvisioningPlan>;

    /// Move `key` to its next stage, retiring the plan after the last one
    fn advance(&self, key: Ipv4Addr) -> Result<Advance>;
}

/// In-memory plan state behind a single lock
#[derive(Debug)]
pub struct PlanRegistry {
    catalog: PlanCatalog,
    plans: RwLock<HashMap<Ipv4Addr, ProvisioningPlan>>,
}

impl PlanRegistry {
    /// Create an empty registry over a plan catalog
    pub fn new(catalog: PlanCatalog) -> Self {
        Self {
            catalog,
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// The catalog plans are instantiated from
    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Number of active plans
    pub fn active(&self) -> usize {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl PlanStore for PlanRegistry {
    fn assign(&self, key: Ipv4Addr, plan_name: &str) -> Result<ProvisioningPlan> {
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = plans.get(&key) {
            return Err(ProvisionError::PlanAlreadyActive {
                address: key,
                plan: existing.name.clone(),
            });
        }

        let plan = self.catalog.instantiate(plan_name)?;
        plans.insert(key, plan.clone());
        debug!(host = %key, plan = %plan.name, stage = %plan.current_stage(), "Plan assigned");
        Ok(plan)
    }

    fn get(&self, key: Ipv4Addr) -> Result<ProvisioningPlan> {
        self.plans
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or(ProvisionError::PlanNotFound(key))
    }

    fn advance(&self, key: Ipv4Addr) -> Result<Advance> {
        let mut plans = self.plans.write().unwrap_or_else(PoisonError::into_inner);

        let plan = plans
            .get_mut(&key)
            .ok_or(ProvisionError::PlanNotFound(key))?;
        plan.current += 1;

        if plan.current >= plan.stages.len() {
            let done = plans
                .remove(&key)
                .ok_or(ProvisionError::PlanNotFound(key))?;
            debug!(host = %key, plan = %done.name, "Plan completed");
            return Ok(Advance::Completed(done));
        }

        debug!(host = %key, plan = %plan.name, stage = %plan.current_stage(), "Plan advanced");
        Ok(Advance::Moved(plan.clone()))
    }
}
