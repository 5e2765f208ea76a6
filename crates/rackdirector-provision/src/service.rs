//! Provisioning service
//!
//! Ties the host directory, plan registry, power control and boot assets
//! together. Every operation addresses a host by any address it owns; plan
//! state is always keyed by the host's primary address.

use crate::content::BootAssets;
use crate::error::{ProvisionError, Result};
use crate::registry::{Advance, PlanStore, ProvisioningPlan};
use rackdirector_bmc::PowerControl;
use rackdirector_inventory::{HostNotFound, HostRecord, HostResolver};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates plan lifecycle and boot content for hosts
pub struct ProvisioningService {
    hosts: Arc<dyn HostResolver>,
    plans: Arc<dyn PlanStore>,
    power: Arc<dyn PowerControl>,
    assets: BootAssets,
}

impl ProvisioningService {
    pub fn new(
        hosts: Arc<dyn HostResolver>,
        plans: Arc<dyn PlanStore>,
        power: Arc<dyn PowerControl>,
        assets: BootAssets,
    ) -> Self {
        Self {
            hosts,
            plans,
            power,
            assets,
        }
    }

    /// Shared handle to the host directory
    pub fn hosts(&self) -> Arc<dyn HostResolver> {
        Arc::clone(&self.hosts)
    }

    /// Shared handle to the plan store
    pub fn plans(&self) -> Arc<dyn PlanStore> {
        Arc::clone(&self.plans)
    }

    pub fn assets(&self) -> &BootAssets {
        &self.assets
    }

    /// Resolve a host and its plan key
    fn host(&self, address: Ipv4Addr) -> Result<(&HostRecord, Ipv4Addr)> {
        let host = self.hosts.resolve_by_address(address)?;
        let key = host
            .primary_address()
            .ok_or_else(|| HostNotFound(host.hostname.clone()))?;
        Ok((host, key))
    }

    fn active_plan(&self, key: Ipv4Addr) -> Option<ProvisioningPlan> {
        self.plans.get(key).ok()
    }

    /// Start a plan and power cycle the host into it
    ///
    /// The plan stays recorded when the power cycle fails.
    pub async fn assign_plan(&self, address: Ipv4Addr, plan_name: &str) -> Result<ProvisioningPlan> {
        let (host, key) = self.host(address)?;
        let bmc = host.bmc.hostname.clone();

        let plan = self.plans.assign(key, plan_name)?;
        info!(
            host = %host.hostname,
            address = %key,
            plan = %plan.name,
            stage = %plan.current_stage(),
            "Assigned plan"
        );

        if let Err(source) = self.power.power_cycle(&bmc).await {
            warn!(host = %key, bmc = %bmc, error = %source, "Power cycle failed; plan remains active");
            return Err(ProvisionError::ManagementCommandFailure { bmc, source });
        }
        Ok(plan)
    }

    /// Stage the host is currently in
    pub fn current_stage(&self, address: Ipv4Addr) -> Result<String> {
        Ok(self.current_plan(address)?.current_stage().to_string())
    }

    /// The host's active plan
    pub fn current_plan(&self, address: Ipv4Addr) -> Result<ProvisioningPlan> {
        let (_, key) = self.host(address)?;
        self.plans.get(key)
    }

    /// Move the host's plan to its next stage
    pub fn advance(&self, address: Ipv4Addr) -> Result<Advance> {
        let (host, key) = self.host(address)?;
        let outcome = self.plans.advance(key)?;
        match &outcome {
            Advance::Moved(plan) => {
                info!(host = %host.hostname, plan = %plan.name, stage = %plan.current_stage(), "Advanced plan")
            }
            Advance::Completed(plan) => {
                info!(host = %host.hostname, plan = %plan.name, "Completed plan")
            }
        }
        Ok(outcome)
    }

    /// PXE menu for the host owning `address`
    pub fn pxe_menu_config(&self, address: Ipv4Addr) -> Result<String> {
        let (host, key) = self.host(address)?;
        let plan = self.active_plan(key);
        self.assets.pxe_menu(host, key, address, plan.as_ref())
    }

    /// iPXE script for the host owning `address`
    pub fn ipxe_script(&self, address: Ipv4Addr) -> Result<String> {
        let (host, key) = self.host(address)?;
        let plan = self.active_plan(key);
        self.assets.ipxe_script(host, key, address, plan.as_ref())
    }

    /// Installer seed for the host owning `address`
    pub fn install_content(&self, address: Ipv4Addr) -> Result<String> {
        let (host, key) = self.host(address)?;
        let plan = self.active_plan(key);
        self.assets.install_content(host, key, plan.as_ref())
    }
}
