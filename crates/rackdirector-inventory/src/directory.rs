//! Host directory and lookup indices
//!
//! The directory is built once from inventory and never mutated, so it is
//! shared between protocol front-ends behind an `Arc` without locking.

use crate::error::{HostNotFound, InventoryError, Result};
use crate::types::{Attachment, Endpoint, HostRecord};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tracing::debug;

/// Host lookups needed by the boot and provisioning paths
pub trait HostResolver: Send + Sync {
    /// Find the interface or controller on `attachment_id` whose subnet
    /// contains the relay agent address. Interfaces win over controllers.
    fn resolve_by_attachment(
        &self,
        attachment_id: &str,
        relay: Ipv4Addr,
    ) -> std::result::Result<Attachment<'_>, HostNotFound>;

    /// Find the host owning an interface or controller address
    fn resolve_by_address(&self, address: Ipv4Addr)
        -> std::result::Result<&HostRecord, HostNotFound>;

    /// Find a host by its own or its controller's hostname
    fn resolve_by_hostname(&self, hostname: &str)
        -> std::result::Result<&HostRecord, HostNotFound>;
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Interface(usize),
    Controller,
}

/// Read-only set of hosts with derived indices
#[derive(Debug, Default)]
pub struct HostDirectory {
    hosts: Vec<HostRecord>,
    by_port: HashMap<String, Vec<(usize, Slot)>>,
    by_address: HashMap<Ipv4Addr, usize>,
    by_hostname: HashMap<String, usize>,
}

impl HostDirectory {
    /// Build the directory, rejecting ambiguous topology
    pub fn new(hosts: Vec<HostRecord>) -> Result<Self> {
        let mut directory = Self {
            hosts: Vec::with_capacity(hosts.len()),
            ..Default::default()
        };
        // (port, network, prefix) -> owner label
        let mut claims: HashMap<(String, Ipv4Addr, u8), String> = HashMap::new();
        let mut address_owners: HashMap<Ipv4Addr, String> = HashMap::new();

        for (idx, host) in hosts.into_iter().enumerate() {
            let mut endpoints: Vec<(Slot, Endpoint<'_>, String)> = host
                .interfaces
                .iter()
                .enumerate()
                .map(|(i, iface)| {
                    (
                        Slot::Interface(i),
                        Endpoint::Interface(iface),
                        format!("{}:{}", host.hostname, iface.device),
                    )
                })
                .collect();
            endpoints.push((
                Slot::Controller,
                Endpoint::Controller(&host.bmc),
                host.bmc.hostname.clone(),
            ));

            for (slot, endpoint, owner) in endpoints {
                let network = endpoint.network();
                let key = (endpoint.port().to_string(), network.network(), network.prefix());
                if let Some(first) = claims.get(&key) {
                    return Err(InventoryError::AmbiguousAttachment {
                        port: key.0,
                        subnet: format!("{}/{}", key.1, key.2),
                        first: first.clone(),
                        second: owner,
                    });
                }
                if let Some(first) = address_owners.get(&endpoint.address()) {
                    return Err(InventoryError::DuplicateAddress {
                        address: endpoint.address(),
                        first: first.clone(),
                        second: owner,
                    });
                }
                claims.insert(key, owner.clone());
                address_owners.insert(endpoint.address(), owner);

                directory
                    .by_port
                    .entry(endpoint.port().to_string())
                    .or_default()
                    .push((idx, slot));
                directory.by_address.insert(endpoint.address(), idx);
            }

            for name in [&host.hostname, &host.bmc.hostname] {
                if directory.by_hostname.insert(name.clone(), idx).is_some() {
                    return Err(InventoryError::DuplicateHostname(name.clone()));
                }
            }

            directory.hosts.push(host);
        }

        debug!(
            hosts = directory.hosts.len(),
            attachments = directory.by_port.len(),
            "Built host directory"
        );
        Ok(directory)
    }

    /// All hosts in inventory order
    pub fn hosts(&self) -> &[HostRecord] {
        &self.hosts
    }

    /// Number of hosts
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the directory has no hosts
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    fn endpoint(&self, idx: usize, slot: Slot) -> Option<Attachment<'_>> {
        let host = self.hosts.get(idx)?;
        let endpoint = match slot {
            Slot::Interface(i) => Endpoint::Interface(host.interfaces.get(i)?),
            Slot::Controller => Endpoint::Controller(&host.bmc),
        };
        Some(Attachment { host, endpoint })
    }
}

impl HostResolver for HostDirectory {
    fn resolve_by_attachment(
        &self,
        attachment_id: &str,
        relay: Ipv4Addr,
    ) -> std::result::Result<Attachment<'_>, HostNotFound> {
        let candidates = self.by_port.get(attachment_id).map(Vec::as_slice).unwrap_or(&[]);

        let on_subnet = |(idx, slot): &(usize, Slot)| {
            self.endpoint(*idx, *slot)
                .filter(|found| found.endpoint.network().contains(relay))
        };

        candidates
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Interface(_)))
            .find_map(on_subnet)
            .or_else(|| {
                candidates
                    .iter()
                    .filter(|(_, slot)| matches!(slot, Slot::Controller))
                    .find_map(on_subnet)
            })
            .ok_or_else(|| HostNotFound(format!("attachment '{}' via relay {}", attachment_id, relay)))
    }

    fn resolve_by_address(
        &self,
        address: Ipv4Addr,
    ) -> std::result::Result<&HostRecord, HostNotFound> {
        self.by_address
            .get(&address)
            .and_then(|idx| self.hosts.get(*idx))
            .ok_or_else(|| HostNotFound(address.to_string()))
    }

    fn resolve_by_hostname(
        &self,
        hostname: &str,
    ) -> std::result::Result<&HostRecord, HostNotFound> {
        self.by_hostname
            .get(hostname)
            .and_then(|idx| self.hosts.get(*idx))
            .ok_or_else(|| HostNotFound(hostname.to_string()))
    }
}
