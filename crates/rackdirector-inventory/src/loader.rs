//! JSON inventory loading

use crate::directory::HostDirectory;
use crate::error::{InventoryError, Result};
use crate::types::{HostRecord, ManagementController, NetworkInterface};
use ipnetwork::Ipv4Network;
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    hosts: Vec<HostEntry>,
}

#[derive(Debug, Deserialize)]
struct HostEntry {
    hostname: String,
    #[serde(default)]
    interfaces: Vec<InterfaceEntry>,
    bmc: BmcEntry,
}

#[derive(Debug, Deserialize)]
struct InterfaceEntry {
    device: String,
    port: String,
    ipv4: String,
    #[serde(default)]
    ipv4_gateway: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BmcEntry {
    hostname: String,
    port: String,
    ipv4: String,
    #[serde(default)]
    ipv4_gateway: Option<String>,
}

fn parse_cidr(owner: &str, value: &str) -> Result<Ipv4Network> {
    value.trim().parse().map_err(|_| InventoryError::InvalidCidr {
        owner: owner.to_string(),
        value: value.to_string(),
    })
}

fn parse_gateway(owner: &str, value: Option<&str>) -> Result<Option<Ipv4Addr>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| InventoryError::InvalidGateway {
                owner: owner.to_string(),
                value: raw.to_string(),
            }),
    }
}

impl HostEntry {
    fn into_record(self) -> Result<HostRecord> {
        let interfaces = self
            .interfaces
            .into_iter()
            .map(|entry| {
                let owner = format!("{}:{}", self.hostname, entry.device);
                Ok(NetworkInterface {
                    network: parse_cidr(&owner, &entry.ipv4)?,
                    gateway: parse_gateway(&owner, entry.ipv4_gateway.as_deref())?,
                    device: entry.device,
                    port: entry.port,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let bmc = ManagementController {
            network: parse_cidr(&self.bmc.hostname, &self.bmc.ipv4)?,
            gateway: parse_gateway(&self.bmc.hostname, self.bmc.ipv4_gateway.as_deref())?,
            hostname: self.bmc.hostname,
            port: self.bmc.port,
        };

        Ok(HostRecord {
            hostname: self.hostname,
            interfaces,
            bmc,
        })
    }
}

impl HostDirectory {
    /// Build a directory from an inventory JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let file: InventoryFile = serde_json::from_str(json)?;
        let records = file
            .hosts
            .into_iter()
            .map(HostEntry::into_record)
            .collect::<Result<Vec<_>>>()?;
        Self::new(records)
    }

    /// Load a directory from an inventory file on disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InventoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let directory = Self::from_json(&json)?;
        info!(path = %path.display(), hosts = directory.len(), "Loaded host inventory");
        Ok(directory)
    }
}
