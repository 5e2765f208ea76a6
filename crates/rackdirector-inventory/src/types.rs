//! Host inventory records
//!
//! These are immutable once the directory is built. Every endpoint carries
//! its address together with the prefix it lives on, so the same
//! [`Ipv4Network`] answers both "what is my address" and "does this relay
//! belong to my subnet".

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

/// A host network interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    /// OS device label (e.g., "eth0")
    pub device: String,
    /// Attachment point, matched against relay circuit identifiers
    pub port: String,
    /// Bound address and its subnet
    pub network: Ipv4Network,
    /// Default gateway, if the subnet has one
    pub gateway: Option<Ipv4Addr>,
}

impl NetworkInterface {
    /// Address bound to this interface
    pub fn address(&self) -> Ipv4Addr {
        self.network.ip()
    }
}

/// Out-of-band management controller (BMC)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementController {
    /// Controller hostname, used as the power-control target
    pub hostname: String,
    /// Attachment point of the controller's dedicated port
    pub port: String,
    /// Bound address and its subnet
    pub network: Ipv4Network,
    /// Default gateway, if the subnet has one
    pub gateway: Option<Ipv4Addr>,
}

impl ManagementController {
    /// Address bound to the controller
    pub fn address(&self) -> Ipv4Addr {
        self.network.ip()
    }
}

/// A provisioned machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Fully qualified hostname
    pub hostname: String,
    /// Interfaces in inventory order; the first is the primary one
    pub interfaces: Vec<NetworkInterface>,
    /// The host's management controller
    pub bmc: ManagementController,
}

impl HostRecord {
    /// Domain part of the hostname (everything after the first `.`)
    pub fn domain(&self) -> Option<&str> {
        self.hostname
            .split_once('.')
            .map(|(_, domain)| domain)
            .filter(|domain| !domain.is_empty())
    }

    /// The first configured interface
    pub fn primary_interface(&self) -> Option<&NetworkInterface> {
        self.interfaces.first()
    }

    /// Address of the primary interface; plan state is keyed by it
    pub fn primary_address(&self) -> Option<Ipv4Addr> {
        self.primary_interface().map(NetworkInterface::address)
    }
}

/// The endpoint a relayed request was matched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint<'a> {
    /// One of the host's OS interfaces
    Interface(&'a NetworkInterface),
    /// The host's management controller
    Controller(&'a ManagementController),
}

impl<'a> Endpoint<'a> {
    /// Address and subnet of the endpoint
    pub fn network(&self) -> Ipv4Network {
        match self {
            Endpoint::Interface(iface) => iface.network,
            Endpoint::Controller(bmc) => bmc.network,
        }
    }

    /// Address bound to the endpoint
    pub fn address(&self) -> Ipv4Addr {
        self.network().ip()
    }

    /// Gateway of the endpoint's subnet
    pub fn gateway(&self) -> Option<Ipv4Addr> {
        match self {
            Endpoint::Interface(iface) => iface.gateway,
            Endpoint::Controller(bmc) => bmc.gateway,
        }
    }

    /// Attachment point label
    pub fn port(&self) -> &'a str {
        match self {
            Endpoint::Interface(iface) => &iface.port,
            Endpoint::Controller(bmc) => &bmc.port,
        }
    }

    /// Whether this is the management controller
    pub fn is_controller(&self) -> bool {
        matches!(self, Endpoint::Controller(_))
    }
}

/// Result of resolving a relay attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment<'a> {
    /// The owning host
    pub host: &'a HostRecord,
    /// The matched interface or controller
    pub endpoint: Endpoint<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(hostname: &str) -> HostRecord {
        HostRecord {
            hostname: hostname.to_string(),
            interfaces: vec![NetworkInterface {
                device: "eth0".to_string(),
                port: "ge-0/0/1.0".to_string(),
                network: "10.0.1.20/24".parse().unwrap(),
                gateway: Some(Ipv4Addr::new(10, 0, 1, 1)),
            }],
            bmc: ManagementController {
                hostname: "node01-bmc.lab.example".to_string(),
                port: "ge-0/0/1.0:management".to_string(),
                network: "10.0.2.20/24".parse().unwrap(),
                gateway: None,
            },
        }
    }

    #[test]
    fn test_domain() {
        assert_eq!(host("node01.lab.example").domain(), Some("lab.example"));
        assert_eq!(host("node01").domain(), None);
        assert_eq!(host("node01.").domain(), None);
    }

    #[test]
    fn test_primary_address() {
        let record = host("node01.lab.example");
        assert_eq!(record.primary_address(), Some(Ipv4Addr::new(10, 0, 1, 20)));

        let bare = HostRecord {
            interfaces: Vec::new(),
            ..record
        };
        assert_eq!(bare.primary_address(), None);
    }

    #[test]
    fn test_endpoint_accessors() {
        let record = host("node01.lab.example");
        let iface = Endpoint::Interface(&record.interfaces[0]);
        assert_eq!(iface.address(), Ipv4Addr::new(10, 0, 1, 20));
        assert_eq!(iface.gateway(), Some(Ipv4Addr::new(10, 0, 1, 1)));
        assert!(!iface.is_controller());

        let bmc = Endpoint::Controller(&record.bmc);
        assert_eq!(bmc.address(), Ipv4Addr::new(10, 0, 2, 20));
        assert_eq!(bmc.port(), "ge-0/0/1.0:management");
        assert!(bmc.is_controller());
    }
}
