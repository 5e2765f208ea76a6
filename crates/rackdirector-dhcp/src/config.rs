//! DHCP responder configuration
//!
//! Addressing comes from the host directory; this holds only the values
//! shared by every reply.

use std::net::Ipv4Addr;

/// DHCP server configuration
#[derive(Debug, Clone)]
pub struct DhcpConfig {
    /// IP address to bind the socket to (0.0.0.0 for all interfaces)
    pub bind_ip: Ipv4Addr,

    /// UDP port to listen on
    pub port: u16,

    /// Address advertised when the socket is bound to all interfaces
    pub server_ip: Ipv4Addr,

    /// TFTP server name handed to host interfaces (option 66); the
    /// advertised address when unset
    pub tftp_server_name: Option<String>,

    /// DNS resolvers handed to every client
    pub dns_servers: Vec<Ipv4Addr>,

    /// Lease time in seconds
    pub lease_time: u32,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self::new(Ipv4Addr::new(10, 0, 1, 10))
    }
}

impl DhcpConfig {
    /// Create a config advertising `server_ip`
    pub fn new(server_ip: Ipv4Addr) -> Self {
        Self {
            bind_ip: Ipv4Addr::UNSPECIFIED,
            port: 67,
            server_ip,
            tftp_server_name: None,
            dns_servers: vec![Ipv4Addr::new(1, 1, 1, 1)],
            lease_time: 86400, // 24 hours
        }
    }

    /// Set the bind address
    pub fn with_bind_ip(mut self, ip: Ipv4Addr) -> Self {
        self.bind_ip = ip;
        self
    }

    /// Set the listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the TFTP server name
    pub fn with_tftp_server_name(mut self, name: impl Into<String>) -> Self {
        self.tftp_server_name = Some(name.into());
        self
    }

    /// Replace the DNS resolver list
    pub fn with_dns_servers(mut self, servers: Vec<Ipv4Addr>) -> Self {
        self.dns_servers = servers;
        self
    }

    /// Set the lease time
    pub fn with_lease_time(mut self, seconds: u32) -> Self {
        self.lease_time = seconds;
        self
    }

    /// Server identifier and host part of boot URLs
    ///
    /// A specific bind address wins over `server_ip`, so clients are sent
    /// back to the address that answered them.
    pub fn advertised_ip(&self) -> Ipv4Addr {
        if self.bind_ip.is_unspecified() {
            self.server_ip
        } else {
            self.bind_ip
        }
    }

    /// TFTP server name for host interfaces
    pub fn tftp_server(&self) -> String {
        self.tftp_server_name
            .clone()
            .unwrap_or_else(|| self.advertised_ip().to_string())
    }
}
