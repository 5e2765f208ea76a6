//! Boot decision engine
//!
//! Pure mapping from the signals in a relayed boot request to the reply a
//! machine should get. No I/O happens here; the server module handles the
//! socket and the packet module the wire format.

use crate::config::DhcpConfig;
use crate::packet::ClientArch;
use rackdirector_inventory::{HostNotFound, HostResolver};
use std::net::Ipv4Addr;

/// Bootfile for legacy BIOS PXE chainloading into iPXE
pub const BIOS_TFTP_BOOTFILE: &str = "undionly.kpxe";
/// Bootfile for UEFI PXE chainloading into iPXE
pub const UEFI_TFTP_BOOTFILE: &str = "ipxe.efi";
/// User class sent by iPXE
pub const USER_CLASS_IPXE: &str = "iPXE";
/// User class sent by UEFI HTTP boot firmware
pub const USER_CLASS_HTTP_CLIENT: &str = "HTTPClient";

/// Message types the engine answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMessage {
    /// DHCPDISCOVER
    Discover,
    /// DHCPREQUEST, with the address the client is asking to keep
    Request { requested: Option<Ipv4Addr> },
}

/// Signals extracted from one boot request
#[derive(Debug, Clone)]
pub struct BootRequest {
    pub message: BootMessage,
    /// Relay circuit id, the attachment point
    pub circuit_id: String,
    /// Relay subscriber id; carried for logging only
    pub subscriber_id: String,
    pub mac_address: String,
    pub relay_ip: Ipv4Addr,
    pub client_arch: ClientArch,
    pub user_class: Option<String>,
}

/// Reply message type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Offer,
    Ack,
    /// Rejection; any attached assignment must not be treated as a grant
    Nak,
}

/// How the client should fetch its next boot stage
///
/// Exactly one of the HTTP or TFTP forms is produced per reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootMethod {
    /// Fetch the bootfile URL over HTTP
    Http { bootfile: String },
    /// Fetch the bootfile over TFTP from `server_name`
    ///
    /// Management controllers get no TFTP server name.
    Tftp {
        server_name: Option<String>,
        bootfile: String,
    },
}

impl BootMethod {
    /// Bootfile name or URL
    pub fn bootfile(&self) -> &str {
        match self {
            BootMethod::Http { bootfile } | BootMethod::Tftp { bootfile, .. } => bootfile,
        }
    }
}

/// Parameters of one DHCP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReply {
    pub kind: ReplyKind,
    /// Server identifier and `siaddr`
    pub server_ip: Ipv4Addr,
    /// Assigned address (`yiaddr`)
    pub your_ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub lease_time: u32,
    pub hostname: String,
    pub domain_search: Option<String>,
    pub boot: BootMethod,
}

/// Pick the boot method from architecture and user class
///
/// `tftp_server_name` is `None` for management controllers.
pub fn classify_boot(
    arch: ClientArch,
    user_class: Option<&str>,
    server_ip: Ipv4Addr,
    tftp_server_name: Option<&str>,
) -> BootMethod {
    let http = |path: &str| BootMethod::Http {
        bootfile: format!("http://{}/{}", server_ip, path),
    };
    let tftp = |bootfile: &str| BootMethod::Tftp {
        server_name: tftp_server_name.map(str::to_string),
        bootfile: bootfile.to_string(),
    };

    match (arch.is_legacy_bios(), user_class) {
        (_, Some(USER_CLASS_IPXE)) => http("config.ipxe"),
        (true, _) => tftp(BIOS_TFTP_BOOTFILE),
        (false, Some(USER_CLASS_HTTP_CLIENT)) => http("ipxe.efi"),
        (false, _) => tftp(UEFI_TFTP_BOOTFILE),
    }
}

/// Reply type for a message given the address the directory assigns
pub fn reply_kind(message: BootMessage, assigned: Ipv4Addr) -> ReplyKind {
    match message {
        BootMessage::Discover => ReplyKind::Offer,
        BootMessage::Request { requested } if requested == Some(assigned) => ReplyKind::Ack,
        BootMessage::Request { .. } => ReplyKind::Nak,
    }
}

/// Decide the reply for a boot request
///
/// Fails only when the relay attachment does not resolve to a known host;
/// the caller drops the request in that case.
pub fn decide(
    request: &BootRequest,
    resolver: &dyn HostResolver,
    config: &DhcpConfig,
) -> Result<BootReply, HostNotFound> {
    let found = resolver.resolve_by_attachment(&request.circuit_id, request.relay_ip)?;
    let endpoint = found.endpoint;

    let server_ip = config.advertised_ip();
    let tftp_server = config.tftp_server();
    let tftp_server_name = if endpoint.is_controller() {
        None
    } else {
        Some(tftp_server.as_str())
    };

    Ok(BootReply {
        kind: reply_kind(request.message, endpoint.address()),
        server_ip,
        your_ip: endpoint.address(),
        subnet_mask: endpoint.network().mask(),
        gateway: endpoint.gateway(),
        dns_servers: config.dns_servers.clone(),
        lease_time: config.lease_time,
        hostname: found.host.hostname.clone(),
        domain_search: found.host.domain().map(str::to_string),
        boot: classify_boot(
            request.client_arch,
            request.user_class.as_deref(),
            server_ip,
            tftp_server_name,
        ),
    })
}
