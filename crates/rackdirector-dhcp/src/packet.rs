//! DHCP packet handling
//!
//! Parses the fields the boot decision needs out of an inbound message and
//! turns a [`BootReply`] back into a wire message.

use crate::decision::{BootMessage, BootMethod, BootReply, BootRequest, ReplyKind};
use crate::error::{DhcpError, Result};
use dhcproto::v4::relay::{RelayCode, RelayInfo};
use dhcproto::v4::{DhcpOption, Message, MessageType, Opcode, OptionCode};
use dhcproto::{Decodable, Encodable, Name};
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::debug;

/// Client architecture types (RFC 4578)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientArch {
    /// Intel x86 BIOS
    IntelX86Bios,
    /// EFI x86
    EfiX86,
    /// EFI x86_64
    EfiX64,
    /// EFI ARM32
    EfiArm32,
    /// EFI ARM64
    EfiArm64,
    /// x86_64 UEFI HTTP boot
    EfiX64Http,
    /// Any other code
    Other(u16),
}

impl From<u16> for ClientArch {
    fn from(value: u16) -> Self {
        match value {
            0 => ClientArch::IntelX86Bios,
            6 => ClientArch::EfiX86,
            7 => ClientArch::EfiX64,
            10 => ClientArch::EfiArm32,
            11 => ClientArch::EfiArm64,
            16 => ClientArch::EfiX64Http,
            other => ClientArch::Other(other),
        }
    }
}

impl ClientArch {
    /// Legacy BIOS gets the BIOS boot rows; every other code is treated as UEFI
    pub fn is_legacy_bios(&self) -> bool {
        matches!(self, ClientArch::IntelX86Bios)
    }
}

/// Parsed DHCP request with extracted information
#[derive(Debug, Clone)]
pub struct DhcpRequest {
    /// Decoded message
    pub message: Message,

    /// Message type (DISCOVER, REQUEST, etc.)
    pub message_type: MessageType,

    /// Client MAC address
    pub mac_address: String,

    /// Relay agent circuit id (option 82.1)
    pub circuit_id: String,

    /// Relay agent subscriber id (option 82.6)
    pub subscriber_id: String,

    /// First client architecture (option 93), BIOS when absent
    pub client_arch: ClientArch,

    /// First user class entry (option 77)
    pub user_class: Option<String>,

    /// Requested IP address (option 50)
    pub requested_ip: Option<Ipv4Addr>,

    /// Transaction ID
    pub xid: u32,

    /// Client IP (ciaddr)
    pub client_ip: Ipv4Addr,

    /// Gateway IP (giaddr) for relayed requests
    pub relay_ip: Ipv4Addr,
}

impl DhcpRequest {
    /// Parse a DHCP request from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let message =
            Message::from_bytes(data).map_err(|e| DhcpError::ParseError(e.to_string()))?;

        let message_type = match message.opts().get(OptionCode::MessageType) {
            Some(DhcpOption::MessageType(mt)) => mt.clone(),
            _ => return Err(DhcpError::ParseError("missing message type".to_string())),
        };

        let mac_address = message
            .chaddr()
            .iter()
            .take(6)
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":");

        let (circuit_id, subscriber_id) = match message.opts().get(OptionCode::RelayAgentInformation) {
            Some(DhcpOption::RelayAgentInformation(info)) => {
                let circuit = match info.get(RelayCode::AgentCircuitId) {
                    Some(RelayInfo::AgentCircuitId(id)) => String::from_utf8_lossy(id).into_owned(),
                    _ => String::new(),
                };
                let subscriber = match info.get(RelayCode::SubscriberId) {
                    Some(RelayInfo::SubscriberId(id)) => String::from_utf8_lossy(id).into_owned(),
                    _ => String::new(),
                };
                (circuit, subscriber)
            }
            _ => (String::new(), String::new()),
        };

        let client_arch = match message.opts().get(OptionCode::ClientSystemArchitecture) {
            Some(DhcpOption::ClientSystemArchitecture(arch)) => ClientArch::from(u16::from(*arch)),
            _ => ClientArch::IntelX86Bios,
        };

        let user_class = match message.opts().get(OptionCode::UserClass) {
            Some(DhcpOption::UserClass(raw)) => first_user_class(raw),
            _ => None,
        };

        let requested_ip = match message.opts().get(OptionCode::RequestedIpAddress) {
            Some(DhcpOption::RequestedIpAddress(ip)) => Some(*ip),
            _ => None,
        };

        Ok(Self {
            xid: message.xid(),
            client_ip: message.ciaddr(),
            relay_ip: message.giaddr(),
            message,
            message_type,
            mac_address,
            circuit_id,
            subscriber_id,
            client_arch,
            user_class,
            requested_ip,
        })
    }

    /// Boot decision input, for the message types this server answers
    pub fn boot_request(&self) -> Option<BootRequest> {
        let message = match self.message_type {
            MessageType::Discover => BootMessage::Discover,
            MessageType::Request => BootMessage::Request {
                requested: self
                    .requested_ip
                    .or_else(|| Some(self.client_ip).filter(|ip| !ip.is_unspecified())),
            },
            _ => return None,
        };

        Some(BootRequest {
            message,
            circuit_id: self.circuit_id.clone(),
            subscriber_id: self.subscriber_id.clone(),
            mac_address: self.mac_address.clone(),
            relay_ip: self.relay_ip,
            client_arch: self.client_arch,
            user_class: self.user_class.clone(),
        })
    }
}

/// First entry of a user class option
///
/// RFC 3004 encodes a list of length-prefixed entries, but iPXE and UEFI
/// firmware commonly send a bare string. Anything that does not frame
/// cleanly as a list is taken as one bare string.
fn first_user_class(raw: &[u8]) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let mut offset = 0;
    let mut entries = Vec::new();
    while offset < raw.len() {
        let len = raw[offset] as usize;
        let end = offset + 1 + len;
        if len == 0 || end > raw.len() {
            entries.clear();
            break;
        }
        entries.push(&raw[offset + 1..end]);
        offset = end;
    }

    let first = entries.first().copied().unwrap_or(raw);
    Some(String::from_utf8_lossy(first).into_owned())
}

impl From<ReplyKind> for MessageType {
    fn from(kind: ReplyKind) -> Self {
        match kind {
            ReplyKind::Offer => MessageType::Offer,
            ReplyKind::Ack => MessageType::Ack,
            ReplyKind::Nak => MessageType::Nak,
        }
    }
}

/// DHCP response builder
pub struct DhcpResponseBuilder<'a> {
    request: &'a DhcpRequest,
    reply: &'a BootReply,
}

impl<'a> DhcpResponseBuilder<'a> {
    /// Create a builder answering `request` with `reply`
    pub fn new(request: &'a DhcpRequest, reply: &'a BootReply) -> Self {
        Self { request, reply }
    }

    /// Build the response message
    pub fn build(self) -> Message {
        let reply = self.reply;
        let mut response = Message::default();

        response.set_opcode(Opcode::BootReply);
        response.set_xid(self.request.xid);
        response.set_flags(self.request.message.flags());
        response.set_chaddr(self.request.message.chaddr());
        response.set_giaddr(self.request.relay_ip);
        response.set_yiaddr(reply.your_ip);
        response.set_siaddr(reply.server_ip);

        let opts = response.opts_mut();
        opts.insert(DhcpOption::MessageType(reply.kind.into()));
        opts.insert(DhcpOption::ServerIdentifier(reply.server_ip));
        opts.insert(DhcpOption::SubnetMask(reply.subnet_mask));
        if let Some(gateway) = reply.gateway {
            opts.insert(DhcpOption::Router(vec![gateway]));
        }
        if !reply.dns_servers.is_empty() {
            opts.insert(DhcpOption::DomainNameServer(reply.dns_servers.clone()));
        }
        opts.insert(DhcpOption::AddressLeaseTime(reply.lease_time));

        if let Some(ref domain) = reply.domain_search {
            match Name::from_str(domain) {
                Ok(name) => {
                    opts.insert(DhcpOption::DomainSearch(vec![name]));
                }
                Err(e) => debug!(domain = %domain, error = %e, "Skipping unencodable domain search"),
            }
        }

        let bootfile = match &reply.boot {
            BootMethod::Http { bootfile } => bootfile,
            BootMethod::Tftp {
                server_name,
                bootfile,
            } => {
                if let Some(name) = server_name {
                    opts.insert(DhcpOption::TFTPServerName(name.clone().into_bytes()));
                }
                bootfile
            }
        };
        opts.insert(DhcpOption::BootfileName(bootfile.clone().into_bytes()));
        response.set_fname_str(bootfile);

        response
    }

    /// Build and encode the response to bytes
    pub fn build_bytes(self) -> Result<Vec<u8>> {
        self.build()
            .to_vec()
            .map_err(|e| DhcpError::EncodeError(e.to_string()))
    }
}
