//! DHCP server implementation
//!
//! Receives relayed boot requests and answers them from the host
//! directory. Every packet is handled on its own task.

use crate::config::DhcpConfig;
use crate::decision::{decide, ReplyKind};
use crate::error::{DhcpError, Result};
use crate::packet::{DhcpRequest, DhcpResponseBuilder};
use rackdirector_inventory::HostResolver;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

/// A reply ready to send
#[derive(Debug, Clone)]
pub struct Outbound {
    pub bytes: Vec<u8>,
    pub dest: SocketAddr,
    pub kind: ReplyKind,
    pub your_ip: Ipv4Addr,
}

/// DHCP server
pub struct DhcpServer {
    config: Arc<DhcpConfig>,
    resolver: Arc<dyn HostResolver>,
}

impl DhcpServer {
    /// Create a new DHCP server
    pub fn new(config: DhcpConfig, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
        }
    }

    /// Run the DHCP server until shutdown is signalled
    pub async fn run(&self, shutdown: tokio::sync::watch::Receiver<bool>) -> Result<()> {
        let bind_addr = SocketAddrV4::new(self.config.bind_ip, self.config.port);
        let socket = Arc::new(create_socket(bind_addr)?);

        info!(addr = %bind_addr, advertised = %self.config.advertised_ip(), "DHCP server started");

        let mut buf = [0u8; 1500];
        let mut shutdown = shutdown;

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, src)) => {
                            let data = buf[..len].to_vec();
                            let socket = Arc::clone(&socket);
                            let config = Arc::clone(&self.config);
                            let resolver = Arc::clone(&self.resolver);
                            tokio::spawn(async move {
                                if let Err(e) = handle_packet(&socket, &data, src, &config, resolver.as_ref()).await {
                                    error!(error = %e, src = %src, "Error handling DHCP packet");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error receiving packet");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("DHCP server shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Create and configure the UDP socket
fn create_socket(bind_addr: SocketAddrV4) -> Result<UdpSocket> {
    let bind_failed = |source| DhcpError::BindFailed {
        addr: bind_addr.into(),
        source,
    };

    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )
    .map_err(bind_failed)?;

    socket.set_reuse_address(true).ok();
    socket.set_broadcast(true).ok();
    socket.bind(&bind_addr.into()).map_err(bind_failed)?;
    socket.set_nonblocking(true).map_err(bind_failed)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(bind_failed)
}

async fn handle_packet(
    socket: &UdpSocket,
    data: &[u8],
    src: SocketAddr,
    config: &DhcpConfig,
    resolver: &dyn HostResolver,
) -> Result<()> {
    let Some(outbound) = process_packet(data, config, resolver) else {
        return Ok(());
    };

    socket.send_to(&outbound.bytes, outbound.dest).await?;
    debug!(src = %src, dest = %outbound.dest, "Sent DHCP reply");
    Ok(())
}

/// Decide and encode the reply for one inbound packet
///
/// Returns `None` when the packet is dropped: unparseable, a message type
/// this server does not answer, or a requester the directory cannot place.
pub fn process_packet(
    data: &[u8],
    config: &DhcpConfig,
    resolver: &dyn HostResolver,
) -> Option<Outbound> {
    let request = match DhcpRequest::parse(data) {
        Ok(req) => req,
        Err(e) => {
            debug!(error = %e, "Failed to parse DHCP packet");
            return None;
        }
    };

    let Some(boot_request) = request.boot_request() else {
        debug!(
            mac = %request.mac_address,
            msg_type = ?request.message_type,
            "Ignoring DHCP message type"
        );
        return None;
    };

    let reply = match decide(&boot_request, resolver, config) {
        Ok(reply) => reply,
        Err(e) => {
            warn!(
                circuit_id = %request.circuit_id,
                subscriber_id = %request.subscriber_id,
                mac = %request.mac_address,
                relay = %request.relay_ip,
                error = %e,
                "Dropping DHCP request"
            );
            return None;
        }
    };

    let bytes = match DhcpResponseBuilder::new(&request, &reply).build_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(mac = %request.mac_address, error = %e, "Failed to encode DHCP reply");
            return None;
        }
    };

    let dest = if request.relay_ip != Ipv4Addr::UNSPECIFIED {
        // Relayed request - send to relay agent
        SocketAddr::new(request.relay_ip.into(), 67)
    } else if request.client_ip != Ipv4Addr::UNSPECIFIED {
        SocketAddr::new(request.client_ip.into(), 68)
    } else {
        SocketAddr::new(Ipv4Addr::BROADCAST.into(), 68)
    };

    info!(
        mac = %request.mac_address,
        circuit_id = %request.circuit_id,
        hostname = %reply.hostname,
        kind = ?reply.kind,
        your_ip = %reply.your_ip,
        bootfile = %reply.boot.bootfile(),
        "Answering DHCP request"
    );

    Some(Outbound {
        bytes,
        dest,
        kind: reply.kind,
        your_ip: reply.your_ip,
    })
}
